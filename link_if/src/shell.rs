//! # Operator shell commands
//!
//! Commands typed by the operator (or read from a script) are parsed into a
//! [`ShellCmd`]. The grammar is a small set of subcommands, for example:
//!
//! ```text
//! takeoff
//! track on
//! move left 40
//! rotate cw
//! land
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;
use structopt::{clap::AppSettings, StructOpt};

use crate::cmd::{Direction, ParseCmdError, Rotation};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command issued by the operator.
#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(name = "quadtrack", setting = AppSettings::NoBinaryName)]
pub enum ShellCmd {
    /// Take off, then climb by the configured height once airborne.
    #[structopt(name = "takeoff")]
    Takeoff,

    /// Land the vehicle. Once landing has started no further movement is possible.
    #[structopt(name = "land")]
    Land,

    /// Enable, disable or toggle target tracking.
    #[structopt(name = "track")]
    Track {
        /// One of "on", "off" or "toggle"
        mode: TrackMode,
    },

    /// Move a fixed distance in a direction.
    #[structopt(name = "move")]
    Move {
        /// One of left, right, up, down, forward or back
        direction: Direction,

        /// Distance in centimetres, the configured default is used if not given
        distance_cm: Option<u32>,
    },

    /// Rotate on the spot.
    #[structopt(name = "rotate")]
    Rotate {
        /// Either cw or ccw
        rotation: Rotation,

        /// Angle in degrees, the configured default is used if not given
        degrees: Option<u32>,
    },

    /// Print the current command, battery level and landed state.
    #[structopt(name = "status")]
    Status,

    /// Stop the video stream, land and exit.
    #[structopt(name = "exit")]
    Exit,
}

/// Ways the tracking flag can be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    On,
    Off,
    Toggle,
}

/// Errors parsing a shell command.
#[derive(Debug, thiserror::Error)]
pub enum ShellParseError {
    #[error("The command is empty")]
    Empty,

    #[error("Invalid command \"{0}\": {1}")]
    Invalid(String, String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShellCmd {
    /// Parse a command from a single line of text.
    pub fn parse_line(line: &str) -> Result<Self, ShellParseError> {
        let line = line.trim();

        if line.is_empty() {
            return Err(ShellParseError::Empty);
        }

        ShellCmd::from_iter_safe(line.split_whitespace())
            .map_err(|e| ShellParseError::Invalid(line.into(), e.message))
    }
}

impl FromStr for TrackMode {
    type Err = ParseCmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "enable" => Ok(TrackMode::On),
            "off" | "disable" => Ok(TrackMode::Off),
            "toggle" => Ok(TrackMode::Toggle),
            _ => Err(ParseCmdError::new("tracking mode", s)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
