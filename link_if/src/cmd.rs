//! # Vehicle commands
//!
//! Every command the software can issue to the vehicle, and the
//! acknowledgement the vehicle link returns for it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Largest magnitude of any velocity component the link accepts.
pub const VELOCITY_LIMIT: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A continuous four-axis velocity command.
///
/// All components are unitless demands in the range
/// `[-VELOCITY_LIMIT, VELOCITY_LIMIT]`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Lateral demand, positive is to the right.
    pub left_right: i32,

    /// Longitudinal demand, positive is forwards.
    pub forward_backward: i32,

    /// Vertical demand, positive is upwards.
    pub up_down: i32,

    /// Yaw rate demand, positive is clockwise.
    pub yaw: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command which can be sent to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Takeoff,
    Land,
    StreamOn,
    StreamOff,

    /// Discrete move by a distance in centimetres.
    Move {
        direction: Direction,
        distance_cm: u32,
    },

    /// Discrete rotation on the spot by an angle in degrees.
    Rotate {
        rotation: Rotation,
        degrees: u32,
    },

    /// Continuous velocity demand.
    Velocity(VelocityCommand),
}

/// Directions for a discrete move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    Forward,
    Back,
}

/// Sense of a discrete rotation, looking down on the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    Anticlockwise,
}

/// The vehicle's acknowledgement of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    /// The command was accepted.
    Ok,

    /// The vehicle answered but did not accept the command. Contains the
    /// vehicle's response text.
    Rejected(String),
}

/// Error parsing a direction or rotation from text.
#[derive(Debug, thiserror::Error)]
#[error("Unrecognised {kind}: \"{value}\"")]
pub struct ParseCmdError {
    kind: &'static str,
    value: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VelocityCommand {
    /// The all-zero (hover) command.
    pub const ZERO: VelocityCommand = VelocityCommand {
        left_right: 0,
        forward_backward: 0,
        up_down: 0,
        yaw: 0,
    };

    /// Create a new command from its components.
    pub fn new(left_right: i32, forward_backward: i32, up_down: i32, yaw: i32) -> Self {
        Self {
            left_right,
            forward_backward,
            up_down,
            yaw,
        }
    }

    /// True if every component is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Return a copy with every component limited to `[-limit, limit]`.
    pub fn clamped(self, limit: i32) -> Self {
        let limit = limit.abs();
        Self {
            left_right: self.left_right.clamp(-limit, limit),
            forward_backward: self.forward_backward.clamp(-limit, limit),
            up_down: self.up_down.clamp(-limit, limit),
            yaw: self.yaw.clamp(-limit, limit),
        }
    }

    /// True if every component lies within `[-limit, limit]`.
    pub fn within(&self, limit: i32) -> bool {
        self.clamped(limit) == *self
    }
}

impl Command {
    /// Motion commands are those which can make the vehicle move. These must not be issued once
    /// the vehicle is landing or landed.
    pub fn is_motion(&self) -> bool {
        match self {
            Command::Takeoff
            | Command::Move { .. }
            | Command::Rotate { .. }
            | Command::Velocity(_) => true,
            Command::Land | Command::StreamOn | Command::StreamOff => false,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Takeoff => "takeoff",
            Command::Land => "land",
            Command::StreamOn => "streamon",
            Command::StreamOff => "streamoff",
            Command::Move { .. } => "move",
            Command::Rotate { .. } => "rotate",
            Command::Velocity(_) => "rc",
        }
    }
}

impl ParseCmdError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl Ack {
    pub fn is_ok(&self) -> bool {
        matches!(self, Ack::Ok)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move {
                direction,
                distance_cm,
            } => write!(f, "move {:?} {} cm", direction, distance_cm),
            Command::Rotate { rotation, degrees } => {
                write!(f, "rotate {:?} {} deg", rotation, degrees)
            }
            Command::Velocity(v) => write!(
                f,
                "rc {} {} {} {}",
                v.left_right, v.forward_backward, v.up_down, v.yaw
            ),
            c => write!(f, "{}", c.name()),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseCmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "forward" | "fwd" | "f" => Ok(Direction::Forward),
            "back" | "backward" | "b" => Ok(Direction::Back),
            _ => Err(ParseCmdError::new("direction", s)),
        }
    }
}

impl FromStr for Rotation {
    type Err = ParseCmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cw" | "clockwise" | "right" => Ok(Rotation::Clockwise),
            "ccw" | "acw" | "anticlockwise" | "left" => Ok(Rotation::Anticlockwise),
            _ => Err(ParseCmdError::new("rotation", s)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_motion_commands() {
        assert!(Command::Takeoff.is_motion());
        assert!(Command::Velocity(VelocityCommand::ZERO).is_motion());
        assert!(Command::Move {
            direction: Direction::Left,
            distance_cm: 20
        }
        .is_motion());
        assert!(!Command::Land.is_motion());
        assert!(!Command::StreamOff.is_motion());
    }

    #[test]
    fn test_clamped() {
        let v = VelocityCommand::new(-250, 20, 101, -100).clamped(VELOCITY_LIMIT);
        assert_eq!(v, VelocityCommand::new(-100, 20, 100, -100));
        assert!(v.within(VELOCITY_LIMIT));
        assert!(!VelocityCommand::new(0, 0, 61, 0).within(60));
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!("Fwd".parse::<Direction>().unwrap(), Direction::Forward);
        assert_eq!("ccw".parse::<Rotation>().unwrap(), Rotation::Anticlockwise);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
