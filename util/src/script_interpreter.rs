//! # Flight script interpreter
//!
//! A flight script is a list of timestamped shell commands, for example:
//!
//! ```text
//! 1.0: takeoff;
//! 4.0: track on;
//! 60.0: land;
//! ```
//!
//! Times are seconds since the start of the session. Anything outside the
//! `<time>: <command>;` pattern is ignored, so scripts may carry comments.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use link_if::shell::{ShellCmd, ShellParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug)]
struct ScriptedCmd {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    cmd: ShellCmd,
}

/// A script interpreter.
///
/// After initialising with the path to the script use `.get_pending_cmds` each
/// cycle to acquire the commands which are now due.
#[derive(Debug)]
pub struct ScriptInterpreter {
    _script_path: PathBuf,
    cmds: VecDeque<ScriptedCmd>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error),

    #[error("The script contains no commands")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid command at {0} s: {1}")]
    InvalidCmd(f64, ShellParseError),
}

/// Result of polling the interpreter for due commands.
#[derive(Debug)]
pub enum PendingCmds {
    None,
    Some(Vec<ShellCmd>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let cmds = parse_script(&script)?;

        Ok(ScriptInterpreter {
            _script_path: path,
            cmds,
        })
    }

    /// Return the commands whose execution time has passed.
    pub fn get_pending_cmds(&mut self) -> PendingCmds {
        self.pending_at(get_elapsed_seconds())
    }

    /// Get the number of commands remaining in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }

    fn pending_at(&mut self, current_time_s: f64) -> PendingCmds {
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript;
        }

        let mut due = vec![];

        while let Some(front) = self.cmds.front() {
            if front.exec_time_s >= current_time_s {
                break;
            }
            if let Some(c) = self.cmds.pop_front() {
                due.push(c.cmd);
            }
        }

        if due.is_empty() {
            PendingCmds::None
        } else {
            PendingCmds::Some(due)
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_script(script: &str) -> Result<VecDeque<ScriptedCmd>, ScriptError> {
    let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
        .multi_line(true)
        .build()
        .map_err(ScriptError::PatternError)?;

    let mut cmds = VecDeque::new();

    for cap in re.captures_iter(script) {
        let time_str = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let exec_time_s: f64 = time_str
            .parse()
            .map_err(|_| ScriptError::InvalidTimestamp(time_str.into()))?;

        let cmd_str = cap.get(3).map(|m| m.as_str()).unwrap_or("");
        let cmd = ShellCmd::parse_line(cmd_str)
            .map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

        cmds.push_back(ScriptedCmd { exec_time_s, cmd });
    }

    if cmds.is_empty() {
        return Err(ScriptError::ScriptEmpty);
    }

    // Scripts are written in order, but don't rely on it
    cmds.make_contiguous().sort_by(|a, b| {
        a.exec_time_s
            .partial_cmp(&b.exec_time_s)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(cmds)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use link_if::shell::TrackMode;

    fn interpreter(script: &str) -> ScriptInterpreter {
        ScriptInterpreter {
            _script_path: PathBuf::new(),
            cmds: parse_script(script).unwrap(),
        }
    }

    #[test]
    fn test_parse_script() {
        let si = interpreter(
            "# takeoff then track\n\
             1.0: takeoff;\n\
             2.5: track on;\n\
             30: land;\n",
        );

        assert_eq!(si.get_num_cmds(), 3);
        assert_eq!(si.get_duration(), 30.0);
    }

    #[test]
    fn test_pending() {
        let mut si = interpreter("1.0: takeoff;\n2.5: track on;\n30: land;\n");

        assert!(matches!(si.pending_at(0.5), PendingCmds::None));

        match si.pending_at(3.0) {
            PendingCmds::Some(cmds) => assert_eq!(
                cmds,
                vec![ShellCmd::Takeoff, ShellCmd::Track { mode: TrackMode::On }]
            ),
            p => panic!("Expected two commands, got {:?}", p),
        }

        match si.pending_at(31.0) {
            PendingCmds::Some(cmds) => assert_eq!(cmds, vec![ShellCmd::Land]),
            p => panic!("Expected land, got {:?}", p),
        }

        assert!(matches!(si.pending_at(32.0), PendingCmds::EndOfScript));
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(parse_script("nothing here"), Err(ScriptError::ScriptEmpty)));
        assert!(matches!(
            parse_script("1.0: takeoff;\n2.0: somersault;\n"),
            Err(ScriptError::InvalidCmd(t, _)) if t == 2.0
        ));
    }
}
