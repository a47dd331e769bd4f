//! # Operator console
//!
//! Reads shell commands from the terminal on a background thread, so that the
//! frame loop keeps running while the operator types.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, warn};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

// Internal
use link_if::shell::{ShellCmd, ShellParseError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PROMPT: &str = "quadtrack $ ";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Receiving end of the console thread.
pub struct Console {
    rx: Receiver<ShellCmd>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Console {
    /// Start the console thread.
    ///
    /// The thread is never joined: it spends its life blocked on the terminal
    /// and exits with the process.
    pub fn start() -> Result<Self, ReadlineError> {
        let editor = DefaultEditor::new()?;
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("console".into())
            .spawn(move || console_thread(editor, tx))
            .map_err(ReadlineError::Io)?;

        Ok(Self { rx })
    }

    /// Get all commands entered since the last call.
    ///
    /// If the console has closed an `exit` command is returned, so closing
    /// the console (Ctrl-D) lands the vehicle rather than leaving it flying
    /// with no operator.
    pub fn pending_cmds(&self) -> Vec<ShellCmd> {
        let mut cmds = Vec::new();

        loop {
            match self.rx.try_recv() {
                Ok(c) => cmds.push(c),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if cmds.last() != Some(&ShellCmd::Exit) {
                        cmds.push(ShellCmd::Exit);
                    }
                    break;
                }
            }
        }

        cmds
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn console_thread(mut editor: DefaultEditor, tx: Sender<ShellCmd>) {
    info!("Console ready, type \"help\" for the list of commands");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                info!("Console closed");
                tx.send(ShellCmd::Exit).ok();
                break;
            }
            Err(e) => {
                error!("Console error: {}", e);
                tx.send(ShellCmd::Exit).ok();
                break;
            }
        };

        let cmd = match ShellCmd::parse_line(&line) {
            Ok(c) => c,
            Err(ShellParseError::Empty) => continue,
            Err(e) => {
                // Help and usage text arrives as a parse error
                warn!("{}", e);
                continue;
            }
        };

        editor.add_history_entry(line.as_str()).ok();

        let exit = cmd == ShellCmd::Exit;
        if tx.send(cmd).is_err() || exit {
            break;
        }
    }
}
