//! # Shell command processor
//!
//! Executes operator commands, whether typed at the console or read from a
//! script.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;
use std::thread;

// Internal
use crate::control_handle::{ControlHandle, ControlStatus};
use crate::dispatch::{DispatchOutcome, DispatchStatsSnapshot, Dispatcher};
use crate::params::TrackExecParams;
use crate::safety::{initiate_landing, LandCause};
use link_if::{
    shell::{ShellCmd, TrackMode},
    Command, CommandChannel, Direction,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Executes shell commands against the dispatcher and control handle.
pub struct ShellProcessor<C> {
    dispatcher: Dispatcher<C>,
    handle: ControlHandle,

    move_distance_cm: u32,
    rotate_deg: u32,
    takeoff_climb_cm: u32,
}

/// Everything printed by the `status` command.
#[derive(Debug, Serialize)]
struct StatusDisplay {
    #[serde(flatten)]
    control: ControlStatus,
    dispatch: DispatchStatsSnapshot,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What the executable should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellAction {
    Continue,
    Exit,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C> ShellProcessor<C>
where
    C: CommandChannel + 'static,
{
    pub fn new(dispatcher: Dispatcher<C>, handle: ControlHandle, params: &TrackExecParams) -> Self {
        Self {
            dispatcher,
            handle,
            move_distance_cm: params.move_distance_cm,
            rotate_deg: params.rotate_deg,
            takeoff_climb_cm: params.takeoff_climb_cm,
        }
    }

    /// Execute a shell command.
    ///
    /// Commands are dispatched in the background, only `exit` waits for the
    /// vehicle.
    pub fn exec(&self, cmd: &ShellCmd) -> ShellAction {
        match cmd {
            ShellCmd::Takeoff => {
                info!("Taking off");
                self.takeoff();
            }
            ShellCmd::Land => {
                initiate_landing(self.dispatcher.latch(), &self.dispatcher, LandCause::Operator);
            }
            ShellCmd::Track { mode } => {
                let enabled = match mode {
                    TrackMode::On => {
                        self.handle.set_tracking_enabled(true);
                        true
                    }
                    TrackMode::Off => {
                        self.handle.set_tracking_enabled(false);
                        false
                    }
                    TrackMode::Toggle => self.handle.toggle_tracking(),
                };
                info!("Tracking {}", if enabled { "enabled" } else { "disabled" });
            }
            ShellCmd::Move {
                direction,
                distance_cm,
            } => {
                self.dispatcher.dispatch(Command::Move {
                    direction: *direction,
                    distance_cm: distance_cm.unwrap_or(self.move_distance_cm),
                });
            }
            ShellCmd::Rotate { rotation, degrees } => {
                self.dispatcher.dispatch(Command::Rotate {
                    rotation: *rotation,
                    degrees: degrees.unwrap_or(self.rotate_deg),
                });
            }
            ShellCmd::Status => {
                let status = StatusDisplay {
                    control: self.handle.status(),
                    dispatch: self.dispatcher.stats(),
                };
                match serde_json::to_string_pretty(&status) {
                    Ok(s) => info!("Status:\n{}", s),
                    Err(e) => warn!("Could not format the status: {}", e),
                }
            }
            ShellCmd::Exit => {
                self.exit();
                return ShellAction::Exit;
            }
        }

        ShellAction::Continue
    }

    /// Take off, then climb once the takeoff has been acknowledged.
    fn takeoff(&self) {
        let takeoff = self.dispatcher.dispatch(Command::Takeoff);

        if self.takeoff_climb_cm == 0 {
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let climb_cm = self.takeoff_climb_cm;

        let spawn_result = thread::Builder::new()
            .name("takeoff_climb".into())
            .spawn(move || match takeoff.wait() {
                DispatchOutcome::Acked { .. } => {
                    info!("Airborne, climbing {} cm", climb_cm);
                    dispatcher.dispatch(Command::Move {
                        direction: Direction::Up,
                        distance_cm: climb_cm,
                    });
                }
                o => warn!("Takeoff did not complete ({:?}), not climbing", o),
            });

        if let Err(e) = spawn_result {
            warn!("Could not start the takeoff climb: {}", e);
        }
    }

    /// Stop the video stream then land, waiting for both to finish so they
    /// aren't abandoned when the process exits.
    fn exit(&self) {
        info!("Exiting: stopping the video stream and landing");

        let stream_off = self.dispatcher.dispatch(Command::StreamOff).wait();
        if !matches!(stream_off, DispatchOutcome::Acked { .. }) {
            warn!("Could not stop the video stream ({:?})", stream_off);
        }

        if let Some(land) =
            initiate_landing(self.dispatcher.latch(), &self.dispatcher, LandCause::Exit)
        {
            match land.wait() {
                DispatchOutcome::Acked { .. } => info!("Landing acknowledged"),
                o => warn!("Landing was not acknowledged ({:?})", o),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::dispatch::RetryParams;
    use crate::safety::LandedLatch;
    use crate::test_utils::MockChannel;
    use link_if::Rotation;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn processor(
        channel: &Arc<MockChannel>,
        takeoff_climb_cm: u32,
    ) -> (ShellProcessor<MockChannel>, ControlHandle) {
        let latch = LandedLatch::new();
        let dispatcher = Dispatcher::new(channel.clone(), latch.clone(), RetryParams::fast());
        let handle = ControlHandle::new(latch, Arc::new(Mutex::new(None)));
        let params = TrackExecParams {
            takeoff_climb_cm,
            ..TrackExecParams::default()
        };

        (
            ShellProcessor::new(dispatcher, handle.clone(), &params),
            handle,
        )
    }

    fn wait_for_calls(channel: &MockChannel, n: usize) {
        let start = Instant::now();
        while channel.total_calls() < n && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_tracking_commands() {
        let channel = Arc::new(MockChannel::always_ok());
        let (sp, handle) = processor(&channel, 0);

        sp.exec(&ShellCmd::Track { mode: TrackMode::On });
        assert!(handle.tracking_enabled());
        sp.exec(&ShellCmd::Track { mode: TrackMode::Toggle });
        assert!(!handle.tracking_enabled());
        sp.exec(&ShellCmd::Track { mode: TrackMode::Toggle });
        assert!(handle.tracking_enabled());
        sp.exec(&ShellCmd::Track { mode: TrackMode::Off });
        assert!(!handle.tracking_enabled());

        assert_eq!(sp.exec(&ShellCmd::Status), ShellAction::Continue);
        assert_eq!(channel.total_calls(), 0);
    }

    #[test]
    fn test_manual_defaults() {
        let channel = Arc::new(MockChannel::always_ok());
        let (sp, _) = processor(&channel, 0);

        sp.exec(&ShellCmd::Move {
            direction: Direction::Left,
            distance_cm: None,
        });
        sp.exec(&ShellCmd::Rotate {
            rotation: Rotation::Anticlockwise,
            degrees: Some(90),
        });
        wait_for_calls(&channel, 2);

        let cmds = channel.commands();
        assert!(cmds.contains(&Command::Move {
            direction: Direction::Left,
            distance_cm: 20
        }));
        assert!(cmds.contains(&Command::Rotate {
            rotation: Rotation::Anticlockwise,
            degrees: 90
        }));
    }

    #[test]
    fn test_takeoff_then_climb() {
        let channel = Arc::new(MockChannel::always_ok());
        let (sp, _) = processor(&channel, 100);

        sp.exec(&ShellCmd::Takeoff);
        wait_for_calls(&channel, 2);

        assert_eq!(
            channel.commands(),
            vec![
                Command::Takeoff,
                Command::Move {
                    direction: Direction::Up,
                    distance_cm: 100
                }
            ]
        );
    }

    #[test]
    fn test_land_blocks_motion() {
        let channel = Arc::new(MockChannel::always_ok());
        let (sp, handle) = processor(&channel, 0);

        sp.exec(&ShellCmd::Land);
        assert!(handle.is_landed());
        wait_for_calls(&channel, 1);

        sp.exec(&ShellCmd::Takeoff);
        sp.exec(&ShellCmd::Move {
            direction: Direction::Up,
            distance_cm: None,
        });
        thread::sleep(Duration::from_millis(20));

        assert_eq!(channel.commands(), vec![Command::Land]);
    }

    #[test]
    fn test_exit_sequence() {
        let channel = Arc::new(MockChannel::always_ok());
        let (sp, handle) = processor(&channel, 0);

        assert_eq!(sp.exec(&ShellCmd::Exit), ShellAction::Exit);
        assert!(handle.is_landed());
        assert_eq!(channel.commands(), vec![Command::StreamOff, Command::Land]);
    }
}
