//! # Frame pipeline
//!
//! Ties the vehicle's camera, the detector, tracking control and the
//! dispatcher together. The executable calls [`FramePipeline::tick`] once per
//! cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::Arc;

// Internal
use crate::control_handle::ControlHandle;
use crate::dispatch::Dispatcher;
use crate::track_ctrl::{self, TrackCtrl};
use link_if::{Command, CommandChannel, Detector, FrameSource, VelocityCommand};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The frame processing pipeline.
pub struct FramePipeline<F, C> {
    frames: Arc<F>,
    detector: Box<dyn Detector>,
    track_ctrl: TrackCtrl,
    dispatcher: Dispatcher<C>,
    handle: ControlHandle,

    /// Sequence number of the last frame processed.
    last_seq: Option<u64>,

    /// Set once a frame size mismatch has been reported.
    size_warned: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The vehicle is landing, the pipeline has nothing more to do.
    Stopped,

    /// No new frame was available.
    NoFrame,

    /// The frame's size doesn't match the controller profile, so its image
    /// centre would be wrong. Nothing was dispatched.
    WrongFrameSize { width: u32, height: u32 },

    /// A command was computed and handed to the dispatcher.
    Dispatched(VelocityCommand),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F, C> FramePipeline<F, C>
where
    F: FrameSource,
    C: CommandChannel + 'static,
{
    /// Create a new pipeline. `track_ctrl` must already be initialised.
    pub fn new(
        frames: Arc<F>,
        detector: Box<dyn Detector>,
        track_ctrl: TrackCtrl,
        dispatcher: Dispatcher<C>,
        handle: ControlHandle,
    ) -> Self {
        Self {
            frames,
            detector,
            track_ctrl,
            dispatcher,
            handle,
            last_seq: None,
            size_warned: false,
        }
    }

    /// Process the latest frame.
    pub fn tick(&mut self) -> Result<TickOutcome, track_ctrl::TrackCtrlError> {
        if self.handle.is_landed() {
            return Ok(TickOutcome::Stopped);
        }

        let frame = match self.frames.latest_frame() {
            Some(f) => f,
            None => return Ok(TickOutcome::NoFrame),
        };

        // The same frame twice would give a zero derivative term
        if self.last_seq == Some(frame.seq) {
            return Ok(TickOutcome::NoFrame);
        }
        if let Some(prev) = self.last_seq {
            if frame.seq > prev + 1 {
                debug!("Skipped {} frames", frame.seq - prev - 1);
            }
        }
        self.last_seq = Some(frame.seq);

        let params = self.track_ctrl.params();
        if frame.width as i64 != params.frame_width as i64
            || frame.height as i64 != params.frame_height as i64
        {
            if !self.size_warned {
                warn!(
                    "Frame is {}x{} but the tracking profile expects {}x{}, frames will be ignored",
                    frame.width, frame.height, params.frame_width, params.frame_height
                );
                self.size_warned = true;
            }
            return Ok(TickOutcome::WrongFrameSize {
                width: frame.width,
                height: frame.height,
            });
        }

        let detection = self.detector.detect(&frame);

        let (cmd, report) = self.track_ctrl.proc(&track_ctrl::InputData {
            detection,
            enabled: self.handle.tracking_enabled(),
        })?;

        if report.yaw_limited || report.up_down_limited {
            debug!("Tracking demand limited: {:?}", report);
        }

        // The latch may have been set while this frame was processed
        if self.handle.is_landed() {
            info!("Vehicle landing, frame pipeline stopping");
            return Ok(TickOutcome::Stopped);
        }

        self.dispatcher.dispatch(Command::Velocity(cmd));
        self.handle.set_current_command(cmd);

        Ok(TickOutcome::Dispatched(cmd))
    }

    pub fn track_ctrl(&self) -> &TrackCtrl {
        &self.track_ctrl
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
    use crate::params::TrackExecParams;
    use crate::safety::{SafetyMonitor, SafetyTick};
    use crate::shell_processor::{ShellAction, ShellProcessor};
    use crate::test_utils::{MockChannel, MockDetector, MockFrames, MockStatus};
    use crate::track_ctrl::Params;
    use link_if::{shell::ShellCmd, DetectionResult};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Fixture {
        pipeline: FramePipeline<MockFrames, MockChannel>,
        channel: Arc<MockChannel>,
        handle: ControlHandle,
        latch: LandedLatch,
    }

    fn fixture(frames: u64, detections: Vec<DetectionResult>) -> Fixture {
        let channel = Arc::new(MockChannel::always_ok());
        let latch = LandedLatch::new();
        let dispatcher = Dispatcher::new(channel.clone(), latch.clone(), RetryParams::fast());
        let handle = ControlHandle::new(latch.clone(), Arc::new(Mutex::new(None)));

        let pipeline = FramePipeline::new(
            Arc::new(MockFrames::new(frames)),
            Box::new(MockDetector(detections.into())),
            TrackCtrl::new(Params::default()).unwrap(),
            dispatcher,
            handle.clone(),
        );

        Fixture {
            pipeline,
            channel,
            handle,
            latch,
        }
    }

    fn wait_for_calls(channel: &MockChannel, n: usize) {
        let start = Instant::now();
        while channel.total_calls() < n && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_tick_tracks() {
        let mut f = fixture(
            3,
            vec![
                DetectionResult::new(200, 120, 9000),
                DetectionResult::new(200, 120, 20000),
            ],
        );
        f.handle.set_tracking_enabled(true);

        assert_eq!(
            f.pipeline.tick().unwrap(),
            TickOutcome::Dispatched(VelocityCommand::new(0, 0, 0, 14))
        );
        assert_eq!(f.handle.current_command(), VelocityCommand::new(0, 0, 0, 14));

        assert_eq!(
            f.pipeline.tick().unwrap(),
            TickOutcome::Dispatched(VelocityCommand::new(0, -20, 0, 7))
        );

        // Detector has run out, no target
        assert_eq!(
            f.pipeline.tick().unwrap(),
            TickOutcome::Dispatched(VelocityCommand::ZERO)
        );
        assert_eq!(f.pipeline.track_ctrl().tracking_state().prev_error, 0);

        // Frames have run out
        assert_eq!(f.pipeline.tick().unwrap(), TickOutcome::NoFrame);

        wait_for_calls(&f.channel, 3);
        assert_eq!(f.channel.calls_to("rc"), 3);
    }

    #[test]
    fn test_tick_rejects_wrong_frame_size() {
        let channel = Arc::new(MockChannel::always_ok());
        let latch = LandedLatch::new();
        let dispatcher = Dispatcher::new(channel.clone(), latch.clone(), RetryParams::fast());
        let handle = ControlHandle::new(latch, Arc::new(Mutex::new(None)));
        handle.set_tracking_enabled(true);

        // The mock camera gives 360x240 frames
        let params = Params {
            frame_width: 640,
            frame_height: 480,
            ..Params::default()
        };
        let mut pipeline = FramePipeline::new(
            Arc::new(MockFrames::new(2)),
            Box::new(MockDetector(vec![DetectionResult::new(200, 120, 9000)].into())),
            TrackCtrl::new(params).unwrap(),
            dispatcher,
            handle,
        );

        for _ in 0..2 {
            assert_eq!(
                pipeline.tick().unwrap(),
                TickOutcome::WrongFrameSize {
                    width: 360,
                    height: 240
                }
            );
        }

        thread::sleep(Duration::from_millis(20));
        assert_eq!(channel.total_calls(), 0);
    }

    #[test]
    fn test_tick_disabled_hovers() {
        let mut f = fixture(1, vec![DetectionResult::new(20, 20, 30000)]);

        assert_eq!(
            f.pipeline.tick().unwrap(),
            TickOutcome::Dispatched(VelocityCommand::ZERO)
        );
    }

    #[test]
    fn test_tick_stops_when_landed() {
        let mut f = fixture(5, vec![DetectionResult::new(200, 120, 9000)]);
        f.handle.set_tracking_enabled(true);

        assert!(f.latch.try_latch());
        assert_eq!(f.pipeline.tick().unwrap(), TickOutcome::Stopped);
        assert_eq!(f.pipeline.tick().unwrap(), TickOutcome::Stopped);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(f.channel.total_calls(), 0);
    }

    #[test]
    fn test_monitor_and_shell_outlive_pipeline() {
        let channel = Arc::new(MockChannel::always_ok());
        let latch = LandedLatch::new();
        let dispatcher = Dispatcher::new(channel.clone(), latch.clone(), RetryParams::fast());
        let monitor = SafetyMonitor::new(
            Arc::new(MockStatus::new(vec![Ok(4), Ok(3)])),
            dispatcher.clone(),
            5,
            Duration::from_millis(10),
        );
        let handle = ControlHandle::new(latch, monitor.battery_reading());
        let shell = ShellProcessor::new(
            dispatcher.clone(),
            handle.clone(),
            &TrackExecParams::default(),
        );
        let mut pipeline = FramePipeline::new(
            Arc::new(MockFrames::new(5)),
            Box::new(MockDetector(Default::default())),
            TrackCtrl::new(Params::default()).unwrap(),
            dispatcher,
            handle.clone(),
        );

        assert_eq!(monitor.check(), SafetyTick::Latched(4));
        assert_eq!(pipeline.tick().unwrap(), TickOutcome::Stopped);

        // Battery is still polled and reported while landing
        assert_eq!(monitor.check(), SafetyTick::AlreadyLatched(3));
        assert_eq!(handle.battery_percent(), Some(3));
        assert!(handle.status().landed);

        assert_eq!(shell.exec(&ShellCmd::Status), ShellAction::Continue);
        assert_eq!(shell.exec(&ShellCmd::Land), ShellAction::Continue);

        wait_for_calls(&channel, 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(channel.commands(), vec![Command::Land]);
    }
}
