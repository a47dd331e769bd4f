//! Mock vehicle links used by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use link_if::{
    Ack, ChannelError, Command, CommandChannel, DetectionResult, Detector, Direction, Frame,
    FrameSource, Rotation, VehicleStatus, VelocityCommand,
};

// ---------------------------------------------------------------------------
// COMMAND CHANNEL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    AlwaysOk,
    AlwaysFail,
    FailThenOk(usize),
    RejectThenOk(usize),
}

/// Command channel which records every call and answers to a script.
#[derive(Debug)]
pub(crate) struct MockChannel {
    behaviour: Behaviour,
    calls: Mutex<Vec<Command>>,
}

impl MockChannel {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::with(Behaviour::AlwaysOk)
    }

    pub fn always_failing() -> Self {
        Self::with(Behaviour::AlwaysFail)
    }

    /// Fail the first `n` calls with a link error, then succeed.
    pub fn fail_then_ok(n: usize) -> Self {
        Self::with(Behaviour::FailThenOk(n))
    }

    /// Answer the first `n` calls with a negative acknowledgement, then succeed.
    pub fn rejecting_then_ok(n: usize) -> Self {
        Self::with(Behaviour::RejectThenOk(n))
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_velocity(&self) -> Option<VelocityCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                Command::Velocity(v) => Some(*v),
                _ => None,
            })
    }

    fn record(&self, cmd: Command) -> Result<Ack, ChannelError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(cmd);
            calls.len()
        };

        match self.behaviour {
            Behaviour::AlwaysOk => Ok(Ack::Ok),
            Behaviour::AlwaysFail => Err(ChannelError::Timeout),
            Behaviour::FailThenOk(k) if n <= k => Err(ChannelError::Transport("mock".into())),
            Behaviour::RejectThenOk(k) if n <= k => Ok(Ack::Rejected("error".into())),
            _ => Ok(Ack::Ok),
        }
    }
}

impl CommandChannel for MockChannel {
    fn takeoff(&self) -> Result<Ack, ChannelError> {
        self.record(Command::Takeoff)
    }

    fn land(&self) -> Result<Ack, ChannelError> {
        self.record(Command::Land)
    }

    fn stream_on(&self) -> Result<Ack, ChannelError> {
        self.record(Command::StreamOn)
    }

    fn stream_off(&self) -> Result<Ack, ChannelError> {
        self.record(Command::StreamOff)
    }

    fn move_by(&self, direction: Direction, distance_cm: u32) -> Result<Ack, ChannelError> {
        self.record(Command::Move {
            direction,
            distance_cm,
        })
    }

    fn rotate(&self, rotation: Rotation, degrees: u32) -> Result<Ack, ChannelError> {
        self.record(Command::Rotate { rotation, degrees })
    }

    fn set_velocity(&self, cmd: &VelocityCommand) -> Result<Ack, ChannelError> {
        self.record(Command::Velocity(*cmd))
    }
}

// ---------------------------------------------------------------------------
// VEHICLE STATUS
// ---------------------------------------------------------------------------

/// Battery readings played back in order, the last one repeats forever.
#[derive(Debug)]
pub(crate) struct MockStatus {
    readings: Mutex<VecDeque<Result<u8, ChannelError>>>,
}

impl MockStatus {
    pub fn new(readings: Vec<Result<u8, ChannelError>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
        }
    }
}

impl VehicleStatus for MockStatus {
    fn battery_percent(&self) -> Result<u8, ChannelError> {
        let mut readings = self.readings.lock().unwrap();
        if readings.len() > 1 {
            readings.pop_front().unwrap()
        } else {
            readings.front().cloned().unwrap_or(Err(ChannelError::NotConnected))
        }
    }
}

// ---------------------------------------------------------------------------
// FRAMES AND DETECTION
// ---------------------------------------------------------------------------

/// Gives out a fixed number of blank frames.
#[derive(Debug)]
pub(crate) struct MockFrames {
    remaining: Mutex<u64>,
    next_seq: Mutex<u64>,
}

impl MockFrames {
    pub fn new(count: u64) -> Self {
        Self {
            remaining: Mutex::new(count),
            next_seq: Mutex::new(0),
        }
    }
}

impl FrameSource for MockFrames {
    fn latest_frame(&self) -> Option<Frame> {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;

        let mut seq = self.next_seq.lock().unwrap();
        *seq += 1;
        Some(Frame::blank(*seq, 360, 240))
    }
}

/// Detector which returns scripted results, then no target.
#[derive(Debug)]
pub(crate) struct MockDetector(pub VecDeque<DetectionResult>);

impl Detector for MockDetector {
    fn detect(&mut self, _frame: &Frame) -> DetectionResult {
        self.0.pop_front().unwrap_or(DetectionResult::NONE)
    }
}
