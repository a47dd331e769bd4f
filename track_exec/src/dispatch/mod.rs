//! # Command dispatcher
//!
//! The link to the vehicle is slow and lossy, and every call on a
//! [`CommandChannel`] blocks until the vehicle answers. The dispatcher runs
//! each command on its own short-lived thread, retrying it a bounded number of
//! times with a fixed backoff, so the frame loop never waits on the link.
//!
//! Commands dispatched in quick succession are not ordered with respect to
//! each other. A caller which needs one command to complete before the next
//! is sent (takeoff before moving, for instance) must [`DispatchHandle::wait`]
//! on the first.
//!
//! Failures are never returned to the caller. A command which exhausts its
//! attempts is logged and dropped, and the vehicle simply doesn't move for
//! that command. A send task which panics counts as a failed attempt.
//!
//! Each motion attempt holds a [`MotionPermit`] from the landed latch while
//! it is on the link, so an attempt is either sent before the latch is set or
//! not at all.
//!
//! [`MotionPermit`]: crate::safety::MotionPermit

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, trace, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Internal
use crate::safety::LandedLatch;
use link_if::{cmd::VELOCITY_LIMIT, Ack, ChannelError, Command, CommandChannel};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default number of attempts made for each command.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default wait between failed attempts.
pub const DEFAULT_BACKOFF_S: f64 = 0.5;

const DRAIN_POLL_PERIOD: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Retry policy for dispatched commands.
#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    /// Total number of attempts, including the first.
    pub max_retries: u32,

    /// Wait between a failed attempt and the next. Fixed, not exponential.
    pub backoff: Duration,
}

/// Dispatches commands to the vehicle in the background.
pub struct Dispatcher<C> {
    channel: Arc<C>,
    latch: LandedLatch,
    params: RetryParams,
    stats: Arc<DispatchStats>,
}

/// Handle to a dispatched command.
///
/// Dropping the handle detaches the command, it will still run to completion
/// or exhaustion.
#[derive(Debug)]
pub struct DispatchHandle(HandleInner);

/// Counters describing everything the dispatcher has done.
#[derive(Debug, Default)]
pub struct DispatchStats {
    in_flight: AtomicU64,
    attempts: AtomicU64,
    acked: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

/// A copy of the [`DispatchStats`] at a point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    /// Number of commands currently being sent.
    pub in_flight: u64,

    /// Number of calls made on the channel.
    pub attempts: u64,

    /// Number of commands acknowledged by the vehicle.
    pub acked: u64,

    /// Number of commands dropped after exhausting their attempts.
    pub dropped: u64,

    /// Number of motion commands refused because the vehicle is landing.
    pub rejected: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Final result of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The vehicle acknowledged the command on the given attempt.
    Acked { attempts: u32 },

    /// No attempt was acknowledged, the command was dropped.
    Exhausted { attempts: u32 },

    /// The command was a motion command and the vehicle is landing.
    Rejected,

    /// The dispatch thread couldn't be started or didn't finish.
    Abandoned,
}

/// Counts a dispatch as in flight for as long as it is alive.
struct InFlight(Arc<DispatchStats>);

#[derive(Debug)]
enum HandleInner {
    Done(DispatchOutcome),
    Pending(JoinHandle<DispatchOutcome>),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_secs_f64(DEFAULT_BACKOFF_S),
        }
    }
}

impl RetryParams {
    /// Default attempt count with a backoff short enough for tests.
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            backoff: Duration::from_millis(1),
            ..Self::default()
        }
    }
}

// Manual impl so that `C` doesn't have to be `Clone`.
impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            latch: self.latch.clone(),
            params: self.params,
            stats: self.stats.clone(),
        }
    }
}

impl<C> Dispatcher<C>
where
    C: CommandChannel + 'static,
{
    /// Create a new dispatcher sending over the given channel.
    pub fn new(channel: Arc<C>, latch: LandedLatch, params: RetryParams) -> Self {
        Self {
            channel,
            latch,
            params,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Dispatch a command in the background.
    ///
    /// Velocity demands are limited to [`VELOCITY_LIMIT`] on every axis.
    /// Motion commands (anything except landing and the video stream) are
    /// refused once the vehicle is landing, both here and before each retry,
    /// so a command already retrying when the latch is set goes no further.
    pub fn dispatch(&self, cmd: Command) -> DispatchHandle {
        let cmd = match cmd {
            Command::Velocity(v) => Command::Velocity(v.clamped(VELOCITY_LIMIT)),
            c => c,
        };

        let channel = self.channel.clone();
        self.spawn_retrying(cmd, move || channel.send(&cmd))
    }

    /// Run an arbitrary send task in the background with the retry policy.
    ///
    /// `cmd` labels the task and decides whether the landed latch gates it.
    /// The task is called once per attempt.
    pub fn spawn_retrying<F>(&self, cmd: Command, mut task: F) -> DispatchHandle
    where
        F: FnMut() -> Result<Ack, ChannelError> + Send + 'static,
    {
        if self.refuse(&cmd) {
            return DispatchHandle(HandleInner::Done(DispatchOutcome::Rejected));
        }

        let this = self.clone();
        let in_flight = InFlight::enter(&self.stats);

        // If the thread can't be started the closure, and the in-flight
        // count with it, is dropped here.
        let spawn_result = thread::Builder::new()
            .name(format!("dispatch_{}", cmd.name()))
            .spawn(move || {
                let _in_flight = in_flight;
                this.retry(&cmd, &mut task)
            });

        match spawn_result {
            Ok(jh) => DispatchHandle(HandleInner::Pending(jh)),
            Err(e) => {
                error!("Could not start a dispatch thread for {}: {}", cmd, e);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                DispatchHandle(HandleInner::Done(DispatchOutcome::Abandoned))
            }
        }
    }

    /// Get the dispatcher's counters.
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn latch(&self) -> &LandedLatch {
        &self.latch
    }

    /// Wait up to `timeout` for every dispatched command to finish.
    ///
    /// Returns the number of commands still in flight, which are abandoned
    /// if the process then exits.
    pub fn drain(&self, timeout: Duration) -> u64 {
        let start = Instant::now();

        loop {
            let in_flight = self.stats.in_flight.load(Ordering::Acquire);
            if in_flight == 0 || start.elapsed() >= timeout {
                return in_flight;
            }
            thread::sleep(DRAIN_POLL_PERIOD);
        }
    }

    /// Run `action` up to `max_retries` times until it returns `Ack::Ok`.
    ///
    /// Any other acknowledgement, an error from the link, or a panic in
    /// `action` counts as a failed attempt.
    fn retry<F>(&self, cmd: &Command, mut action: F) -> DispatchOutcome
    where
        F: FnMut() -> Result<Ack, ChannelError>,
    {
        let max = self.params.max_retries.max(1);

        for attempt in 1..=max {
            let permit = if cmd.is_motion() {
                match self.latch.motion_permit() {
                    Some(p) => Some(p),
                    None => {
                        self.count_refusal(cmd);
                        return DispatchOutcome::Rejected;
                    }
                }
            } else {
                None
            };

            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let result = panic::catch_unwind(AssertUnwindSafe(|| action()));
            drop(permit);

            let failure = match result {
                Ok(Ok(Ack::Ok)) => {
                    self.stats.acked.fetch_add(1, Ordering::Relaxed);
                    if attempt > 1 {
                        debug!("{} acknowledged on attempt {}", cmd, attempt);
                    } else {
                        trace!("{} acknowledged", cmd);
                    }
                    return DispatchOutcome::Acked { attempts: attempt };
                }
                Ok(Ok(Ack::Rejected(reason))) => format!("vehicle responded \"{}\"", reason),
                Ok(Err(e)) => e.to_string(),
                Err(payload) => {
                    warn!("Send task for {} panicked: {}", cmd, panic_message(&*payload));
                    String::from("send task panicked")
                }
            };

            debug!(
                "{} failed on attempt {}/{}: {}",
                cmd, attempt, max, failure
            );

            if attempt < max {
                thread::sleep(self.params.backoff);
            }
        }

        error!("{} was not acknowledged after {} attempts, dropping it", cmd, max);
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);

        DispatchOutcome::Exhausted { attempts: max }
    }

    /// True if the command must not be sent because the vehicle is landing.
    fn refuse(&self, cmd: &Command) -> bool {
        if cmd.is_motion() && self.latch.is_latched() {
            self.count_refusal(cmd);
            true
        } else {
            false
        }
    }

    fn count_refusal(&self, cmd: &Command) {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        debug!("{} refused, the vehicle is landing", cmd);
    }
}

impl InFlight {
    fn enter(stats: &Arc<DispatchStats>) -> Self {
        stats.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(stats.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl DispatchHandle {
    /// Block until the command has completed or been dropped.
    pub fn wait(self) -> DispatchOutcome {
        match self.0 {
            HandleInner::Done(o) => o,
            HandleInner::Pending(jh) => match jh.join() {
                Ok(o) => o,
                Err(_) => {
                    warn!("A dispatch thread panicked");
                    DispatchOutcome::Abandoned
                }
            },
        }
    }

    /// True if the command has already completed (or was never started).
    pub fn is_finished(&self) -> bool {
        match &self.0 {
            HandleInner::Done(_) => true,
            HandleInner::Pending(jh) => jh.is_finished(),
        }
    }
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Acquire),
            attempts: self.attempts.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown cause"
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::MockChannel;
    use link_if::{Direction, VelocityCommand};
    use std::sync::{mpsc, Mutex};

    fn dispatcher(channel: &Arc<MockChannel>) -> Dispatcher<MockChannel> {
        Dispatcher::new(channel.clone(), LandedLatch::new(), RetryParams::fast())
    }

    #[test]
    fn test_succeeds_after_failures() {
        for k in 0..DEFAULT_MAX_RETRIES {
            let channel = Arc::new(MockChannel::fail_then_ok(k as usize));
            let d = dispatcher(&channel);

            let outcome = d.dispatch(Command::Takeoff).wait();

            assert_eq!(outcome, DispatchOutcome::Acked { attempts: k + 1 });
            assert_eq!(channel.calls_to("takeoff"), (k + 1) as usize);
            assert_eq!(d.stats().dropped, 0);
        }
    }

    #[test]
    fn test_exhausts() {
        let channel = Arc::new(MockChannel::always_failing());
        let d = dispatcher(&channel);

        let outcome = d
            .dispatch(Command::Move {
                direction: Direction::Left,
                distance_cm: 20,
            })
            .wait();

        assert_eq!(outcome, DispatchOutcome::Exhausted { attempts: 5 });
        assert_eq!(channel.calls_to("move"), 5);

        let stats = d.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.attempts, 5);
        assert_eq!(stats.acked, 0);
    }

    #[test]
    fn test_rejected_ack_is_a_failure() {
        let channel = Arc::new(MockChannel::rejecting_then_ok(2));
        let d = dispatcher(&channel);

        assert_eq!(
            d.dispatch(Command::StreamOn).wait(),
            DispatchOutcome::Acked { attempts: 3 }
        );
    }

    #[test]
    fn test_velocity_clamped() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);

        d.dispatch(Command::Velocity(VelocityCommand::new(250, -101, 50, -400)))
            .wait();

        assert_eq!(
            channel.last_velocity(),
            Some(VelocityCommand::new(100, -100, 50, -100))
        );
    }

    #[test]
    fn test_latched_rejects_motion() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);
        assert!(d.latch().try_latch());

        for cmd in [
            Command::Takeoff,
            Command::Velocity(VelocityCommand::new(0, 0, 0, 10)),
            Command::Move {
                direction: Direction::Up,
                distance_cm: 20,
            },
        ] {
            assert_eq!(d.dispatch(cmd).wait(), DispatchOutcome::Rejected);
        }

        assert_eq!(channel.total_calls(), 0);
        assert_eq!(d.stats().rejected, 3);

        // Land and the video stream are still allowed
        assert!(matches!(
            d.dispatch(Command::Land).wait(),
            DispatchOutcome::Acked { .. }
        ));
        assert!(matches!(
            d.dispatch(Command::StreamOff).wait(),
            DispatchOutcome::Acked { .. }
        ));
    }

    #[test]
    fn test_latch_stops_retries() {
        let channel = Arc::new(MockChannel::always_failing());
        let latch = LandedLatch::new();
        let d = Dispatcher::new(
            channel.clone(),
            latch.clone(),
            RetryParams {
                max_retries: 5,
                backoff: Duration::from_millis(50),
            },
        );

        let handle = d.dispatch(Command::Takeoff);

        // Let the first attempt fail, then land while it's backing off
        while channel.calls_to("takeoff") == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(latch.try_latch());

        assert_eq!(handle.wait(), DispatchOutcome::Rejected);
        assert!(channel.calls_to("takeoff") < 5);
    }

    #[test]
    fn test_dispatch_does_not_block() {
        let channel = Arc::new(MockChannel::always_failing());
        let d = Dispatcher::new(
            channel.clone(),
            LandedLatch::new(),
            RetryParams {
                max_retries: 3,
                backoff: Duration::from_millis(200),
            },
        );

        let start = std::time::Instant::now();
        let handle = d.dispatch(Command::Takeoff);
        assert!(start.elapsed() < Duration::from_millis(200));

        assert_eq!(handle.wait(), DispatchOutcome::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_spawn_retrying_task() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);

        // Popped from the back: rejected, timed out, then accepted
        let mut replies = vec![
            Ok(Ack::Ok),
            Err(ChannelError::Timeout),
            Ok(Ack::Rejected("error".into())),
        ];
        let outcome = d
            .spawn_retrying(Command::Takeoff, move || {
                replies.pop().unwrap_or(Ok(Ack::Ok))
            })
            .wait();

        assert_eq!(outcome, DispatchOutcome::Acked { attempts: 3 });
        assert_eq!(channel.total_calls(), 0);
    }

    #[test]
    fn test_panicking_task_is_a_failed_attempt() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);

        let mut calls = 0;
        let outcome = d
            .spawn_retrying(Command::Takeoff, move || {
                calls += 1;
                if calls == 1 {
                    panic!("link driver fault");
                }
                Ok(Ack::Ok)
            })
            .wait();

        assert_eq!(outcome, DispatchOutcome::Acked { attempts: 2 });
        assert_eq!(d.stats().attempts, 2);
        assert_eq!(d.stats().in_flight, 0);
    }

    #[test]
    fn test_always_panicking_task_exhausts_and_drains() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);

        let handle = d.spawn_retrying(Command::Land, || panic!("link driver fault"));

        assert_eq!(d.drain(Duration::from_secs(2)), 0);
        assert_eq!(handle.wait(), DispatchOutcome::Exhausted { attempts: 5 });
        assert_eq!(d.stats().dropped, 1);
    }

    #[test]
    fn test_latch_waits_for_motion_send() {
        let channel = Arc::new(MockChannel::always_ok());
        let d = dispatcher(&channel);
        let events = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::channel();

        let ev = events.clone();
        let handle = d.spawn_retrying(
            Command::Velocity(VelocityCommand::new(0, 0, 0, 10)),
            move || {
                started_tx.send(()).ok();
                thread::sleep(Duration::from_millis(50));
                ev.lock().unwrap().push("velocity sent");
                Ok(Ack::Ok)
            },
        );

        // Latch while the velocity attempt is on the link
        started_rx.recv().unwrap();
        assert!(d.latch().try_latch());
        events.lock().unwrap().push("latched");

        assert_eq!(handle.wait(), DispatchOutcome::Acked { attempts: 1 });
        assert_eq!(*events.lock().unwrap(), vec!["velocity sent", "latched"]);
    }

    #[test]
    fn test_drain() {
        let channel = Arc::new(MockChannel::fail_then_ok(2));
        let d = dispatcher(&channel);

        d.dispatch(Command::Land);
        assert_eq!(d.drain(Duration::from_secs(2)), 0);
        assert_eq!(d.stats().acked, 1);
        assert_eq!(d.stats().in_flight, 0);
    }
}
