//! # Safety module
//!
//! Landing is a one way transition. Once the [`LandedLatch`] is set, by the
//! operator, by exiting, or by the [`SafetyMonitor`] seeing a critically low
//! battery, no further motion command will be sent to the vehicle for the
//! rest of the process.
//!
//! Motion sends and the latch transition exclude each other. A motion attempt
//! holds a [`MotionPermit`] while it is on the link, and setting the latch
//! waits for outstanding permits, so no motion command reaches the vehicle
//! after the land command. Setting the latch can therefore take as long as
//! one link call.
//!
//! The latch replaces the general safe mode used by larger executables, which
//! could be entered and left again. A quadrotor that has started landing on a
//! flat battery can't take off again, so there is no way to clear it.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod monitor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock, RwLockReadGuard,
};

// Internal
use crate::dispatch::{DispatchHandle, Dispatcher};
use link_if::{Command, CommandChannel};

pub use monitor::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One way landed flag shared between the frame pipeline, the dispatcher and
/// the safety monitor.
#[derive(Debug, Clone, Default)]
pub struct LandedLatch(Arc<LatchInner>);

#[derive(Debug, Default)]
struct LatchInner {
    latched: AtomicBool,

    /// Read by motion sends, written while latching.
    gate: RwLock<()>,
}

/// Permission to put one motion command attempt on the link.
///
/// The latch cannot be set while any permit is alive.
#[must_use]
pub struct MotionPermit<'a> {
    _gate: RwLockReadGuard<'a, ()>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The reason a landing was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandCause {
    /// The operator asked for a landing.
    Operator,

    /// The battery fell to or below the critical level, contains the reading.
    LowBattery(u8),

    /// The executable is shutting down.
    Exit,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LandedLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch.
    ///
    /// Returns `true` for the one caller which made the transition, every
    /// other caller (concurrent or later) gets `false`.
    ///
    /// Blocks until every outstanding [`MotionPermit`] has been released.
    pub fn try_latch(&self) -> bool {
        let _gate = self.0.gate.write().unwrap_or_else(PoisonError::into_inner);

        self.0
            .latched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True once the vehicle has started landing.
    pub fn is_latched(&self) -> bool {
        self.0.latched.load(Ordering::Acquire)
    }

    /// Get a permit to send a motion command, or `None` if already latched.
    pub fn motion_permit(&self) -> Option<MotionPermit<'_>> {
        let gate = self.0.gate.read().unwrap_or_else(PoisonError::into_inner);

        if self.is_latched() {
            None
        } else {
            Some(MotionPermit { _gate: gate })
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Latch the vehicle as landed and send the land command.
///
/// Only the caller which sets the latch sends the land command, so if the
/// operator and the monitor both ask for a landing at the same moment one
/// land command goes out. Returns `None` if the vehicle was already latched.
pub fn initiate_landing<C>(
    latch: &LandedLatch,
    dispatcher: &Dispatcher<C>,
    cause: LandCause,
) -> Option<DispatchHandle>
where
    C: CommandChannel + 'static,
{
    if !latch.try_latch() {
        info!("Landing requested ({:?}) but the vehicle is already landing", cause);
        return None;
    }

    match cause {
        LandCause::LowBattery(pct) => warn!(
            "Battery critical ({}%), landing. No further movement will be possible",
            pct
        ),
        _ => info!("Landing ({:?}), no further movement will be possible", cause),
    }

    Some(dispatcher.dispatch(Command::Land))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
