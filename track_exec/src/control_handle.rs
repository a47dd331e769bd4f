//! # Control handle
//!
//! The handle is the operator's view into the running tracker. It is cheap to
//! clone and every method takes `&self`, so the console, the script runner and
//! the frame pipeline can each hold one.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use crate::safety::{BatteryReading, LandedLatch};
use link_if::VelocityCommand;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shared operator controls and displayed state.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tracking_enabled: Arc<AtomicBool>,
    current_cmd: Arc<Mutex<VelocityCommand>>,
    latch: LandedLatch,
    battery: BatteryReading,
}

/// Snapshot of the handle, used for the `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlStatus {
    pub tracking_enabled: bool,
    pub current_cmd: VelocityCommand,
    pub landed: bool,
    pub battery_pct: Option<u8>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlHandle {
    /// Create a new handle, tracking starts disabled.
    pub fn new(latch: LandedLatch, battery: BatteryReading) -> Self {
        Self {
            tracking_enabled: Arc::new(AtomicBool::new(false)),
            current_cmd: Arc::new(Mutex::new(VelocityCommand::ZERO)),
            latch,
            battery,
        }
    }

    pub fn set_tracking_enabled(&self, enabled: bool) {
        self.tracking_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the tracking flag, returning the new value.
    pub fn toggle_tracking(&self) -> bool {
        !self.tracking_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn tracking_enabled(&self) -> bool {
        self.tracking_enabled.load(Ordering::Relaxed)
    }

    /// The last velocity command produced by the frame pipeline.
    pub fn current_command(&self) -> VelocityCommand {
        *self
            .current_cmd
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_current_command(&self, cmd: VelocityCommand) {
        *self
            .current_cmd
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = cmd;
    }

    /// True once the vehicle has started landing.
    pub fn is_landed(&self) -> bool {
        self.latch.is_latched()
    }

    /// The latest battery reading, `None` until the first successful read.
    pub fn battery_percent(&self) -> Option<u8> {
        *self.battery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            tracking_enabled: self.tracking_enabled(),
            current_cmd: self.current_command(),
            landed: self.is_landed(),
            battery_pct: self.battery_percent(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handle() {
        let latch = LandedLatch::new();
        let battery = Arc::new(Mutex::new(None));
        let h = ControlHandle::new(latch.clone(), battery.clone());

        assert!(!h.tracking_enabled());
        assert!(h.toggle_tracking());
        assert!(h.tracking_enabled());
        assert!(!h.toggle_tracking());
        h.set_tracking_enabled(true);

        // Clones share state
        let other = h.clone();
        assert!(other.tracking_enabled());
        other.set_current_command(VelocityCommand::new(0, 20, 0, -5));
        assert_eq!(h.current_command(), VelocityCommand::new(0, 20, 0, -5));

        assert_eq!(h.battery_percent(), None);
        *battery.lock().unwrap() = Some(77);
        latch.try_latch();

        let status = h.status();
        assert!(status.landed);
        assert_eq!(status.battery_pct, Some(77));
    }
}
