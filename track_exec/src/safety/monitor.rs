//! # Battery safety monitor
//!
//! Polls the battery on a fixed period and lands the vehicle when the charge
//! reaches the critical level. The monitor keeps polling after landing so the
//! operator can still see the battery level.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Internal
use super::{initiate_landing, LandCause};
use crate::dispatch::Dispatcher;
use link_if::{CommandChannel, VehicleStatus};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest the monitor thread sleeps before checking for shutdown.
const SHUTDOWN_POLL_PERIOD: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Most recent battery reading, shared with the operator interface.
pub type BatteryReading = Arc<Mutex<Option<u8>>>;

/// The battery safety monitor.
pub struct SafetyMonitor<S, C> {
    status: Arc<S>,
    dispatcher: Dispatcher<C>,
    critical_pct: u8,
    period: Duration,
    last_battery: BatteryReading,
}

/// Handle to a running monitor thread.
pub struct MonitorHandle {
    shutdown: Arc<AtomicBool>,
    jh: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The result of one battery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyTick {
    /// Battery above the critical level.
    Nominal(u8),

    /// Battery critical, this check started the landing.
    Latched(u8),

    /// The vehicle was already landing when this reading was taken.
    AlreadyLatched(u8),

    /// The battery couldn't be read, nothing was done.
    ReadFailed,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<S, C> SafetyMonitor<S, C>
where
    S: VehicleStatus + 'static,
    C: CommandChannel + 'static,
{
    /// Create a new monitor.
    ///
    /// A reading at or below `critical_pct` lands the vehicle.
    pub fn new(
        status: Arc<S>,
        dispatcher: Dispatcher<C>,
        critical_pct: u8,
        period: Duration,
    ) -> Self {
        Self {
            status,
            dispatcher,
            critical_pct,
            period,
            last_battery: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared copy of the latest battery reading.
    pub fn battery_reading(&self) -> BatteryReading {
        self.last_battery.clone()
    }

    /// Perform a single battery check.
    ///
    /// A failed read is skipped. It is never treated as a low battery.
    pub fn check(&self) -> SafetyTick {
        let pct = match self.status.battery_percent() {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not read the battery level, skipping this check: {}", e);
                return SafetyTick::ReadFailed;
            }
        };

        *self
            .last_battery
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pct);

        if self.dispatcher.latch().is_latched() {
            debug!("Battery: {}% (landing)", pct);
            return SafetyTick::AlreadyLatched(pct);
        }

        if pct > self.critical_pct {
            debug!("Battery: {}%", pct);
            return SafetyTick::Nominal(pct);
        }

        match initiate_landing(
            self.dispatcher.latch(),
            &self.dispatcher,
            LandCause::LowBattery(pct),
        ) {
            Some(_) => SafetyTick::Latched(pct),
            None => SafetyTick::AlreadyLatched(pct),
        }
    }

    /// Run the monitor on its own thread, checking once immediately and then
    /// once per period.
    pub fn spawn(self) -> std::io::Result<MonitorHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        info!(
            "Starting the safety monitor, battery checked every {:.1} s, landing at {}%",
            self.period.as_secs_f64(),
            self.critical_pct
        );

        let jh = thread::Builder::new()
            .name("safety_monitor".into())
            .spawn(move || self.run(shutdown_clone))?;

        Ok(MonitorHandle {
            shutdown,
            jh: Some(jh),
        })
    }

    fn run(self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.check();

            // Sleep in short steps so that stopping isn't held up by the period
            let wake = Instant::now() + self.period;
            while !shutdown.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now >= wake {
                    break;
                }
                thread::sleep(SHUTDOWN_POLL_PERIOD.min(wake - now));
            }
        }

        debug!("Safety monitor stopped");
    }
}

impl MonitorHandle {
    /// Stop the monitor and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                warn!("The safety monitor thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
