//! # Tracking controllers
//!
//! The PD controllers, the area band policy, and the [`track`] function
//! which combines them into a velocity command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use link_if::{DetectionResult, VelocityCommand};
use util::maths;

use super::{Params, StatusReport, TrackingState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A proportional-derivative controller.
///
/// The controller is stateless, the previous error is passed in by the caller
/// so that the whole tracking state can live in [`TrackingState`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PdController {
    /// Proportional gain
    k_p: f64,

    /// Derivative gain
    k_d: f64,
}

/// Result of running one axis through its controller.
#[derive(Debug, Clone, Copy, Default)]
struct AxisOutput {
    /// Error to remember for the next cycle.
    error: i32,

    /// Clamped (and possibly smoothed) demand.
    speed: i32,

    /// Smoothing memory for the next cycle.
    smoothed: Option<f64>,

    /// True if the raw demand exceeded the speed limit.
    limited: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The forward/backward band a target's area falls in.
///
/// For any area exactly one band applies:
///
/// | band       | area                        | demand           |
/// |------------|-----------------------------|------------------|
/// | `Noise`    | `area <= noise_floor`       | 0                |
/// | `Forward`  | `noise_floor < area < low`  | `forward_speed`  |
/// | `Hold`     | `low <= area <= high`       | 0                |
/// | `Backward` | `area > high`               | `backward_speed` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AreaBand {
    Noise,
    Forward,
    Hold,
    Backward,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PdController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_d: f64) -> Self {
        Self { k_p, k_d }
    }

    /// Create the controller described by the parameters.
    pub fn from_params(params: &Params) -> Self {
        Self::new(params.k_p, params.k_d)
    }

    /// Get the unclamped controller output for this cycle's error.
    ///
    /// The derivative is taken per cycle rather than per second, since the
    /// cycle period is fixed.
    pub fn get(&self, error: i32, prev_error: i32) -> f64 {
        self.k_p * error as f64 + self.k_d * (error - prev_error) as f64
    }
}

impl AreaBand {
    /// Find the band for the given target area.
    pub fn classify(area: i32, params: &Params) -> Self {
        if area <= params.area_noise_floor {
            AreaBand::Noise
        } else if area < params.area_low {
            AreaBand::Forward
        } else if area <= params.area_high {
            AreaBand::Hold
        } else {
            AreaBand::Backward
        }
    }

    /// The forward/backward demand for this band.
    pub fn demand(&self, params: &Params) -> i32 {
        match self {
            AreaBand::Noise | AreaBand::Hold => 0,
            AreaBand::Forward => params.forward_speed,
            AreaBand::Backward => params.backward_speed,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Limit a controller output to `[-limit, limit]` and convert it to an
/// integer demand, truncating toward zero.
pub fn clamp_speed(speed: f64, limit: i32) -> i32 {
    maths::clamp_sym(speed, limit as f64) as i32
}

/// Compute the velocity command for one frame.
///
/// If tracking is disabled, or the detection is the no target sentinel, the
/// command is all zero and the returned state has its errors and smoothing
/// memory reset, so that the derivative term never spans a gap in tracking.
pub fn track(
    detection: &DetectionResult,
    enabled: bool,
    state: TrackingState,
    params: &Params,
) -> (VelocityCommand, TrackingState) {
    let (cmd, state, _) = track_with_report(detection, enabled, state, params);
    (cmd, state)
}

/// As [`track`], also returning the status report for the cycle.
pub fn track_with_report(
    detection: &DetectionResult,
    enabled: bool,
    state: TrackingState,
    params: &Params,
) -> (VelocityCommand, TrackingState, StatusReport) {
    let mut report = StatusReport::default();

    if !enabled || detection.is_none() {
        return (
            VelocityCommand::ZERO,
            TrackingState::reset(enabled),
            report,
        );
    }

    let ctrl = PdController::from_params(params);
    let (centre_x, centre_y) = params.frame_centre();
    let (target_x, target_y) = detection.center;

    // Horizontal error is positive when the target is right of centre, which
    // demands a clockwise yaw. Vertical error is positive when the target is
    // above the centreline, which demands a climb.
    let yaw = run_axis(
        &ctrl,
        target_x,
        target_x - centre_x,
        state.prev_error,
        state.smoothed_yaw,
        params,
    );
    let up_down = run_axis(
        &ctrl,
        target_y,
        centre_y - target_y,
        state.prev_error_vertical,
        state.smoothed_up_down,
        params,
    );

    let band = AreaBand::classify(detection.area, params);

    let cmd = VelocityCommand {
        left_right: 0,
        forward_backward: band.demand(params),
        up_down: up_down.speed,
        yaw: yaw.speed,
    };

    report.target_present = true;
    report.error_x = yaw.error;
    report.error_y = up_down.error;
    report.yaw_limited = yaw.limited;
    report.up_down_limited = up_down.limited;
    report.band = Some(band);

    let next_state = TrackingState {
        prev_error: yaw.error,
        prev_error_vertical: up_down.error,
        tracking_enabled: enabled,
        smoothed_yaw: yaw.smoothed,
        smoothed_up_down: up_down.smoothed,
    };

    (cmd, next_state, report)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Run a single axis through the controller, limits and smoothing.
///
/// A target coordinate of exactly zero on this axis is treated as no
/// information for the axis: no demand, and the error is forgotten.
fn run_axis(
    ctrl: &PdController,
    target_coord: i32,
    error: i32,
    prev_error: i32,
    prev_smoothed: Option<f64>,
    params: &Params,
) -> AxisOutput {
    if target_coord == 0 {
        return AxisOutput::default();
    }

    let raw = ctrl.get(error, prev_error);
    let clamped = clamp_speed(raw, params.speed_limit);
    let limited = raw.abs() > params.speed_limit as f64;

    let (speed, smoothed) = match params.smoothing_factor {
        Some(factor) => {
            let s = maths::ema(prev_smoothed, clamped as f64, factor);
            (s as i32, Some(s))
        }
        None => (clamped, None),
    };

    AxisOutput {
        error,
        speed,
        smoothed,
        limited,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
