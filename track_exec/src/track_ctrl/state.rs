//! TrackCtrl state and cyclic module implementation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use serde::Serialize;

// Internal
use link_if::{DetectionResult, VelocityCommand};
use util::{module::State, params, session::Session};

use super::{track_with_report, AreaBand, Params, TrackCtrlError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Memory carried from one tracking cycle to the next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct TrackingState {
    /// Horizontal error from the previous cycle.
    pub prev_error: i32,

    /// Vertical error from the previous cycle.
    pub prev_error_vertical: i32,

    /// Whether tracking was enabled on the previous cycle.
    pub tracking_enabled: bool,

    /// Smoothed yaw demand, only used if smoothing is enabled.
    pub smoothed_yaw: Option<f64>,

    /// Smoothed up/down demand, only used if smoothing is enabled.
    pub smoothed_up_down: Option<f64>,
}

/// Input data to TrackCtrl.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Detection for the latest frame.
    pub detection: DetectionResult,

    /// Whether the operator has tracking enabled.
    pub enabled: bool,
}

/// Status report for TrackCtrl processing.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusReport {
    /// True if a target was present and tracking was enabled.
    pub target_present: bool,

    /// Horizontal error this cycle, positive when the target is to the right.
    pub error_x: i32,

    /// Vertical error this cycle, positive when the target is above the
    /// centreline.
    pub error_y: i32,

    /// True if the yaw demand hit the speed limit.
    pub yaw_limited: bool,

    /// True if the up/down demand hit the speed limit.
    pub up_down_limited: bool,

    /// Area band the target fell in.
    pub band: Option<AreaBand>,
}

/// Tracking control module.
#[derive(Debug, Default)]
pub struct TrackCtrl {
    params: Params,

    state: TrackingState,

    report: StatusReport,

    output: VelocityCommand,

    initialised: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrackingState {
    /// The state after a cycle with no target or with tracking disabled.
    pub fn reset(enabled: bool) -> Self {
        Self {
            tracking_enabled: enabled,
            ..Self::default()
        }
    }
}

impl TrackCtrl {
    /// Create an initialised module directly from a set of parameters.
    pub fn new(params: Params) -> Result<Self, TrackCtrlError> {
        params.validate()?;

        Ok(Self {
            params,
            initialised: true,
            ..Self::default()
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.state
    }

    /// The most recent command produced.
    pub fn output(&self) -> VelocityCommand {
        self.output
    }

    pub fn report(&self) -> StatusReport {
        self.report
    }
}

impl State for TrackCtrl {
    type InitData = String;
    type InitError = TrackCtrlError;

    type InputData = InputData;
    type OutputData = VelocityCommand;
    type StatusReport = StatusReport;
    type ProcError = TrackCtrlError;

    /// Initialise the TrackCtrl module from the named parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(&init_data).map_err(TrackCtrlError::ParamLoadError)?;
        params.validate()?;

        info!(
            "TrackCtrl initialised from {}: centre {:?}, limit {}",
            init_data,
            params.frame_centre(),
            params.speed_limit
        );

        self.params = params;
        self.state = TrackingState::default();
        self.initialised = true;

        Ok(())
    }

    /// Perform cyclic processing of tracking control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if !self.initialised {
            return Err(TrackCtrlError::NotInitialised);
        }

        if input_data.enabled != self.state.tracking_enabled {
            debug!(
                "Tracking {}",
                if input_data.enabled { "enabled" } else { "disabled" }
            );
        }

        let (cmd, state, report) = track_with_report(
            &input_data.detection,
            input_data.enabled,
            self.state,
            &self.params,
        );

        trace!("TrackCtrl: {:?} -> {:?} ({:?})", input_data.detection, cmd, report);

        self.state = state;
        self.report = report;
        self.output = cmd;

        Ok((cmd, report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
