//! # Tracking Executable Parameters
//!
//! This module provides parameters for the tracking executable, loaded from
//! `params/track_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dispatch::{RetryParams, DEFAULT_BACKOFF_S, DEFAULT_MAX_RETRIES};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackExecParams {
    /// Period of the frame processing cycle.
    ///
    /// Units: seconds
    pub frame_period_s: f64,

    /// Period between battery checks.
    ///
    /// Units: seconds
    pub battery_period_s: f64,

    /// Battery level at or below which the vehicle lands.
    ///
    /// Units: percent
    pub critical_battery_pct: u8,

    /// Number of attempts made to send each command
    pub max_retries: u32,

    /// Wait between failed attempts.
    ///
    /// Units: seconds
    pub retry_backoff_s: f64,

    /// Name of the TrackCtrl profile to load (a file in the params directory)
    pub track_ctrl_params: String,

    /// Distance moved by a manual move command with no distance given.
    ///
    /// Units: centimetres
    pub move_distance_cm: u32,

    /// Angle turned by a manual rotate command with no angle given.
    ///
    /// Units: degrees
    pub rotate_deg: u32,

    /// Distance to climb once takeoff has been acknowledged, 0 to disable.
    ///
    /// Units: centimetres
    pub takeoff_climb_cm: u32,

    /// Brightness above which a pixel is part of the target.
    pub detector_threshold: u8,

    /// Fewest bright pixels which count as a target.
    pub detector_min_pixels: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TrackExecParams {
    fn default() -> Self {
        Self {
            frame_period_s: 0.05,
            battery_period_s: 10.0,
            critical_battery_pct: 5,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_s: DEFAULT_BACKOFF_S,
            track_ctrl_params: "track_ctrl.toml".into(),
            move_distance_cm: 20,
            rotate_deg: 15,
            takeoff_climb_cm: 0,
            detector_threshold: 200,
            detector_min_pixels: 16,
        }
    }
}

impl TrackExecParams {
    pub fn retry_params(&self) -> RetryParams {
        RetryParams {
            max_retries: self.max_retries,
            backoff: Duration::from_secs_f64(self.retry_backoff_s.max(0.0)),
        }
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_period_s.max(0.0))
    }

    pub fn battery_period(&self) -> Duration {
        Duration::from_secs_f64(self.battery_period_s.max(0.0))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
