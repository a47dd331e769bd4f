//! # Tracking control module
//!
//! Tracking control keeps a detected target centred in the camera frame. Each
//! cycle it takes the detection for the latest frame and produces a velocity
//! command for the vehicle:
//!
//! - The horizontal offset of the target from the frame centre drives the yaw
//!   demand through a PD controller.
//! - The vertical offset drives the up/down demand through a second PD
//!   controller. Vertical error is positive when the target is above the
//!   centreline, so a positive error climbs.
//! - The target's apparent area selects one of four bands (noise, forward,
//!   hold, backward), each with a fixed forward/backward demand. A continuous
//!   controller on area oscillates at close range because the area
//!   measurement is noisy, the bands don't.
//! - Lateral demand is always zero, lateral motion is left to manual control.
//!
//! There is no integral term. The command link is lossy and slow, and an
//! integrator winds up while commands are being dropped.
//!
//! The controller itself is the pure function [`track`], which takes the
//! previous [`TrackingState`] and returns the next one. [`TrackCtrl`] wraps it
//! as a cyclic module which owns its parameters and state.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod controllers;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use controllers::*;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrackCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TrackCtrlError {
    #[error("Could not load the TrackCtrl parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid TrackCtrl parameters: {0}")]
    InvalidParams(String),

    #[error("TrackCtrl is a PD controller, the integral gain must be 0 (found {0})")]
    IntegralGainNotSupported(f64),

    #[error("TrackCtrl has not been initialised")]
    NotInitialised,
}
