//! # Tracking library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the tracking executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Tracking control - converts target detections into velocity commands
pub mod track_ctrl;

/// Command dispatcher - sends commands to the vehicle in the background with retries
pub mod dispatch;

/// Safety - the landed latch and the battery monitor
pub mod safety;

/// Frame pipeline - one frame in, one velocity command out
pub mod pipeline;

/// Operator controls shared between threads
pub mod control_handle;

/// Executes operator shell commands
pub mod shell_processor;

/// Interactive operator console
pub mod console;

/// Brightness threshold target detector
pub mod detector;

/// Executable parameters
pub mod params;

/// Simulated vehicle - stands in for the vehicle link during development
#[cfg(feature = "sim")]
pub mod sim_vehicle;

#[cfg(test)]
pub(crate) mod test_utils;
