//! # Vehicle link interface crate.
//!
//! Provides the interface between the tracking software and the vehicle: the
//! commands which can be sent, the acknowledgements which come back, and the
//! traits that a vehicle link (or a simulation of one) must implement.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Commands sent to the vehicle and the acknowledgements it returns
pub mod cmd;

/// Traits implemented by the vehicle link
pub mod channel;

/// Camera frames and target detection
pub mod detect;

/// Operator shell command grammar
pub mod shell;

// ------------------------------------------------------------------------------------------------
// REEXPORTS
// ------------------------------------------------------------------------------------------------

pub use channel::{ChannelError, CommandChannel, FrameSource, VehicleStatus};
pub use cmd::{Ack, Command, Direction, Rotation, VelocityCommand};
pub use detect::{DetectionResult, Detector, Frame};
