//! # Vehicle link traits
//!
//! The vehicle link is split along the lines the software uses it: commands
//! go out through a [`CommandChannel`], the battery is read through
//! [`VehicleStatus`] and camera frames come in through a [`FrameSource`].
//! All three take `&self` so a single link can be shared between the frame
//! processing loop, the safety monitor and the dispatch threads.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::cmd::{Ack, Command, Direction, Rotation, VelocityCommand};
use crate::detect::Frame;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by the vehicle link.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("The link is not connected to the vehicle")]
    NotConnected,

    #[error("No response from the vehicle within the timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not interpret the response from the vehicle: {0}")]
    InvalidResponse(String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Sends commands to the vehicle.
///
/// Every call blocks until the vehicle has answered or the link gives up, so
/// callers on a timing-sensitive loop should go through a dispatcher rather
/// than calling these directly.
pub trait CommandChannel: Send + Sync {
    fn takeoff(&self) -> Result<Ack, ChannelError>;

    fn land(&self) -> Result<Ack, ChannelError>;

    fn stream_on(&self) -> Result<Ack, ChannelError>;

    fn stream_off(&self) -> Result<Ack, ChannelError>;

    /// Move a fixed distance in the given direction.
    fn move_by(&self, direction: Direction, distance_cm: u32) -> Result<Ack, ChannelError>;

    /// Rotate on the spot by the given angle.
    fn rotate(&self, rotation: Rotation, degrees: u32) -> Result<Ack, ChannelError>;

    /// Set the continuous velocity demand.
    ///
    /// The vehicle is not required to acknowledge velocity demands, but a link
    /// may still report a failure to deliver one.
    fn set_velocity(&self, cmd: &VelocityCommand) -> Result<Ack, ChannelError>;

    /// Send any command, routing it to the matching method.
    fn send(&self, cmd: &Command) -> Result<Ack, ChannelError> {
        match *cmd {
            Command::Takeoff => self.takeoff(),
            Command::Land => self.land(),
            Command::StreamOn => self.stream_on(),
            Command::StreamOff => self.stream_off(),
            Command::Move {
                direction,
                distance_cm,
            } => self.move_by(direction, distance_cm),
            Command::Rotate { rotation, degrees } => self.rotate(rotation, degrees),
            Command::Velocity(ref v) => self.set_velocity(v),
        }
    }
}

/// Reads status information from the vehicle.
pub trait VehicleStatus: Send + Sync {
    /// Current battery charge in percent.
    fn battery_percent(&self) -> Result<u8, ChannelError>;
}

/// Provides camera frames from the vehicle.
pub trait FrameSource: Send + Sync {
    /// The most recent frame, or `None` if no frame is available yet.
    fn latest_frame(&self) -> Option<Frame>;
}

// Shared links are used behind `Arc`, so forward the traits through it.

impl<T: CommandChannel + ?Sized> CommandChannel for std::sync::Arc<T> {
    fn takeoff(&self) -> Result<Ack, ChannelError> {
        (**self).takeoff()
    }

    fn land(&self) -> Result<Ack, ChannelError> {
        (**self).land()
    }

    fn stream_on(&self) -> Result<Ack, ChannelError> {
        (**self).stream_on()
    }

    fn stream_off(&self) -> Result<Ack, ChannelError> {
        (**self).stream_off()
    }

    fn move_by(&self, direction: Direction, distance_cm: u32) -> Result<Ack, ChannelError> {
        (**self).move_by(direction, distance_cm)
    }

    fn rotate(&self, rotation: Rotation, degrees: u32) -> Result<Ack, ChannelError> {
        (**self).rotate(rotation, degrees)
    }

    fn set_velocity(&self, cmd: &VelocityCommand) -> Result<Ack, ChannelError> {
        (**self).set_velocity(cmd)
    }
}

impl<T: VehicleStatus + ?Sized> VehicleStatus for std::sync::Arc<T> {
    fn battery_percent(&self) -> Result<u8, ChannelError> {
        (**self).battery_percent()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for std::sync::Arc<T> {
    fn latest_frame(&self) -> Option<Frame> {
        (**self).latest_frame()
    }
}
