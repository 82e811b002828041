//! Errors surfaced by the line engine.
//!
//! There is no timeout variant: a read that runs out of time returns
//! whatever it collected.

use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for line operations.
pub type LineResult<T> = Result<T, LineError>;

/// Errors returned by [`crate::SerialLine`] operations.
#[derive(Debug, Error)]
pub enum LineError {
    /// The underlying channel failed to read, write or configure.
    #[error("channel error: {0}")]
    Channel(PortError),

    /// DSR, or a watched CD, dropped while a read was blocked.
    #[error("{port}: DSR/CD off")]
    CarrierLost { port: String },

    /// The named endpoint does not exist or is held elsewhere.
    #[error("port unavailable: {0}")]
    PortUnavailable(String),

    /// The operation makes no sense for this line or modem.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl LineError {
    /// Create a CarrierLost error for a port.
    pub fn carrier_lost(port: impl Into<String>) -> Self {
        Self::CarrierLost { port: port.into() }
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}

impl From<PortError> for LineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(name) => Self::PortUnavailable(format!("invalid port {name}")),
            PortError::InUse(name) => Self::PortUnavailable(format!("{name} in use")),
            other => Self::Channel(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_port_unavailable() {
        let err: LineError = PortError::not_found("/dev/ttyS9").into();
        assert!(matches!(err, LineError::PortUnavailable(ref m) if m == "invalid port /dev/ttyS9"));
    }

    #[test]
    fn test_in_use_maps_to_port_unavailable() {
        let err: LineError = PortError::in_use("/dev/ttyS1").into();
        assert!(matches!(err, LineError::PortUnavailable(_)));
    }

    #[test]
    fn test_other_errors_map_to_channel() {
        let err: LineError = PortError::NotOpen.into();
        assert!(matches!(err, LineError::Channel(PortError::NotOpen)));
        assert_eq!(err.to_string(), "channel error: Port is not open");
    }

    #[test]
    fn test_carrier_lost_display() {
        let err = LineError::carrier_lost("/dev/ttyS1");
        assert_eq!(err.to_string(), "/dev/ttyS1: DSR/CD off");
    }
}
