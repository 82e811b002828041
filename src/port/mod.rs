//! Channel abstraction layer for serial communication.
//!
//! Provides the `SerialChannel` trait and its implementations, so the line
//! engine can run against real hardware or against a mock in tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockChannel;
pub use sync_port::*;
pub use traits::*;
