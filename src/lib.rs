//! v24-line
//!
//! Timed serial-line transport for modem-style conversations: deadline-bounded
//! reads, waits for one of several response markers, and a DSR/CD monitor
//! that aborts blocked reads when the far end goes away.
//!
//! # Modules
//!
//! - `line`: the [`SerialLine`] engine (signal monitor, reads, pattern waits, flushing)
//! - `port`: channel abstraction with a `serialport` backend and an in-memory mock
//! - `diag`: diagnostic records and sinks
//! - `modem`: dial/hangup orchestration
//! - `config`: TOML configuration with environment overrides
//! - `logging`: `tracing` subscriber setup
//! - `error`: line error types

pub mod config;
pub mod diag;
pub mod error;
pub mod line;
pub mod logging;
pub mod modem;
pub mod port;

// Re-export commonly used types for convenience
pub use diag::{Category, DiagnosticRecord, DiagnosticSink, MemorySink, TracingSink};
pub use error::{LineError, LineResult};
pub use line::{MatchResult, SerialLine, SignalState, Timeout};
pub use modem::{LeasedLineModem, Modem};
pub use port::{
    ControlLine, DataBits, FlowControl, LineEvent, LinkParams, MockChannel, Parity, PortError,
    SerialChannel, StopBits, SyncSerialPort,
};

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
