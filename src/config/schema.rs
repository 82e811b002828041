//! Configuration schema definitions.
//!
//! Defines the structure of the configuration file using serde. Every
//! section has defaults, so an empty file is a valid configuration.

use crate::port::{DataBits, FlowControl, LinkParams, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line configuration
    pub line: LineConfig,
    /// Timing knobs of the line engine
    pub timing: TimingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial line section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Device path, e.g. `/dev/ttyS1` or `COM3`
    pub port: String,
    /// Producer name stamped on diagnostic records
    pub realm: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Driver open/IO timeout in milliseconds
    pub open_timeout_ms: u64,
    /// Abort blocked reads when CD drops
    pub watch_carrier: bool,
    /// Drain and log unsolicited input as it arrives
    pub auto_flush_receiver: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        let link = LinkParams::default();
        Self {
            port: "/dev/ttyS1".to_string(),
            realm: "V24".to_string(),
            baud_rate: link.baud_rate,
            data_bits: link.data_bits,
            stop_bits: link.stop_bits,
            parity: link.parity,
            flow_control: link.flow_control,
            open_timeout_ms: 2000,
            watch_carrier: false,
            auto_flush_receiver: false,
        }
    }
}

impl LineConfig {
    pub fn link_params(&self) -> LinkParams {
        LinkParams {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            flow_control: self.flow_control,
        }
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Timing section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between drains when flushing unsolicited input
    pub flush_debounce_ms: u64,
    /// Line-status sampling interval of the serial driver
    pub status_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            flush_debounce_ms: 250,
            status_poll_ms: 20,
        }
    }
}

impl TimingConfig {
    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms.max(1))
    }
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "v24_line=debug", ...
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
