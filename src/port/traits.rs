//! Core traits for the serial channel boundary.
//!
//! Defines the `SerialChannel` trait that lets the line engine drive a real
//! serial port or an in-memory mock interchangeably, plus the link parameter
//! and line-status types that cross that boundary.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Link parameters for a serial channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParams {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for LinkParams {
    /// 1200 bps, 8N1 with RTS/CTS, the classic dial-up terminal setting.
    fn default() -> Self {
        Self {
            baud_rate: 1200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::Hardware,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Output control lines the local end can assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    /// Data Terminal Ready.
    Dtr,
    /// Request To Send.
    Rts,
}

/// Line-status transitions delivered by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// New bytes are waiting in the receive buffer.
    DataAvailable,
    /// Data Set Ready changed to the given level.
    DataSetReady(bool),
    /// Carrier Detect changed to the given level.
    CarrierDetect(bool),
}

/// Callback invoked by a channel's delivery context for every [`LineEvent`].
pub type LineEventListener = Arc<dyn Fn(LineEvent) + Send + Sync>;

/// A duplex serial channel with line-status notifications.
///
/// Implementations own the physical connection. Event delivery happens on a
/// context of the implementation's choosing and must never call the listener
/// while holding a lock that `read_bytes` or `bytes_available` also takes.
pub trait SerialChannel: Send + std::fmt::Debug {
    /// Get the name/path of this channel.
    fn name(&self) -> &str;

    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize, PortError>;

    /// Read up to `buffer.len()` already-available bytes.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write bytes to the channel.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Push any buffered output onto the wire.
    fn flush(&mut self) -> Result<(), PortError>;

    /// Current level of Data Set Ready.
    fn data_set_ready(&mut self) -> Result<bool, PortError>;

    /// Current level of Carrier Detect.
    fn carrier_detect(&mut self) -> Result<bool, PortError>;

    /// Assert or drop an output control line.
    fn set_control_line(&mut self, line: ControlLine, level: bool) -> Result<(), PortError>;

    /// Apply new link parameters.
    fn configure(&mut self, params: &LinkParams) -> Result<(), PortError>;

    /// Start delivering line events to `listener`, replacing any previous one.
    fn subscribe(&mut self, listener: LineEventListener) -> Result<(), PortError>;

    /// Stop delivering line events.
    fn unsubscribe(&mut self);

    /// Release the physical connection.
    fn close(&mut self) -> Result<(), PortError>;
}
