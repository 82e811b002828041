//! Serial channel backed by the `serialport` crate.
//!
//! `serialport` has no event notifications, so line events are produced by a
//! status-polling thread that samples DSR, CD and the receive queue on a
//! cloned handle. It reports every DSR/CD change to the subscribed listener
//! and keeps announcing input while the receive queue is not empty.

use super::error::PortError;
use super::traits::{ControlLine, LineEvent, LineEventListener, LinkParams, SerialChannel};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default interval between two line-status samples.
pub const DEFAULT_STATUS_POLL: Duration = Duration::from_millis(20);

/// Synchronous serial channel wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port, `None` once closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
    /// Sampling interval of the status poller.
    poll_interval: Duration,
    /// Running status poller, if subscribed.
    poller: Option<StatusPoller>,
}

struct StatusPoller {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl SyncSerialPort {
    /// Open a serial port with the given link parameters.
    ///
    /// `io_timeout` bounds every blocking driver call. Reads issued by the
    /// line engine never block past what is already buffered.
    ///
    /// # Example
    /// ```no_run
    /// use std::time::Duration;
    /// use v24_line::port::{LinkParams, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyS1", &LinkParams::default(), Duration::from_secs(2))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(
        port_name: &str,
        params: &LinkParams,
        io_timeout: Duration,
    ) -> Result<Self, PortError> {
        let port = serialport::new(port_name, params.baud_rate)
            .data_bits(params.data_bits.into())
            .flow_control(params.flow_control.into())
            .parity(params.parity.into())
            .stop_bits(params.stop_bits.into())
            .timeout(io_timeout)
            .open()
            .map_err(|e| open_error(port_name, e))?;

        debug!(port = port_name, baud = params.baud_rate, "serial port opened");
        Ok(Self::from_port(port, port_name))
    }

    /// Wrap a port that is already open, e.g. one half of `TTYPort::pair`.
    pub fn from_port(port: Box<dyn serialport::SerialPort>, name: impl Into<String>) -> Self {
        Self {
            port: Some(port),
            name: name.into(),
            poll_interval: DEFAULT_STATUS_POLL,
            poller: None,
        }
    }

    /// Change the status sampling interval used by later subscriptions.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }

    /// Stop the poller and wait for it to release its cloned handle.
    ///
    /// Callers must not hold a lock the listener takes.
    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop.store(true, Ordering::SeqCst);
            // Dropping the last line handle from inside the listener ends up here
            if poller.handle.thread().id() == thread::current().id() {
                return;
            }
            if poller.handle.join().is_err() {
                warn!(port = %self.name, "status poller panicked");
            }
        }
    }
}

/// Classify a failed open.
///
/// `serialport` reports a missing device and one locked by another owner
/// (EBUSY from TIOCEXCL, or a held `flock`) with the same `NoDevice` kind,
/// so the description tells them apart.
fn open_error(port_name: &str, e: serialport::Error) -> PortError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => {
            let description = e.description.to_lowercase();
            if description.contains("busy") || description.contains("lock") {
                PortError::in_use(port_name)
            } else {
                PortError::not_found(port_name)
            }
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => PortError::not_found(port_name),
        serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        _ => PortError::Serial(e),
    }
}

/// Samples line status until `stop` is raised, reporting every transition
/// and announcing input for as long as any is queued.
fn poll_status(
    mut status_port: Box<dyn serialport::SerialPort>,
    listener: LineEventListener,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut dsr = status_port.read_data_set_ready().ok();
    let mut cd = status_port.read_carrier_detect().ok();

    while !stop.load(Ordering::SeqCst) {
        let sample = (|| -> serialport::Result<(bool, bool, u32)> {
            Ok((
                status_port.read_data_set_ready()?,
                status_port.read_carrier_detect()?,
                status_port.bytes_to_read()?,
            ))
        })();

        let (now_dsr, now_cd, now_pending) = match sample {
            Ok(s) => s,
            Err(e) => {
                warn!(port = ?status_port.name(), "status poller stopped: {}", e);
                break;
            }
        };

        if dsr != Some(now_dsr) {
            dsr = Some(now_dsr);
            listener(LineEvent::DataSetReady(now_dsr));
        }
        if cd != Some(now_cd) {
            cd = Some(now_cd);
            listener(LineEvent::CarrierDetect(now_cd));
        }
        // Readers drain the queue between samples, so a count that did not
        // grow can still be new data.
        if now_pending > 0 {
            listener(LineEvent::DataAvailable);
        }

        thread::sleep(interval);
    }
}

impl SerialChannel for SyncSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> Result<usize, PortError> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let available = self.bytes_available()?;
        let wanted = buffer.len().min(available);
        if wanted == 0 {
            return Ok(0);
        }
        match self.port()?.read(&mut buffer[..wanted]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port()?.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port()?.flush().map_err(PortError::Io)
    }

    fn data_set_ready(&mut self) -> Result<bool, PortError> {
        Ok(self.port()?.read_data_set_ready()?)
    }

    fn carrier_detect(&mut self) -> Result<bool, PortError> {
        Ok(self.port()?.read_carrier_detect()?)
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) -> Result<(), PortError> {
        let port = self.port()?;
        match line {
            ControlLine::Dtr => port.write_data_terminal_ready(level)?,
            ControlLine::Rts => port.write_request_to_send(level)?,
        }
        Ok(())
    }

    fn configure(&mut self, params: &LinkParams) -> Result<(), PortError> {
        let port = self.port()?;
        port.set_baud_rate(params.baud_rate)?;
        port.set_data_bits(params.data_bits.into())?;
        port.set_stop_bits(params.stop_bits.into())?;
        port.set_parity(params.parity.into())?;
        port.set_flow_control(params.flow_control.into())?;
        Ok(())
    }

    fn subscribe(&mut self, listener: LineEventListener) -> Result<(), PortError> {
        self.stop_poller();

        let status_port = self.port()?.try_clone()?;
        let stop = Arc::new(AtomicBool::new(false));
        let interval = self.poll_interval;
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("v24-status:{}", self.name))
            .spawn(move || poll_status(status_port, listener, thread_stop, interval))?;

        self.poller = Some(StatusPoller { stop, handle });
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.stop_poller();
    }

    fn close(&mut self) -> Result<(), PortError> {
        self.stop_poller();
        if self.port.take().is_some() {
            debug!(port = %self.name, "serial port closed");
        }
        Ok(())
    }
}

impl Drop for SyncSerialPort {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("polling", &self.poller.is_some())
            .finish()
    }
}
