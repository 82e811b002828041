//! Mock serial channel for testing.
//!
//! Provides a `MockChannel` that simulates a serial line without hardware.
//! Test code plays the far end: it queues inbound bytes, toggles DSR and CD,
//! and inspects what the line engine wrote. Every such change is delivered to
//! the subscribed listener on the calling thread, which makes the test thread
//! the channel's delivery context.

use super::error::PortError;
use super::traits::{ControlLine, LineEvent, LineEventListener, LinkParams, SerialChannel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct MockChannelState {
    /// Bytes waiting to be read.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Control line assertions, in order.
    control_log: Vec<(ControlLine, bool)>,
    /// Link parameters applied through `configure`.
    configured: Vec<LinkParams>,
    dsr: bool,
    cd: bool,
    flush_count: usize,
    fail_next_write: bool,
    fail_next_read: bool,
    closed: bool,
    listener: Option<LineEventListener>,
}

/// Mock serial channel.
///
/// Clones share state, so a test keeps one handle while the line owns another.
///
/// # Example
/// ```
/// use v24_line::port::{MockChannel, SerialChannel};
///
/// let far_end = MockChannel::new("MOCK0");
/// let mut channel = far_end.clone();
///
/// far_end.push_input(b"OK\r\n");
/// let mut buffer = [0u8; 8];
/// let n = channel.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"OK\r\n");
///
/// channel.write_bytes(b"ATZ\r").unwrap();
/// assert_eq!(far_end.written(), b"ATZ\r");
/// ```
#[derive(Clone)]
pub struct MockChannel {
    name: String,
    state: Arc<Mutex<MockChannelState>>,
}

impl MockChannel {
    /// Create a mock channel with DSR and CD both asserted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockChannelState {
                dsr: true,
                cd: true,
                ..Default::default()
            })),
        }
    }

    /// Set the initial DSR/CD levels without delivering events.
    pub fn with_levels(self, dsr: bool, cd: bool) -> Self {
        {
            let mut state = self.state.lock();
            state.dsr = dsr;
            state.cd = cd;
        }
        self
    }

    /// Queue inbound bytes and announce them with `DataAvailable`.
    pub fn push_input(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
        self.emit(LineEvent::DataAvailable);
    }

    /// Queue inbound bytes without announcing them.
    pub fn push_input_silently(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Change DSR and deliver the transition.
    pub fn set_dsr(&self, level: bool) {
        self.state.lock().dsr = level;
        self.emit(LineEvent::DataSetReady(level));
    }

    /// Change CD and deliver the transition.
    pub fn set_carrier(&self, level: bool) {
        self.state.lock().cd = level;
        self.emit(LineEvent::CarrierDetect(level));
    }

    /// Deliver an arbitrary event, e.g. a spurious wake.
    pub fn emit(&self, event: LineEvent) {
        // The listener takes the line lock, so ours must be released first.
        let listener = self.state.lock().listener.clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    /// All writes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Each write as issued.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Control line changes as issued.
    pub fn control_log(&self) -> Vec<(ControlLine, bool)> {
        self.state.lock().control_log.clone()
    }

    /// Link parameters applied so far.
    pub fn configured(&self) -> Vec<LinkParams> {
        self.state.lock().configured.clone()
    }

    /// Number of `flush` calls.
    pub fn flush_count(&self) -> usize {
        self.state.lock().flush_count
    }

    /// Bytes still waiting to be read.
    pub fn pending_input(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Whether a listener is currently subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Make the next write fail with a broken-pipe I/O error.
    pub fn fail_next_write(&self) {
        self.state.lock().fail_next_write = true;
    }

    /// Make the next read fail with a broken-pipe I/O error.
    pub fn fail_next_read(&self) {
        self.state.lock().fail_next_read = true;
    }

    fn check_open(state: &MockChannelState) -> Result<(), PortError> {
        if state.closed {
            Err(PortError::NotOpen)
        } else {
            Ok(())
        }
    }

    fn broken_pipe() -> PortError {
        PortError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "simulated channel failure",
        ))
    }
}

impl SerialChannel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> Result<usize, PortError> {
        let state = self.state.lock();
        Self::check_open(&state)?;
        Ok(state.read_queue.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(Self::broken_pipe());
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }
        Ok(bytes_read)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(Self::broken_pipe());
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        state.flush_count += 1;
        Ok(())
    }

    fn data_set_ready(&mut self) -> Result<bool, PortError> {
        let state = self.state.lock();
        Self::check_open(&state)?;
        Ok(state.dsr)
    }

    fn carrier_detect(&mut self) -> Result<bool, PortError> {
        let state = self.state.lock();
        Self::check_open(&state)?;
        Ok(state.cd)
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        state.control_log.push((line, level));
        Ok(())
    }

    fn configure(&mut self, params: &LinkParams) -> Result<(), PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        state.configured.push(*params);
        Ok(())
    }

    fn subscribe(&mut self, listener: LineEventListener) -> Result<(), PortError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        state.listener = Some(listener);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.state.lock().listener = None;
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.listener = None;
        state.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("name", &self.name)
            .field("pending_input", &self.pending_input())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_push_and_read() {
        let far_end = MockChannel::new("MOCK0");
        let mut channel = far_end.clone();
        far_end.push_input(b"Hello");

        let mut buffer = [0u8; 10];
        let n = channel.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_partial_read() {
        let far_end = MockChannel::new("MOCK0");
        let mut channel = far_end.clone();
        far_end.push_input(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = channel.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(channel.bytes_available().unwrap(), 8);
    }

    #[test]
    fn test_empty_read_returns_zero() {
        let mut channel = MockChannel::new("MOCK0");
        let mut buffer = [0u8; 4];
        assert_eq!(channel.read_bytes(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_write_logging() {
        let mut channel = MockChannel::new("MOCK0");
        channel.write_bytes(b"AT").unwrap();
        channel.write_bytes(b"\r").unwrap();

        assert_eq!(channel.write_log(), vec![b"AT".to_vec(), b"\r".to_vec()]);
        assert_eq!(channel.written(), b"AT\r");
    }

    #[test]
    fn test_events_reach_listener() {
        let far_end = MockChannel::new("MOCK0");
        let mut channel = far_end.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        channel
            .subscribe(Arc::new(move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        far_end.push_input(b"x");
        far_end.set_carrier(false);
        far_end.set_dsr(false);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(!channel.carrier_detect().unwrap());
        assert!(!channel.data_set_ready().unwrap());

        channel.unsubscribe();
        far_end.push_input(b"y");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_simulated_failures() {
        let mut channel = MockChannel::new("MOCK0");
        channel.fail_next_write();
        assert!(matches!(channel.write_bytes(b"x"), Err(PortError::Io(_))));
        assert!(channel.write_bytes(b"x").is_ok());

        channel.fail_next_read();
        let mut buffer = [0u8; 1];
        assert!(channel.read_bytes(&mut buffer).is_err());
    }

    #[test]
    fn test_closed_channel_rejects_io() {
        let mut channel = MockChannel::new("MOCK0");
        channel.close().unwrap();
        assert!(channel.is_closed());
        assert!(matches!(channel.bytes_available(), Err(PortError::NotOpen)));
        assert!(matches!(channel.write_bytes(b"x"), Err(PortError::NotOpen)));
    }
}
