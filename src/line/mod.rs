//! The serial line engine.
//!
//! A [`SerialLine`] owns one channel and layers on top of it:
//!
//! - a signal monitor tracking DSR/CD from the channel's line events,
//! - deadline-bounded reads (`read`, `read_until`, `read_line`, `read_string`),
//! - pattern waits over single-byte reads (`waitfor` and friends),
//! - sends and receive flushing with diagnostic records.
//!
//! # Concurrency
//!
//! The channel and the [`SignalState`] live behind one mutex paired with one
//! condition variable. The channel's delivery context takes that mutex to
//! update signal state and notify; a blocked reader waits on the condition
//! variable and re-checks its predicate after every wake. At most one blocking
//! read per line may be outstanding, and `close` must not race a read.

mod flush;
mod monitor;
mod reader;
mod timeout;
mod waiter;

pub use flush::{DEFAULT_FLUSH_DEBOUNCE, FLUSH_LOG_LIMIT};
pub use monitor::SignalState;
pub use reader::MAX_STRING_SIZE;
pub use timeout::Timeout;
pub use waiter::MatchResult;

use crate::config::Config;
use crate::diag::{self, Category, DiagnosticRecord, DiagnosticSink};
use crate::error::{LineError, LineResult};
use crate::port::{ControlLine, LinkParams, PortError, SerialChannel, SyncSerialPort};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Produces a fresh channel for [`SerialLine::reopen`].
pub type ChannelOpener =
    Box<dyn Fn() -> Result<Box<dyn SerialChannel>, PortError> + Send + Sync>;

/// State guarded by the line mutex.
pub(crate) struct LineInner {
    channel: Option<Box<dyn SerialChannel>>,
    port_name: String,
    pub(crate) signals: SignalState,
    pub(crate) watch_carrier: bool,
    pub(crate) auto_flush: bool,
    pub(crate) flush_debounce: Duration,
}

impl LineInner {
    pub(crate) fn channel(&mut self) -> Result<&mut Box<dyn SerialChannel>, PortError> {
        self.channel.as_mut().ok_or(PortError::NotOpen)
    }

    pub(crate) fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Fails with `CarrierLost` once DSR is down, or CD when it is watched.
    ///
    /// Every blocking wait runs this after waking.
    pub(crate) fn ensure_signals(&self) -> LineResult<()> {
        if self.signals.is_usable(self.watch_carrier) {
            Ok(())
        } else {
            Err(LineError::carrier_lost(&self.port_name))
        }
    }
}

struct Producer {
    sink: Arc<dyn DiagnosticSink>,
    realm: String,
}

/// Everything shared between callers and the channel's delivery context.
pub(crate) struct Shared {
    inner: Mutex<LineInner>,
    wake: Condvar,
    producer: RwLock<Producer>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, LineInner> {
        self.inner.lock()
    }

    /// Block until woken or `timeout` passes. Callers re-check afterwards.
    pub(crate) fn wait(&self, guard: &mut MutexGuard<'_, LineInner>, timeout: Duration) {
        self.wake.wait_for(guard, timeout);
    }

    pub(crate) fn notify(&self) {
        self.wake.notify_all();
    }

    /// Start a record attributed to this line's realm.
    pub(crate) fn record(&self, category: Category) -> DiagnosticRecord {
        DiagnosticRecord::new(self.producer.read().realm.clone(), category)
    }

    pub(crate) fn publish(&self, record: &DiagnosticRecord) {
        let sink = Arc::clone(&self.producer.read().sink);
        diag::emit(sink.as_ref(), record);
    }
}

/// A serial line with carrier monitoring, timed reads and pattern waits.
///
/// All methods take `&self`; share a line between threads with `Arc`.
pub struct SerialLine {
    shared: Arc<Shared>,
    opener: Option<ChannelOpener>,
}

impl SerialLine {
    /// Take ownership of an already opened channel.
    pub fn new(
        channel: impl SerialChannel + 'static,
        realm: impl Into<String>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> LineResult<Self> {
        let line = Self::detached(realm.into(), sink, None);
        line.install(Box::new(channel))?;
        Ok(line)
    }

    /// Open a channel through `opener`, keeping it for [`reopen`](Self::reopen).
    pub fn with_opener<F>(
        opener: F,
        realm: impl Into<String>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> LineResult<Self>
    where
        F: Fn() -> Result<Box<dyn SerialChannel>, PortError> + Send + Sync + 'static,
    {
        let line = Self::detached(realm.into(), sink, Some(Box::new(opener)));
        line.reopen()?;
        Ok(line)
    }

    /// Open the serial port described by `config`.
    pub fn open(config: &Config, sink: Arc<dyn DiagnosticSink>) -> LineResult<Self> {
        let line_config = config.line.clone();
        let poll_interval = config.timing.status_poll();
        let line = Self::with_opener(
            move || {
                let port = SyncSerialPort::open(
                    &line_config.port,
                    &line_config.link_params(),
                    line_config.open_timeout(),
                )?;
                Ok(Box::new(port.with_poll_interval(poll_interval)) as Box<dyn SerialChannel>)
            },
            config.line.realm.clone(),
            sink,
        )?;

        line.set_watch_carrier(config.line.watch_carrier);
        line.set_flush_debounce(config.timing.flush_debounce());
        line.set_auto_flush_receiver(config.line.auto_flush_receiver);
        Ok(line)
    }

    fn detached(realm: String, sink: Arc<dyn DiagnosticSink>, opener: Option<ChannelOpener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(LineInner {
                    channel: None,
                    port_name: String::new(),
                    signals: SignalState::default(),
                    watch_carrier: false,
                    auto_flush: false,
                    flush_debounce: DEFAULT_FLUSH_DEBOUNCE,
                }),
                wake: Condvar::new(),
                producer: RwLock::new(Producer { sink, realm }),
            }),
            opener,
        }
    }

    /// Sample the initial line levels, subscribe to events and take the channel.
    fn install(&self, mut channel: Box<dyn SerialChannel>) -> LineResult<()> {
        let ready = channel.data_set_ready()?;
        let carrier = channel.carrier_detect()?;

        let mut inner = self.shared.lock();
        let weak = Arc::downgrade(&self.shared);
        channel.subscribe(Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        }))?;

        debug!(port = channel.name(), ready, carrier, "line installed");
        inner.port_name = channel.name().to_string();
        inner.signals = SignalState::sampled(ready, carrier, Instant::now());
        inner.channel = Some(channel);
        Ok(())
    }

    /// Stop event delivery, drop DTR and release the channel.
    ///
    /// Closing an already closed line succeeds.
    pub fn close(&self) -> LineResult<()> {
        // Shut the channel down outside the lock: unsubscribing waits for the
        // delivery context, which may itself be waiting for the lock.
        let channel = self.shared.lock().channel.take();
        if let Some(mut channel) = channel {
            channel.unsubscribe();
            if let Err(e) = channel.set_control_line(ControlLine::Dtr, false) {
                warn!(port = channel.name(), "failed to drop DTR on close: {}", e);
            }
            channel.close()?;
            debug!(port = channel.name(), "line closed");
        }
        Ok(())
    }

    /// Close the current channel, if any, and open a new one.
    ///
    /// Only lines created through an opener can be reopened.
    pub fn reopen(&self) -> LineResult<()> {
        let opener = self
            .opener
            .as_ref()
            .ok_or_else(|| LineError::unsupported("line was not created from an opener"))?;
        self.close()?;
        self.install(opener()?)
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().channel.is_some()
    }

    /// Name of the channel as reported by the driver.
    pub fn port_name(&self) -> String {
        self.shared.lock().port_name.clone()
    }

    /// Whether the far end reports ready (DSR).
    pub fn is_connected(&self) -> bool {
        let inner = self.shared.lock();
        inner.channel.is_some() && inner.signals.ready
    }

    /// Snapshot of the monitored line signals.
    pub fn signal_state(&self) -> SignalState {
        self.shared.lock().signals
    }

    /// When set, a dropped CD also aborts blocked reads with `CarrierLost`.
    pub fn set_watch_carrier(&self, watch: bool) {
        self.shared.lock().watch_carrier = watch;
    }

    /// Pause between two drains of [`flush_and_log`](Self::flush_and_log).
    pub fn set_flush_debounce(&self, debounce: Duration) {
        self.shared.lock().flush_debounce = debounce;
    }

    /// Drain-and-log unsolicited input from the delivery context instead of
    /// waking readers. Enabling it discards whatever is already pending.
    pub fn set_auto_flush_receiver(&self, auto_flush: bool) {
        self.shared.lock().auto_flush = auto_flush;
        if auto_flush {
            if let Err(e) = self.flush_receiver() {
                debug!("flush on enabling auto-flush failed: {}", e);
            }
        }
    }

    /// Apply new link parameters.
    pub fn set_speed(&self, params: &LinkParams) -> LineResult<()> {
        let mut inner = self.shared.lock();
        inner.channel()?.configure(params)?;
        debug!(port = %inner.port_name, baud = params.baud_rate, "link reconfigured");
        Ok(())
    }

    /// Assert or drop DTR.
    pub fn dtr(&self, level: bool) -> LineResult<()> {
        let record = self
            .shared
            .record(Category::Dtr)
            .with(if level { "on" } else { "off" });
        self.shared.publish(&record);

        let mut inner = self.shared.lock();
        inner.channel()?.set_control_line(ControlLine::Dtr, level)?;
        Ok(())
    }

    /// Replace the diagnostic sink and realm.
    pub fn set_sink(&self, sink: Arc<dyn DiagnosticSink>, realm: impl Into<String>) {
        let mut producer = self.shared.producer.write();
        producer.sink = sink;
        producer.realm = realm.into();
    }

    pub fn realm(&self) -> String {
        self.shared.producer.read().realm.clone()
    }

    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.shared.producer.read().sink)
    }
}

impl std::fmt::Debug for SerialLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("SerialLine")
            .field("port", &inner.port_name)
            .field("open", &inner.channel.is_some())
            .field("signals", &inner.signals)
            .field("watch_carrier", &inner.watch_carrier)
            .field("auto_flush", &inner.auto_flush)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{MemorySink, MockDiagnosticSink, SinkError};
    use crate::port::MockChannel;

    fn mock_line() -> (MockChannel, MemorySink, SerialLine) {
        let far_end = MockChannel::new("MOCK0");
        let sink = MemorySink::new();
        let line = SerialLine::new(far_end.clone(), "V24", Arc::new(sink.clone())).unwrap();
        (far_end, sink, line)
    }

    #[test]
    fn test_new_subscribes_and_samples_levels() {
        let far_end = MockChannel::new("MOCK0").with_levels(true, false);
        let line = SerialLine::new(far_end.clone(), "V24", Arc::new(MemorySink::new())).unwrap();

        assert!(far_end.is_subscribed());
        assert!(line.is_connected());
        let signals = line.signal_state();
        assert!(!signals.carrier);
        assert!(signals.carrier_lost_at.is_some());
        assert_eq!(line.port_name(), "MOCK0");
    }

    #[test]
    fn test_close_drops_dtr_and_unsubscribes() {
        let (far_end, _sink, line) = mock_line();
        line.close().unwrap();

        assert!(far_end.is_closed());
        assert!(!far_end.is_subscribed());
        assert_eq!(far_end.control_log(), vec![(ControlLine::Dtr, false)]);
        assert!(!line.is_open());
        assert!(!line.is_connected());

        // Idempotent
        line.close().unwrap();
        assert!(matches!(
            line.send(b"x"),
            Err(LineError::Channel(PortError::NotOpen))
        ));
    }

    #[test]
    fn test_reopen_requires_opener() {
        let (_far_end, _sink, line) = mock_line();
        assert!(matches!(line.reopen(), Err(LineError::Unsupported(_))));
    }

    #[test]
    fn test_reopen_installs_fresh_channel() {
        let opened = Arc::new(Mutex::new(Vec::<MockChannel>::new()));
        let log = Arc::clone(&opened);
        let line = SerialLine::with_opener(
            move || {
                let channel = MockChannel::new("MOCK1");
                log.lock().push(channel.clone());
                Ok(Box::new(channel) as Box<dyn SerialChannel>)
            },
            "V24",
            Arc::new(MemorySink::new()),
        )
        .unwrap();

        line.reopen().unwrap();
        let channels = opened.lock().clone();
        assert_eq!(channels.len(), 2);
        assert!(channels[0].is_closed());
        assert!(!channels[1].is_closed());
        assert!(channels[1].is_subscribed());
        assert!(line.is_open());
    }

    #[test]
    fn test_opener_failure_is_port_unavailable() {
        let result = SerialLine::with_opener(
            || Err(PortError::not_found("/dev/ttyS7")),
            "V24",
            Arc::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(LineError::PortUnavailable(_))));
    }

    #[test]
    fn test_dtr_records_and_sets_line() {
        let (far_end, sink, line) = mock_line();
        line.dtr(true).unwrap();

        assert_eq!(far_end.control_log(), vec![(ControlLine::Dtr, true)]);
        let records = sink.by_category(Category::Dtr);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fragments, vec!["on"]);
    }

    #[test]
    fn test_set_speed_configures_channel() {
        let (far_end, _sink, line) = mock_line();
        let params = LinkParams {
            baud_rate: 2400,
            ..LinkParams::default()
        };
        line.set_speed(&params).unwrap();
        assert_eq!(far_end.configured(), vec![params]);
    }

    #[test]
    fn test_set_sink_changes_realm() {
        let (_far_end, old_sink, line) = mock_line();
        let new_sink = MemorySink::new();
        line.set_sink(Arc::new(new_sink.clone()), "modem");

        line.send(b"AT").unwrap();
        assert!(old_sink.is_empty());
        assert_eq!(new_sink.records()[0].producer, "modem");
        assert_eq!(line.realm(), "modem");
    }

    #[test]
    fn test_enabling_auto_flush_discards_pending_input() {
        let (far_end, sink, line) = mock_line();
        far_end.push_input_silently(b"RING\r\n");

        line.set_auto_flush_receiver(true);
        assert_eq!(far_end.pending_input(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failing_sink_never_fails_operations() {
        let far_end = MockChannel::new("MOCK0");
        let mut sink = MockDiagnosticSink::new();
        sink.expect_record()
            .returning(|_| Err(SinkError("unreachable log host".into())));
        let line = SerialLine::new(far_end.clone(), "V24", Arc::new(sink)).unwrap();

        line.send_str("AT\r").unwrap();
        far_end.push_input(b"OK\r\n");
        assert_eq!(line.waitfor(&["OK"], 200).unwrap(), Some(0));
        // waitfor stops right after the marker, leaving the line ending queued
        assert_eq!(line.flush_receiver().unwrap(), 2);
        line.set_flush_debounce(Duration::from_millis(5));
        far_end.push_input_silently(b"noise");
        assert_eq!(line.flush_and_log().unwrap(), b"noise");
    }
}
