//! Line-status tracking driven by channel events.

use super::Shared;
use crate::diag::{format_elapsed, Category};
use crate::port::LineEvent;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Monitored DSR/CD levels.
///
/// `carrier_lost_at` is set exactly while carrier is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalState {
    /// DSR level.
    pub ready: bool,
    /// CD level.
    pub carrier: bool,
    /// When carrier was last seen dropping.
    pub carrier_lost_at: Option<Instant>,
}

impl Default for SignalState {
    fn default() -> Self {
        Self {
            ready: true,
            carrier: true,
            carrier_lost_at: None,
        }
    }
}

impl SignalState {
    /// State for levels sampled at `now`. A line that starts without carrier
    /// counts as having lost it at `now`.
    pub fn sampled(ready: bool, carrier: bool, now: Instant) -> Self {
        Self {
            ready,
            carrier,
            carrier_lost_at: (!carrier).then_some(now),
        }
    }

    pub fn carrier_lost(&mut self, now: Instant) {
        self.carrier = false;
        self.carrier_lost_at = Some(now);
    }

    /// Mark carrier up again, returning how long it was down if a loss
    /// had been recorded.
    pub fn carrier_recovered(&mut self, now: Instant) -> Option<Duration> {
        self.carrier = true;
        self.carrier_lost_at
            .take()
            .map(|lost| now.saturating_duration_since(lost))
    }

    /// Whether a blocked read may keep waiting.
    pub fn is_usable(&self, watch_carrier: bool) -> bool {
        self.ready && (!watch_carrier || self.carrier)
    }
}

impl Shared {
    /// Entry point for the channel's delivery context.
    pub(crate) fn handle_event(&self, event: LineEvent) {
        self.handle_event_at(event, Instant::now());
    }

    pub(crate) fn handle_event_at(&self, event: LineEvent, now: Instant) {
        trace!(?event, "line event");
        match event {
            LineEvent::CarrierDetect(false) => {
                let record = {
                    let mut inner = self.lock();
                    inner.signals.carrier_lost(now);
                    self.notify();
                    self.record(Category::BadNews)
                        .with(format!("{} lost CD", inner.port_name()))
                };
                self.publish(&record);
            }
            LineEvent::CarrierDetect(true) => {
                let record = {
                    let mut inner = self.lock();
                    let down_for = inner.signals.carrier_recovered(now);
                    self.notify();
                    let message = match down_for {
                        Some(elapsed) => format!(
                            "{} recovered CD after {}",
                            inner.port_name(),
                            format_elapsed(elapsed)
                        ),
                        None => format!("{} recovered CD", inner.port_name()),
                    };
                    self.record(Category::GoodNews).with(message)
                };
                self.publish(&record);
            }
            LineEvent::DataSetReady(level) => {
                let mut inner = self.lock();
                inner.signals.ready = level;
                if !level {
                    self.notify();
                }
            }
            LineEvent::DataAvailable => {
                let auto_flush = {
                    let inner = self.lock();
                    if !inner.auto_flush {
                        self.notify();
                    }
                    inner.auto_flush
                };
                if auto_flush {
                    if let Err(e) = self.drain_and_log() {
                        debug!("auto-flush failed: {}", e);
                    }
                }
            }
        }
    }
}
