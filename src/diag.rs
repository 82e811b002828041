//! Diagnostic records and the sinks that receive them.
//!
//! Every public read, send and signal transition produces exactly one
//! [`DiagnosticRecord`]. Records form the audit trail of a line and are kept
//! apart from operational `tracing` output, although [`TracingSink`] bridges
//! the two. A sink that fails never fails the operation that produced the
//! record.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Kind of event a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    /// Carrier dropped.
    #[serde(rename = "badnews")]
    BadNews,
    /// Carrier came back.
    #[serde(rename = "goodnews")]
    GoodNews,
    #[serde(rename = "read-until")]
    ReadUntil,
    #[serde(rename = "waitfor")]
    WaitFor,
    #[serde(rename = "flush")]
    Flush,
    #[serde(rename = "send")]
    Send,
    #[serde(rename = "dtr")]
    Dtr,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadNews => "badnews",
            Self::GoodNews => "goodnews",
            Self::ReadUntil => "read-until",
            Self::WaitFor => "waitfor",
            Self::Flush => "flush",
            Self::Send => "send",
            Self::Dtr => "dtr",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured audit entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub timestamp: DateTime<Utc>,
    /// Realm of the line that produced the record.
    pub producer: String,
    pub category: Category,
    /// Message fragments in the order they were added.
    pub fragments: Vec<String>,
}

impl DiagnosticRecord {
    pub fn new(producer: impl Into<String>, category: Category) -> Self {
        Self {
            timestamp: Utc::now(),
            producer: producer.into(),
            category,
            fragments: Vec::new(),
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, fragment: impl Into<String>) -> Self {
        self.push(fragment);
        self
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// All fragments joined by single spaces.
    pub fn message(&self) -> String {
        self.fragments.join(" ")
    }
}

/// Failure reported by a sink.
#[derive(Debug, Error)]
#[error("diagnostic sink failed: {0}")]
pub struct SinkError(pub String);

/// Destination for diagnostic records.
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &DiagnosticRecord) -> Result<(), SinkError>;
}

/// Deliver a record, swallowing sink failures.
pub fn emit(sink: &dyn DiagnosticSink, record: &DiagnosticRecord) {
    if let Err(e) = sink.record(record) {
        warn!(
            producer = %record.producer,
            category = record.category.as_str(),
            "dropping diagnostic record: {}",
            e
        );
    }
}

/// Sink that re-emits records as `tracing` events under `v24_line::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, record: &DiagnosticRecord) -> Result<(), SinkError> {
        info!(
            target: "v24_line::audit",
            producer = %record.producer,
            category = record.category.as_str(),
            "{}",
            record.message()
        );
        Ok(())
    }
}

/// Sink that keeps every record in memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<DiagnosticRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    /// Records of one category, oldest first.
    pub fn by_category(&self, category: Category) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, record: &DiagnosticRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Render bytes for a log line.
///
/// Printable ASCII is kept as is, well-known control characters become
/// mnemonics such as `{CR}` and anything else becomes `[XX]`.
pub fn dump_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let mnemonic = match b {
            b'\r' => Some("{CR}"),
            b'\n' => Some("{LF}"),
            0x00 => Some("{NULL}"),
            0x01 => Some("{SOH}"),
            0x02 => Some("{STX}"),
            0x03 => Some("{ETX}"),
            0x04 => Some("{EOT}"),
            0x05 => Some("{ENQ}"),
            0x06 => Some("{ACK}"),
            0x07 => Some("{BEL}"),
            0x10 => Some("{DLE}"),
            0x15 => Some("{NAK}"),
            0x16 => Some("{SYN}"),
            0x1c => Some("{FS}"),
            0x1e => Some("{RS}"),
            _ => None,
        };
        match mnemonic {
            Some(m) => out.push_str(m),
            None if (0x20..0x7f).contains(&b) => out.push(b as char),
            None => {
                let _ = write!(out, "[{b:02X}]");
            }
        }
    }
    out
}

/// Human form of an elapsed time: milliseconds below five seconds, whole
/// seconds from there on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 5000 {
        format!("{ms}ms")
    } else {
        format!("{}s", ms / 1000)
    }
}
