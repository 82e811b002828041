//! Sending, and getting rid of unsolicited input.

use super::{SerialLine, Shared};
use crate::diag::{dump_bytes, Category};
use crate::error::LineResult;
use std::thread;
use std::time::Duration;

/// Most bytes a single `flush_and_log` keeps for its record.
pub const FLUSH_LOG_LIMIT: usize = 1000;

/// Default pause between drains, long enough to coalesce a burst.
pub const DEFAULT_FLUSH_DEBOUNCE: Duration = Duration::from_millis(250);

impl Shared {
    /// Drain input until a whole debounce pause passes without new bytes,
    /// then log what was drained.
    pub(crate) fn drain_and_log(&self) -> LineResult<Vec<u8>> {
        let mut captured = Vec::new();
        let outcome = self.drain_with_debounce(&mut captured);

        let mut record = self.record(Category::Flush).with(dump_bytes(&captured));
        if let Err(e) = &outcome {
            record.push(format!("<error>{e}</error>"));
        }
        self.publish(&record);

        outcome.map(|_| captured)
    }

    fn drain_with_debounce(&self, captured: &mut Vec<u8>) -> LineResult<()> {
        let mut chunk = [0u8; 256];
        loop {
            let mut inner = self.lock();
            let debounce = inner.flush_debounce;
            let channel = inner.channel()?;
            if channel.bytes_available()? == 0 {
                return Ok(());
            }
            while channel.bytes_available()? > 0 {
                let n = channel.read_bytes(&mut chunk)?;
                if n == 0 {
                    break;
                }
                let room = FLUSH_LOG_LIMIT.saturating_sub(captured.len());
                captured.extend_from_slice(&chunk[..n.min(room)]);
            }
            drop(inner);
            thread::sleep(debounce);
        }
    }

    fn discard_input(&self) -> LineResult<usize> {
        let mut chunk = [0u8; 256];
        let mut discarded = 0;
        let mut inner = self.lock();
        let channel = inner.channel()?;
        while channel.bytes_available()? > 0 {
            let n = channel.read_bytes(&mut chunk)?;
            if n == 0 {
                break;
            }
            discarded += n;
        }
        Ok(discarded)
    }

    fn write_logged(&self, data: &[u8], flush: bool) -> LineResult<()> {
        let outcome = (|| -> LineResult<()> {
            let mut inner = self.lock();
            let channel = inner.channel()?;
            channel.write_bytes(data)?;
            if flush {
                channel.flush()?;
            }
            Ok(())
        })();

        let mut record = self.record(Category::Send).with(dump_bytes(data));
        if let Err(e) = &outcome {
            record.push(format!("<error>{e}</error>"));
        }
        self.publish(&record);
        outcome
    }
}

impl SerialLine {
    /// Drain pending input, waiting out bursts, and log it as one `flush`
    /// record.
    ///
    /// At most [`FLUSH_LOG_LIMIT`] bytes are kept; all pending input is
    /// consumed regardless. Returns the kept bytes.
    pub fn flush_and_log(&self) -> LineResult<Vec<u8>> {
        self.shared.drain_and_log()
    }

    /// Discard pending input without logging. Returns how many bytes went.
    pub fn flush_receiver(&self) -> LineResult<usize> {
        self.shared.discard_input()
    }

    /// Push buffered output onto the wire.
    pub fn flush_transmitter(&self) -> LineResult<()> {
        let mut inner = self.shared.lock();
        inner.channel()?.flush()?;
        Ok(())
    }

    /// Write `data` without flushing.
    pub fn send(&self, data: &[u8]) -> LineResult<()> {
        self.shared.write_logged(data, false)
    }

    /// Write a single byte without flushing.
    pub fn send_byte(&self, byte: u8) -> LineResult<()> {
        self.shared.write_logged(&[byte], false)
    }

    /// Write `s` and flush the transmitter.
    pub fn send_str(&self, s: &str) -> LineResult<()> {
        self.shared.write_logged(s.as_bytes(), true)
    }
}
