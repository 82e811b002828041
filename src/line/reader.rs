//! Deadline-bounded reads.
//!
//! Running out of time is not an error here: every read returns what it
//! collected before the deadline.

use super::timeout::{Deadline, Timeout};
use super::{SerialLine, Shared};
use crate::diag::{dump_bytes, Category};
use crate::error::LineResult;
use tracing::trace;

/// Longest string `read_until` accumulates; later bytes are dropped.
pub const MAX_STRING_SIZE: usize = 64 * 1024;

/// Bytes to text, one `char` per byte.
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

impl Shared {
    /// Fill `buf` until it is full or `deadline` passes.
    pub(crate) fn read_into(&self, buf: &mut [u8], deadline: &Deadline) -> LineResult<usize> {
        let mut filled = 0;
        while filled < buf.len() && !deadline.expired() {
            let mut inner = self.lock();
            if inner.channel()?.bytes_available()? > 0 {
                filled += inner.channel()?.read_bytes(&mut buf[filled..])?;
                continue;
            }

            let remaining = deadline.remaining();
            if remaining.is_zero() {
                break;
            }
            self.wait(&mut inner, remaining);
            inner.ensure_signals()?;
        }
        Ok(filled)
    }

    /// Accumulate into `buf` until a terminator arrives (`Ok(true)`) or the
    /// deadline passes (`Ok(false)`).
    fn accumulate_until(
        &self,
        terminators: &[u8],
        include_terminator: bool,
        deadline: &Deadline,
        buf: &mut Vec<u8>,
    ) -> LineResult<bool> {
        loop {
            if deadline.expired() {
                return Ok(false);
            }

            let mut inner = self.lock();
            if inner.channel()?.bytes_available()? > 0 {
                let mut byte = [0u8; 1];
                if inner.channel()?.read_bytes(&mut byte)? == 0 {
                    continue;
                }
                let c = byte[0];
                if memchr::memchr(c, terminators).is_some() {
                    if include_terminator {
                        buf.push(c);
                    }
                    return Ok(true);
                }
                if buf.len() < MAX_STRING_SIZE {
                    buf.push(c);
                }
            } else {
                let remaining = deadline.remaining();
                if !remaining.is_zero() {
                    self.wait(&mut inner, remaining);
                    inner.ensure_signals()?;
                }
            }
        }
    }
}

impl SerialLine {
    /// Fill `buf` from the line, giving up when `timeout` elapses.
    ///
    /// Returns how many bytes were stored; fewer than `buf.len()` means the
    /// deadline passed. Fails with `CarrierLost` if DSR drops (or CD, in
    /// watch-carrier mode) while waiting.
    pub fn read(&self, buf: &mut [u8], timeout: impl Into<Timeout>) -> LineResult<usize> {
        let deadline = Deadline::after(timeout.into());
        let n = self.shared.read_into(buf, &deadline)?;
        trace!(requested = buf.len(), read = n, "read");
        Ok(n)
    }

    /// Read until one of `terminators` arrives or `timeout` elapses.
    ///
    /// The terminator itself is only part of the result when
    /// `include_terminator` is set. On timeout the bytes gathered so far are
    /// returned, possibly none. At most [`MAX_STRING_SIZE`] bytes are kept.
    pub fn read_until(
        &self,
        terminators: &[u8],
        timeout: impl Into<Timeout>,
        include_terminator: bool,
    ) -> LineResult<String> {
        let timeout = timeout.into();
        let deadline = Deadline::after(timeout);
        let mut record = self
            .shared
            .record(Category::ReadUntil)
            .with(dump_bytes(terminators));

        let mut buf = Vec::new();
        let outcome = self
            .shared
            .accumulate_until(terminators, include_terminator, &deadline, &mut buf);

        match &outcome {
            Ok(true) => record.push("<match/>"),
            Ok(false) => record.push(format!("<timeout>{}</timeout>", timeout.as_millis())),
            Err(e) => record.push(format!("<error>{e}</error>")),
        }
        record.push(format!("<read>{}</read>", dump_bytes(&buf)));
        self.shared.publish(&record);

        outcome.map(|_| latin1(&buf))
    }

    /// Read one line, without its `\n`.
    pub fn read_line(&self, timeout: impl Into<Timeout>) -> LineResult<String> {
        self.read_until(b"\n", timeout, false)
    }

    /// Read up to `maxsize` bytes as text.
    pub fn read_string(&self, timeout: impl Into<Timeout>, maxsize: usize) -> LineResult<String> {
        let mut buf = vec![0u8; maxsize];
        let n = self.read(&mut buf, timeout)?;
        Ok(latin1(&buf[..n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_is_byte_exact() {
        let bytes = [b'O', b'K', 0xe9, 0x00];
        let text = latin1(&bytes);
        assert_eq!(text.chars().count(), 4);
        let back: Vec<u8> = text.chars().map(|c| c as u8).collect();
        assert_eq!(back, bytes);
    }
}
