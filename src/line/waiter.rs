//! Waiting for one of several markers, e.g. `OK` / `ERROR` after an AT command.

use super::reader::latin1;
use super::timeout::{Deadline, Timeout};
use super::SerialLine;
use crate::diag::{dump_bytes, Category};
use crate::error::LineResult;
use std::time::Duration;

/// Outcome of a pattern wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Position of the matching pattern, `None` if the deadline passed first.
    pub index: Option<usize>,
    pub elapsed: Duration,
    /// Every byte consumed during the wait.
    pub buffer: Vec<u8>,
}

impl MatchResult {
    pub fn matched(&self) -> bool {
        self.index.is_some()
    }

    pub fn buffer_text(&self) -> String {
        latin1(&self.buffer)
    }
}

/// First pattern, in declaration order, that ends at the last byte of
/// `buffer`.
///
/// Buffers are checked after every appended byte, so a pattern that became a
/// substring with the newest byte necessarily ends there.
pub(crate) fn first_match<P: AsRef<str>>(patterns: &[P], buffer: &[u8]) -> Option<usize> {
    patterns
        .iter()
        .position(|p| buffer.ends_with(p.as_ref().as_bytes()))
}

impl SerialLine {
    /// Read byte by byte until the buffer contains one of `patterns` or
    /// `timeout` elapses.
    ///
    /// All single-byte reads share one deadline. The first declared pattern
    /// that shows up wins. One `waitfor` record lists the patterns, the
    /// outcome and everything consumed.
    pub fn wait_for_match<P: AsRef<str>>(
        &self,
        patterns: &[P],
        timeout: impl Into<Timeout>,
    ) -> LineResult<MatchResult> {
        let deadline = Deadline::after(timeout.into());
        let mut record = self.shared.record(Category::WaitFor);
        for (i, pattern) in patterns.iter().enumerate() {
            record.push(format!("{i}:{}", dump_bytes(pattern.as_ref().as_bytes())));
        }

        let mut buffer = Vec::new();
        let mut index = None;
        let outcome = loop {
            if deadline.expired() {
                break Ok(());
            }
            let mut byte = [0u8; 1];
            match self.shared.read_into(&mut byte, &deadline) {
                Ok(1) => {
                    buffer.push(byte[0]);
                    index = first_match(patterns, &buffer);
                    if index.is_some() {
                        break Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        let elapsed = deadline.elapsed();
        let matched = index.map_or(-1, |i| i as i64);
        record.push(format!(
            "<buffer match=\"{matched}\" elapsed=\"{}\">{}</buffer>",
            elapsed.as_millis(),
            dump_bytes(&buffer)
        ));
        if let Err(e) = &outcome {
            record.push(format!("<error>{e}</error>"));
        }
        self.shared.publish(&record);

        outcome.map(|_| MatchResult {
            index,
            elapsed,
            buffer,
        })
    }

    /// Index of the first pattern seen before `timeout`, if any.
    pub fn waitfor<P: AsRef<str>>(
        &self,
        patterns: &[P],
        timeout: impl Into<Timeout>,
    ) -> LineResult<Option<usize>> {
        Ok(self.wait_for_match(patterns, timeout)?.index)
    }

    /// Whether `pattern` shows up before `timeout`.
    pub fn waitfor_one(&self, pattern: &str, timeout: impl Into<Timeout>) -> LineResult<bool> {
        Ok(self.waitfor(&[pattern], timeout)?.is_some())
    }

    /// Send `command`, then wait for one of `patterns`.
    pub fn send_and_waitfor<P: AsRef<str>>(
        &self,
        command: &str,
        patterns: &[P],
        timeout: impl Into<Timeout>,
    ) -> LineResult<Option<usize>> {
        self.send_str(command)?;
        self.waitfor(patterns, timeout)
    }

    /// Send `command`, then wait for `pattern`.
    pub fn send_and_waitfor_one(
        &self,
        command: &str,
        pattern: &str,
        timeout: impl Into<Timeout>,
    ) -> LineResult<bool> {
        self.send_str(command)?;
        self.waitfor_one(pattern, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_prefers_declaration_order() {
        // Both end at the last byte; the earlier declaration wins.
        assert_eq!(first_match(&["OK", "K"], b"AT\r\nOK"), Some(0));
        assert_eq!(first_match(&["K", "OK"], b"AT\r\nOK"), Some(0));
    }

    #[test]
    fn test_first_match_none() {
        assert_eq!(first_match(&["OK", "ERROR"], b"AT\r\nERR"), None);
        assert_eq!(first_match::<&str>(&[], b"anything"), None);
    }

    #[test]
    fn test_match_result_text() {
        let result = MatchResult {
            index: Some(1),
            elapsed: Duration::from_millis(3),
            buffer: b"ERROR".to_vec(),
        };
        assert!(result.matched());
        assert_eq!(result.buffer_text(), "ERROR");
    }
}
