//! Caller timeouts and the deadlines derived from them.

use std::time::{Duration, Instant};

/// Upper bound for a deadline when `now + timeout` would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A non-negative wait budget.
///
/// Built from a [`Duration`] or from a signed millisecond count. Negative
/// counts are taken by absolute value, so `Timeout::from(-250)` and
/// `Timeout::from(250)` are the same budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeout(Duration);

impl Timeout {
    pub const ZERO: Timeout = Timeout(Duration::ZERO);

    pub fn from_millis(ms: i64) -> Self {
        Self(Duration::from_millis(ms.unsigned_abs()))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> u128 {
        self.0.as_millis()
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        Self::from_millis(ms.into())
    }
}

impl From<u64> for Timeout {
    fn from(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

impl From<u32> for Timeout {
    fn from(ms: u32) -> Self {
        Self(Duration::from_millis(ms.into()))
    }
}

/// Absolute point in time after which a blocking operation gives up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    start: Instant,
    at: Instant,
}

impl Deadline {
    pub(crate) fn after(timeout: Timeout) -> Self {
        let start = Instant::now();
        let at = start
            .checked_add(timeout.as_duration())
            .unwrap_or_else(|| start + FAR_FUTURE);
        Self { start, at }
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, zero once expired.
    pub(crate) fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Time since the deadline was set.
    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
