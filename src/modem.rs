//! Dial/hangup orchestration on top of a [`SerialLine`].

use crate::error::{LineError, LineResult};
use crate::line::{SerialLine, Timeout};
use std::sync::Arc;
use tracing::debug;

/// Connection management for a line.
#[cfg_attr(test, mockall::automock)]
pub trait Modem: Send + Sync {
    /// Establish a connection to `number`, giving up after `timeout`.
    fn dial(&self, number: &str, timeout: Timeout) -> LineResult<()>;

    fn hangup(&self) -> LineResult<()>;

    fn is_connected(&self) -> bool;
}

/// A permanently connected line. Dialing is a no-op and it can never hang up.
#[derive(Debug, Clone)]
pub struct LeasedLineModem {
    line: Arc<SerialLine>,
}

impl LeasedLineModem {
    pub fn new(line: Arc<SerialLine>) -> Self {
        Self { line }
    }

    pub fn line(&self) -> &Arc<SerialLine> {
        &self.line
    }
}

impl Modem for LeasedLineModem {
    fn dial(&self, number: &str, _timeout: Timeout) -> LineResult<()> {
        debug!(port = %self.line.port_name(), number, "leased line, nothing to dial");
        Ok(())
    }

    fn hangup(&self) -> LineResult<()> {
        Err(LineError::unsupported("leased line cannot hang up"))
    }

    fn is_connected(&self) -> bool {
        self.line.is_connected()
    }
}
