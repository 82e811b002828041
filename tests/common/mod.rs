//! Shared test utilities for line engine tests.
//!
//! - A mock-backed line with an in-memory diagnostic sink
//! - Helpers that play the far end from another thread

#![allow(dead_code)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use v24_line::{MemorySink, MockChannel, SerialLine};

/// A line under test together with its far end and its log.
pub struct Harness {
    pub far_end: MockChannel,
    pub sink: MemorySink,
    pub line: Arc<SerialLine>,
}

/// Create a line on a fresh mock channel with DSR and CD asserted.
pub fn line_with_mock(port_name: &str) -> Harness {
    harness(MockChannel::new(port_name))
}

/// Create a line on `far_end` as it is configured.
pub fn harness(far_end: MockChannel) -> Harness {
    let sink = MemorySink::new();
    let line = SerialLine::new(far_end.clone(), "V24", Arc::new(sink.clone()))
        .expect("mock channel should always install");
    Harness {
        far_end,
        sink,
        line: Arc::new(line),
    }
}

/// Deliver `data` to the line after `delay`, from another thread.
pub fn feed_later(far_end: &MockChannel, delay: Duration, data: &[u8]) -> JoinHandle<()> {
    let far_end = far_end.clone();
    let data = data.to_vec();
    thread::spawn(move || {
        thread::sleep(delay);
        far_end.push_input(&data);
    })
}

/// Deliver `chunks` one after another, `gap` apart.
pub fn feed_chunks(far_end: &MockChannel, gap: Duration, chunks: Vec<&[u8]>) -> JoinHandle<()> {
    let far_end = far_end.clone();
    let chunks: Vec<Vec<u8>> = chunks.into_iter().map(<[u8]>::to_vec).collect();
    thread::spawn(move || {
        for chunk in chunks {
            thread::sleep(gap);
            far_end.push_input(&chunk);
        }
    })
}

/// Drop CD (or DSR when `dsr` is set) after `delay`, from another thread.
pub fn drop_signal_later(far_end: &MockChannel, delay: Duration, dsr: bool) -> JoinHandle<()> {
    let far_end = far_end.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        if dsr {
            far_end.set_dsr(false);
        } else {
            far_end.set_carrier(false);
        }
    })
}
