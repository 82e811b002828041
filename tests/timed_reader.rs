//! Deadline-bounded reads against a mock far end.

mod common;

use common::{drop_signal_later, feed_chunks, feed_later, harness, line_with_mock};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::{Duration, Instant};
use v24_line::line::MAX_STRING_SIZE;
use v24_line::{Category, LineError, MockChannel, Timeout};

#[test]
fn test_read_without_data_returns_zero_after_timeout() {
    let h = line_with_mock("MOCK0");
    let mut buf = [0u8; 10];

    let started = Instant::now();
    let n = h.line.read(&mut buf, 100).unwrap();
    let took = started.elapsed();

    assert_eq!(n, 0);
    assert!(took >= Duration::from_millis(100));
    assert!(took < Duration::from_millis(300), "read overran its deadline: {took:?}");
    // Raw reads are not part of the audit trail
    assert!(h.sink.is_empty());
}

#[test]
fn test_read_fills_buffer_from_queued_input() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"0123456789ABC");
    let mut buf = [0u8; 10];

    let n = h.line.read(&mut buf, 1000).unwrap();

    assert_eq!(n, 10);
    assert_eq!(&buf, b"0123456789");
    assert_eq!(h.far_end.pending_input(), 3);
}

#[test]
fn test_read_collects_input_arriving_in_pieces() {
    let h = line_with_mock("MOCK0");
    let feeder = feed_chunks(
        &h.far_end,
        Duration::from_millis(20),
        vec![b"AB".as_slice(), b"CD".as_slice()],
    );
    let mut buf = [0u8; 4];

    let n = h.line.read(&mut buf, 2000).unwrap();
    feeder.join().unwrap();

    assert_eq!(n, 4);
    assert_eq!(&buf, b"ABCD");
}

#[test]
fn test_read_until_stops_at_terminator() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"hello\nworld");

    let text = h.line.read_until(b"\n", 1000, false).unwrap();

    assert_eq!(text, "hello");
    assert_eq!(h.far_end.pending_input(), 5);

    let records = h.sink.by_category(Category::ReadUntil);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].fragments,
        vec!["{LF}", "<match/>", "<read>hello</read>"]
    );
}

#[test]
fn test_read_until_can_keep_terminator() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"+CSQ: 21,0\r");

    let text = h.line.read_until(b"\r\n", 1000, true).unwrap();

    assert_eq!(text, "+CSQ: 21,0\r");
}

#[test]
fn test_read_until_timeout_returns_partial_text() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"CONN");

    let started = Instant::now();
    let text = h.line.read_until(b"\n", 80, false).unwrap();
    let took = started.elapsed();

    assert_eq!(text, "CONN");
    assert!(took >= Duration::from_millis(80));
    assert!(took < Duration::from_millis(280), "read_until overran: {took:?}");
    let record = &h.sink.by_category(Category::ReadUntil)[0];
    assert_eq!(record.fragments[1], "<timeout>80</timeout>");
    assert_eq!(record.fragments[2], "<read>CONN</read>");
}

#[test]
fn test_negative_timeout_is_taken_by_magnitude() {
    let h = line_with_mock("MOCK0");

    let started = Instant::now();
    let text = h.line.read_until(b"\n", -60, false).unwrap();
    let took = started.elapsed();

    assert_eq!(text, "");
    assert!(took >= Duration::from_millis(60));
    assert!(took < Duration::from_millis(260), "read_until overran: {took:?}");
    let record = &h.sink.by_category(Category::ReadUntil)[0];
    assert_eq!(record.fragments[1], "<timeout>60</timeout>");
}

#[test]
fn test_zero_timeout_returns_without_consuming() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"OK\n");

    let text = h.line.read_until(b"\n", 0, false).unwrap();
    let mut buf = [0u8; 4];
    let n = h.line.read(&mut buf, 0).unwrap();

    assert_eq!(text, "");
    assert_eq!(n, 0);
    assert_eq!(h.far_end.pending_input(), 3);
    let record = &h.sink.by_category(Category::ReadUntil)[0];
    assert_eq!(record.fragments[1], "<timeout>0</timeout>");
}

#[test]
fn test_read_until_caps_accumulated_text() {
    let h = line_with_mock("MOCK0");
    let mut data = vec![b'a'; MAX_STRING_SIZE + 10];
    data.push(b'\n');
    h.far_end.push_input(&data);

    let text = h.line.read_until(b"\n", Timeout::from(Duration::from_secs(10)), true).unwrap();

    // Overflow is dropped but the terminator is still appended
    assert_eq!(text.len(), MAX_STRING_SIZE + 1);
    assert!(text.ends_with('\n'));
    assert_eq!(h.far_end.pending_input(), 0);
}

#[test]
fn test_read_line_waits_for_late_line() {
    let h = line_with_mock("MOCK0");
    let feeder = feed_later(&h.far_end, Duration::from_millis(30), b"RING\r\n");

    let text = h.line.read_line(2000).unwrap();
    feeder.join().unwrap();

    assert_eq!(text, "RING\r");
}

#[test]
fn test_read_string_returns_what_arrived() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"OK");

    let text = h.line.read_string(60, 10).unwrap();

    assert_eq!(text, "OK");
}

#[test]
fn test_carrier_drop_aborts_read_when_watched() {
    let h = line_with_mock("MOCK0");
    h.line.set_watch_carrier(true);
    let dropper = drop_signal_later(&h.far_end, Duration::from_millis(30), false);

    let started = Instant::now();
    let result = h.line.read_until(b"\n", 5000, false);
    dropper.join().unwrap();

    match result {
        Err(LineError::CarrierLost { port }) => assert_eq!(port, "MOCK0"),
        other => panic!("expected CarrierLost, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    let record = &h.sink.by_category(Category::ReadUntil)[0];
    assert_eq!(record.fragments[1], "<error>MOCK0: DSR/CD off</error>");
}

#[test]
fn test_carrier_drop_is_ignored_when_not_watched() {
    let h = line_with_mock("MOCK0");
    let dropper = drop_signal_later(&h.far_end, Duration::from_millis(10), false);
    let mut buf = [0u8; 4];

    let n = h.line.read(&mut buf, 100).unwrap();
    dropper.join().unwrap();

    assert_eq!(n, 0);
    assert!(!h.line.signal_state().carrier);
}

#[test]
fn test_dsr_drop_always_aborts_read() {
    let h = line_with_mock("MOCK0");
    let dropper = drop_signal_later(&h.far_end, Duration::from_millis(30), true);
    let mut buf = [0u8; 4];

    let started = Instant::now();
    let result = h.line.read(&mut buf, 5000);
    dropper.join().unwrap();

    assert!(matches!(result, Err(LineError::CarrierLost { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_spurious_wake_keeps_waiting() {
    let h = harness(MockChannel::new("MOCK0"));
    let far_end = h.far_end.clone();
    let waker = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        // Announces data that is not there
        far_end.emit(v24_line::LineEvent::DataAvailable);
        std::thread::sleep(Duration::from_millis(20));
        far_end.push_input(b"\n");
    });

    let text = h.line.read_line(2000).unwrap();
    waker.join().unwrap();

    assert_eq!(text, "");
    assert_eq!(h.sink.by_category(Category::ReadUntil)[0].fragments[1], "<match/>");
}

#[test]
fn test_read_failure_propagates() {
    let h = line_with_mock("MOCK0");
    h.far_end.push_input(b"x");
    h.far_end.fail_next_read();
    let mut buf = [0u8; 1];

    assert!(matches!(
        h.line.read(&mut buf, 100),
        Err(LineError::Channel(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_read_never_exceeds_buffer(
        data in proptest::collection::vec(any::<u8>(), 1..64),
        want in 1usize..64,
    ) {
        let want = want.min(data.len());
        let h = line_with_mock("MOCK0");
        h.far_end.push_input(&data);
        let mut buf = vec![0u8; want];

        let n = h.line.read(&mut buf, 1000).unwrap();

        prop_assert_eq!(n, want);
        prop_assert_eq!(&buf[..], &data[..want]);
        prop_assert_eq!(h.far_end.pending_input(), data.len() - want);
    }
}
