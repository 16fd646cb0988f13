//! Tests for stream watching

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};

use crate::config::QueueConfig;
use crate::events::{Event, EventKind, EventQueue};
use crate::subprocess::streaming::watcher::MAX_LINE_LEN;
use crate::subprocess::streaming::{StreamSource, StreamWatcher};
use crate::trigger::TriggerMatcher;

const HELLO: EventKind = EventKind(0);
const ERROR: EventKind = EventKind(1);
const READY: EventKind = EventKind(2);

fn hello_matcher() -> TriggerMatcher {
    let matcher = TriggerMatcher::new();
    matcher.register("hello (.*)", HELLO).unwrap();
    matcher
}

fn queue_with(capacity: usize, send_timeout: Option<Duration>) -> EventQueue {
    EventQueue::with_config(&QueueConfig {
        capacity,
        send_timeout,
    })
}

/// Yields its data once, then fails every read
struct FailingReader {
    data: Option<&'static [u8]>,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.data.take() {
            Some(data) => {
                buf.put_slice(data);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream torn down",
            ))),
        }
    }
}

#[tokio::test]
async fn test_events_follow_line_order() {
    let mut queue = queue_with(16, None);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let input: &'static [u8] = b"hello 0\nnoise\nhello 1\nhello 2\n\nmore noise\nhello 3\n";
    let summary = watcher.run(input).await;

    assert_eq!(summary.lines, 7);
    assert_eq!(summary.events, 4);
    assert_eq!(summary.dropped, 0);
    for i in 0..4 {
        let event = queue.skip().await.unwrap();
        assert_eq!(event, Event::new(HELLO, vec![i.to_string()]));
    }
    assert_eq!(queue.clear(), 0);
}

#[tokio::test]
async fn test_incomplete_trailing_line_is_discarded() {
    let mut queue = queue_with(16, None);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let input: &'static [u8] = b"hello 0\r\nhello 1";
    let summary = watcher.run(input).await;

    assert_eq!(summary.lines, 1);
    assert!(summary.partial_line_discarded);
    assert!(queue.expect(HELLO, &["0"]).await.is_ok());
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_read_error_ends_watcher_quietly() {
    let mut queue = queue_with(16, None);
    let watcher = StreamWatcher::new(StreamSource::Stderr, hello_matcher(), queue.sender());

    let summary = watcher
        .run(FailingReader {
            data: Some(&b"hello err\n"[..]),
        })
        .await;

    assert_eq!(summary.lines, 1);
    assert_eq!(summary.events, 1);
    assert!(queue.expect(HELLO, &["err"]).await.is_ok());
    assert_eq!(queue.clear(), 0);
    assert!(!queue.is_closed());
}

#[tokio::test]
async fn test_verbose_echoes_every_complete_line() {
    let queue = queue_with(16, None);
    let (echo_tx, mut echo_rx) = tokio::io::duplex(1024);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender())
        .with_echo(echo_tx);

    let input: &'static [u8] = b"hello 0\r\nplain\npartial";
    watcher.run(input).await;

    let mut echoed = String::new();
    echo_rx.read_to_string(&mut echoed).await.unwrap();
    assert_eq!(echoed, "hello 0\nplain\n");
}

#[tokio::test]
async fn test_producer_waits_for_consumer() {
    let mut queue = queue_with(1, None);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let input: &'static [u8] = b"hello 0\nhello 1\nhello 2\n";
    let handle = watcher.spawn(input);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(queue.pending(), 1);

    for i in 0..3 {
        let event = queue.skip().await.unwrap();
        assert_eq!(event.args, vec![i.to_string()]);
    }

    let summary = handle.await.unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(summary.dropped, 0);
}

#[tokio::test]
async fn test_send_timeout_drops_unconsumed_events() {
    let mut queue = queue_with(1, Some(Duration::from_millis(20)));
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let input: &'static [u8] = b"hello 0\nhello 1\nhello 2\n";
    let summary = watcher.run(input).await;

    assert_eq!(summary.lines, 3);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.dropped, 2);
    assert!(queue.expect(HELLO, &["0"]).await.is_ok());
}

#[tokio::test]
async fn test_closed_queue_stops_forwarding_but_keeps_reading() {
    let mut queue = queue_with(1, None);
    queue.close();
    let (echo_tx, mut echo_rx) = tokio::io::duplex(1024);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender())
        .with_echo(echo_tx);

    let input: &'static [u8] = b"hello 0\nhello 1\nbye\n";
    let summary = watcher.run(input).await;

    assert_eq!(summary.lines, 3);
    assert_eq!(summary.events, 0);
    assert_eq!(summary.dropped, 2);

    let mut echoed = String::new();
    echo_rx.read_to_string(&mut echoed).await.unwrap();
    assert_eq!(echoed, "hello 0\nhello 1\nbye\n");
    assert!(queue.skip().await.is_err());
}

#[tokio::test]
async fn test_queue_closed_mid_stream_counts_every_lost_event() {
    let mut queue = queue_with(1, None);
    let matcher = hello_matcher();
    matcher.register("(hello)", READY).unwrap();

    let (mut child_out, watched) = tokio::io::duplex(1024);
    let handle =
        StreamWatcher::new(StreamSource::Stdout, matcher, queue.sender()).spawn(watched);

    // Two events per line; the second one parks the watcher on a full queue
    child_out.write_all(b"hello 0\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(queue.pending(), 1);
    queue.close();

    child_out.write_all(b"hello 1\nhello 2\nquiet\nhello 3\n").await.unwrap();
    drop(child_out);

    let summary = handle.await.unwrap();
    assert_eq!(summary.lines, 5);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.dropped, 7);
    assert_eq!(summary.events + summary.dropped, 8);

    assert!(queue.expect(HELLO, &["0"]).await.is_ok());
    assert!(queue.skip().await.is_err());
}

#[tokio::test]
async fn test_overlong_line_ends_watcher() {
    let mut queue = queue_with(4, None);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let mut input = b"hello 0\n".to_vec();
    input.extend(std::iter::repeat(b'x').take(MAX_LINE_LEN + 10));
    input.extend_from_slice(b"\nhello 1\n");
    let summary = watcher.run(std::io::Cursor::new(input)).await;

    assert_eq!(summary.lines, 1);
    assert!(summary.line_too_long);
    assert!(!summary.partial_line_discarded);
    assert!(queue.expect(HELLO, &["0"]).await.is_ok());
    assert_eq!(queue.clear(), 0);
}

#[tokio::test]
async fn test_line_at_length_limit_is_accepted() {
    let mut queue = queue_with(4, None);
    let watcher = StreamWatcher::new(StreamSource::Stdout, hello_matcher(), queue.sender());

    let mut line = b"hello ".to_vec();
    line.extend(std::iter::repeat(b'y').take(MAX_LINE_LEN - line.len()));
    assert_eq!(line.len(), MAX_LINE_LEN);
    let mut input = line.clone();
    input.extend_from_slice(b"\nhello 1\n");
    let summary = watcher.run(std::io::Cursor::new(input)).await;

    assert_eq!(summary.lines, 2);
    assert!(!summary.line_too_long);
    let first = queue.skip().await.unwrap();
    assert_eq!(first.args[0].len(), MAX_LINE_LEN - "hello ".len());
    assert!(queue.expect(HELLO, &["1"]).await.is_ok());
}

#[tokio::test]
async fn test_line_firing_two_triggers_emits_both_in_registration_order() {
    let mut queue = queue_with(4, None);
    let matcher = TriggerMatcher::new();
    matcher.register(r"error: (\w+)", ERROR).unwrap();
    matcher.register(r"^hello (\w+)", HELLO).unwrap();
    let watcher = StreamWatcher::new(StreamSource::Stdout, matcher, queue.sender());

    let input: &'static [u8] = b"hello world error: disk\n";
    watcher.run(input).await;

    assert!(queue.expect(ERROR, &["disk"]).await.is_ok());
    assert!(queue.expect(HELLO, &["world"]).await.is_ok());
}

#[tokio::test]
async fn test_two_watchers_keep_per_stream_order() {
    let mut queue = queue_with(1, None);
    let matcher = TriggerMatcher::new();
    matcher.register(r"out (\d+)", HELLO).unwrap();
    matcher.register(r"err (\d+)", ERROR).unwrap();

    let stdout: String = (0..20).map(|i| format!("out {}\n", i)).collect();
    let stderr: String = (0..20).map(|i| format!("err {}\n", i)).collect();

    let out = StreamWatcher::new(StreamSource::Stdout, matcher.clone(), queue.sender())
        .spawn(std::io::Cursor::new(stdout.into_bytes()));
    let err = StreamWatcher::new(StreamSource::Stderr, matcher, queue.sender())
        .spawn(std::io::Cursor::new(stderr.into_bytes()));

    let mut next_out = 0;
    let mut next_err = 0;
    for _ in 0..40 {
        let event = queue.skip().await.unwrap();
        let index: usize = event.args[0].parse().unwrap();
        if event.kind == HELLO {
            assert_eq!(index, next_out);
            next_out += 1;
        } else {
            assert_eq!(event.kind, ERROR);
            assert_eq!(index, next_err);
            next_err += 1;
        }
    }

    assert_eq!(out.await.unwrap().events, 20);
    assert_eq!(err.await.unwrap().events, 20);
}

#[tokio::test]
async fn test_triggers_registered_late_apply_to_later_lines_only() {
    let mut queue = queue_with(4, None);
    let matcher = TriggerMatcher::new();
    matcher.register(r"line (\d+)", HELLO).unwrap();

    let (mut child_out, watched) = tokio::io::duplex(1024);
    let handle =
        StreamWatcher::new(StreamSource::Stdout, matcher.clone(), queue.sender()).spawn(watched);

    child_out.write_all(b"line 1 ready\n").await.unwrap();
    assert!(queue.expect(HELLO, &["1"]).await.is_ok());

    matcher.register("ready", READY).unwrap();
    child_out.write_all(b"line 2 ready\n").await.unwrap();
    drop(child_out);

    assert!(queue.expect(HELLO, &["2"]).await.is_ok());
    assert!(queue.expect(READY, &[]).await.is_ok());

    let summary = handle.await.unwrap();
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.events, 3);
}
