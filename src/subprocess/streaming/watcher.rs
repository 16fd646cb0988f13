//! Stream watcher: output lines in, events out

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

use super::types::{StreamSource, WatchSummary};
use crate::events::queue::SendError;
use crate::events::EventSender;
use crate::trigger::TriggerMatcher;

/// Longest line a watcher accepts, terminator excluded
pub const MAX_LINE_LEN: usize = 64 * 1024;

type EchoTarget = Box<dyn AsyncWrite + Send + Unpin>;

/// Scans one output stream and forwards trigger matches to the event queue
pub struct StreamWatcher {
    source: StreamSource,
    matcher: TriggerMatcher,
    sender: EventSender,
    echo: Option<EchoTarget>,
}

impl StreamWatcher {
    pub fn new(source: StreamSource, matcher: TriggerMatcher, sender: EventSender) -> Self {
        Self {
            source,
            matcher,
            sender,
            echo: None,
        }
    }

    /// Echo every scanned line to `target` (verbose mode)
    pub fn with_echo<W>(mut self, target: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.echo = Some(Box::new(target));
        self
    }

    /// Run [`StreamWatcher::run`] as a background task
    pub fn spawn<R>(self, stream: R) -> JoinHandle<WatchSummary>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(self.run(stream))
    }

    /// Watch `stream` until it ends.
    ///
    /// Every event send waits for room in the queue, so a producer never runs
    /// further ahead of the consumer than the queue depth allows. Read errors
    /// and lines longer than [`MAX_LINE_LEN`] end the watcher like
    /// end-of-stream does. An incomplete last line is dropped.
    ///
    /// Once the queue is closed, lines are still read, echoed and matched so
    /// the child never stalls on a full pipe; their events are counted as
    /// dropped.
    pub async fn run<R>(mut self, stream: R) -> WatchSummary
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut summary = WatchSummary::new(self.source);
        let mut forwarding = true;

        loop {
            buf.clear();
            let mut limited = (&mut reader).take(MAX_LINE_LEN as u64 + 1);
            match limited.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Stopped reading {}: {}", self.source, e);
                    break;
                }
            }

            if buf.last() != Some(&b'\n') {
                if buf.len() > MAX_LINE_LEN {
                    tracing::debug!(
                        "Stopped reading {}: line exceeds {} bytes",
                        self.source,
                        MAX_LINE_LEN
                    );
                    summary.line_too_long = true;
                } else {
                    tracing::trace!(
                        "Discarding incomplete trailing line on {}: {:?}",
                        self.source,
                        String::from_utf8_lossy(&buf)
                    );
                    summary.partial_line_discarded = true;
                }
                break;
            }

            let line = normalize_line(&buf);
            summary.lines += 1;
            tracing::trace!("[{}] {}", self.source, line);

            self.echo_line(&line).await;

            if forwarding && self.sender.is_closed() {
                tracing::debug!("Event queue closed, {} stops forwarding", self.source);
                forwarding = false;
            }

            let events = self.matcher.match_line(&line);
            if !forwarding {
                summary.dropped += events.len();
                continue;
            }

            let mut events = events.into_iter();
            while let Some(event) = events.next() {
                match self.sender.send(event).await {
                    Ok(()) => summary.events += 1,
                    Err(SendError::Timeout { event, timeout }) => {
                        tracing::warn!(
                            "Dropping event {} from {}: not consumed within {:?}",
                            event,
                            self.source,
                            timeout
                        );
                        summary.dropped += 1;
                    }
                    Err(SendError::Closed(event)) => {
                        tracing::debug!(
                            "Event queue closed, {} stops forwarding (first undelivered: {})",
                            self.source,
                            event
                        );
                        summary.dropped += 1 + events.len();
                        forwarding = false;
                        break;
                    }
                }
            }
        }

        tracing::debug!(
            "{} watcher finished: {} lines, {} events, {} dropped",
            self.source,
            summary.lines,
            summary.events,
            summary.dropped
        );
        summary
    }

    async fn echo_line(&mut self, line: &str) {
        let Some(target) = self.echo.as_mut() else {
            return;
        };

        let result: std::io::Result<()> = async {
            target.write_all(line.as_bytes()).await?;
            target.write_all(b"\n").await?;
            target.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::debug!("Echo of {} disabled: {}", self.source, e);
            self.echo = None;
        }
    }
}

/// Decode a raw line and strip its terminator
fn normalize_line(raw: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(raw).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line(b"hello\n"), "hello");
        assert_eq!(normalize_line(b"hello\r\n"), "hello");
        assert_eq!(normalize_line(b"\n"), "");
        assert_eq!(normalize_line(b"a\rb\n"), "a\rb");
    }

    #[test]
    fn test_normalize_line_replaces_invalid_utf8() {
        assert_eq!(normalize_line(b"ok \xff\n"), "ok \u{fffd}");
    }
}
