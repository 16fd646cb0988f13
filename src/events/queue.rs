//! Ordered handoff of events from stream watchers to test code
//!
//! [`EventQueue`] is the single consumption point. Producers hold cloned
//! [`EventSender`] handles; every successful send is paired with exactly one
//! receive, in the order the sends completed. Consumer operations take
//! `&mut self`, so only one caller can be waiting on the queue at a time.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::{Event, EventKind};
use crate::config::QueueConfig;

/// Errors surfaced to the consumer of an [`EventQueue`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("The queue has been closed")]
    Closed,

    #[error("Unexpected event: received {received} - expected {expected}")]
    UnexpectedEvent { expected: Event, received: Event },
}

/// Why a producer could not hand over an event
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("event queue is closed, {0} was not delivered")]
    Closed(Event),

    #[error("no consumer took {event} within {timeout:?}")]
    Timeout { event: Event, timeout: Duration },
}

impl SendError {
    /// The event that failed to be delivered
    pub fn into_event(self) -> Event {
        match self {
            SendError::Closed(event) => event,
            SendError::Timeout { event, .. } => event,
        }
    }
}

/// Producer half of an [`EventQueue`]
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    send_timeout: Option<Duration>,
}

impl EventSender {
    /// Hand an event to the queue, waiting while the queue is full.
    ///
    /// Without a send timeout this waits for as long as the consumer takes.
    pub async fn send(&self, event: Event) -> Result<(), SendError> {
        let permit = match self.send_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.tx.reserve()).await {
                Ok(permit) => permit,
                Err(_) => return Err(SendError::Timeout { event, timeout }),
            },
            None => self.tx.reserve().await,
        };

        match permit {
            Ok(permit) => {
                permit.send(event);
                Ok(())
            }
            Err(_) => Err(SendError::Closed(event)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the event pipeline
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    send_timeout: Option<Duration>,
}

impl EventQueue {
    /// Create a queue with the default configuration (depth 1, no send timeout)
    pub fn new() -> Self {
        Self::with_config(&QueueConfig::default())
    }

    pub fn with_config(config: &QueueConfig) -> Self {
        // tokio channels need at least one slot
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        Self {
            rx,
            tx,
            send_timeout: config.send_timeout,
        }
    }

    /// Get a producer handle for this queue
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            send_timeout: self.send_timeout,
        }
    }

    /// Wait for the next event and check that it is the expected one.
    ///
    /// Returns the event actually received, which is mostly useful when the
    /// expectation used [`ANY`](super::ANY).
    pub async fn expect(&mut self, kind: EventKind, args: &[&str]) -> Result<Event, QueueError> {
        let received = self.rx.recv().await.ok_or(QueueError::Closed)?;

        if !received.matches(kind, args) {
            tracing::debug!("Expected {:?} {:?}, received {}", kind, args, received);
            return Err(QueueError::UnexpectedEvent {
                expected: Event::new(kind, args.iter().map(|s| s.to_string()).collect()),
                received,
            });
        }

        tracing::trace!("Expectation met: {}", received);
        Ok(received)
    }

    /// Wait for the next event and return it whatever it is
    pub async fn skip(&mut self) -> Result<Event, QueueError> {
        let event = self.rx.recv().await.ok_or(QueueError::Closed)?;
        tracing::trace!("Skipped {}", event);
        Ok(event)
    }

    /// Discard every event that is ready right now.
    ///
    /// Never waits for a producer. Returns the number of events discarded.
    pub fn clear(&mut self) -> usize {
        let mut discarded = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    tracing::trace!("Cleared {}", event);
                    discarded += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if discarded > 0 {
            tracing::debug!("Cleared {} pending event(s)", discarded);
        }
        discarded
    }

    /// Stop accepting events.
    ///
    /// Events already buffered can still be received; after that every
    /// `expect`/`skip` returns [`QueueError::Closed`] immediately.
    pub fn close(&mut self) {
        tracing::debug!("Closing event queue");
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Number of events buffered and ready to be received
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
