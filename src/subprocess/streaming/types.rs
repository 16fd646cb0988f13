//! Core types for stream watching

use std::fmt;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => write!(f, "stdout"),
            StreamSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// What a stream watcher saw before its stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub source: StreamSource,
    /// Complete lines scanned
    pub lines: usize,
    /// Events accepted by the queue
    pub events: usize,
    /// Matched events that never reached the queue, either timed out or
    /// matched after the queue closed
    pub dropped: usize,
    /// The stream ended in the middle of a line, which was discarded
    pub partial_line_discarded: bool,
    /// Reading stopped at a line longer than the watcher accepts
    pub line_too_long: bool,
}

impl WatchSummary {
    pub fn new(source: StreamSource) -> Self {
        Self {
            source,
            lines: 0,
            events: 0,
            dropped: 0,
            partial_line_discarded: false,
            line_too_long: false,
        }
    }
}
