//! Line-by-line observation of subprocess output
//!
//! A [`StreamWatcher`] reads one output stream of the driven process, echoes
//! each complete line when verbose, runs it through the shared
//! [`TriggerMatcher`](crate::trigger::TriggerMatcher) and hands the resulting
//! events to the [`EventQueue`](crate::events::EventQueue). One watcher runs
//! per stream; events keep their line order within a stream, but the
//! interleaving of stdout and stderr events is whatever the scheduler produces.

pub mod types;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use types::{StreamSource, WatchSummary};
pub use watcher::{StreamWatcher, MAX_LINE_LEN};
