//! # Autotest
//!
//! Drive an external process from a test, turn the lines it prints into
//! typed events, and assert on the order those events arrive in.
//!
//! ## Usage
//!
//! ```no_run
//! use autotest::{EventKind, EventQueue, Process};
//!
//! const HELLO: EventKind = EventKind(0);
//!
//! # async fn run() -> autotest::Result<()> {
//! let mut queue = EventQueue::new();
//! let mut process = Process::new("sh", ["-c", "echo hello 0; echo hello 1"]);
//! process.add_trigger("hello (.*)", HELLO)?;
//! process.start(&queue)?;
//!
//! queue.expect(HELLO, &["0"]).await?;
//! queue.skip().await?;
//! process.wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `config` - Harness settings from defaults, TOML and `AUTOTEST_*` variables
//! - `error` - Crate-wide error type
//! - `events` - Events and the queue tests consume them from
//! - `logging` - Tracing subscriber setup for tests
//! - `subprocess` - Process controller and stream watchers
//! - `trigger` - Regex rules that turn output lines into events
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod subprocess;
pub mod trigger;

pub use config::{ConfigError, HarnessConfig, QueueConfig};
pub use error::{HarnessError, Result};
pub use events::{Event, EventKind, EventQueue, QueueError, ANY};
pub use subprocess::{Process, ProcessError};
pub use trigger::{PatternError, TriggerMatcher};
