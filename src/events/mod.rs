//! Events produced from process output
//!
//! An [`Event`] is created by a stream watcher the moment a trigger matches a
//! line. It carries the trigger's [`EventKind`] and the pattern's capture
//! groups, in left-to-right order, and is delivered through an
//! [`EventQueue`].

pub mod queue;

pub use queue::{EventQueue, EventSender, QueueError};

use std::fmt;

/// Wildcard argument.
///
/// When the first expected argument is `ANY`, [`EventQueue::expect`] compares
/// the event kind only and ignores every argument.
pub const ANY: &str = "\u{0}autotest:any\u{0}";

/// Identifier chosen by the test author for a class of events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(pub u32);

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EventKind {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A matched line, reduced to its kind and captured arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub args: Vec<String>,
}

impl Event {
    pub fn new(kind: EventKind, args: Vec<String>) -> Self {
        Self { kind, args }
    }

    /// Check this event against an expected kind and argument list.
    ///
    /// A leading [`ANY`] short-circuits the argument comparison.
    pub fn matches(&self, kind: EventKind, args: &[&str]) -> bool {
        if self.kind != kind {
            return false;
        }
        if args.first() == Some(&ANY) {
            return true;
        }
        self.args.len() == args.len() && self.args.iter().zip(args).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, [", self.kind)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if arg == ANY {
                write!(f, "*")?;
            } else {
                write!(f, "{:?}", arg)?;
            }
        }
        write!(f, "]}}")
    }
}
