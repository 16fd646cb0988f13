//! Pattern rules that turn output lines into events

use regex::Regex;
use std::sync::{Arc, RwLock};

use crate::events::{Event, EventKind};

/// Registration failed because the pattern is not a valid regular expression
#[derive(Debug, thiserror::Error)]
#[error("Invalid pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// A compiled pattern and the kind of event it fires
#[derive(Debug, Clone)]
pub struct Trigger {
    pattern: Regex,
    kind: EventKind,
}

impl Trigger {
    pub fn new(pattern: &str, kind: EventKind) -> Result<Self, PatternError> {
        let pattern = Regex::new(pattern).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern, kind })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Match anywhere in `line`, returning the capture groups.
    ///
    /// Groups that did not take part in the match come back as empty strings
    /// so positions stay aligned with the pattern's group numbers.
    pub fn fire(&self, line: &str) -> Option<Event> {
        let captures = self.pattern.captures(line)?;
        let args = captures
            .iter()
            .skip(1) // Skip the full match
            .map(|m| m.map(|s| s.as_str().to_string()).unwrap_or_default())
            .collect();
        Some(Event::new(self.kind, args))
    }
}

/// Ordered set of triggers shared between a process and its stream watchers.
///
/// Cloning shares the same rule list. Rules registered while watchers are
/// running apply to lines scanned from then on; earlier lines are not
/// re-examined.
#[derive(Debug, Clone, Default)]
pub struct TriggerMatcher {
    triggers: Arc<RwLock<Vec<Trigger>>>,
}

impl TriggerMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it to the rule list
    pub fn register(&self, pattern: &str, kind: EventKind) -> Result<(), PatternError> {
        let trigger = Trigger::new(pattern, kind)?;
        tracing::debug!(
            "Registered trigger {:?} -> event {}",
            trigger.pattern(),
            trigger.kind()
        );
        self.triggers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(trigger);
        Ok(())
    }

    /// Evaluate every trigger against `line`, in registration order.
    ///
    /// Each trigger that matches yields one event, so a single line can
    /// produce several.
    pub fn match_line(&self, line: &str) -> Vec<Event> {
        self.triggers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter_map(|trigger| trigger.fire(line))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.triggers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
