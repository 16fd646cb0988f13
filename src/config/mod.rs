//! Harness configuration
//!
//! Values are layered, lowest priority first:
//!
//! 1. Hardcoded defaults
//! 2. A TOML file passed to [`HarnessConfig::load`]
//! 3. Environment variables (`AUTOTEST_*` prefix)
//!
//! ```toml
//! verbose = true
//! working_dir = "fixtures/server"
//! log_level = "debug"
//!
//! [queue]
//! capacity = 1
//! send_timeout = "5s"
//! ```

mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Valid log levels for configuration validation.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub const ENV_VERBOSE: &str = "AUTOTEST_VERBOSE";
pub const ENV_WORKING_DIR: &str = "AUTOTEST_WORKING_DIR";
pub const ENV_LOG_LEVEL: &str = "AUTOTEST_LOG_LEVEL";
pub const ENV_QUEUE_CAPACITY: &str = "AUTOTEST_QUEUE_CAPACITY";
pub const ENV_SEND_TIMEOUT: &str = "AUTOTEST_SEND_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Config validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },
}

/// Settings consumed by the process controller and the event queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Echo every line of the child's stdout/stderr to our own stdout/stderr.
    #[serde(default)]
    pub verbose: bool,

    /// Directory the child process is started in.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub queue: QueueConfig,
}

/// Event queue depth and producer backpressure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of events that may wait unconsumed before producers block.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// How long a producer waits for room before dropping an event.
    /// `None` waits forever.
    #[serde(default, with = "humantime_serde")]
    pub send_timeout: Option<Duration>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_capacity() -> usize {
    1
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            working_dir: None,
            log_level: default_log_level(),
            queue: QueueConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            send_timeout: None,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `AUTOTEST_*` overrides from the process environment
    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(verbose) = lookup(ENV_VERBOSE) {
            match parse_flag(&verbose) {
                Some(value) => self.verbose = value,
                None => tracing::warn!("Ignoring {}={:?}: not a boolean", ENV_VERBOSE, verbose),
            }
        }

        if let Some(dir) = lookup(ENV_WORKING_DIR) {
            self.working_dir = Some(PathBuf::from(dir));
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.to_lowercase();
        }

        if let Some(capacity) = lookup(ENV_QUEUE_CAPACITY) {
            match capacity.parse::<usize>() {
                Ok(value) => self.queue.capacity = value,
                Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ENV_QUEUE_CAPACITY, capacity, e),
            }
        }

        if let Some(timeout) = lookup(ENV_SEND_TIMEOUT) {
            if matches!(timeout.as_str(), "" | "none" | "off") {
                self.queue.send_timeout = None;
            } else {
                match humantime_serde::re::humantime::parse_duration(&timeout) {
                    Ok(value) => self.queue.send_timeout = Some(value),
                    Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ENV_SEND_TIMEOUT, timeout, e),
                }
            }
        }
    }

    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut messages = Vec::new();

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            messages.push(format!(
                "log_level '{}' must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if self.queue.capacity == 0 {
            messages.push("queue.capacity must be at least 1".to_string());
        }

        if self.queue.send_timeout == Some(Duration::ZERO) {
            messages.push("queue.send_timeout must be greater than zero".to_string());
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { messages })
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
