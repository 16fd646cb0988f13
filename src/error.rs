use thiserror::Error;

use crate::config::ConfigError;
use crate::events::QueueError;
use crate::subprocess::ProcessError;
use crate::trigger::PatternError;

/// Any failure a harness-driven test can run into
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
