//! Scheduler error types.
//!
//! Only construction can fail. Runtime operations report "no" through
//! `bool` and `Option` returns instead of errors.

use thiserror::Error;

use fairgrid_core::ConfigError;

/// Errors that can occur while building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
