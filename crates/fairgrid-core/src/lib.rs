//! fairgrid-core — shared types and configuration for the FairGrid
//! tenant-fair job scheduler.

pub mod config;
pub mod error;
pub mod types;

pub use config::{FairSchedulerConfig, SAMPLE_CAPACITY};
pub use error::ConfigError;
pub use types::*;
