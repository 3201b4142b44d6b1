//! Fair scheduler configuration.
//!
//! Field names on the wire are camelCase (`maxConcurrentPerOrg`, ...) so
//! that existing scheduler configs load unchanged. A config file may hold
//! the fields at the top level or inside a `[scheduler]` table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Number of samples each per-org reservoir retains.
///
/// Retention is count-based only: a sample stays until 100 newer samples
/// for the same org arrive, regardless of its age.
pub const SAMPLE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FairSchedulerConfig {
    /// Per-org active job ceiling.
    pub max_concurrent_per_org: u32,
    /// Global active job ceiling across all orgs.
    pub max_total_concurrent: u32,
    /// Polling cadence hint for worker loops. Not enforced by the scheduler.
    pub round_robin_interval_ms: u64,
    /// Largest share (0-100) of `max_total_concurrent` a single org may hold.
    pub max_org_capacity_percent: u32,
    /// Accepted but inert: selection never consults job priority.
    pub enable_priority: bool,
    /// Kept for wire compatibility. Sample retention is the fixed-size
    /// reservoir of [`SAMPLE_CAPACITY`] entries, not a time window, and
    /// this value has no effect on it.
    pub metrics_window_ms: u64,
}

impl Default for FairSchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_org: 5,
            max_total_concurrent: 20,
            round_robin_interval_ms: 100,
            max_org_capacity_percent: 50,
            enable_priority: false,
            metrics_window_ms: 60_000,
        }
    }
}

impl FairSchedulerConfig {
    /// Load a config from a TOML file.
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a config from a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut doc: toml::Table = toml::from_str(content)?;
        let config: FairSchedulerConfig = match doc.remove("scheduler") {
            Some(section @ toml::Value::Table(_)) => section.try_into()?,
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "`scheduler` must be a table".to_string(),
                ));
            }
            None => toml::Value::Table(doc).try_into()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Render the config as a `[scheduler]` TOML document.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let mut doc = toml::Table::new();
        doc.insert(
            "scheduler".to_string(),
            toml::Value::try_from(self)?,
        );
        Ok(toml::to_string_pretty(&doc)?)
    }

    /// Reject configurations the scheduler cannot operate with.
    ///
    /// A capacity percent that floors the per-org share to zero is legal
    /// but makes every org inadmissible, so it is only warned about.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_per_org == 0 {
            return Err(ConfigError::Invalid(
                "maxConcurrentPerOrg must be greater than 0".to_string(),
            ));
        }
        if self.max_total_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "maxTotalConcurrent must be greater than 0".to_string(),
            ));
        }
        if self.max_org_capacity_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "maxOrgCapacityPercent must be within 0..=100, got {}",
                self.max_org_capacity_percent
            )));
        }
        if self.share_cap() == 0 {
            warn!(
                max_total = self.max_total_concurrent,
                percent = self.max_org_capacity_percent,
                "org share cap floors to zero; no org will ever be admitted"
            );
        }
        Ok(())
    }

    /// Maximum active jobs any single org may hold by share:
    /// `floor(max_total_concurrent * max_org_capacity_percent / 100)`.
    pub fn share_cap(&self) -> u32 {
        (u64::from(self.max_total_concurrent) * u64::from(self.max_org_capacity_percent) / 100)
            as u32
    }
}
