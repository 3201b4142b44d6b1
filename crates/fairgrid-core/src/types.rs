//! Shared types used across FairGrid crates.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-org queue statistics.
///
/// `active_jobs` always equals the size of the org's active job set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgQueueStats {
    pub org_id: String,
    pub active_jobs: u32,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub total_processed: u64,
    pub avg_wait_time_ms: f64,
    pub avg_processing_time_ms: f64,
    /// Epoch milliseconds of the last track or release for this org.
    pub last_activity_at: u64,
}

impl OrgQueueStats {
    pub fn new(org_id: &str, now_ms: u64) -> Self {
        Self {
            org_id: org_id.to_string(),
            active_jobs: 0,
            completed_jobs: 0,
            failed_jobs: 0,
            total_processed: 0,
            avg_wait_time_ms: 0.0,
            avg_processing_time_ms: 0.0,
            last_activity_at: now_ms,
        }
    }
}

/// Tracking record for one active job. Lives from `track_job` until the
/// matching `release_job`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTrackingInfo {
    pub job_id: String,
    pub org_id: String,
    /// Epoch milliseconds at which the job became active.
    pub started_at: u64,
    /// Epoch milliseconds at which the job was enqueued, if known.
    pub queued_at: Option<u64>,
    /// Recorded only. Selection order does not depend on it.
    pub priority: i32,
}

/// Point-in-time snapshot of scheduler state, pushed to metrics listeners
/// and returned by `get_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    pub total_active_jobs: u32,
    /// Number of orgs currently holding at least one active job.
    pub active_orgs: usize,
    pub org_stats: HashMap<String, OrgQueueStats>,
    /// Sample-weighted mean over every retained wait sample of every org.
    pub overall_avg_wait_time_ms: f64,
}

/// How jobs are spread over physical queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationStrategy {
    /// One queue for all orgs; fairness comes from the scheduler.
    Shared,
    /// One queue per org.
    PerOrg,
    /// Two lanes, `high` and `normal`, split on job priority.
    PriorityLanes,
}

impl IsolationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationStrategy::Shared => "shared",
            IsolationStrategy::PerOrg => "per_org",
            IsolationStrategy::PriorityLanes => "priority_lanes",
        }
    }
}

impl fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(IsolationStrategy::Shared),
            "per_org" => Ok(IsolationStrategy::PerOrg),
            "priority_lanes" => Ok(IsolationStrategy::PriorityLanes),
            other => Err(ConfigError::Invalid(format!(
                "unknown isolation strategy: {other}"
            ))),
        }
    }
}
