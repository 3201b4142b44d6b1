//! Job tracker — ground truth for active jobs and per-org statistics.
//!
//! Holds each org's active jobs keyed by job id, the org's counters, and
//! the wait/processing sample reservoirs. It has no lock of its own; the
//! scheduler owns it behind its state mutex.

use std::collections::HashMap;

use fairgrid_core::{JobTrackingInfo, OrgQueueStats};
use fairgrid_metrics::MetricsAggregator;
use tracing::{debug, warn};

/// Result of a `track` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracked {
    /// The org went from zero to one active job.
    pub org_activated: bool,
    /// The job id was already active for this org and its record was replaced.
    pub replaced: bool,
}

/// Result of a `release` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The job was active and has been released.
    Job { org_drained: bool },
    /// No active job matched; nothing changed.
    Unknown,
}

#[derive(Debug, Default)]
pub struct JobTracker {
    /// org_id → (job_id → tracking record). Orgs with no active jobs are
    /// removed from this map.
    active: HashMap<String, HashMap<String, JobTrackingInfo>>,
    /// Lazily created on first track; never evicted implicitly.
    stats: HashMap<String, OrgQueueStats>,
    metrics: MetricsAggregator,
    total_active: u32,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job as active for an org.
    pub fn track(
        &mut self,
        org_id: &str,
        job_id: &str,
        queued_at: Option<u64>,
        priority: i32,
        now_ms: u64,
    ) -> Tracked {
        if !self.stats.contains_key(org_id) {
            self.stats
                .insert(org_id.to_string(), OrgQueueStats::new(org_id, now_ms));
            self.metrics.register(org_id);
            debug!(%org_id, "org first seen");
        }

        let jobs = self.active.entry(org_id.to_string()).or_default();
        let org_activated = jobs.is_empty();
        let info = JobTrackingInfo {
            job_id: job_id.to_string(),
            org_id: org_id.to_string(),
            started_at: now_ms,
            queued_at,
            priority,
        };
        let replaced = jobs.insert(job_id.to_string(), info).is_some();
        let org_active = jobs.len() as u32;
        if replaced {
            warn!(%org_id, %job_id, "job already active; tracking record replaced");
        } else {
            self.total_active += 1;
        }

        let avg_wait = queued_at.map(|queued_at| {
            let wait_ms = now_ms.saturating_sub(queued_at);
            self.metrics.record_wait(org_id, wait_ms as f64)
        });

        if let Some(stats) = self.stats.get_mut(org_id) {
            stats.active_jobs = org_active;
            stats.last_activity_at = now_ms;
            if let Some(avg) = avg_wait {
                stats.avg_wait_time_ms = avg;
            }
        }

        debug!(%org_id, %job_id, org_active, total_active = self.total_active, "job tracked");
        Tracked {
            org_activated,
            replaced,
        }
    }

    /// Release an active job.
    ///
    /// A job id that is not active for the org is a no-op: counters,
    /// samples and timestamps are left untouched.
    pub fn release(&mut self, org_id: &str, job_id: &str, failed: bool, now_ms: u64) -> Released {
        let Some(jobs) = self.active.get_mut(org_id) else {
            debug!(%org_id, %job_id, "release for org with no active jobs ignored");
            return Released::Unknown;
        };
        let Some(info) = jobs.remove(job_id) else {
            debug!(%org_id, %job_id, "release for unknown job ignored");
            return Released::Unknown;
        };

        let org_active = jobs.len() as u32;
        let org_drained = jobs.is_empty();
        if org_drained {
            self.active.remove(org_id);
        }
        self.total_active = self.total_active.saturating_sub(1);

        let processing_ms = now_ms.saturating_sub(info.started_at);
        let avg_processing = self.metrics.record_processing(org_id, processing_ms as f64);

        if let Some(stats) = self.stats.get_mut(org_id) {
            stats.active_jobs = org_active;
            if failed {
                stats.failed_jobs += 1;
            } else {
                stats.completed_jobs += 1;
            }
            stats.total_processed += 1;
            stats.avg_processing_time_ms = avg_processing;
            stats.last_activity_at = now_ms;
        }

        debug!(
            %org_id,
            %job_id,
            failed,
            processing_ms,
            org_active,
            total_active = self.total_active,
            "job released"
        );
        Released::Job { org_drained }
    }

    pub fn active_job_count(&self, org_id: &str) -> u32 {
        self.active
            .get(org_id)
            .map(|jobs| jobs.len() as u32)
            .unwrap_or(0)
    }

    pub fn total_active(&self) -> u32 {
        self.total_active
    }

    pub fn org_stats(&self, org_id: &str) -> Option<&OrgQueueStats> {
        self.stats.get(org_id)
    }

    pub fn all_org_stats(&self) -> &HashMap<String, OrgQueueStats> {
        &self.stats
    }

    pub fn job_info(&self, org_id: &str, job_id: &str) -> Option<&JobTrackingInfo> {
        self.active.get(org_id)?.get(job_id)
    }

    /// Active jobs that started at or before `cutoff_ms`, oldest first.
    pub fn jobs_started_before(&self, cutoff_ms: u64) -> Vec<JobTrackingInfo> {
        let mut jobs: Vec<JobTrackingInfo> = self
            .active
            .values()
            .flat_map(|jobs| jobs.values())
            .filter(|info| info.started_at <= cutoff_ms)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.org_id.cmp(&b.org_id))
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    /// Drop stats and samples of orgs with no active jobs whose last
    /// activity is at or before `cutoff_ms`. Returns the pruned org ids.
    pub fn prune_idle(&mut self, cutoff_ms: u64) -> Vec<String> {
        let idle: Vec<String> = self
            .stats
            .values()
            .filter(|s| s.active_jobs == 0 && s.last_activity_at <= cutoff_ms)
            .map(|s| s.org_id.clone())
            .collect();
        for org_id in &idle {
            self.stats.remove(org_id);
            self.metrics.remove(org_id);
        }
        idle
    }

    pub fn overall_avg_wait_ms(&self) -> f64 {
        self.metrics.overall_avg_wait_ms()
    }
}
