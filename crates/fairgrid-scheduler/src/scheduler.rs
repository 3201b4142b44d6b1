//! Fair scheduler — per-org admission, job tracking and org rotation.
//!
//! The `FairScheduler` is shared by every worker that pulls jobs:
//! - `can_process_job` before dequeuing for an org
//! - `track_job` when a job starts, `release_job` when it ends
//! - `get_next_org` to pick which org a generic worker serves next
//!
//! # Concurrency
//!
//! All mutable state (active jobs, stats, reservoirs, rotation and its
//! cursor) sits behind one `std::sync::Mutex`, taken once per operation.
//! Metrics listeners run after the lock is released, on the caller's
//! thread, so they may call back into the scheduler. Snapshots from two
//! concurrent mutations can therefore reach listeners in either order.
//!
//! `can_process_job` followed by `track_job` is not atomic: two callers
//! can both see `true` and both track, briefly exceeding a limit. Use
//! `try_track_job` to check and register under one lock acquisition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fairgrid_core::{FairSchedulerConfig, JobTrackingInfo, OrgQueueStats, QueueMetrics};
use fairgrid_metrics::{MetricsEmitter, MetricsSubscription};
use tracing::{debug, info};

use crate::admission::{self, Admission};
use crate::clock::{Clock, SystemClock};
use crate::error::SchedulerResult;
use crate::rotation::RotationList;
use crate::tracker::{JobTracker, Released};

/// Everything guarded by the scheduler mutex.
#[derive(Debug, Default)]
struct SchedulerState {
    tracker: JobTracker,
    rotation: RotationList,
}

impl SchedulerState {
    fn admission(&self, config: &FairSchedulerConfig, org_id: &str) -> Admission {
        admission::evaluate(
            config,
            self.tracker.active_job_count(org_id),
            self.tracker.total_active(),
        )
    }

    fn track(
        &mut self,
        org_id: &str,
        job_id: &str,
        queued_at: Option<u64>,
        priority: i32,
        now_ms: u64,
    ) {
        let tracked = self.tracker.track(org_id, job_id, queued_at, priority, now_ms);
        if tracked.org_activated {
            self.rotation.insert(org_id);
        }
    }

    fn snapshot(&self) -> QueueMetrics {
        QueueMetrics {
            total_active_jobs: self.tracker.total_active(),
            active_orgs: self.rotation.len(),
            org_stats: self.tracker.all_org_stats().clone(),
            overall_avg_wait_time_ms: self.tracker.overall_avg_wait_ms(),
        }
    }
}

pub struct FairScheduler {
    config: FairSchedulerConfig,
    state: Mutex<SchedulerState>,
    emitter: MetricsEmitter,
    clock: Arc<dyn Clock>,
}

impl FairScheduler {
    /// Create a scheduler. Fails only if the config does not validate.
    pub fn new(config: FairSchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        info!(
            max_per_org = config.max_concurrent_per_org,
            max_total = config.max_total_concurrent,
            max_org_percent = config.max_org_capacity_percent,
            share_cap = config.share_cap(),
            "fair scheduler initialized"
        );
        Ok(Self {
            config,
            state: Mutex::new(SchedulerState::default()),
            emitter: MetricsEmitter::new(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used for job timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FairSchedulerConfig {
        &self.config
    }

    // ── Admission ───────────────────────────────────────────────────

    /// Whether `org_id` may start another job now. Reserves nothing.
    pub fn can_process_job(&self, org_id: &str) -> bool {
        self.admission(org_id).is_admitted()
    }

    /// Like `can_process_job`, but reports which limit denied the org.
    pub fn admission(&self, org_id: &str) -> Admission {
        self.lock().admission(&self.config, org_id)
    }

    // ── Tracking ────────────────────────────────────────────────────

    /// Register a job as active for an org.
    ///
    /// When `queued_at` (epoch ms) is given, the wait time until now is
    /// recorded. `priority` is stored on the tracking record only.
    pub fn track_job(&self, org_id: &str, job_id: &str, queued_at: Option<u64>, priority: i32) {
        let now = self.clock.now_ms();
        let snapshot = {
            let mut state = self.lock();
            state.track(org_id, job_id, queued_at, priority, now);
            state.snapshot()
        };
        self.emitter.emit(&snapshot);
    }

    /// Check admission and track the job under a single lock acquisition.
    ///
    /// Returns `false` (and tracks nothing) if the org is not admissible.
    pub fn try_track_job(
        &self,
        org_id: &str,
        job_id: &str,
        queued_at: Option<u64>,
        priority: i32,
    ) -> bool {
        let now = self.clock.now_ms();
        let snapshot = {
            let mut state = self.lock();
            let admission = state.admission(&self.config, org_id);
            if !admission.is_admitted() {
                debug!(%org_id, %job_id, ?admission, "job not admitted");
                return false;
            }
            state.track(org_id, job_id, queued_at, priority, now);
            state.snapshot()
        };
        self.emitter.emit(&snapshot);
        true
    }

    /// Release a job. Unknown orgs or job ids are ignored.
    pub fn release_job(&self, org_id: &str, job_id: &str, failed: bool) {
        let now = self.clock.now_ms();
        let snapshot = {
            let mut state = self.lock();
            if let Released::Job { org_drained: true } =
                state.tracker.release(org_id, job_id, failed, now)
            {
                state.rotation.remove(org_id);
            }
            state.snapshot()
        };
        self.emitter.emit(&snapshot);
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Next org in rotation that is currently admissible.
    ///
    /// Scans at most one full cycle from the persisted cursor. Order is
    /// strictly registration order; job priority is not consulted.
    pub fn get_next_org(&self) -> Option<String> {
        let mut state = self.lock();
        let SchedulerState { tracker, rotation } = &mut *state;
        let total_active = tracker.total_active();
        rotation.next_where(|org_id| {
            admission::evaluate(&self.config, tracker.active_job_count(org_id), total_active)
                .is_admitted()
        })
    }

    /// Orgs currently in rotation, in rotation order.
    pub fn active_orgs(&self) -> Vec<String> {
        self.lock().rotation.orgs().to_vec()
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn get_active_job_count(&self, org_id: &str) -> u32 {
        self.lock().tracker.active_job_count(org_id)
    }

    pub fn get_total_active_jobs(&self) -> u32 {
        self.lock().tracker.total_active()
    }

    pub fn get_org_stats(&self, org_id: &str) -> Option<OrgQueueStats> {
        self.lock().tracker.org_stats(org_id).cloned()
    }

    pub fn get_all_org_stats(&self) -> HashMap<String, OrgQueueStats> {
        self.lock().tracker.all_org_stats().clone()
    }

    pub fn get_job_info(&self, org_id: &str, job_id: &str) -> Option<JobTrackingInfo> {
        self.lock().tracker.job_info(org_id, job_id).cloned()
    }

    /// Snapshot of the whole scheduler.
    pub fn get_metrics(&self) -> QueueMetrics {
        self.lock().snapshot()
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Subscribe to the snapshot emitted after every track and release.
    pub fn on_metrics<F>(&self, listener: F) -> MetricsSubscription
    where
        F: Fn(&QueueMetrics) + Send + Sync + 'static,
    {
        self.emitter.subscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.emitter.listener_count()
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Active jobs that have been running for at least `older_than`.
    ///
    /// Read-only: a job that is never released keeps its slot until
    /// someone calls `release_job` for it.
    pub fn stale_jobs(&self, older_than: Duration) -> Vec<JobTrackingInfo> {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(older_than.as_millis() as u64);
        self.lock().tracker.jobs_started_before(cutoff)
    }

    /// Forget stats of orgs idle for at least `idle_for`.
    ///
    /// Stats are otherwise kept forever. Only orgs with no active jobs are
    /// pruned. Returns the number of orgs removed.
    pub fn prune_idle_orgs(&self, idle_for: Duration) -> usize {
        let cutoff = self
            .clock
            .now_ms()
            .saturating_sub(idle_for.as_millis() as u64);
        let (pruned, snapshot) = {
            let mut state = self.lock();
            let pruned = state.tracker.prune_idle(cutoff);
            (pruned, state.snapshot())
        };
        if !pruned.is_empty() {
            info!(count = pruned.len(), orgs = ?pruned, "pruned idle org stats");
            self.emitter.emit(&snapshot);
        }
        pruned.len()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler(per_org: u32, total: u32, percent: u32) -> FairScheduler {
        FairScheduler::new(FairSchedulerConfig {
            max_concurrent_per_org: per_org,
            max_total_concurrent: total,
            max_org_capacity_percent: percent,
            ..FairSchedulerConfig::default()
        })
        .unwrap()
    }

    fn with_manual_clock(s: FairScheduler, start: u64) -> (FairScheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (s.with_clock(clock.clone()), clock)
    }

    #[test]
    fn rejects_invalid_config() {
        let result = FairScheduler::new(FairSchedulerConfig {
            max_total_concurrent: 0,
            ..FairSchedulerConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn unknown_org_queries() {
        let s = scheduler(2, 10, 100);
        assert_eq!(s.get_active_job_count("nope"), 0);
        assert!(s.get_org_stats("nope").is_none());
        assert!(s.can_process_job("nope"));
        assert_eq!(s.get_next_org(), None);
    }

    #[test]
    fn share_limit_example() {
        let s = scheduler(2, 3, 50);

        s.track_job("A", "j1", None, 0);
        assert!(!s.can_process_job("A"));
        assert!(matches!(s.admission("A"), Admission::ShareLimit { .. }));

        s.track_job("B", "j2", None, 0);
        s.track_job("B", "j3", None, 0);
        assert_eq!(s.get_total_active_jobs(), 3);
        assert!(!s.can_process_job("A"));
        assert!(!s.can_process_job("B"));
        assert!(!s.can_process_job("C"));
        assert_eq!(s.get_next_org(), None);
    }

    #[test]
    fn drained_org_leaves_rotation() {
        let s = scheduler(5, 10, 100);
        s.track_job("A", "j1", None, 0);
        s.track_job("B", "j2", None, 0);
        assert_eq!(s.active_orgs(), vec!["A", "B"]);

        s.release_job("A", "j1", false);
        assert_eq!(s.active_orgs(), vec!["B"]);
        assert_eq!(s.get_metrics().active_orgs, 1);
        // Stats survive the org going idle.
        assert_eq!(s.get_org_stats("A").unwrap().completed_jobs, 1);
    }

    #[test]
    fn try_track_respects_limits() {
        let s = scheduler(1, 10, 100);
        assert!(s.try_track_job("A", "j1", None, 0));
        assert!(!s.try_track_job("A", "j2", None, 0));
        assert_eq!(s.get_active_job_count("A"), 1);
        assert!(s.get_job_info("A", "j2").is_none());
    }

    #[test]
    fn denied_try_track_emits_nothing() {
        let s = scheduler(1, 10, 100);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = s.on_metrics(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(s.try_track_job("A", "j1", None, 0));
        assert!(!s.try_track_job("A", "j2", None, 0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_and_processing_times_use_clock() {
        let (s, clock) = with_manual_clock(scheduler(5, 10, 100), 10_000);

        s.track_job("A", "j1", Some(9_000), 3);
        let info = s.get_job_info("A", "j1").unwrap();
        assert_eq!(info.started_at, 10_000);
        assert_eq!(info.queued_at, Some(9_000));
        assert_eq!(info.priority, 3);

        clock.advance(400);
        s.release_job("A", "j1", true);

        let stats = s.get_org_stats("A").unwrap();
        assert_eq!(stats.avg_wait_time_ms, 1_000.0);
        assert_eq!(stats.avg_processing_time_ms, 400.0);
        assert_eq!(stats.failed_jobs, 1);
        assert_eq!(stats.last_activity_at, 10_400);
        assert_eq!(s.get_metrics().overall_avg_wait_time_ms, 1_000.0);
    }

    #[test]
    fn listener_can_query_scheduler() {
        let s = Arc::new(scheduler(5, 10, 100));
        let seen = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&s);
        let sink = seen.clone();
        let _sub = s.on_metrics(move |m| {
            if let Some(s) = weak.upgrade() {
                assert_eq!(s.get_total_active_jobs(), m.total_active_jobs);
                sink.fetch_add(1, Ordering::SeqCst);
            }
        });

        s.track_job("A", "j1", None, 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let s = scheduler(5, 10, 100);
        s.track_job("A", "j1", None, 0);
        let mut metrics = s.get_metrics();
        metrics.org_stats.get_mut("A").unwrap().active_jobs = 99;
        assert_eq!(s.get_org_stats("A").unwrap().active_jobs, 1);
    }

    #[test]
    fn stale_jobs_reports_long_runners() {
        let (s, clock) = with_manual_clock(scheduler(5, 10, 100), 0);
        s.track_job("A", "old", None, 0);
        clock.advance(60_000);
        s.track_job("B", "new", None, 0);

        let stale = s.stale_jobs(Duration::from_secs(30));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].job_id, "old");
        // Reporting does not release anything.
        assert_eq!(s.get_total_active_jobs(), 2);
    }

    #[test]
    fn prune_idle_orgs_is_opt_in() {
        let (s, clock) = with_manual_clock(scheduler(5, 10, 100), 0);
        s.track_job("A", "j1", None, 0);
        s.release_job("A", "j1", false);
        s.track_job("B", "j2", None, 0);

        clock.advance(10_000);
        assert_eq!(s.prune_idle_orgs(Duration::from_secs(60)), 0);
        assert!(s.get_org_stats("A").is_some());

        assert_eq!(s.prune_idle_orgs(Duration::from_secs(5)), 1);
        assert!(s.get_org_stats("A").is_none());
        assert!(s.get_org_stats("B").is_some());
    }
}
