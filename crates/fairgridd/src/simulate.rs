//! Simulated worker pool driving a `FairScheduler`.
//!
//! Each org gets an in-memory backlog of synthetic jobs. Worker tasks
//! repeatedly pick an org, register a job with `try_track_job`, "run" it
//! by sleeping, and release it. Orgs already in rotation are picked via
//! `get_next_org`; orgs with no active job are found by scanning the
//! backlog, since rotation only holds orgs that are already running work.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use fairgrid_core::OrgQueueStats;
use fairgrid_scheduler::clock::epoch_millis;
use fairgrid_scheduler::FairScheduler;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

/// Shape of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub orgs: usize,
    pub jobs_per_org: usize,
    pub workers: usize,
    /// How long each job "runs".
    pub job_duration: Duration,
    /// Every Nth job of an org is released as failed.
    pub fail_every: Option<usize>,
    /// Extra jobs queued for the first org, to model a noisy tenant.
    pub hot_org_extra_jobs: usize,
}

#[derive(Debug, Clone)]
struct QueuedJob {
    id: String,
    queued_at: u64,
    seq: usize,
}

/// Per-org job backlogs, iterated in org-name order.
#[derive(Default)]
struct Backlog {
    orgs: BTreeMap<String, VecDeque<QueuedJob>>,
}

impl Backlog {
    fn build(sim: &SimulationConfig) -> Self {
        let now = epoch_millis();
        let mut orgs = BTreeMap::new();
        for o in 0..sim.orgs {
            let org_id = format!("org-{o:03}");
            let count = if o == 0 {
                sim.jobs_per_org + sim.hot_org_extra_jobs
            } else {
                sim.jobs_per_org
            };
            let jobs = (0..count)
                .map(|seq| QueuedJob {
                    id: format!("{org_id}-job-{seq}"),
                    queued_at: now,
                    seq,
                })
                .collect();
            orgs.insert(org_id, jobs);
        }
        Self { orgs }
    }

    fn has_work(&self, org_id: &str) -> bool {
        self.orgs.get(org_id).is_some_and(|q| !q.is_empty())
    }

    fn is_drained(&self) -> bool {
        self.orgs.values().all(VecDeque::is_empty)
    }

    fn pop(&mut self, org_id: &str) -> Option<QueuedJob> {
        self.orgs.get_mut(org_id)?.pop_front()
    }

    fn push_front(&mut self, org_id: &str, job: QueuedJob) {
        self.orgs.entry(org_id.to_string()).or_default().push_front(job);
    }

    fn first_waiting<F>(&self, mut admissible: F) -> Option<String>
    where
        F: FnMut(&str) -> bool,
    {
        self.orgs
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(org_id, _)| org_id)
            .find(|org_id| admissible(org_id))
            .cloned()
    }
}

/// Highest concurrency seen while the simulation ran.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakUsage {
    pub total_active: u32,
    pub per_org: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub elapsed_ms: u64,
    pub processed: u64,
    pub peak: PeakUsage,
    pub org_stats: BTreeMap<String, OrgQueueStats>,
    pub overall_avg_wait_time_ms: f64,
    /// True if the run ended on a shutdown signal with work left.
    pub interrupted: bool,
}

/// Run the simulation to completion or until `shutdown` flips to `true`.
pub async fn run(
    scheduler: Arc<FairScheduler>,
    sim: SimulationConfig,
    shutdown: watch::Receiver<bool>,
) -> SimulationReport {
    let started = Instant::now();
    let backlog = Arc::new(Mutex::new(Backlog::build(&sim)));
    let idle_sleep = Duration::from_millis(scheduler.config().round_robin_interval_ms.max(1));

    let peak = Arc::new(Mutex::new(PeakUsage::default()));
    let sink = peak.clone();
    let subscription = scheduler.on_metrics(move |m| {
        let mut peak = sink.lock().unwrap_or_else(PoisonError::into_inner);
        peak.total_active = peak.total_active.max(m.total_active_jobs);
        for (org_id, stats) in &m.org_stats {
            let entry = peak.per_org.entry(org_id.clone()).or_default();
            *entry = (*entry).max(stats.active_jobs);
        }
    });

    info!(
        orgs = sim.orgs,
        jobs_per_org = sim.jobs_per_org,
        workers = sim.workers,
        job_ms = sim.job_duration.as_millis() as u64,
        "simulation starting"
    );

    let mut handles = Vec::with_capacity(sim.workers);
    for worker_id in 0..sim.workers {
        let scheduler = scheduler.clone();
        let backlog = backlog.clone();
        let sim = sim.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(worker_id, scheduler, backlog, sim, idle_sleep, shutdown).await
        }));
    }

    let mut processed = 0;
    for handle in handles {
        processed += handle.await.unwrap_or(0);
    }
    subscription.unsubscribe();

    let metrics = scheduler.get_metrics();
    let interrupted = !backlog
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_drained();
    let peak = peak.lock().unwrap_or_else(PoisonError::into_inner).clone();

    let report = SimulationReport {
        elapsed_ms: started.elapsed().as_millis() as u64,
        processed,
        peak,
        org_stats: metrics.org_stats.into_iter().collect(),
        overall_avg_wait_time_ms: metrics.overall_avg_wait_time_ms,
        interrupted,
    };
    info!(
        processed = report.processed,
        elapsed_ms = report.elapsed_ms,
        peak_total = report.peak.total_active,
        interrupted = report.interrupted,
        "simulation finished"
    );
    report
}

/// One worker. Returns the number of jobs it processed.
async fn worker_loop(
    worker_id: usize,
    scheduler: Arc<FairScheduler>,
    backlog: Arc<Mutex<Backlog>>,
    sim: SimulationConfig,
    idle_sleep: Duration,
    shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut processed = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let claimed = {
            let mut backlog = backlog.lock().unwrap_or_else(PoisonError::into_inner);
            if backlog.is_drained() {
                break;
            }
            claim(&scheduler, &mut backlog)
        };

        let Some((org_id, job)) = claimed else {
            tokio::time::sleep(idle_sleep).await;
            continue;
        };

        debug!(worker_id, %org_id, job_id = %job.id, "job started");
        tokio::time::sleep(sim.job_duration).await;

        let failed = sim
            .fail_every
            .is_some_and(|n| n > 0 && (job.seq + 1) % n == 0);
        scheduler.release_job(&org_id, &job.id, failed);
        processed += 1;
    }

    debug!(worker_id, processed, "worker exiting");
    processed
}

/// Pick an admissible org with queued work and register its next job.
fn claim(scheduler: &FairScheduler, backlog: &mut Backlog) -> Option<(String, QueuedJob)> {
    let org_id = match scheduler.get_next_org() {
        Some(org_id) if backlog.has_work(&org_id) => org_id,
        _ => backlog.first_waiting(|org_id| scheduler.can_process_job(org_id))?,
    };

    let job = backlog.pop(&org_id)?;
    if scheduler.try_track_job(&org_id, &job.id, Some(job.queued_at), 0) {
        Some((org_id, job))
    } else {
        backlog.push_front(&org_id, job);
        None
    }
}

/// Render a report as an aligned text table.
pub fn render_table(report: &SimulationReport) -> String {
    let mut out = format!(
        "{:<10} {:>6} {:>9} {:>6} {:>9} {:>12} {:>12}\n",
        "ORG", "PEAK", "COMPLETED", "FAILED", "PROCESSED", "AVG WAIT ms", "AVG PROC ms"
    );
    for (org_id, stats) in &report.org_stats {
        let peak = report.peak.per_org.get(org_id).copied().unwrap_or(0);
        out.push_str(&format!(
            "{:<10} {:>6} {:>9} {:>6} {:>9} {:>12.1} {:>12.1}\n",
            org_id,
            peak,
            stats.completed_jobs,
            stats.failed_jobs,
            stats.total_processed,
            stats.avg_wait_time_ms,
            stats.avg_processing_time_ms
        ));
    }
    out.push_str(&format!(
        "\nprocessed {} jobs in {} ms; peak concurrency {}; overall avg wait {:.1} ms{}\n",
        report.processed,
        report.elapsed_ms,
        report.peak.total_active,
        report.overall_avg_wait_time_ms,
        if report.interrupted { " (interrupted)" } else { "" }
    ));
    out
}
