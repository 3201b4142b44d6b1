//! fairgrid-scheduler — fair sharing of a finite worker pool across orgs.
//!
//! Keeps one high-traffic org from starving the others when many orgs
//! share a job queue. The scheduler:
//!
//! - Decides whether an org may start another job (admission control)
//! - Tracks active jobs and per-org statistics
//! - Picks the next org to serve in round-robin order
//! - Pushes a metrics snapshot to observers after every change
//! - Names physical queues for an isolation strategy
//!
//! It never executes, delays or requeues jobs itself.
//!
//! # Architecture
//!
//! ```text
//! FairScheduler
//!   ├── Mutex<SchedulerState>
//!   │   ├── JobTracker (active jobs, OrgQueueStats, MetricsAggregator)
//!   │   └── RotationList (orgs with active jobs + cursor)
//!   ├── MetricsEmitter (listeners, invoked after the lock is released)
//!   └── Clock (epoch ms for wait / processing times)
//!
//! admission::evaluate  — pure per-org / global / share limit check
//! get_queue_name       — stateless queue naming per IsolationStrategy
//! ```

pub mod admission;
pub mod clock;
pub mod error;
pub mod isolation;
pub mod rotation;
pub mod scheduler;
pub mod tracker;

pub use admission::Admission;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SchedulerError, SchedulerResult};
pub use isolation::{get_queue_name, HIGH_PRIORITY_THRESHOLD};
pub use rotation::RotationList;
pub use scheduler::FairScheduler;
pub use tracker::JobTracker;

pub use fairgrid_core::{
    FairSchedulerConfig, IsolationStrategy, JobTrackingInfo, OrgQueueStats, QueueMetrics,
};
pub use fairgrid_metrics::MetricsSubscription;
