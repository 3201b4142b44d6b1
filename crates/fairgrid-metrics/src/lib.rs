//! fairgrid-metrics — observability for the FairGrid scheduler.
//!
//! Keeps per-org rolling averages of wait and processing time, fans
//! snapshots out to subscribers, and renders Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! MetricsAggregator
//!   ├── SampleReservoir (wait, per org, last 100 samples)
//!   ├── SampleReservoir (processing, per org, last 100 samples)
//!   └── overall_avg_wait_ms() → sample-weighted across all orgs
//!
//! MetricsEmitter
//!   ├── subscribe() → MetricsSubscription (unsubscribe handle)
//!   └── emit() ← called after every track/release
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for a /metrics endpoint
//! ```

pub mod aggregator;
pub mod emitter;
pub mod prometheus;
pub mod reservoir;

pub use aggregator::MetricsAggregator;
pub use emitter::{MetricsEmitter, MetricsListener, MetricsSubscription};
pub use prometheus::render_prometheus;
pub use reservoir::SampleReservoir;
