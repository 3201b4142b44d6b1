//! Metrics aggregator — rolling per-org averages.
//!
//! Each org owns two reservoirs (wait time and processing time) of
//! [`SAMPLE_CAPACITY`] samples. The aggregator holds no lock of its own;
//! the scheduler owns it inside its single state mutex.

use std::collections::HashMap;

use fairgrid_core::SAMPLE_CAPACITY;

use crate::reservoir::SampleReservoir;

/// Sample reservoirs for one org.
#[derive(Debug, Clone)]
struct OrgSamples {
    wait: SampleReservoir,
    processing: SampleReservoir,
}

impl OrgSamples {
    fn new(capacity: usize) -> Self {
        Self {
            wait: SampleReservoir::new(capacity),
            processing: SampleReservoir::new(capacity),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    orgs: HashMap<String, OrgSamples>,
    capacity: usize,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_capacity(SAMPLE_CAPACITY)
    }

    /// Create an aggregator whose reservoirs hold `capacity` samples each.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            orgs: HashMap::new(),
            capacity,
        }
    }

    /// Create empty reservoirs for an org if it has none yet.
    pub fn register(&mut self, org_id: &str) {
        if !self.orgs.contains_key(org_id) {
            self.orgs
                .insert(org_id.to_string(), OrgSamples::new(self.capacity));
        }
    }

    /// Drop an org's reservoirs.
    pub fn remove(&mut self, org_id: &str) {
        self.orgs.remove(org_id);
    }

    /// Record a wait-time sample and return the org's new average.
    pub fn record_wait(&mut self, org_id: &str, wait_ms: f64) -> f64 {
        let samples = self.entry(org_id);
        samples.wait.push(wait_ms);
        samples.wait.mean()
    }

    /// Record a processing-time sample and return the org's new average.
    pub fn record_processing(&mut self, org_id: &str, processing_ms: f64) -> f64 {
        let samples = self.entry(org_id);
        samples.processing.push(processing_ms);
        samples.processing.mean()
    }

    pub fn avg_wait_ms(&self, org_id: &str) -> f64 {
        self.orgs.get(org_id).map(|s| s.wait.mean()).unwrap_or(0.0)
    }

    pub fn avg_processing_ms(&self, org_id: &str) -> f64 {
        self.orgs
            .get(org_id)
            .map(|s| s.processing.mean())
            .unwrap_or(0.0)
    }

    /// Number of retained wait samples for an org.
    pub fn wait_sample_count(&self, org_id: &str) -> usize {
        self.orgs.get(org_id).map(|s| s.wait.len()).unwrap_or(0)
    }

    /// Mean over every retained wait sample of every org.
    ///
    /// Sample-weighted: an org with 100 samples counts 100 times as much
    /// as an org with one. Returns 0.0 when there are no samples.
    pub fn overall_avg_wait_ms(&self) -> f64 {
        let (sum, count) = self
            .orgs
            .values()
            .fold((0.0, 0usize), |(sum, count), s| {
                (sum + s.wait.sum(), count + s.wait.len())
            });
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Number of orgs with reservoirs.
    pub fn org_count(&self) -> usize {
        self.orgs.len()
    }

    fn entry(&mut self, org_id: &str) -> &mut OrgSamples {
        let capacity = self.capacity;
        self.orgs
            .entry(org_id.to_string())
            .or_insert_with(|| OrgSamples::new(capacity))
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
