//! Metrics emitter — synchronous fan-out of scheduler snapshots.
//!
//! Listeners run on the caller's thread, in subscription order. A
//! listener that panics is logged and skipped; the remaining listeners
//! still receive the snapshot.
//!
//! # Concurrency
//!
//! The listener list is protected by a `std::sync::Mutex`, held only
//! long enough to clone the current list. Listeners are invoked with no
//! lock held, so they may subscribe, unsubscribe, or query the scheduler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use fairgrid_core::QueueMetrics;
use tracing::{debug, error};

/// Observer invoked with every snapshot.
pub type MetricsListener = Arc<dyn Fn(&QueueMetrics) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, MetricsListener)>,
}

#[derive(Clone, Default)]
pub struct MetricsEmitter {
    registry: Arc<Mutex<Registry>>,
}

impl MetricsEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The returned handle removes it again.
    pub fn subscribe<F>(&self, listener: F) -> MetricsSubscription
    where
        F: Fn(&QueueMetrics) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        debug!(listener_id = id, "metrics listener subscribed");

        MetricsSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a snapshot to every listener.
    ///
    /// Returns the number of listeners that completed without panicking.
    pub fn emit(&self, metrics: &QueueMetrics) -> usize {
        let listeners: Vec<(u64, MetricsListener)> = self.lock().listeners.clone();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(metrics))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        listener_id = id,
                        panic = %panic_message(payload.as_ref()),
                        "metrics listener failed"
                    );
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`MetricsEmitter::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct MetricsSubscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl MetricsSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns `false` if it was already gone or the
    /// emitter has been dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        let removed = registry.listeners.len() < before;
        if removed {
            debug!(listener_id = self.id, "metrics listener unsubscribed");
        }
        removed
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(total: u32) -> QueueMetrics {
        QueueMetrics {
            total_active_jobs: total,
            active_orgs: 0,
            org_stats: HashMap::new(),
            overall_avg_wait_time_ms: 0.0,
        }
    }

    #[test]
    fn emit_reaches_all_listeners() {
        let emitter = MetricsEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            let _ = emitter.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(emitter.emit(&snapshot(1)), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listener_sees_snapshot_contents() {
        let emitter = MetricsEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = emitter.subscribe(move |m| sink.lock().unwrap().push(m.total_active_jobs));

        emitter.emit(&snapshot(4));
        emitter.emit(&snapshot(2));
        assert_eq!(*seen.lock().unwrap(), vec![4, 2]);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let emitter = MetricsEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = emitter.subscribe(|_| panic!("listener exploded"));
        let counter = hits.clone();
        let _good = emitter.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(emitter.emit(&snapshot(1)), 1);
        assert_eq!(emitter.emit(&snapshot(2)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.listener_count(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let emitter = MetricsEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = emitter.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(&snapshot(1));
        assert!(sub.unsubscribe());
        emitter.emit(&snapshot(1));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_after_emitter_dropped() {
        let emitter = MetricsEmitter::new();
        let sub = emitter.subscribe(|_| {});
        drop(emitter);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn listener_may_unsubscribe_during_emit() {
        let emitter = MetricsEmitter::new();
        let slot: Arc<Mutex<Option<MetricsSubscription>>> = Arc::new(Mutex::new(None));

        let inner = slot.clone();
        let sub = emitter.subscribe(move |_| {
            if let Some(sub) = inner.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(emitter.emit(&snapshot(1)), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let emitter = MetricsEmitter::new();
        let a = emitter.subscribe(|_| {});
        let b = emitter.subscribe(|_| {});
        assert_ne!(a.id(), b.id());
    }
}
