use crate::accumulator::{Accumulator, GaugeAggregation};
use crate::error::Result;
use dashmap::DashMap;
use oxmon_common::types::{MetricKind, Sample};
use std::sync::Arc;

/// Concurrent id → [`Accumulator`] map shared by the poll tasks and the
/// reporter.
///
/// Entries are created on first use and never removed; cardinality is bounded
/// by the set of metrics the host's collectors emit.
///
/// # Examples
///
/// ```
/// use oxmon_agent::registry::BufferRegistry;
/// use oxmon_common::types::{MetricKind, Sample};
///
/// let registry = BufferRegistry::default();
/// registry.record(&Sample::counter("PollCount", 1)).unwrap();
/// let acc = registry.get_or_create("PollCount", MetricKind::Counter);
/// assert_eq!(acc.kind(), MetricKind::Counter);
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: DashMap<String, Arc<Accumulator>>,
    aggregation: GaugeAggregation,
}

impl BufferRegistry {
    pub fn new(aggregation: GaugeAggregation) -> Self {
        Self {
            buffers: DashMap::new(),
            aggregation,
        }
    }

    /// Returns the accumulator for `id`, creating it with `kind` on first use.
    ///
    /// An existing accumulator is returned as-is even if `kind` differs; the
    /// following accumulate call then reports the mismatch.
    pub fn get_or_create(&self, id: &str, kind: MetricKind) -> Arc<Accumulator> {
        if let Some(existing) = self.buffers.get(id) {
            return Arc::clone(existing.value());
        }
        // The entry holds the shard lock, so two racing creators agree on one
        // instance.
        let entry = self
            .buffers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Accumulator::new(id, kind, self.aggregation)));
        Arc::clone(entry.value())
    }

    pub fn get(&self, id: &str) -> Option<Arc<Accumulator>> {
        self.buffers.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every known accumulator, in no particular order.
    pub fn all(&self) -> Vec<Arc<Accumulator>> {
        self.buffers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Routes one collector sample into its accumulator.
    pub fn record(&self, sample: &Sample) -> Result<()> {
        self.get_or_create(&sample.id, sample.kind())
            .accumulate(sample.value)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::SnapshotValue;
    use crate::error::AgentError;
    use std::thread;

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = BufferRegistry::default();
        let a = registry.get_or_create("cnt1", MetricKind::Counter);
        let b = registry.get_or_create("cnt1", MetricKind::Counter);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_does_not_create() {
        let registry = BufferRegistry::default();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn existing_kind_wins_over_requested_kind() {
        let registry = BufferRegistry::default();
        registry.record(&Sample::counter("m", 1)).unwrap();
        let err = registry.record(&Sample::gauge("m", 1.0)).unwrap_err();
        assert!(matches!(err, AgentError::KindMismatch { .. }));
        assert_eq!(registry.get("m").unwrap().kind(), MetricKind::Counter);
    }

    #[test]
    fn all_lists_every_id() {
        let registry = BufferRegistry::default();
        registry.record(&Sample::counter("a", 1)).unwrap();
        registry.record(&Sample::gauge("b", 1.0)).unwrap();
        let mut ids: Vec<String> = registry.all().iter().map(|a| a.id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_first_access_creates_one_accumulator() {
        let registry = Arc::new(BufferRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.record(&Sample::counter("shared", 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
        let snap = registry.get("shared").unwrap().stage_changes().unwrap();
        assert_eq!(snap.map(|s| s.value), Some(SnapshotValue::Counter(800)));
    }
}
