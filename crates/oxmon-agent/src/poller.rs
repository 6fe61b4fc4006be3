use crate::registry::BufferRegistry;
use oxmon_collector::Collector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Feeds one collector's samples into the registry on a fixed interval.
pub struct Poller {
    registry: Arc<BufferRegistry>,
    collector: Box<dyn Collector>,
    interval: Duration,
}

impl Poller {
    pub fn new(
        registry: Arc<BufferRegistry>,
        collector: Box<dyn Collector>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            collector,
            interval,
        }
    }

    /// Collects once and records every sample. Returns how many were
    /// recorded; failures are logged and skipped.
    pub fn poll_once(&mut self) -> usize {
        let samples = match self.collector.collect() {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(collector = self.collector.name(), error = %e, "Collection failed");
                return 0;
            }
        };

        let mut recorded = 0;
        for sample in &samples {
            match self.registry.record(sample) {
                Ok(()) => recorded += 1,
                Err(e) => tracing::warn!(
                    collector = self.collector.name(),
                    metric_id = %sample.id,
                    error = %e,
                    "Failed to buffer sample"
                ),
            }
        }
        tracing::trace!(collector = self.collector.name(), count = recorded, "Collected samples");
        recorded
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        tracing::debug!(
            collector = self.collector.name(),
            interval_secs = self.interval.as_secs(),
            "Poller started"
        );

        let stopped = *shutdown.borrow_and_update();
        if stopped {
            return;
        }
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once();
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!(collector = self.collector.name(), "Poller stopped");
    }
}
