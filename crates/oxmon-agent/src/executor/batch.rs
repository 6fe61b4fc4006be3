use super::{DeliveryExecutor, DeliveryResult};
use crate::accumulator::Snapshot;
use crate::error::{AgentError, Result};
use crate::retry::RetryExecutor;
use crate::sender::MetricSender;
use async_trait::async_trait;
use oxmon_common::types::Metric;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sends a whole cycle as a single request, retried as a unit.
///
/// Fewest requests, largest blast radius: when the request finally fails,
/// every metric in it is reported as failed.
pub struct BatchExecutor {
    sender: Arc<dyn MetricSender>,
    retry: RetryExecutor,
    shut_down: AtomicBool,
}

impl BatchExecutor {
    pub fn new(sender: Arc<dyn MetricSender>, retry: RetryExecutor) -> Self {
        Self {
            sender,
            retry,
            shut_down: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DeliveryExecutor for BatchExecutor {
    async fn execute(&self, snapshots: Vec<Snapshot>) -> Result<DeliveryResult> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(AgentError::ExecutorShutdown);
        }
        if snapshots.is_empty() {
            return Ok(DeliveryResult::default());
        }

        let metrics: Vec<Metric> = snapshots.iter().map(Snapshot::to_metric).collect();
        match self.retry.run(|| self.sender.send_batch(&metrics)).await {
            Ok(()) => {
                tracing::debug!(count = metrics.len(), "Metric batch delivered");
                Ok(DeliveryResult::all_succeeded(&snapshots))
            }
            Err(e) => {
                tracing::warn!(count = metrics.len(), error = %e, "Metric batch delivery failed");
                Ok(DeliveryResult::all_failed(&snapshots))
            }
        }
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    fn name(&self) -> &'static str {
        "batch"
    }
}
