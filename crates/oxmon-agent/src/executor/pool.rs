use super::{DeliveryExecutor, DeliveryResult};
use crate::accumulator::Snapshot;
use crate::error::{AgentError, Result};
use crate::retry::RetryExecutor;
use crate::sender::MetricSender;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Task {
    snapshot: Snapshot,
    /// Per-`execute` completion channel, sized to the batch so a worker never
    /// waits on it.
    outcome: mpsc::Sender<Outcome>,
}

struct Outcome {
    id: String,
    delivered: bool,
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>;

/// Fixed pool of delivery workers fed from a bounded queue.
///
/// Each metric is sent and retried on its own, so one slow or failing metric
/// does not fail the others. Must be constructed inside a Tokio runtime.
pub struct WorkerPoolExecutor {
    queue: Mutex<Option<mpsc::Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPoolExecutor {
    pub fn new(
        sender: Arc<dyn MetricSender>,
        retry: RetryExecutor,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx: SharedQueue = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    Arc::clone(&sender),
                    retry.clone(),
                ))
            })
            .collect();

        Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: SharedQueue,
    sender: Arc<dyn MetricSender>,
    retry: RetryExecutor,
) {
    loop {
        let task = queue.lock().await.recv().await;
        let Some(Task { snapshot, outcome }) = task else {
            break;
        };

        // A panicking sender only fails its own metric; the worker survives.
        let delivery = tokio::spawn(deliver(
            snapshot.clone(),
            Arc::clone(&sender),
            retry.clone(),
        ));
        let delivered = match delivery.await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(worker_id, error = %e, "Metric delivery failed");
                false
            }
            Err(e) => {
                tracing::error!(
                    worker_id,
                    metric_id = %snapshot.id,
                    error = %e,
                    "Metric delivery task aborted"
                );
                false
            }
        };

        // The receiver is gone only if `execute` was dropped mid-flight.
        let _ = outcome
            .send(Outcome {
                id: snapshot.id,
                delivered,
            })
            .await;
    }
    tracing::debug!(worker_id, "Delivery worker stopped");
}

async fn deliver(
    snapshot: Snapshot,
    sender: Arc<dyn MetricSender>,
    retry: RetryExecutor,
) -> Result<()> {
    let metric = snapshot.to_metric();
    retry
        .run(|| sender.send(&metric))
        .await
        .map_err(|e| AgentError::DeliveryFailure {
            id: snapshot.id,
            message: format!("{e:#}"),
        })
}

#[async_trait]
impl DeliveryExecutor for WorkerPoolExecutor {
    async fn execute(&self, snapshots: Vec<Snapshot>) -> Result<DeliveryResult> {
        let queue = self
            .queue
            .lock()
            .clone()
            .ok_or(AgentError::ExecutorShutdown)?;

        let mut result = DeliveryResult::default();
        if snapshots.is_empty() {
            return Ok(result);
        }

        let mut pending: HashSet<String> = snapshots.iter().map(|s| s.id.clone()).collect();
        let (outcome_tx, mut outcome_rx) = mpsc::channel(snapshots.len());

        // Workers drain the queue while we fill it, so a queue smaller than
        // the batch only applies backpressure here.
        for snapshot in snapshots {
            let task = Task {
                snapshot,
                outcome: outcome_tx.clone(),
            };
            if queue.send(task).await.is_err() {
                // Every worker is gone. What was already queued still resolves
                // below; the rest is reported as failed.
                tracing::error!("All delivery workers exited, marking pool as shut down");
                self.queue.lock().take();
                break;
            }
        }
        drop(outcome_tx);

        // Every task holds a sender clone; `recv` yields `None` once all of
        // them are resolved or dropped.
        while let Some(Outcome { id, delivered }) = outcome_rx.recv().await {
            if pending.remove(&id) {
                result.record(id, delivered);
            }
        }

        for id in pending {
            tracing::error!(metric_id = %id, "Metric was not delivered by any worker");
            result.record(id, false);
        }

        Ok(result)
    }

    async fn shutdown(&self) {
        // Workers exit once the queue is empty and every sender is gone,
        // including clones held by in-flight `execute` calls.
        drop(self.queue.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        let count = workers.len();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Delivery worker terminated abnormally");
            }
        }
        tracing::info!(workers = count, "Delivery worker pool stopped");
    }

    fn name(&self) -> &'static str {
        "worker_pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::SnapshotValue;
    use crate::error::SendError;
    use crate::retry::NoRetry;
    use oxmon_common::types::Metric;

    struct AcceptAll;

    #[async_trait]
    impl MetricSender for AcceptAll {
        async fn send(&self, _metric: &Metric) -> std::result::Result<(), SendError> {
            Ok(())
        }

        async fn send_batch(&self, _metrics: &[Metric]) -> std::result::Result<(), SendError> {
            Ok(())
        }
    }

    fn snapshots(ids: &[&str]) -> Vec<Snapshot> {
        ids.iter()
            .map(|id| Snapshot {
                id: id.to_string(),
                value: SnapshotValue::Counter(1),
            })
            .collect()
    }

    #[tokio::test]
    async fn dead_workers_fail_the_batch_and_close_the_pool() {
        let pool = WorkerPoolExecutor::new(
            Arc::new(AcceptAll),
            RetryExecutor::new(Arc::new(NoRetry)),
            2,
            1,
        );
        let handles = std::mem::take(&mut *pool.workers.lock());
        for handle in handles {
            handle.abort();
            assert!(handle.await.unwrap_err().is_cancelled());
        }

        let work = snapshots(&["a", "b", "c"]);
        let result = pool.execute(work.clone()).await.unwrap();
        assert_eq!(result, DeliveryResult::all_failed(&work));

        assert!(matches!(
            pool.execute(work).await,
            Err(AgentError::ExecutorShutdown)
        ));
        pool.shutdown().await;
    }
}
