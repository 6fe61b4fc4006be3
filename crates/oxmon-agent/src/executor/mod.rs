//! Delivery strategies.
//!
//! A [`DeliveryExecutor`] takes the snapshots staged in one report cycle and
//! tells the reporter which of them reached the server. Two strategies are
//! available, chosen once at startup from `delivery.mode`:
//!
//! - [`batch::BatchExecutor`]: one retried request for the whole cycle,
//!   all-or-nothing.
//! - [`pool::WorkerPoolExecutor`]: a fixed pool of workers sending one metric
//!   per request, each retried and resolved independently.

pub mod batch;
pub mod pool;

use crate::accumulator::Snapshot;
use crate::config::{DeliveryConfig, DeliveryMode};
use crate::error::Result;
use crate::retry::RetryExecutor;
use crate::sender::MetricSender;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one `execute` call: every submitted id lands in exactly one of
/// the two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: HashSet<String>,
    pub failure: HashSet<String>,
}

impl DeliveryResult {
    pub fn all_succeeded(snapshots: &[Snapshot]) -> Self {
        Self {
            success: snapshots.iter().map(|s| s.id.clone()).collect(),
            failure: HashSet::new(),
        }
    }

    pub fn all_failed(snapshots: &[Snapshot]) -> Self {
        Self {
            success: HashSet::new(),
            failure: snapshots.iter().map(|s| s.id.clone()).collect(),
        }
    }

    pub fn record(&mut self, id: String, delivered: bool) {
        if delivered {
            self.success.insert(id);
        } else {
            self.failure.insert(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failure.is_empty()
    }
}

#[async_trait]
pub trait DeliveryExecutor: Send + Sync {
    /// Delivers `snapshots` and reports a per-id outcome.
    ///
    /// Returns only once every snapshot is resolved. Delivery failures are
    /// reported through [`DeliveryResult::failure`]; an `Err` means the
    /// executor itself could not run (e.g. after [`shutdown`](Self::shutdown))
    /// and nothing was delivered.
    async fn execute(&self, snapshots: Vec<Snapshot>) -> Result<DeliveryResult>;

    /// Releases background resources. Idempotent; waits for in-flight
    /// `execute` calls to drain.
    async fn shutdown(&self);

    /// Strategy name for logging.
    fn name(&self) -> &'static str;
}

/// Builds the executor selected by `delivery.mode`.
///
/// The worker pool spawns its workers immediately, so this must be called
/// inside a Tokio runtime.
pub fn from_config(
    config: &DeliveryConfig,
    sender: Arc<dyn MetricSender>,
    retry: RetryExecutor,
) -> Arc<dyn DeliveryExecutor> {
    match config.mode {
        DeliveryMode::Batch => Arc::new(batch::BatchExecutor::new(sender, retry)),
        DeliveryMode::WorkerPool => Arc::new(pool::WorkerPoolExecutor::new(
            sender,
            retry,
            config.workers,
            config.queue_capacity,
        )),
    }
}
