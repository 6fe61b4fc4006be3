use crate::error::{AgentError, Result};
use crate::executor::{DeliveryExecutor, DeliveryResult};
use crate::registry::BufferRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time;

/// Counts from one report cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub staged: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Periodically drains every buffer, delivers the snapshots and resolves them.
///
/// A cycle stages each accumulator, hands the snapshots to the configured
/// [`DeliveryExecutor`], then commits what was delivered and rolls back what
/// was not. Cycles never overlap: a tick that fires while a cycle is running
/// waits for it to finish.
pub struct Reporter {
    registry: Arc<BufferRegistry>,
    executor: Arc<dyn DeliveryExecutor>,
    interval: Duration,
    cycle: Mutex<()>,
}

impl Reporter {
    pub fn new(
        registry: Arc<BufferRegistry>,
        executor: Arc<dyn DeliveryExecutor>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            executor,
            interval,
            cycle: Mutex::new(()),
        }
    }

    /// Runs report cycles every `interval` until `shutdown` flips, then runs
    /// one final cycle and shuts the executor down.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; there is nothing buffered yet.
        ticker.tick().await;

        let stopped = *shutdown.borrow_and_update();
        if !stopped {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.report_once().await;
                    }
                    // Either a stop request or the sender went away.
                    _ = shutdown.changed() => break,
                }
            }
        }

        tracing::info!("Reporter stopping, flushing buffered metrics");
        let report = self.report_once().await;
        if report.failed > 0 {
            tracing::warn!(
                failed = report.failed,
                "Final report left undelivered metrics behind"
            );
        }
        self.executor.shutdown().await;
    }

    /// Runs a single stage → deliver → commit/rollback cycle.
    pub async fn report_once(&self) -> CycleReport {
        let _cycle = self.cycle.lock().await;

        let mut work = Vec::new();
        for acc in self.registry.all() {
            match acc.stage_changes() {
                Ok(Some(snapshot)) => work.push(snapshot),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(metric_id = %acc.id(), error = %e, "Skipping metric this cycle");
                }
            }
        }

        if work.is_empty() {
            tracing::debug!("Nothing to report");
            return CycleReport::default();
        }

        let staged: HashSet<String> = work.iter().map(|s| s.id.clone()).collect();
        let result = match self.executor.execute(work).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    executor = self.executor.name(),
                    error = %e,
                    "Delivery executor unavailable, rolling back cycle"
                );
                DeliveryResult {
                    success: HashSet::new(),
                    failure: staged.clone(),
                }
            }
        };

        for id in &result.success {
            if let Err(e) = self.commit(id) {
                tracing::warn!(metric_id = %id, error = %e, "Commit failed");
            }
        }
        for id in &result.failure {
            if let Err(e) = self.rollback(id) {
                tracing::warn!(metric_id = %id, error = %e, "Rollback failed");
            }
        }

        // An executor must resolve every id; anything it missed goes back to
        // the live buffer so the next cycle can stage it again.
        let mut unresolved = 0;
        for id in &staged {
            if !result.success.contains(id) && !result.failure.contains(id) {
                unresolved += 1;
                tracing::error!(metric_id = %id, "Executor returned no outcome, rolling back");
                if let Err(e) = self.rollback(id) {
                    tracing::warn!(metric_id = %id, error = %e, "Rollback failed");
                }
            }
        }

        let report = CycleReport {
            staged: staged.len(),
            delivered: result.success.len(),
            failed: result.failure.len() + unresolved,
        };
        if report.failed > 0 {
            tracing::warn!(
                executor = self.executor.name(),
                staged = report.staged,
                delivered = report.delivered,
                failed = report.failed,
                "Report cycle finished with failures, data kept for next cycle"
            );
        } else {
            tracing::info!(
                executor = self.executor.name(),
                delivered = report.delivered,
                "Report cycle finished"
            );
        }
        report
    }

    fn commit(&self, id: &str) -> Result<()> {
        let acc = self
            .registry
            .get(id)
            .ok_or_else(|| AgentError::UnknownMetric { id: id.to_string() })?;
        acc.commit_staged();
        Ok(())
    }

    fn rollback(&self, id: &str) -> Result<()> {
        let acc = self
            .registry
            .get(id)
            .ok_or_else(|| AgentError::UnknownMetric { id: id.to_string() })?;
        acc.rollback_staged();
        Ok(())
    }
}
