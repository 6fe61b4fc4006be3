mod common;

use anyhow::Result;
use common::{delivered_counter, http_sender, no_retry, reporter, MockServer};
use oxmon_agent::accumulator::SnapshotValue;
use oxmon_agent::error::AgentError;
use oxmon_agent::executor::batch::BatchExecutor;
use oxmon_agent::executor::pool::WorkerPoolExecutor;
use oxmon_agent::executor::DeliveryExecutor;
use oxmon_agent::registry::BufferRegistry;
use oxmon_agent::retry::{Linear, RetryExecutor};
use oxmon_common::types::{MetricKind, Sample};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn shutdown_flushes_buffered_metrics_in_one_batch() -> Result<()> {
    let server = MockServer::start([]).await?;
    let registry = Arc::new(BufferRegistry::default());
    let executor = Arc::new(BatchExecutor::new(http_sender(&server)?, no_retry()));
    let reporter = reporter(&registry, executor.clone(), Duration::from_secs(3600));

    for _ in 0..3 {
        registry.record(&Sample::counter("PollCount", 1))?;
    }
    registry.record(&Sample::gauge("RandomValue", 0.25))?;
    registry.record(&Sample::gauge("RandomValue", 0.75))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(Arc::clone(&reporter).run(stop_rx));
    stop_tx.send(true)?;
    task.await?;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/updates/");
    assert_eq!(delivered_counter(&server, "PollCount"), 3);

    let items = requests[0].body.as_array().cloned().unwrap_or_default();
    let gauge = items
        .iter()
        .find(|m| m["id"] == "RandomValue")
        .expect("gauge in batch");
    assert_eq!(gauge["type"], "gauge");
    assert_eq!(gauge["value"].as_f64(), Some(0.5));
    assert!(gauge.get("delta").is_none());

    // The executor is released once the reporter stops.
    assert!(matches!(
        executor.execute(Vec::new()).await,
        Err(AgentError::ExecutorShutdown)
    ));
    Ok(())
}

#[tokio::test]
async fn worker_pool_retries_unavailable_server() -> Result<()> {
    let server = MockServer::start([503, 503]).await?;
    let registry = Arc::new(BufferRegistry::default());
    let retry = RetryExecutor::new(Arc::new(Linear::new(
        3,
        Duration::from_millis(10),
        Duration::from_millis(10),
    )));
    let executor = Arc::new(WorkerPoolExecutor::new(http_sender(&server)?, retry, 1, 4));
    let reporter = reporter(&registry, executor.clone(), Duration::from_secs(3600));

    registry.record(&Sample::counter("cnt1", 7))?;
    let report = reporter.report_once().await;

    assert_eq!((report.delivered, report.failed), (1, 0));
    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.path == "/update/"));
    assert_eq!(delivered_counter(&server, "cnt1"), 7);
    executor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_delivery_is_kept_for_the_next_cycle() -> Result<()> {
    let server = MockServer::start([400]).await?;
    let registry = Arc::new(BufferRegistry::default());
    let retry = RetryExecutor::new(Arc::new(Linear::new(
        3,
        Duration::from_millis(10),
        Duration::ZERO,
    )));
    let executor = Arc::new(BatchExecutor::new(http_sender(&server)?, retry));
    let reporter = reporter(&registry, executor, Duration::from_secs(3600));

    registry.record(&Sample::counter("cnt1", 3))?;
    registry.record(&Sample::counter("cnt1", 4))?;

    let first = reporter.report_once().await;
    assert_eq!(first.failed, 1);
    // 400 is terminal: no retries.
    assert_eq!(server.requests().len(), 1);

    let acc = registry.get_or_create("cnt1", MetricKind::Counter);
    assert!(!acc.has_staged());
    acc.accumulate_counter(2)?;

    let second = reporter.report_once().await;
    assert_eq!(second.delivered, 1);
    assert_eq!(delivered_counter(&server, "cnt1"), 9);

    acc.accumulate_counter(1)?;
    let snapshot = acc.stage_changes()?.expect("new increment staged");
    assert_eq!(snapshot.value, SnapshotValue::Counter(1));
    Ok(())
}
