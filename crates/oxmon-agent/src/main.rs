use anyhow::Result;
use oxmon_agent::config::AgentConfig;
use oxmon_agent::executor;
use oxmon_agent::poller::Poller;
use oxmon_agent::registry::BufferRegistry;
use oxmon_agent::reporter::Reporter;
use oxmon_agent::retry::RetryExecutor;
use oxmon_agent::sender::{HttpSender, MetricSender};
use oxmon_collector::cpu::CpuCollector;
use oxmon_collector::load::LoadCollector;
use oxmon_collector::memory::MemoryCollector;
use oxmon_collector::network::NetworkCollector;
use oxmon_collector::runtime::RuntimeCollector;
use oxmon_collector::Collector;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    let endpoint = config.endpoint_url();
    tracing::info!(server = %endpoint, "oxmon-agent starting");

    let registry = Arc::new(BufferRegistry::new(config.gauge_aggregation));
    let sender: Arc<dyn MetricSender> =
        Arc::new(HttpSender::new(&endpoint, config.request_timeout())?);
    let retry = RetryExecutor::new(config.retry.build_policy()).with_logging("metric delivery");
    let executor = executor::from_config(&config.delivery, sender, retry);

    tracing::info!(
        poll_interval_secs = config.poll_interval_secs,
        report_interval_secs = config.report_interval_secs,
        delivery = executor.name(),
        "Starting poll and report loops"
    );

    let (stop_polling_tx, stop_polling_rx) = watch::channel(false);
    let (stop_reporting_tx, stop_reporting_rx) = watch::channel(false);

    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(CpuCollector::new()),
        Box::new(MemoryCollector::new()),
        Box::new(NetworkCollector::new()),
        Box::new(LoadCollector::new()),
        Box::new(RuntimeCollector::new()),
    ];
    let pollers: Vec<_> = collectors
        .into_iter()
        .map(|collector| {
            let poller = Poller::new(Arc::clone(&registry), collector, config.poll_interval());
            tokio::spawn(poller.run(stop_polling_rx.clone()))
        })
        .collect();

    let reporter = Arc::new(Reporter::new(
        Arc::clone(&registry),
        executor,
        config.report_interval(),
    ));
    let reporter_task = tokio::spawn(reporter.run(stop_reporting_rx));

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    // Stop sampling first so the final report sees everything collected.
    let _ = stop_polling_tx.send(true);
    for poller in pollers {
        if let Err(e) = poller.await {
            tracing::error!(error = %e, "Poller task failed");
        }
    }
    let _ = stop_reporting_tx.send(true);
    if let Err(e) = reporter_task.await {
        tracing::error!(error = %e, "Reporter task failed");
    }

    tracing::info!("oxmon-agent stopped");
    Ok(())
}
