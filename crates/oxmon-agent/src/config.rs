use crate::accumulator::GaugeAggregation;
use crate::error::{AgentError, Result};
use crate::retry::{Linear, NoRetry, RetryPolicy};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// `host:port` or a full URL of the aggregation service.
    pub server_endpoint: String,
    /// Use https when `server_endpoint` carries no scheme
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
    /// Upper bound for a single delivery request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub gauge_aggregation: GaugeAggregation,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One request per report cycle.
    #[default]
    Batch,
    /// One request per metric, spread over a worker pool.
    WorkerPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,
    /// Worker count for `worker_pool` mode
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound of the worker pool's task queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicyKind {
    None,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub policy: RetryPolicyKind,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_increment_ms")]
    pub increment_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicyKind::default(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            increment_ms: default_increment_ms(),
        }
    }
}

impl RetryConfig {
    pub fn build_policy(&self) -> Arc<dyn RetryPolicy> {
        match self.policy {
            RetryPolicyKind::None => Arc::new(NoRetry),
            RetryPolicyKind::Linear => Arc::new(Linear::new(
                self.max_retries,
                Duration::from_millis(self.initial_delay_ms),
                Duration::from_millis(self.increment_ms),
            )),
        }
    }
}

fn default_poll_interval() -> u64 {
    2
}

fn default_report_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    16
}

// Retries after 1s, 3s and 5s.
fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_increment_ms() -> u64 {
    2000
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_endpoint.trim().is_empty() {
            return Err(AgentError::Config("server_endpoint is required".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(AgentError::Config("poll_interval_secs must be > 0".into()));
        }
        if self.report_interval_secs == 0 {
            return Err(AgentError::Config("report_interval_secs must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AgentError::Config("request_timeout_secs must be > 0".into()));
        }
        if self.delivery.mode == DeliveryMode::WorkerPool {
            if self.delivery.workers == 0 {
                return Err(AgentError::Config("delivery.workers must be > 0".into()));
            }
            if self.delivery.queue_capacity == 0 {
                return Err(AgentError::Config(
                    "delivery.queue_capacity must be > 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Base URL of the aggregation service, with a scheme derived from `tls`
    /// when the endpoint has none.
    pub fn endpoint_url(&self) -> String {
        let addr = self.server_endpoint.trim();
        if addr.contains("://") {
            return addr.to_string();
        }
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{addr}")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
