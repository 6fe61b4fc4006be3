use crate::error::SendError;
use anyhow::anyhow;
use async_trait::async_trait;
use oxmon_common::types::Metric;
use reqwest::StatusCode;
use std::time::Duration;

/// Delivers metrics to the aggregation service.
///
/// Implementations must tag transient failures (timeouts, unavailability,
/// throttling, server errors) as [`SendError::Retryable`]; everything else is
/// [`SendError::Terminal`] and will not be retried.
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// Sends a single metric.
    async fn send(&self, metric: &Metric) -> Result<(), SendError>;

    /// Sends all `metrics` in one request.
    async fn send_batch(&self, metrics: &[Metric]) -> Result<(), SendError>;
}

/// JSON-over-HTTP sender: `POST {endpoint}/update/` for one metric and
/// `POST {endpoint}/updates/` for a batch.
pub struct HttpSender {
    client: reqwest::Client,
    update_url: String,
    updates_url: String,
}

impl HttpSender {
    /// `base_url` must include the scheme, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base = base_url.trim().trim_end_matches('/');
        Ok(Self {
            client,
            update_url: format!("{base}/update/"),
            updates_url: format!("{base}/updates/"),
        })
    }

    async fn post<T>(&self, url: &str, body: &T) -> Result<(), SendError>
    where
        T: serde::Serialize + ?Sized,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("[Failed to read response body: {e}]"));
        let err = anyhow!("HTTP {status} from {url}: {body}");
        if is_retryable_status(status) {
            Err(SendError::Retryable(err))
        } else {
            Err(SendError::Terminal(err))
        }
    }
}

#[async_trait]
impl MetricSender for HttpSender {
    async fn send(&self, metric: &Metric) -> Result<(), SendError> {
        self.post(&self.update_url, metric).await
    }

    async fn send_batch(&self, metrics: &[Metric]) -> Result<(), SendError> {
        self.post(&self.updates_url, metrics).await
    }
}

/// 408, 429 and 5xx responses are worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn classify_transport_error(err: reqwest::Error) -> SendError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SendError::retryable(err)
    } else {
        SendError::terminal(err)
    }
}
