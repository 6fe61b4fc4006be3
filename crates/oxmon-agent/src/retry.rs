//! Policy-driven retry for remote operations.
//!
//! [`RetryExecutor::run`] wraps any async operation that reports failures as
//! [`SendError`]. Terminal failures are returned at once; retryable ones are
//! re-attempted after the delays the [`RetryPolicy`] hands out, until the
//! policy's attempt cap is reached.
//!
//! ```rust,ignore
//! let retry = RetryExecutor::new(Arc::new(Linear::new(3, ms(1000), ms(2000))))
//!     .with_logging("send_batch");
//! retry.run(|| sender.send_batch(&metrics)).await?;
//! ```

use crate::error::SendError;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Stateless source of retry delays.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Number of retries after the initial attempt.
    fn max_attempts(&self) -> u32;

    /// Delay before the next retry. `previous` is `None` before the first
    /// retry, which yields the policy's initial delay.
    fn next_delay(&self, previous: Option<Duration>) -> Duration;
}

/// Never retries: any failure propagates after the first attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn max_attempts(&self) -> u32 {
        0
    }

    fn next_delay(&self, _previous: Option<Duration>) -> Duration {
        Duration::ZERO
    }
}

/// Delays grow by a fixed increment: `initial`, `initial + inc`,
/// `initial + 2 * inc`, ...
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub increment: Duration,
}

impl Linear {
    pub fn new(max_retries: u32, initial_delay: Duration, increment: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            increment,
        }
    }
}

impl RetryPolicy for Linear {
    fn max_attempts(&self) -> u32 {
        self.max_retries
    }

    fn next_delay(&self, previous: Option<Duration>) -> Duration {
        match previous {
            None => self.initial_delay,
            Some(prev) => prev.saturating_add(self.increment),
        }
    }
}

/// Decides whether a failed attempt may be retried.
pub type Classifier = Arc<dyn Fn(&SendError) -> bool + Send + Sync>;

fn tagged_retryable(err: &SendError) -> bool {
    err.is_retryable()
}

#[derive(Clone)]
pub struct RetryExecutor {
    policy: Arc<dyn RetryPolicy>,
    classifier: Classifier,
    label: Option<Cow<'static, str>>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Executor that trusts the [`SendError`] tag and logs nothing.
    pub fn new(policy: Arc<dyn RetryPolicy>) -> Self {
        Self {
            policy,
            classifier: Arc::new(tagged_retryable),
            label: None,
        }
    }

    /// Replaces the retryable/terminal decision.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Records scheduled, attempted and exhausted retries under `label`.
    pub fn with_logging(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Runs `op`, retrying retryable failures per the policy.
    ///
    /// The returned error has its retry tag stripped. Sleeps between attempts
    /// are not cancellable.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let mut last_err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !(self.classifier)(&last_err) {
            return Err(last_err.into_inner());
        }

        let max_attempts = self.policy.max_attempts();
        let mut delay = None;

        for attempt in 1..=max_attempts {
            let next = self.policy.next_delay(delay);
            delay = Some(next);

            if let Some(label) = &self.label {
                tracing::debug!(
                    op = %label,
                    attempt,
                    max_attempts,
                    delay_ms = next.as_millis() as u64,
                    error = %last_err,
                    "Scheduling retry"
                );
            }
            tokio::time::sleep(next).await;

            match op().await {
                Ok(value) => {
                    if let Some(label) = &self.label {
                        tracing::debug!(op = %label, attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if !(self.classifier)(&e) => {
                    if let Some(label) = &self.label {
                        tracing::warn!(
                            op = %label,
                            attempt,
                            error = %e,
                            "Retry hit a non-retryable error, giving up"
                        );
                    }
                    return Err(e.into_inner());
                }
                Err(e) => {
                    if let Some(label) = &self.label {
                        tracing::debug!(op = %label, attempt, error = %e, "Retry attempt failed");
                    }
                    last_err = e;
                }
            }
        }

        if let Some(label) = &self.label {
            tracing::warn!(
                op = %label,
                max_attempts,
                error = %last_err,
                "Retries exhausted"
            );
        }
        Err(last_err.into_inner())
    }
}
