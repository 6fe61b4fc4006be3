use oxmon_common::types::MetricKind;

/// Errors raised by the agent's buffering and delivery pipeline.
///
/// Per-metric variants only ever affect their own metric id: the reporter logs
/// them and carries on with the rest of the cycle.
///
/// # Examples
///
/// ```rust
/// use oxmon_agent::error::AgentError;
/// use oxmon_common::types::MetricKind;
///
/// let err = AgentError::KindMismatch {
///     id: "PollCount".to_string(),
///     expected: MetricKind::Counter,
///     actual: MetricKind::Gauge,
/// };
/// assert!(err.to_string().contains("PollCount"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A sample of one kind was applied to a metric of the other kind.
    #[error("metric '{id}' is a {expected}, got a {actual} operation")]
    KindMismatch {
        id: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    /// A new stage was requested while the previous one is unresolved.
    #[error("metric '{id}' already has a staged snapshot awaiting resolution")]
    StageAlreadyPending { id: String },

    /// Remote delivery gave up after exhausting its retries.
    #[error("delivery of '{id}' failed: {message}")]
    DeliveryFailure { id: String, message: String },

    /// A delivery result referenced an id the registry does not know.
    #[error("unknown metric '{id}'")]
    UnknownMetric { id: String },

    /// The executor was used after `shutdown`.
    #[error("delivery executor has been shut down")]
    ExecutorShutdown,

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience `Result` alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Failure reported by a [`MetricSender`](crate::sender::MetricSender),
/// tagged with whether another attempt may succeed.
///
/// # Examples
///
/// ```rust
/// use oxmon_agent::error::SendError;
///
/// let err = SendError::retryable(anyhow::anyhow!("503 Service Unavailable"));
/// assert!(err.is_retryable());
/// assert_eq!(err.into_inner().to_string(), "503 Service Unavailable");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Transient condition (timeout, unavailable, throttled, 5xx).
    #[error(transparent)]
    Retryable(anyhow::Error),

    /// Any other failure; retrying will not help.
    #[error(transparent)]
    Terminal(anyhow::Error),
}

impl SendError {
    pub fn retryable(err: impl Into<anyhow::Error>) -> Self {
        Self::Retryable(err.into())
    }

    pub fn terminal(err: impl Into<anyhow::Error>) -> Self {
        Self::Terminal(err.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Strips the retry tag.
    pub fn into_inner(self) -> anyhow::Error {
        match self {
            Self::Retryable(e) | Self::Terminal(e) => e,
        }
    }
}
