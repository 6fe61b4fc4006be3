use serde::{Deserialize, Serialize};

/// The fixed kind of a metric.
///
/// # Examples
///
/// ```
/// use oxmon_common::types::MetricKind;
///
/// let kind: MetricKind = "Counter".parse().unwrap();
/// assert_eq!(kind, MetricKind::Counter);
/// assert_eq!(kind.to_string(), "counter");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

/// A raw observation produced by a collector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// Additive increment.
    Counter(i64),
    /// Point-in-time reading.
    Gauge(f64),
}

impl SampleValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            SampleValue::Counter(_) => MetricKind::Counter,
            SampleValue::Gauge(_) => MetricKind::Gauge,
        }
    }
}

/// One `(id, kind, value)` observation handed from a collector to the agent's
/// buffers.
///
/// # Examples
///
/// ```
/// use oxmon_common::types::{MetricKind, Sample};
///
/// let s = Sample::counter("PollCount", 1);
/// assert_eq!(s.kind(), MetricKind::Counter);
/// assert_eq!(s.id, "PollCount");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub value: SampleValue,
}

impl Sample {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: SampleValue::Counter(delta),
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: SampleValue::Gauge(value),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Wire representation of a single reported metric.
///
/// A counter carries only `delta`, a gauge only `value`; the absent field is
/// omitted from the JSON body.
///
/// # Examples
///
/// ```
/// use oxmon_common::types::Metric;
///
/// let m = Metric::counter("PollCount", 5);
/// let json = serde_json::to_string(&m).unwrap();
/// assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":5}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metric {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
        }
    }
}
