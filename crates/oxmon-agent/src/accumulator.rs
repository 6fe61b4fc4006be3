//! Per-metric staging buffer.
//!
//! An [`Accumulator`] keeps two slots: the *live* buffer that collectors write
//! into, and at most one *staged* extraction that is waiting for the outcome
//! of a delivery attempt. Staging moves everything out of the live buffer, so
//! samples arriving while a delivery is in flight never mix with the staged
//! copy. Committing drops the staged copy; rolling back merges it into
//! whatever has accumulated since, so a failed delivery loses nothing.

use crate::error::{AgentError, Result};
use oxmon_common::types::{Metric, MetricKind, SampleValue};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How a gauge's staged value is derived from the samples collected since
/// the previous stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeAggregation {
    /// Arithmetic mean of all samples.
    #[default]
    Mean,
    /// Most recent sample.
    Last,
}

impl GaugeAggregation {
    /// `values` must not be empty.
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            GaugeAggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            GaugeAggregation::Last => values.last().copied().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotValue {
    Counter(i64),
    Gauge(f64),
}

/// Immutable extraction of one accumulator's live buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub value: SnapshotValue,
}

impl Snapshot {
    pub fn to_metric(&self) -> Metric {
        match self.value {
            SnapshotValue::Counter(delta) => Metric::counter(self.id.clone(), delta),
            SnapshotValue::Gauge(value) => Metric::gauge(self.id.clone(), value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Buffer {
    /// `None` until the first increment since the last stage, so that an
    /// accumulated total of zero is still reported.
    Counter(Option<i64>),
    Gauge(Vec<f64>),
}

impl Buffer {
    fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Buffer::Counter(None),
            MetricKind::Gauge => Buffer::Gauge(Vec::new()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Buffer::Counter(delta) => delta.is_none(),
            Buffer::Gauge(values) => values.is_empty(),
        }
    }
}

#[derive(Debug)]
struct State {
    live: Buffer,
    staged: Option<Buffer>,
}

#[derive(Debug)]
pub struct Accumulator {
    id: String,
    kind: MetricKind,
    aggregation: GaugeAggregation,
    state: Mutex<State>,
}

impl Accumulator {
    pub fn new(id: impl Into<String>, kind: MetricKind, aggregation: GaugeAggregation) -> Self {
        Self {
            id: id.into(),
            kind,
            aggregation,
            state: Mutex::new(State {
                live: Buffer::empty(kind),
                staged: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    fn mismatch(&self, actual: MetricKind) -> AgentError {
        AgentError::KindMismatch {
            id: self.id.clone(),
            expected: self.kind,
            actual,
        }
    }

    /// Adds `delta` to the live pending increment.
    pub fn accumulate_counter(&self, delta: i64) -> Result<()> {
        let mut state = self.state.lock();
        match &mut state.live {
            Buffer::Counter(pending) => {
                *pending = Some(pending.map_or(delta, |p| p.saturating_add(delta)));
                Ok(())
            }
            Buffer::Gauge(_) => Err(self.mismatch(MetricKind::Counter)),
        }
    }

    /// Appends `value` to the live sample list.
    pub fn accumulate_gauge(&self, value: f64) -> Result<()> {
        let mut state = self.state.lock();
        match &mut state.live {
            Buffer::Gauge(values) => {
                values.push(value);
                Ok(())
            }
            Buffer::Counter(_) => Err(self.mismatch(MetricKind::Gauge)),
        }
    }

    pub fn accumulate(&self, value: SampleValue) -> Result<()> {
        match value {
            SampleValue::Counter(delta) => self.accumulate_counter(delta),
            SampleValue::Gauge(v) => self.accumulate_gauge(v),
        }
    }

    /// Moves the live buffer into the staged slot and returns its snapshot.
    ///
    /// Returns `Ok(None)` without touching the staged slot when nothing was
    /// accumulated since the last stage.
    pub fn stage_changes(&self) -> Result<Option<Snapshot>> {
        let mut state = self.state.lock();
        if state.staged.is_some() {
            return Err(AgentError::StageAlreadyPending {
                id: self.id.clone(),
            });
        }
        if state.live.is_empty() {
            return Ok(None);
        }

        let drained = std::mem::replace(&mut state.live, Buffer::empty(self.kind));
        let value = match &drained {
            Buffer::Counter(delta) => SnapshotValue::Counter(delta.unwrap_or_default()),
            Buffer::Gauge(values) => SnapshotValue::Gauge(self.aggregation.apply(values)),
        };
        state.staged = Some(drained);

        Ok(Some(Snapshot {
            id: self.id.clone(),
            value,
        }))
    }

    /// Drops the staged slot after a confirmed delivery. No-op when nothing
    /// is staged.
    pub fn commit_staged(&self) {
        self.state.lock().staged = None;
    }

    /// Returns the staged content to the live buffer after a failed delivery.
    ///
    /// Samples accumulated while the delivery was in flight are kept: counter
    /// increments are summed, gauge samples are concatenated with the staged
    /// (older) samples first. The order of gauge samples is not a guarantee
    /// callers should rely on. No-op when nothing is staged.
    pub fn rollback_staged(&self) {
        let mut state = self.state.lock();
        let Some(staged) = state.staged.take() else {
            return;
        };
        match (staged, &mut state.live) {
            (Buffer::Counter(Some(restored)), Buffer::Counter(live)) => {
                *live = Some(live.map_or(restored, |l| l.saturating_add(restored)));
            }
            (Buffer::Gauge(mut restored), Buffer::Gauge(live)) => {
                restored.append(live);
                *live = restored;
            }
            // Kind is fixed at construction, and an empty stage is never stored.
            _ => {}
        }
    }

    pub fn has_staged(&self) -> bool {
        self.state.lock().staged.is_some()
    }
}
