//! Sample sources for the oxmon agent.
//!
//! Each [`Collector`] observes one category of host or agent-runtime state
//! (CPU, memory, network, load, runtime) and returns raw [`Sample`]s. The
//! agent's poll loop feeds them into its per-metric buffers, so a collector
//! never needs to know how or when the values are reported.

pub mod cpu;
pub mod load;
pub mod memory;
pub mod network;
pub mod runtime;

use anyhow::Result;
use oxmon_common::types::Sample;

/// A metric source polled periodically on the agent host.
///
/// Every collector runs in its own poll task, so implementations only need to
/// be `Send`; they are never shared between tasks.
pub trait Collector: Send {
    /// Returns the collector name (e.g., `"cpu"`, `"network"`), used for
    /// logging.
    fn name(&self) -> &str;

    /// Collects the current samples.
    ///
    /// Counter samples carry the increment observed since the previous call,
    /// gauge samples the current reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn collect(&mut self) -> Result<Vec<Sample>>;
}

/// Converts an unsigned OS counter delta into a counter increment.
pub(crate) fn counter_delta(delta: u64) -> i64 {
    i64::try_from(delta).unwrap_or(i64::MAX)
}
