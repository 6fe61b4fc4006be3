use crate::Collector;
use anyhow::Result;
use oxmon_common::types::Sample;
use rand::Rng;

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

/// Agent self-telemetry: a `PollCount` counter incremented once per poll and a
/// `RandomValue` gauge the server can use to verify that fresh values arrive.
#[derive(Default)]
pub struct RuntimeCollector;

impl RuntimeCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&mut self) -> Result<Vec<Sample>> {
        let random: f64 = rand::thread_rng().gen();
        Ok(vec![
            Sample::counter(POLL_COUNT, 1),
            Sample::gauge(RANDOM_VALUE, random),
        ])
    }
}
