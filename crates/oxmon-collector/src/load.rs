use crate::Collector;
use anyhow::Result;
use oxmon_common::types::Sample;
use sysinfo::System;

#[derive(Default)]
pub struct LoadCollector;

impl LoadCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for LoadCollector {
    fn name(&self) -> &str {
        "load"
    }

    fn collect(&mut self) -> Result<Vec<Sample>> {
        let load_avg = System::load_average();
        let uptime = System::uptime();

        Ok(vec![
            Sample::gauge("system.load_1", load_avg.one),
            Sample::gauge("system.load_5", load_avg.five),
            Sample::gauge("system.load_15", load_avg.fifteen),
            Sample::gauge("system.uptime", uptime as f64),
        ])
    }
}
