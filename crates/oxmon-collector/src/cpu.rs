use crate::Collector;
use anyhow::Result;
use oxmon_common::types::Sample;
use sysinfo::System;

pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Vec<Sample>> {
        self.system.refresh_cpu_all();
        let mut samples = Vec::with_capacity(self.system.cpus().len() + 1);

        samples.push(Sample::gauge(
            "cpu.usage",
            f64::from(self.system.global_cpu_usage()),
        ));

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            samples.push(Sample::gauge(
                format!("cpu.core_usage.{i}"),
                f64::from(cpu.cpu_usage()),
            ));
        }

        Ok(samples)
    }
}
