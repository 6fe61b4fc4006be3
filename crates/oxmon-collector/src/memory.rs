use crate::Collector;
use anyhow::Result;
use oxmon_common::types::Sample;
use sysinfo::System;

pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Vec<Sample>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let available = self.system.available_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        Ok(vec![
            Sample::gauge("memory.total", total as f64),
            Sample::gauge("memory.used", used as f64),
            Sample::gauge("memory.available", available as f64),
            Sample::gauge("memory.used_percent", percent(used, total)),
            Sample::gauge("memory.swap_total", swap_total as f64),
            Sample::gauge("memory.swap_used", swap_used as f64),
            Sample::gauge("memory.swap_percent", percent(swap_used, swap_total)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_zero_total() {
        assert_eq!(percent(10, 0), 0.0);
        assert!((percent(25, 100) - 25.0).abs() < f64::EPSILON);
    }
}
