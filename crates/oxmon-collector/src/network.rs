use crate::{counter_delta, Collector};
use anyhow::Result;
use oxmon_common::types::Sample;
use std::collections::HashMap;
use sysinfo::Networks;

#[derive(Default, Clone, Copy)]
struct Totals {
    received: u64,
    transmitted: u64,
    packets_received: u64,
    packets_transmitted: u64,
}

/// Reports per-interface traffic as counters: each poll contributes the bytes
/// and packets seen since the previous poll.
pub struct NetworkCollector {
    networks: Networks,
    prev: HashMap<String, Totals>,
}

impl NetworkCollector {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();
        Self {
            networks,
            prev: HashMap::new(),
        }
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    fn collect(&mut self) -> Result<Vec<Sample>> {
        self.networks.refresh();
        let mut samples = Vec::new();

        for (name, data) in self.networks.iter() {
            let current = Totals {
                received: data.total_received(),
                transmitted: data.total_transmitted(),
                packets_received: data.total_packets_received(),
                packets_transmitted: data.total_packets_transmitted(),
            };
            // First sighting of an interface establishes the baseline.
            let prev = self.prev.insert(name.clone(), current).unwrap_or(current);

            samples.push(Sample::counter(
                format!("network.bytes_recv.{name}"),
                counter_delta(current.received.saturating_sub(prev.received)),
            ));
            samples.push(Sample::counter(
                format!("network.bytes_sent.{name}"),
                counter_delta(current.transmitted.saturating_sub(prev.transmitted)),
            ));
            samples.push(Sample::counter(
                format!("network.packets_recv.{name}"),
                counter_delta(current.packets_received.saturating_sub(prev.packets_received)),
            ));
            samples.push(Sample::counter(
                format!("network.packets_sent.{name}"),
                counter_delta(
                    current
                        .packets_transmitted
                        .saturating_sub(prev.packets_transmitted),
                ),
            ));
        }

        Ok(samples)
    }
}
