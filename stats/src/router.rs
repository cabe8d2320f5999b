// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use metrics::{counter, gauge};

/// Recorders a single router instance updates each cycle. `node` is baked
/// into every metric as a label so per-node dashboards can slice on it.
#[derive(Debug, Clone)]
pub struct RouterStats {
    node: String,
}

impl RouterStats {
    #[must_use]
    pub fn new(node_id: u32) -> Self {
        Self {
            node: node_id.to_string(),
        }
    }

    pub fn record_head_dropped(&self, output: u32) {
        counter!("router_head_drops_total", "node" => self.node.clone(), "output" => output.to_string())
            .increment(1);
    }

    pub fn record_flit_dropped(&self, output: u32) {
        counter!("router_flit_drops_total", "node" => self.node.clone(), "output" => output.to_string())
            .increment(1);
    }

    pub fn record_flit_sent(&self, output: u32) {
        counter!("router_flits_sent_total", "node" => self.node.clone(), "output" => output.to_string())
            .increment(1);
    }

    pub fn record_output_occupancy(&self, output: u32, occupancy: u32) {
        gauge!("router_output_buffer_occupancy", "node" => self.node.clone(), "output" => output.to_string())
            .set(f64::from(occupancy));
    }

    pub fn record_crossbar_occupancy(&self, occupancy: u32) {
        gauge!("router_crossbar_occupancy", "node" => self.node.clone()).set(f64::from(occupancy));
    }
}
