// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use metrics::counter;

/// Recorders a workload component updates on `test`/`get`/`eject` tallies.
#[derive(Debug, Clone)]
pub struct WorkloadStats {
    component: String,
}

impl WorkloadStats {
    #[must_use]
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_owned(),
        }
    }

    pub fn record_test(&self, hit: bool) {
        counter!("workload_test_total", "component" => self.component.clone(), "hit" => hit.to_string())
            .increment(1);
    }

    pub fn record_get(&self) {
        counter!("workload_get_total", "component" => self.component.clone()).increment(1);
    }

    pub fn record_eject(&self) {
        counter!("workload_eject_total", "component" => self.component.clone()).increment(1);
    }
}
