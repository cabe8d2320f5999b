// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::ConfigError;
use serde::Deserialize;

/// A scalar knob or a per-node array, as the original config format allows
/// for `injection_rate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PerNode<T> {
    Scalar(T),
    Array(Vec<T>),
}

impl<T: Copy> PerNode<T> {
    #[must_use]
    pub fn get(&self, node: usize) -> T {
        match self {
            PerNode::Scalar(v) => *v,
            PerNode::Array(vs) => vs[node % vs.len()],
        }
    }
}

/// Knobs the workload component pipeline consumes: injection, traffic
/// pattern, packet sizing, the SWM app-run mode, and the collective radix.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    pub injection_rate: PerNode<f64>,
    #[serde(default)]
    pub injection_rate_uses_flits: i64,
    pub traffic: String,
    #[serde(default)]
    pub use_read_write: bool,
    #[serde(default)]
    pub write_fraction: f64,
    pub packet_size: u32,
    #[serde(default)]
    pub read_request_size: Option<u32>,
    #[serde(default)]
    pub read_reply_size: Option<u32>,
    #[serde(default)]
    pub write_request_size: Option<u32>,
    #[serde(default)]
    pub write_reply_size: Option<u32>,
    #[serde(default)]
    pub packet_size_rate: Option<Vec<f64>>,

    #[serde(default)]
    pub swm_app_run_mode: bool,
    #[serde(default = "minus_one")]
    pub swm_active_nodes: i64,

    #[serde(default)]
    pub roi: bool,
    #[serde(default)]
    pub roi_begin: u64,
    #[serde(default)]
    pub roi_end: u64,
    #[serde(default)]
    pub roi_begin_count: u64,
    #[serde(default)]
    pub roi_end_count: u64,

    pub fabric: String,
    #[serde(default = "two")]
    pub k: u32,
}

fn minus_one() -> i64 {
    -1
}

fn two() -> u32 {
    2
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.injection_rate_uses_flits != 0 {
            return Err(ConfigError::InjectionRateUsesFlits {
                value: self.injection_rate_uses_flits,
            });
        }
        if self.packet_size_rate.is_some() {
            return Err(ConfigError::UnsupportedPacketSizeRate);
        }
        Ok(())
    }

    /// Number of active nodes, resolving the `-1` "use all nodes" sentinel.
    #[must_use]
    pub fn active_nodes(&self, total_nodes: usize) -> usize {
        if self.swm_active_nodes < 0 {
            total_nodes
        } else {
            self.swm_active_nodes as usize
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> WorkloadConfig {
        serde_yaml_ng::from_str(
            r"
injection_rate: 0.1
traffic: uniform
packet_size: 1
fabric: mesh
",
        )
        .unwrap()
    }

    #[test]
    fn scalar_injection_rate_broadcasts() {
        let cfg = sample();
        assert!((cfg.injection_rate.get(0) - 0.1).abs() < f64::EPSILON);
        assert!((cfg.injection_rate.get(7) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn active_nodes_defaults_to_total() {
        let cfg = sample();
        assert_eq!(cfg.active_nodes(16), 16);
    }

    #[test]
    fn rejects_flit_based_injection_rate() {
        let mut cfg = sample();
        cfg.injection_rate_uses_flits = 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InjectionRateUsesFlits { value: 1 })
        ));
    }
}
