// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::ConfigError;
use serde::Deserialize;

/// Knobs the lossy output-queued router pipeline itself consumes.
///
/// Topology construction and routing-table lookup are out of scope for this
/// core; `routing_function` and `topology` are carried here only because the
/// router needs to know their *names* were resolved by something upstream —
/// the core itself takes a `Box<dyn RoutingFunction>` already built.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    pub num_vcs: u32,
    pub routing_delay: u64,
    pub crossbar_latency: Option<u64>,
    pub crossbar_delay: u64,
    pub credit_delay: u64,
    #[serde(default = "one")]
    pub input_speedup: u32,
    #[serde(default = "one")]
    pub output_speedup: u32,
    #[serde(default)]
    pub use_endpoint_crediting: bool,
    pub output_buffer_size_in_kb: f64,
    pub router_total_buffer_size: u32,
    #[serde(default)]
    pub switch_drop_rate: f64,
    pub routing_function: String,
    pub topology: String,
    /// Bytes per flit, used to convert `output_buffer_size_in_kb` into a
    /// flit count the same way the original scales `gFlitSize`.
    #[serde(default = "default_flit_size")]
    pub flit_size_bytes: u32,
}

fn one() -> u32 {
    1
}

fn default_flit_size() -> u32 {
    16
}

impl RouterConfig {
    /// Validate the knobs and derive `output_buffer_size` (in flits) from
    /// `output_buffer_size_in_kb`, matching
    /// `int(output_buffer_size_in_kb * 1000 / gFlitSize)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_vcs == 0 {
            return Err(ConfigError::InvalidRouterKnob {
                field: "num_vcs",
                reason: "must be at least 1".into(),
            });
        }
        if self.input_speedup == 0 || self.output_speedup == 0 {
            return Err(ConfigError::InvalidRouterKnob {
                field: "input_speedup/output_speedup",
                reason: "must be at least 1".into(),
            });
        }
        if self.output_buffer_size_in_kb < 0.0 {
            return Err(ConfigError::InvalidRouterKnob {
                field: "output_buffer_size_in_kb",
                reason: "must be non-negative".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.switch_drop_rate) {
            return Err(ConfigError::InvalidRouterKnob {
                field: "switch_drop_rate",
                reason: "must be within [0, 1]".into(),
            });
        }
        Ok(())
    }

    /// Output buffer capacity in flits.
    #[must_use]
    pub fn output_buffer_size_flits(&self) -> u32 {
        ((self.output_buffer_size_in_kb * 1000.0) / f64::from(self.flit_size_bytes)) as u32
    }
}
