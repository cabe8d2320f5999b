// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Deserializable configuration knobs and the component-specifier grammar
//! parser shared by the router and workload pipelines.

mod errors;
mod router;
mod spec_grammar;
mod workload;

pub use errors::ConfigError;
pub use router::RouterConfig;
pub use spec_grammar::{ComponentSpec, parse_component_stack};
pub use workload::{PerNode, WorkloadConfig};
