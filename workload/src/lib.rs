// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Concrete workload components: the `random` generator, its injection
//! processes and traffic patterns, and the modifier stack (`Mppn`,
//! `packetize`, `latency`, `local`, `smc`, `trace`) that wraps generators
//! from this crate or from `swm`/`collectives`.

pub mod generators;
pub mod injection;
pub mod modifiers;
mod registry;
pub mod traffic;

pub use registry::{build_stack, default_registry};
