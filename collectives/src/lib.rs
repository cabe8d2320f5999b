// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Collective-operations accelerator: barrier, all-reduce and broadcast
//! implemented as a workload modifier sitting between a PE and the fabric.
//! Intercepts collective requests, runs the configured algorithm as
//! node-to-node sync traffic, and replies once every participant is done.

mod algorithm;
mod error;
mod generator;
mod node;
mod tree;

pub use error::CollectiveError;
pub use generator::CollectiveAccelerator;

use config::ConfigError;
use pipeline::{ComponentRegistry, WorkloadComponent};

/// Default radix used when no [`config::WorkloadConfig`] is available to
/// supply the real `k` knob (the plain registry path below).
const DEFAULT_RADIX: u32 = 2;

fn parse_collxl_options(options: &[String]) -> Result<(String, String, String), ConfigError> {
    if options.len() > 3 {
        return Err(ConfigError::WrongOptionCount { name: "collxl".into(), expected: 3, got: options.len() });
    }
    let barrier = options.first().cloned().unwrap_or_else(|| "tree".into());
    let allreduce = options.get(1).cloned().unwrap_or_else(|| "ring".into());
    let bcast = options.get(2).cloned().unwrap_or_else(|| "tree".into());
    Ok((barrier, allreduce, bcast))
}

/// `collxl(<barrier-alg>,<reduce-alg>,<broadcast-alg>)`; every position is
/// optional and defaults to the algorithm used when the corpus this core
/// was learned from leaves the option off. Only reachable through the
/// generic registry path, which has no [`config::WorkloadConfig`] to source
/// the collective radix from, so it falls back to [`DEFAULT_RADIX`];
/// [`build_collxl_with_config`] is the entry point that wires the real `k`.
fn build_collxl(options: &[String], inner: Box<dyn WorkloadComponent>) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let (barrier, allreduce, bcast) = parse_collxl_options(options)?;
    Ok(Box::new(CollectiveAccelerator::new(inner, DEFAULT_RADIX, barrier, allreduce, bcast)))
}

/// Builds the accelerator with its radix taken from [`config::WorkloadConfig::k`],
/// the collective radix knob a plain-`fn` registry factory can't see.
pub fn build_collxl_with_config(
    options: &[String],
    inner: Box<dyn WorkloadComponent>,
    cfg: &config::WorkloadConfig,
) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let (barrier, allreduce, bcast) = parse_collxl_options(options)?;
    Ok(Box::new(CollectiveAccelerator::new(inner, cfg.k, barrier, allreduce, bcast)))
}

pub fn register(registry: &mut ComponentRegistry) {
    registry.register_modifier("collxl", build_collxl);
}

#[cfg(test)]
mod test {
    use super::*;

    struct Stub;
    impl WorkloadComponent for Stub {
        fn init(&mut self, _pes: u32) {}
        fn test(&mut self, _src: pipeline::Pe, _now: u64) -> bool {
            false
        }
        fn get(&mut self, _src: pipeline::Pe, _now: u64) -> Option<std::rc::Rc<pipeline::Message>> {
            None
        }
        fn next(&mut self, _src: pipeline::Pe, _now: u64) {}
        fn eject(&mut self, _dest: pipeline::Pe, _msg: std::rc::Rc<pipeline::Message>, _now: u64) {}
    }

    #[test]
    fn too_many_options_is_rejected_at_construction() {
        let options = vec!["tree".into(), "ring".into(), "tree".into(), "extra".into()];
        assert_eq!(
            build_collxl(&options, Box::new(Stub)).unwrap_err(),
            ConfigError::WrongOptionCount { name: "collxl".into(), expected: 3, got: 4 }
        );
    }

    #[test]
    fn register_exposes_collxl_under_its_own_name() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry);
        assert!(registry.apply_modifier("collxl", &[], Box::new(Stub)).is_ok());
    }
}
