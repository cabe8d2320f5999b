// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The scalable-workload-model engine: a finite-instruction-sequence
//! stand-in for SWM's original stackful-coroutine scripts (see
//! [`program`]), the per-PE resumable state machine that runs one such
//! program ([`thread`]), and the `SWM` generator that exposes a whole
//! fleet of them through the workload component contract.

mod catalog;
mod generator;
pub mod program;
mod roi;
mod thread;

pub use generator::Swm;
pub use roi::RoiTracker;
pub use thread::{Overheads, SwmState, SwmThread};

use config::{ConfigError, WorkloadConfig};
use pipeline::{ComponentRegistry, WorkloadComponent};

fn build_swm(options: &[String]) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let name = options.first().map(String::as_str).unwrap_or("randperm");
    let program = catalog::lookup(name)?;
    let overheads = Overheads::default();
    Ok(Box::new(Swm::new(program, overheads, true)))
}

/// Builds the `SWM` generator with the region-of-interest knobs taken from
/// [`WorkloadConfig`], since those live outside the plain specifier options
/// a [`ComponentRegistry`] factory sees.
pub fn build_swm_with_config(options: &[String], cfg: &WorkloadConfig) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let name = options.first().map(String::as_str).unwrap_or("randperm");
    let program = catalog::lookup(name)?;
    let overheads = Overheads::default();
    let roi = RoiTracker::new(cfg.roi, cfg.roi_begin as i32, cfg.roi_end as i32, cfg.roi_begin_count, cfg.roi_end_count);
    Ok(Box::new(Swm::with_roi(program, overheads, true, roi)))
}

/// Registers the `SWM` generator name on a shared registry. Only reachable
/// through the generic path when region-of-interest tracking is disabled;
/// [`build_swm_with_config`] is the entry point that wires real knobs.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_generator("SWM", build_swm);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_program_name_is_rejected() {
        assert!(build_swm(&["nonexistent".to_owned()]).is_err());
    }

    #[test]
    fn default_program_name_is_randperm() {
        assert!(build_swm(&[]).is_ok());
    }

    #[test]
    fn register_exposes_swm_under_its_own_name() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry);
        assert!(registry.build_generator("SWM", &["ring".to_owned()]).is_ok());
    }
}
