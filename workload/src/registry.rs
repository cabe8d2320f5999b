// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Resolves a parsed component-specifier list into a concrete stack.
//!
//! `random`'s parameters (per-node injection rate, traffic pattern, packet
//! sizing, read/write split) and `SWM`'s region-of-interest knobs live in
//! [`WorkloadConfig`], not in the specifier string itself, so both are
//! special-cased here rather than routed through a plain-`fn` registry
//! factory; every other recognised name goes through [`ComponentRegistry`]
//! uniformly.

use config::{ComponentSpec, ConfigError, WorkloadConfig};
use pipeline::{ComponentRegistry, WorkloadComponent};

use crate::generators::random::Random;
use crate::injection::build_injection_process;
use crate::modifiers::local_shortcut::LocalShortcut;
use crate::modifiers::mppn::Mppn;
use crate::modifiers::on_node_latency::OnNodeLatency;
use crate::modifiers::packetize::Packetize;
use crate::modifiers::small_message_coalescing::SmallMessageCoalescing;
use crate::modifiers::trace::Trace;
use crate::traffic::{TrafficPattern, Uniform};

fn traffic_pattern(name: &str) -> Result<Box<dyn TrafficPattern>, ConfigError> {
    match name {
        "uniform" => Ok(Box::new(Uniform)),
        other => Err(ConfigError::UnknownComponent { name: other.into() }),
    }
}

fn build_random(cfg: &WorkloadConfig, num_nodes: u32, seed: u64) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let rate: Vec<f64> = (0..num_nodes.max(1) as usize).map(|n| cfg.injection_rate.get(n)).collect();
    let injection = build_injection_process("bernoulli", &[], &rate, num_nodes as usize)?;
    let pattern = traffic_pattern(&cfg.traffic)?;
    Ok(Box::new(Random::new(
        injection,
        pattern,
        seed,
        u64::from(cfg.packet_size),
        cfg.use_read_write,
        cfg.write_fraction,
    )))
}

fn parse_u32(s: &str) -> Result<u32, ConfigError> {
    s.parse().map_err(|_| ConfigError::MalformedSpecifier { spec: s.into() })
}

fn parse_u64(s: &str) -> Result<u64, ConfigError> {
    s.parse().map_err(|_| ConfigError::MalformedSpecifier { spec: s.into() })
}

fn local_latency(options: &[String]) -> Result<u64, ConfigError> {
    if options.len() != 1 {
        return Err(ConfigError::WrongOptionCount { name: "local".into(), expected: 1, got: options.len() });
    }
    parse_u64(&options[0])
}

fn build_local(cfg: &WorkloadConfig, options: &[String], inner: Box<dyn WorkloadComponent>) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    Ok(Box::new(LocalShortcut::new(inner, local_latency(options)?, cfg.use_read_write)))
}

/// Populate a registry with every modifier this crate implements; `random`
/// is deliberately absent since it needs [`WorkloadConfig`] context,
/// available only through [`build_stack`].
#[must_use]
pub fn default_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register_modifier("Mppn", |options, inner| {
        if options.len() != 1 {
            return Err(ConfigError::WrongOptionCount { name: "Mppn".into(), expected: 1, got: options.len() });
        }
        Ok(Box::new(Mppn::new(inner, parse_u32(&options[0])?)))
    });
    registry.register_modifier("packetize", |options, inner| {
        if options.len() != 4 {
            return Err(ConfigError::WrongOptionCount { name: "packetize".into(), expected: 4, got: options.len() });
        }
        // packetize(overhead, min_payload, max_payload, flit_size); min_payload
        // is parsed for compatibility but unused, matching the original.
        let fabric_overhead = parse_u64(&options[0])?;
        let _min_payload = parse_u64(&options[1])?;
        let max_payload = parse_u64(&options[2])?;
        let flit_size = parse_u64(&options[3])?;
        Ok(Box::new(Packetize::new(inner, max_payload, fabric_overhead, flit_size)))
    });
    registry.register_modifier("latency", |options, inner| {
        if options.len() != 2 {
            return Err(ConfigError::WrongOptionCount { name: "latency".into(), expected: 2, got: options.len() });
        }
        Ok(Box::new(OnNodeLatency::new(inner, parse_u64(&options[0])?, parse_u64(&options[1])?)))
    });
    registry.register_modifier("local", |options, inner| {
        Ok(Box::new(LocalShortcut::new(inner, local_latency(options)?, false)))
    });
    registry.register_modifier("smc", |options, inner| {
        if options.len() != 1 {
            return Err(ConfigError::WrongOptionCount { name: "smc".into(), expected: 1, got: options.len() });
        }
        Ok(Box::new(SmallMessageCoalescing::new(inner, parse_u32(&options[0])? as usize)))
    });
    registry.register_modifier("trace", |options, inner| Ok(Box::new(Trace::new(inner, options)?)));
    swm::register(&mut registry);
    collectives::register(&mut registry);
    registry
}

/// Build a full component stack from a parsed specifier list, special-casing
/// every name whose build needs [`WorkloadConfig`] knobs the generic
/// registry's plain-`fn` factories cannot see: `random` (injection/traffic
/// config), `SWM` (region-of-interest knobs), `local` (`use_read_write`) and
/// `collxl` (the collective radix `k`).
pub fn build_stack(
    registry: &ComponentRegistry,
    cfg: &WorkloadConfig,
    num_nodes: u32,
    seed: u64,
    specs: &[ComponentSpec],
) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
    let (head, rest) = specs.split_first().ok_or_else(|| ConfigError::MalformedSpecifier { spec: String::new() })?;
    let mut stack = if head.name == "random" {
        build_random(cfg, num_nodes, seed)?
    } else if head.name == "SWM" {
        swm::build_swm_with_config(&head.options, cfg)?
    } else {
        registry.build_generator(&head.name, &head.options)?
    };
    for spec in rest {
        stack = if spec.name == "local" {
            build_local(cfg, &spec.options, stack)?
        } else if spec.name == "collxl" {
            collectives::build_collxl_with_config(&spec.options, stack, cfg)?
        } else {
            registry.apply_modifier(&spec.name, &spec.options, stack)?
        };
    }
    Ok(stack)
}
