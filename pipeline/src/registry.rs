// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Component name resolution.
//!
//! The upstream source resolves component names via self-registering
//! factories run at static-init time, ordering-sensitive across translation
//! units. Here a [`ComponentRegistry`] is built explicitly by its caller —
//! generators and modifiers register themselves into one map each, and
//! `build_stack` folds a parsed specifier list into a concrete chain.

use std::collections::HashMap;

use config::{ComponentSpec, ConfigError};

use crate::component::WorkloadComponent;

/// Constructs a generator, the bottom of a component stack.
pub type GeneratorFactory = fn(options: &[String]) -> Result<Box<dyn WorkloadComponent>, ConfigError>;

/// Constructs a modifier wrapping an already-built inner component.
pub type ModifierFactory =
    fn(options: &[String], inner: Box<dyn WorkloadComponent>) -> Result<Box<dyn WorkloadComponent>, ConfigError>;

/// Name-indexed factory tables. Generators and modifiers are kept separate
/// because a specifier's first item must name a generator and every
/// subsequent item must name a modifier — conflating the two maps would let
/// a generator appear mid-stack.
#[derive(Default)]
pub struct ComponentRegistry {
    generators: HashMap<&'static str, GeneratorFactory>,
    modifiers: HashMap<&'static str, ModifierFactory>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_generator(&mut self, name: &'static str, factory: GeneratorFactory) {
        self.generators.insert(name, factory);
    }

    pub fn register_modifier(&mut self, name: &'static str, factory: ModifierFactory) {
        self.modifiers.insert(name, factory);
    }

    /// Build a generator by name. Exposed separately from [`Self::build_stack`]
    /// so a caller that needs out-of-band context (a config struct a plain
    /// `fn` factory cannot close over) can special-case a generator name and
    /// still reuse this registry for the rest of the chain.
    pub fn build_generator(&self, name: &str, options: &[String]) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
        let generator = self
            .generators
            .get(name)
            .ok_or_else(|| ConfigError::UnknownComponent { name: name.to_owned() })?;
        generator(options)
    }

    /// Wrap `inner` with the named modifier.
    pub fn apply_modifier(
        &self,
        name: &str,
        options: &[String],
        inner: Box<dyn WorkloadComponent>,
    ) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
        let modifier = self
            .modifiers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownComponent { name: name.to_owned() })?;
        modifier(options, inner)
    }

    /// Build a concrete component stack from a parsed specifier list.
    ///
    /// `specs[0]` must name a registered generator; every `specs[1..]` must
    /// name a registered modifier, each wrapping the component built by the
    /// previous step.
    pub fn build_stack(&self, specs: &[ComponentSpec]) -> Result<Box<dyn WorkloadComponent>, ConfigError> {
        let (head, rest) = specs.split_first().ok_or_else(|| ConfigError::MalformedSpecifier {
            spec: String::new(),
        })?;
        let mut stack = self.build_generator(&head.name, &head.options)?;
        for spec in rest {
            stack = self.apply_modifier(&spec.name, &spec.options, stack)?;
        }
        Ok(stack)
    }
}
