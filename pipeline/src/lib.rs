// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! # Workload Component Pipeline
//!
//! A workload's traffic is produced by a chain of [`WorkloadComponent`]
//! implementations: one generator at the bottom (`Random`, `SWM`, the
//! collective accelerator) wrapped by zero or more modifiers (`Mppn`,
//! `Packetize`, `OnNodeLatency`, `LocalShortcut`, `SmallMessageCoalescing`,
//! `Trace`). Every layer answers the same four questions about a PE:
//! does it have something to send (`test`), what is it (`get`), move past
//! it (`next`), and deliver an arrival (`eject`).
//!
//! This crate defines that contract and the [`ComponentRegistry`] used to
//! resolve a parsed specifier list into a concrete stack; concrete
//! generators and modifiers are registered by the `workload` crate.

mod component;
mod message;
mod registry;

pub use component::WorkloadComponent;
pub use message::{BaseMessage, CollectiveOp, CollectiveRequest, Message, MessageKind, Pe};
pub use registry::{ComponentRegistry, GeneratorFactory, ModifierFactory};
