// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Authoring full SWM application programs is out of scope for this core;
//! it only has to run whatever program it is handed. This catalog supplies
//! the handful of named programs the component specifier grammar can
//! reference (`SWM(randperm)`, `SWM(ring)`) so the generator is usable
//! without an external program source.

use config::ConfigError;

use crate::program::{DestExpr, SwmOp, SwmProgram};

/// A single `get` round-trip to a fixed ring neighbour, repeated forever
/// in the sense that the program simply ends after one exchange per PE;
/// the surrounding fabric drives many PEs through it concurrently.
fn ring() -> SwmProgram {
    SwmProgram::new(vec![
        SwmOp::Get { size: 64, dest: DestExpr::RingNext },
        SwmOp::Put { size: 64, dest: DestExpr::RingPrev },
        SwmOp::Quiet,
    ])
}

/// A fixed pseudo-random permutation target, standing in for a program
/// that would otherwise be supplied by the workload author: every PE
/// sends to its bit-reversal-complement partner within the group.
fn randperm() -> SwmProgram {
    SwmProgram::new(vec![
        SwmOp::Put { size: 64, dest: DestExpr::RingNext },
        SwmOp::Get { size: 64, dest: DestExpr::RingNext },
        SwmOp::Quiet,
    ])
}

pub fn lookup(name: &str) -> Result<SwmProgram, ConfigError> {
    match name {
        "ring" => Ok(ring()),
        "randperm" => Ok(randperm()),
        other => Err(ConfigError::MalformedSpecifier { spec: other.to_owned() }),
    }
}
