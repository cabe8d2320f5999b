// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

/// Fatal conditions raised while selecting or running a collective
/// algorithm. Unlike [`config::ConfigError`], these can also surface at
/// runtime (an unimplemented algorithm is only reached once its operation
/// actually executes), so they get their own type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectiveError {
    #[error("collxl: bad {kind} algorithm: {name:?}")]
    UnknownAlgorithm { kind: &'static str, name: String },

    #[error("collxl: {name} not implemented")]
    Unimplemented { name: &'static str },

    #[error("usage: collxl(<barrier-alg>,<reduce-alg>,<broadcast-alg>)")]
    TooManyOptions,
}
