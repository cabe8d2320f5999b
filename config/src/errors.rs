// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

/// Configuration errors. All of these are fatal at construction time: the
/// core never retries or falls back to a default when a knob is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown injection process {name:?}")]
    UnknownInjectionProcess { name: String },

    #[error("unknown workload component {name:?}")]
    UnknownComponent { name: String },

    #[error("unknown routing function {name:?}")]
    UnknownRoutingFunction { name: String },

    #[error("malformed component specifier: {spec:?}")]
    MalformedSpecifier { spec: String },

    #[error("injection_rate_uses_flits must be 0, got {value}")]
    InjectionRateUsesFlits { value: i64 },

    #[error("component {name:?} expects {expected} option(s), got {got}")]
    WrongOptionCount {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("packet_size_rate is not supported by this core")]
    UnsupportedPacketSizeRate,

    #[error("invalid router knob {field:?}: {reason}")]
    InvalidRouterKnob { field: &'static str, reason: String },
}
