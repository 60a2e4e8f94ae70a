// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the governor.
//!
//! Only construction and configuration can fail. Everything the monitor
//! loop encounters at runtime (provider failures, panicking callbacks) is
//! logged and absorbed.

use resource_monitor::DomainId;

/// A configuration value was rejected. The previously active configuration
/// stays in effect.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Tier bounds for a metric are not strictly increasing.
    #[error("{domain}: {metric} thresholds must be strictly increasing ({detail})")]
    NonMonotonic {
        domain: String,
        metric: &'static str,
        detail: String,
    },

    /// A scalar is outside its permitted range.
    #[error("{field} = {value} is out of range: expected {expected}")]
    OutOfRange {
        field: String,
        value: f64,
        expected: &'static str,
    },

    /// Two `[[gpus]]` entries share an index.
    #[error("gpu index {0} is configured more than once")]
    DuplicateGpu(u32),

    /// A GPU's `memory_total` could not be parsed.
    #[error("gpu{index}: invalid memory_total: {source}")]
    InvalidMemoryTotal {
        index: u32,
        #[source]
        source: memory_ledger::LedgerError,
    },

    /// The configuration file could not be read.
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// TOML serialise error.
    #[error("TOML serialise error: {0}")]
    Serialise(String),
}

/// Errors surfaced synchronously by [`Governor`](crate::Governor)
/// construction and lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum GovernorError {
    /// The static configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Neither the system domain nor any GPU is enabled.
    #[error("no domains to govern: enable the system domain or configure at least one GPU")]
    NoDomains,

    /// A metrics source was supplied for a domain that is not configured.
    #[error("metrics source supplied for unconfigured domain '{0}'")]
    UnknownDomain(DomainId),

    /// The domain has no memory ledger yet: its total is neither configured
    /// nor reported by a sample.
    #[error("no memory ledger for domain '{0}'")]
    NoLedger(DomainId),

    /// The ledger refused the request.
    #[error(transparent)]
    Ledger(#[from] memory_ledger::LedgerError),

    /// The monitor thread could not be spawned.
    #[error("failed to spawn monitor thread: {0}")]
    Spawn(#[source] std::io::Error),
}
