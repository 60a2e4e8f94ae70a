// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the reservation ledger.

/// Reasons a ledger operation can be refused.
///
/// Ledger state is never modified when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A reservation with this id is already active.
    #[error("reservation '{0}' already exists")]
    DuplicateId(String),

    /// The request would push the ledger over its limit.
    #[error("capacity exceeded: requested {requested_mb} MB, but only {available_mb} MB available (limit: {limit_mb} MB)")]
    CapacityExceeded {
        requested_mb: u64,
        available_mb: u64,
        limit_mb: u64,
    },

    /// Zero-sized reservations are refused.
    #[error("cannot reserve zero megabytes")]
    ZeroSizedAllocation,

    /// No active reservation has this id.
    #[error("no reservation with id '{0}'")]
    UnknownId(String),

    /// A memory size string could not be parsed.
    #[error("invalid memory size '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },
}
