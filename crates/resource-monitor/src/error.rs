// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for resource monitoring.

/// Errors that can occur when reading system resources.
///
/// These never reach the governor's monitor loop directly: the concrete
/// sources fold them into [`Sample::Unavailable`](crate::Sample::Unavailable)
/// or [`Sample::Error`](crate::Sample::Error).
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Failed to read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse a numeric value from a system file.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// The expected sysfs/procfs path does not exist on this host.
    #[error("path not found: {path}")]
    NotAvailable { path: String },

    /// A domain identifier string could not be parsed.
    #[error("invalid domain id '{0}': expected 'system' or 'gpu<N>'")]
    InvalidDomain(String),
}
