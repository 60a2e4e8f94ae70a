// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The metrics-source capability consumed by the governor.
//!
//! A source never returns a `Result`: every outcome, including "this host
//! has no such device", is expressed as a [`Sample`] variant, so the caller
//! only interprets a tagged value and never has to know about provider
//! specific failure types.

use crate::{DomainId, ResourceSnapshot};

/// The outcome of asking a [`MetricsSource`] for one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// A successful reading.
    Snapshot(ResourceSnapshot),
    /// The domain cannot be observed on this host (no driver, no device).
    Unavailable { reason: String },
    /// The provider exists but this particular read failed.
    Error { reason: String },
}

impl Sample {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Returns the snapshot, if this sample carries one.
    pub fn snapshot(&self) -> Option<&ResourceSnapshot> {
        match self {
            Self::Snapshot(snap) => Some(snap),
            _ => None,
        }
    }

    /// Returns the failure reason for non-snapshot samples.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Snapshot(_) => None,
            Self::Unavailable { reason } | Self::Error { reason } => Some(reason),
        }
    }
}

/// A provider of point-in-time readings for one domain.
///
/// `sample` may block on OS or driver I/O; the governor only calls it from
/// its background worker. Implementations receive the domain and the sample
/// time so they can build the snapshot directly.
///
/// Any `Fn(&DomainId, u64) -> Sample` closure is a source:
/// ```
/// use resource_monitor::{DomainId, MetricsSource, ResourceSnapshot, Sample};
///
/// let source = |domain: &DomainId, now_ms: u64| {
///     Sample::Snapshot(ResourceSnapshot::new(domain.clone(), now_ms).with_cpu(12.5))
/// };
/// let sample = source.sample(&DomainId::System, 1_000);
/// assert_eq!(sample.snapshot().unwrap().cpu_percent, Some(12.5));
/// ```
pub trait MetricsSource: Send + Sync {
    /// Takes one reading of `domain` at `timestamp_ms`.
    fn sample(&self, domain: &DomainId, timestamp_ms: u64) -> Sample;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> MetricsSource for F
where
    F: Fn(&DomainId, u64) -> Sample + Send + Sync,
{
    fn sample(&self, domain: &DomainId, timestamp_ms: u64) -> Sample {
        self(domain, timestamp_ms)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// A source for a domain that has no provider on this host.
///
/// Always reports [`Sample::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl MetricsSource for UnavailableSource {
    fn sample(&self, _domain: &DomainId, _timestamp_ms: u64) -> Sample {
        Sample::unavailable(self.reason.clone())
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
