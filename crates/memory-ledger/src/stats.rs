// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ledger statistics for the dashboard and diagnostics.

use crate::AllocationRecord;

/// Cumulative counters kept alongside the live reservations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LedgerCounters {
    pub(crate) total_allocations: u64,
    pub(crate) total_deallocations: u64,
    pub(crate) denied_count: u64,
    pub(crate) peak_allocated_mb: u64,
}

impl LedgerCounters {
    pub(crate) fn record_allocation(&mut self, allocated_after_mb: u64) {
        self.total_allocations += 1;
        if allocated_after_mb > self.peak_allocated_mb {
            self.peak_allocated_mb = allocated_after_mb;
        }
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.total_deallocations += 1;
    }

    pub(crate) fn record_denial(&mut self) {
        self.denied_count += 1;
    }
}

/// A consistent view of one ledger, taken under its lock.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LedgerStats {
    /// Domain the ledger belongs to (e.g. `"gpu0"`).
    pub domain: String,
    /// Physical memory of the device.
    pub total_mb: u64,
    /// Admission ceiling; never exceeded by the sum of reservations.
    pub limit_mb: u64,
    /// Sum of active reservations.
    pub allocated_mb: u64,
    /// `limit_mb - allocated_mb`.
    pub available_mb: u64,
    /// Number of active reservations.
    pub count: usize,
    /// Active reservations, ordered by id.
    pub allocations: Vec<AllocationRecord>,
    /// High-water mark of `allocated_mb`.
    pub peak_allocated_mb: u64,
    /// Successful allocations since creation.
    pub total_allocations: u64,
    /// Reservations released since creation.
    pub total_deallocations: u64,
    /// Requests refused for any reason.
    pub denied_count: u64,
}

impl LedgerStats {
    /// Fraction of the limit currently reserved, in `[0.0, 1.0]`.
    pub fn utilisation(&self) -> f64 {
        if self.limit_mb == 0 {
            return 0.0;
        }
        self.allocated_mb as f64 / self.limit_mb as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} MB reserved ({:.0}%) in {} reservations, \
             peak {} MB, {} denied",
            self.domain,
            self.allocated_mb,
            self.limit_mb,
            self.utilisation() * 100.0,
            self.count,
            self.peak_allocated_mb,
            self.denied_count,
        )
    }
}
