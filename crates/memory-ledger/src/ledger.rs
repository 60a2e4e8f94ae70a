// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capacity-bounded admission control for named reservations.
//!
//! The [`GpuMemoryLedger`] does not allocate device memory itself. It is the
//! bookkeeping a job pipeline consults before it loads a model or a batch
//! onto a GPU:
//!
//! 1. Every reservation has a unique string id and a size in MB.
//! 2. A reservation is admitted only if the sum of all active reservations
//!    stays within `limit_mb`. Otherwise it is refused and nothing changes.
//! 3. All mutations happen under a single mutex per ledger, so the limit
//!    holds under any interleaving of concurrent callers.
//!
//! # Thread Safety
//! `GpuMemoryLedger` is cheap to clone (an `Arc` around the shared state)
//! and `Send + Sync`.

use crate::stats::LedgerCounters;
use crate::{LedgerError, LedgerStats, MemoryBudget, Reservation};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// One active reservation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AllocationRecord {
    pub id: String,
    pub domain: String,
    pub requested_mb: u64,
    /// Unix timestamp in milliseconds when the reservation was admitted.
    pub created_at_ms: u64,
}

#[derive(Debug)]
struct Entry {
    record: AllocationRecord,
    /// Distinguishes a re-used id from the reservation a guard was issued for.
    generation: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<String, Entry>,
    allocated_mb: u64,
    next_generation: u64,
    counters: LedgerCounters,
}

/// State shared between the ledger handle and outstanding [`Reservation`]s.
#[derive(Debug)]
pub(crate) struct LedgerInner {
    domain: String,
    total_mb: u64,
    limit_mb: u64,
    state: Mutex<LedgerState>,
}

impl LedgerInner {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // Every mutation leaves the state consistent before it can panic,
        // so a poisoned lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self, id: &str, requested_mb: u64, now_ms: u64) -> Result<u64, LedgerError> {
        let mut state = self.state();

        let refusal = if requested_mb == 0 {
            Some(LedgerError::ZeroSizedAllocation)
        } else if state.entries.contains_key(id) {
            Some(LedgerError::DuplicateId(id.to_string()))
        } else if state.allocated_mb.saturating_add(requested_mb) > self.limit_mb {
            Some(LedgerError::CapacityExceeded {
                requested_mb,
                available_mb: self.limit_mb.saturating_sub(state.allocated_mb),
                limit_mb: self.limit_mb,
            })
        } else {
            None
        };

        if let Some(err) = refusal {
            state.counters.record_denial();
            tracing::debug!(domain = %self.domain, id, requested_mb, "reservation denied: {err}");
            return Err(err);
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        state.allocated_mb += requested_mb;
        let allocated_after = state.allocated_mb;
        state.counters.record_allocation(allocated_after);
        state.entries.insert(
            id.to_string(),
            Entry {
                record: AllocationRecord {
                    id: id.to_string(),
                    domain: self.domain.clone(),
                    requested_mb,
                    created_at_ms: now_ms,
                },
                generation,
            },
        );
        tracing::debug!(domain = %self.domain, id, requested_mb, allocated_mb = allocated_after, "reservation admitted");
        Ok(generation)
    }

    fn remove(&self, id: &str, generation: Option<u64>) -> Result<AllocationRecord, LedgerError> {
        let mut state = self.state();
        let matches = state
            .entries
            .get(id)
            .map(|e| generation.map_or(true, |g| g == e.generation))
            .unwrap_or(false);
        if !matches {
            return Err(LedgerError::UnknownId(id.to_string()));
        }
        let entry = state
            .entries
            .remove(id)
            .ok_or_else(|| LedgerError::UnknownId(id.to_string()))?;
        state.allocated_mb -= entry.record.requested_mb;
        state.counters.record_deallocation();
        Ok(entry.record)
    }

    /// Called by `Reservation::drop`; only removes the exact reservation
    /// the guard was issued for.
    pub(crate) fn release(&self, id: &str, generation: u64) -> bool {
        self.remove(id, Some(generation)).is_ok()
    }
}

/// Admission controller over one device's memory.
///
/// # Example
/// ```
/// use memory_ledger::GpuMemoryLedger;
///
/// let ledger = GpuMemoryLedger::new("gpu0", 1000, 1000);
/// assert!(ledger.allocate("a", 700));
/// assert!(!ledger.allocate("b", 400)); // would exceed the limit
/// assert_eq!(ledger.available_mb(), 300);
/// assert!(ledger.deallocate("a"));
/// assert_eq!(ledger.available_mb(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct GpuMemoryLedger {
    inner: Arc<LedgerInner>,
}

impl GpuMemoryLedger {
    /// Creates a ledger for `domain` over `total_mb` of device memory with
    /// an admission ceiling of `limit_mb` (clamped to `total_mb`).
    pub fn new(domain: impl Into<String>, total_mb: u64, limit_mb: u64) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                domain: domain.into(),
                total_mb,
                limit_mb: limit_mb.min(total_mb),
                state: Mutex::new(LedgerState::default()),
            }),
        }
    }

    /// Creates a ledger whose limit is `fraction` of `total`.
    pub fn with_fraction(domain: impl Into<String>, total: MemoryBudget, fraction: f64) -> Self {
        Self::new(domain, total.as_mb(), total.scaled(fraction).as_mb())
    }

    /// Reserves `requested_mb` under `id`, returning the reason on refusal.
    pub fn try_allocate(&self, id: &str, requested_mb: u64) -> Result<(), LedgerError> {
        self.try_allocate_at(id, requested_mb, unix_now_ms())
    }

    /// Like [`try_allocate`](Self::try_allocate) with an explicit timestamp.
    pub fn try_allocate_at(&self, id: &str, requested_mb: u64, now_ms: u64) -> Result<(), LedgerError> {
        self.inner.admit(id, requested_mb, now_ms).map(|_| ())
    }

    /// Reserves `requested_mb` under `id`.
    ///
    /// Returns `false`, leaving the ledger untouched, if `id` is already
    /// reserved, `requested_mb` is zero, or the reservation would exceed
    /// the limit.
    pub fn allocate(&self, id: &str, requested_mb: u64) -> bool {
        self.try_allocate(id, requested_mb).is_ok()
    }

    /// Releases the reservation `id`, returning its record.
    pub fn try_deallocate(&self, id: &str) -> Result<AllocationRecord, LedgerError> {
        self.inner.remove(id, None)
    }

    /// Releases the reservation `id`. Returns `false` if there is none.
    pub fn deallocate(&self, id: &str) -> bool {
        self.try_deallocate(id).is_ok()
    }

    /// Reserves memory and returns a guard that releases it on drop.
    pub fn reserve(&self, id: &str, requested_mb: u64) -> Result<Reservation, LedgerError> {
        self.reserve_at(id, requested_mb, unix_now_ms())
    }

    /// Like [`reserve`](Self::reserve) with an explicit timestamp.
    pub fn reserve_at(&self, id: &str, requested_mb: u64, now_ms: u64) -> Result<Reservation, LedgerError> {
        let generation = self.inner.admit(id, requested_mb, now_ms)?;
        Ok(Reservation::new(
            id.to_string(),
            requested_mb,
            generation,
            Arc::clone(&self.inner),
        ))
    }

    /// Drops every active reservation. Returns how many were released.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state();
        let released = state.entries.len();
        state.entries.clear();
        state.allocated_mb = 0;
        for _ in 0..released {
            state.counters.record_deallocation();
        }
        released
    }

    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    pub fn total_mb(&self) -> u64 {
        self.inner.total_mb
    }

    pub fn limit_mb(&self) -> u64 {
        self.inner.limit_mb
    }

    /// Sum of active reservations.
    pub fn allocated_mb(&self) -> u64 {
        self.inner.state().allocated_mb
    }

    /// `limit_mb - allocated_mb`.
    pub fn available_mb(&self) -> u64 {
        self.inner.limit_mb.saturating_sub(self.allocated_mb())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.state().entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<AllocationRecord> {
        self.inner.state().entries.get(id).map(|e| e.record.clone())
    }

    /// Returns a consistent snapshot of the ledger.
    pub fn stats(&self) -> LedgerStats {
        let state = self.inner.state();
        LedgerStats {
            domain: self.inner.domain.clone(),
            total_mb: self.inner.total_mb,
            limit_mb: self.inner.limit_mb,
            allocated_mb: state.allocated_mb,
            available_mb: self.inner.limit_mb.saturating_sub(state.allocated_mb),
            count: state.entries.len(),
            allocations: state.entries.values().map(|e| e.record.clone()).collect(),
            peak_allocated_mb: state.counters.peak_allocated_mb,
            total_allocations: state.counters.total_allocations,
            total_deallocations: state.counters.total_deallocations,
            denied_count: state.counters.denied_count,
        }
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
