// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII reservation guard.
//!
//! A [`Reservation`] releases its ledger entry when dropped, so a job that
//! panics or returns early cannot leak GPU memory accounting.

use crate::ledger::LedgerInner;
use std::sync::Arc;

/// A reservation that is released when the guard goes out of scope.
///
/// # Example
/// ```
/// use memory_ledger::GpuMemoryLedger;
///
/// let ledger = GpuMemoryLedger::new("gpu0", 1000, 1000);
/// {
///     let _model = ledger.reserve("model-weights", 600).unwrap();
///     assert_eq!(ledger.available_mb(), 400);
/// }
/// assert_eq!(ledger.available_mb(), 1000);
/// ```
pub struct Reservation {
    id: String,
    size_mb: u64,
    generation: u64,
    ledger: Arc<LedgerInner>,
    /// Set once the entry has been released or handed over.
    done: bool,
}

impl Reservation {
    pub(crate) fn new(id: String, size_mb: u64, generation: u64, ledger: Arc<LedgerInner>) -> Self {
        Self {
            id,
            size_mb,
            generation,
            ledger,
            done: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size_mb(&self) -> u64 {
        self.size_mb
    }

    /// Releases the reservation now. Returns `false` if it had already been
    /// removed through [`GpuMemoryLedger::deallocate`](crate::GpuMemoryLedger::deallocate).
    pub fn release(mut self) -> bool {
        self.done = true;
        self.ledger.release(&self.id, self.generation)
    }

    /// Keeps the reservation active after the guard is dropped. It must then
    /// be released by id.
    pub fn detach(mut self) -> String {
        self.done = true;
        std::mem::take(&mut self.id)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.done {
            self.ledger.release(&self.id, self.generation);
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("id", &self.id)
            .field("size_mb", &self.size_mb)
            .field("active", &!self.done)
            .finish()
    }
}
