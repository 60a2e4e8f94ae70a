// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-ledger
//!
//! Admission control for GPU memory reservations.
//!
//! # Key Components
//!
//! - [`GpuMemoryLedger`] — the ledger: named reservations against a fixed
//!   limit, refused (never partially applied) when they would overflow it.
//! - [`Reservation`] — an RAII guard; dropping it releases the entry.
//! - [`LedgerStats`] — a consistent view for dashboards (live reservations,
//!   peak usage, denial count).
//! - [`MemoryBudget`] — human-readable sizes (`"8G"`, `"512M"`) used in
//!   configuration.
//!
//! # Ownership Model
//!
//! ```text
//! GpuMemoryLedger::reserve(id, mb)
//!       │
//!       ▼
//!   Reservation  ◄─── holds Arc<LedgerInner> + generation
//!       │
//!       │  drop()
//!       ▼
//!   LedgerInner::release(id, generation)
//! ```
//!
//! The boolean [`GpuMemoryLedger::allocate`] / [`GpuMemoryLedger::deallocate`]
//! pair is the primary interface; `try_*` variants return [`LedgerError`]
//! with the refusal reason.

mod budget;
mod error;
mod guard;
mod ledger;
mod stats;

pub use budget::MemoryBudget;
pub use error::LedgerError;
pub use guard::Reservation;
pub use ledger::{AllocationRecord, GpuMemoryLedger};
pub use stats::LedgerStats;
