// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Event subscriptions with per-handler fault isolation.
//!
//! Handlers are kept per [`EventType`] in registration order. Dispatch
//! snapshots the handler list and releases the registry lock before
//! invoking anything, so a handler may itself register or unregister
//! callbacks. Each invocation is guarded individually: an `Err` return or
//! a panic is logged and the remaining handlers still run.

use crate::ResourceState;
use resource_monitor::{DomainId, ResourceSnapshot};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// The kinds of event a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Any change of classified state.
    StateChange,
    /// Entry into `BUSY`/`CRITICAL` from a non-throttling state.
    Throttle,
    /// Return to `IDLE`/`OPTIMAL`/`NORMAL` from `BUSY`/`CRITICAL`.
    Resume,
    /// Entry into `CRITICAL`.
    Critical,
    /// Temperature crossed its throttle bound upwards.
    Overheat,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        Self::StateChange,
        Self::Throttle,
        Self::Resume,
        Self::Critical,
        Self::Overheat,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateChange => "state_change",
            Self::Throttle => "throttle",
            Self::Resume => "resume",
            Self::Critical => "critical",
            Self::Overheat => "overheat",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Payload passed to every handler.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GovernorEvent {
    pub kind: EventType,
    pub domain: DomainId,
    pub previous: ResourceState,
    pub current: ResourceState,
    /// The reading that triggered the event, absent when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ResourceSnapshot>,
    pub timestamp_ms: u64,
}

/// What a handler returns. Errors are logged, never propagated.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Arc<dyn Fn(&GovernorEvent) -> HandlerResult + Send + Sync>;

/// Opaque handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

/// Per-event-type handler registry.
#[derive(Default)]
pub struct CallbackDispatcher {
    handlers: Mutex<BTreeMap<EventType, Vec<(CallbackId, Handler)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `kind`.
    pub fn register<F>(&self, kind: EventType, handler: F) -> CallbackId
    where
        F: Fn(&GovernorEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().entry(kind).or_default().push((id, Arc::new(handler)));
        debug!(event = %kind, handler = %id, "callback registered");
        id
    }

    /// Removes a registration. Returns `false` if `id` is unknown.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut handlers = self.lock();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                debug!(handler = %id, "callback unregistered");
                return true;
            }
        }
        false
    }

    /// Number of registered handlers across all event types.
    pub fn handler_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Invokes every handler registered for `event.kind`, in order.
    pub fn dispatch(&self, event: &GovernorEvent) -> DispatchReport {
        let snapshot: Vec<(CallbackId, Handler)> = match self.lock().get(&event.kind) {
            Some(list) => list.clone(),
            None => return DispatchReport::default(),
        };

        let mut report = DispatchReport::default();
        for (id, handler) in snapshot {
            report.invoked += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(event = %event.kind, handler = %id, domain = %event.domain, error = %e, "callback failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    error!(
                        event = %event.kind,
                        handler = %id,
                        domain = %event.domain,
                        panic = panic_message(&*payload),
                        "callback panicked"
                    );
                }
            }
        }
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<EventType, Vec<(CallbackId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Edge-triggered events implied by a state change, `StateChange` first.
///
/// `previous` is the state of the last tick. `baseline` is the last state
/// backed by a reading; the throttle, critical and resume edges are taken
/// against it, so an `Unavailable` tick in between neither re-arms nor
/// swallows them. `Overheat` is not state-derived and is decided separately.
pub fn transition_events(previous: ResourceState, baseline: ResourceState, current: ResourceState) -> Vec<EventType> {
    if previous == current {
        return Vec::new();
    }
    let mut events = vec![EventType::StateChange];
    if current.is_throttling() && !baseline.is_throttling() {
        events.push(EventType::Throttle);
    }
    if current == ResourceState::Critical && baseline != ResourceState::Critical {
        events.push(EventType::Critical);
    }
    if current.is_relaxed() && baseline.is_throttling() {
        events.push(EventType::Resume);
    }
    events
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
