//! Replay gate: ids the agent authored or already enqueued.
//!
//! The dispatcher records the id of every reply it sends. When the transport
//! redelivers that reply as a new event, the inbox finds the id here, removes
//! it, and drops the echo. Startup replay records the ids it enqueues so the
//! same history event is never enqueued twice.

use std::sync::Arc;

use dashmap::DashSet;
use parley_types::event::EventId;

/// Concurrent set of event ids, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct ReplayGate {
    ids: Arc<DashSet<EventId>>,
}

impl ReplayGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id. Returns `false` if it was already present.
    pub fn insert(&self, id: EventId) -> bool {
        self.ids.insert(id)
    }

    /// Remove an id, returning whether it was present.
    pub fn take(&self, id: &EventId) -> bool {
        self.ids.remove(id).is_some()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
