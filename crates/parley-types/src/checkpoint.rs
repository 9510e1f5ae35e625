//! Persisted agent checkpoint: recurrent state plus per-room watermarks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventId, RoomId};
use crate::model::RecurrentState;

/// Per-room "last folded event" ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermarks(BTreeMap<RoomId, EventId>);

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room: &RoomId) -> Option<&EventId> {
        self.0.get(room)
    }

    /// Record `event` as the last one folded for `room`.
    pub fn record(&mut self, room: RoomId, event: EventId) {
        self.0.insert(room, event);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &EventId)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything needed to resume the agent without refolding history.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Model identity this state belongs to.
    pub model: String,
    /// Shared conversational state.
    pub state: RecurrentState,
    /// Per-room states, only populated when rooms are isolated.
    pub room_states: BTreeMap<RoomId, RecurrentState>,
    pub watermarks: Watermarks,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(model: impl Into<String>, state: RecurrentState) -> Self {
        Self {
            model: model.into(),
            state,
            room_states: BTreeMap::new(),
            watermarks: Watermarks::new(),
            saved_at: Utc::now(),
        }
    }
}
