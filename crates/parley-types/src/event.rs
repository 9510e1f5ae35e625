//! Chat event types delivered by a transport.
//!
//! Events are immutable once produced. Identifiers are opaque strings chosen
//! by the transport; the only assumption made about them is that an event id
//! is unique within its room and that history is returned in arrival order.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a room (channel, group chat) on the transport.
    RoomId
);

string_id!(
    /// Identifier of a single event, unique within its room.
    EventId
);

string_id!(
    /// Identifier of a participant, including the agent itself.
    UserId
);

/// What kind of room event this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Reaction,
    Membership,
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Message => "message",
            EventKind::Reaction => "reaction",
            EventKind::Membership => "membership",
            EventKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A single event observed in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub room_id: RoomId,
    pub event_id: EventId,
    pub sender: UserId,
    pub kind: EventKind,
    /// Message body for `Message` events, a textual rendering of the
    /// content for everything else.
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EventId>,
}

impl Event {
    /// Convenience constructor for a plain text message.
    pub fn message(
        room_id: impl Into<RoomId>,
        event_id: impl Into<EventId>,
        sender: impl Into<UserId>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            event_id: event_id.into(),
            sender: sender.into(),
            kind: EventKind::Message,
            payload: payload.into(),
            reply_to: None,
        }
    }

    pub fn is_message(&self) -> bool {
        self.kind == EventKind::Message
    }

    /// The text that represents this event in the conversation.
    pub fn text(&self) -> String {
        match self.kind {
            EventKind::Message => self.payload.clone(),
            kind => format!("{kind}: {}", self.payload),
        }
    }
}

/// A room the agent belongs to, as seen at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    /// Whether the agent may speak here without being addressed.
    pub voice: bool,
    /// Past events, oldest first.
    #[serde(default)]
    pub history: Vec<Event>,
}
