//! Chat transport trait.
//!
//! A transport connects the agent to rooms. Incoming events reach the agent
//! through an [`Inbox`](crate::queue::Inbox) the transport holds; everything
//! the dispatcher needs to do in return goes through [`Transport`].
//!
//! Only `user_id`, `rooms`, `voice` and `send` are required. Presence signals
//! (reactions, typing, read receipts) default to no-ops for transports that
//! lack them.

use std::future::Future;
use std::time::Duration;

use parley_types::error::TransportError;
use parley_types::event::{EventId, RoomId, RoomSnapshot, UserId};

pub trait Transport: Send + Sync {
    /// The agent's own identity on this transport.
    fn user_id(&self) -> &UserId;

    /// Rooms the agent belongs to, with their history oldest first.
    fn rooms(&self) -> impl Future<Output = Result<Vec<RoomSnapshot>, TransportError>> + Send;

    /// Whether the agent may speak in `room` unprompted.
    fn voice(&self, room: &RoomId) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Post a text message, returning the id the transport assigned to it.
    fn send(
        &self,
        room: &RoomId,
        text: &str,
    ) -> impl Future<Output = Result<EventId, TransportError>> + Send;

    /// React to an event. Returns the reaction's own id when it can later be
    /// removed.
    fn react(
        &self,
        _room: &RoomId,
        _event: &EventId,
        _key: &str,
    ) -> impl Future<Output = Result<Option<EventId>, TransportError>> + Send {
        async { Ok(None) }
    }

    /// Remove an event the agent previously sent (e.g. a reaction).
    fn redact(
        &self,
        _room: &RoomId,
        _event: &EventId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }

    /// Raise or lower the typing indicator.
    fn typing(
        &self,
        _room: &RoomId,
        _active: bool,
        _timeout: Duration,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }

    /// Mark an event as read.
    fn confirm(
        &self,
        _room: &RoomId,
        _event: &EventId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }
}
