//! Event queue between transport delivery and the dispatcher.
//!
//! Built on an unbounded `tokio::sync::mpsc` channel: any number of
//! [`Inbox`] clones push without blocking, a single [`EventQueue`] drains.
//! Order is preserved per producer; interleaving between producers is
//! whatever the channel observes.

use parley_types::event::{Event, UserId};
use tokio::sync::mpsc;

use crate::gate::ReplayGate;

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed onto the queue.
    Queued,
    /// The agent's own message coming back; dropped and its id released.
    Echo,
    /// Not a message event; dropped.
    Ignored,
    /// The dispatcher is gone.
    Closed,
}

/// Create a connected inbox/queue pair for `agent`.
pub fn event_queue(agent: UserId, gate: ReplayGate) -> (Inbox, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Inbox { tx, agent, gate }, EventQueue { rx })
}

/// Producer handle given to transports. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Inbox {
    tx: mpsc::UnboundedSender<Event>,
    agent: UserId,
    gate: ReplayGate,
}

impl Inbox {
    /// Live delivery entry point. Never blocks.
    pub fn deliver(&self, event: Event) -> Delivery {
        if !event.is_message() {
            tracing::trace!(event_id = %event.event_id, kind = %event.kind, "ignoring non-message event");
            return Delivery::Ignored;
        }

        if event.sender == self.agent && self.gate.take(&event.event_id) {
            tracing::debug!(event_id = %event.event_id, room = %event.room_id, "absorbed self-echo");
            return Delivery::Echo;
        }

        self.enqueue(event)
    }

    /// Push without delivery filtering. Used by startup replay.
    pub fn enqueue(&self, event: Event) -> Delivery {
        match self.tx.send(event) {
            Ok(()) => Delivery::Queued,
            Err(_) => {
                tracing::warn!("event queue closed; dropping event");
                Delivery::Closed
            }
        }
    }

    pub fn agent(&self) -> &UserId {
        &self.agent
    }

    pub fn gate(&self) -> &ReplayGate {
        &self.gate
    }
}

/// Single-consumer end of the queue, owned by the dispatcher.
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventQueue {
    /// Wait for the next event. `None` once every inbox is dropped and the
    /// queue is empty.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an event only if one is already waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}
