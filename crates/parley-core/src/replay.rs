//! Startup replay: enqueue the history each room accumulated while the agent
//! was down.

use parley_types::checkpoint::Watermarks;
use parley_types::error::TransportError;
use parley_types::event::{Event, EventId};

use crate::gate::ReplayGate;
use crate::queue::{Delivery, Inbox};
use crate::transport::Transport;

/// Counts from a startup replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub rooms: usize,
    pub enqueued: usize,
}

/// Events of `history` that still need folding.
///
/// Resumes right after the last occurrence of `watermark`, or from the start
/// when the watermark is absent or unknown. Ids already in `gate` are left
/// out. Pure: the gate is only read.
pub fn plan_replay(history: &[Event], watermark: Option<&EventId>, gate: &ReplayGate) -> Vec<Event> {
    let start = watermark
        .and_then(|mark| history.iter().rposition(|e| &e.event_id == mark))
        .map_or(0, |pos| pos + 1);

    history[start..]
        .iter()
        .filter(|e| !gate.contains(&e.event_id))
        .cloned()
        .collect()
}

/// Plan replay for every room the transport reports and push the result
/// through `inbox`, recording each enqueued id in the gate.
pub async fn seed_from_history<T: Transport>(
    transport: &T,
    watermarks: &Watermarks,
    inbox: &Inbox,
) -> Result<ReplaySummary, TransportError> {
    let rooms = transport.rooms().await?;
    let mut summary = ReplaySummary {
        rooms: rooms.len(),
        enqueued: 0,
    };

    for room in rooms {
        let mark = watermarks.get(&room.room_id);
        if mark.is_some_and(|m| !room.history.iter().any(|e| &e.event_id == m)) {
            tracing::debug!(room = %room.room_id, "watermark not in history; replaying from start");
        }

        let pending = plan_replay(&room.history, mark, inbox.gate());
        tracing::info!(room = %room.room_id, events = pending.len(), "replaying room history");

        for event in pending {
            // Duplicate ids within one history are enqueued once.
            if !inbox.gate().insert(event.event_id.clone()) {
                continue;
            }
            if inbox.enqueue(event) == Delivery::Closed {
                return Err(TransportError::Closed);
            }
            summary.enqueued += 1;
        }
    }

    Ok(summary)
}
