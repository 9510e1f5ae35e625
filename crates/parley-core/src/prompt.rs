//! Text lines folded into the model for events and speaker turns.

use parley_types::event::{Event, RoomId, UserId};

/// One conversation line for an observed event, newline terminated.
pub fn render_event(event: &Event) -> String {
    format!(
        "\"{}\", in \"{}\", says: {}\n",
        event.sender,
        event.room_id,
        event.text()
    )
}

/// Cue that hands the turn to `agent`; generation continues from here.
pub fn speaker_cue(agent: &UserId, room: &RoomId) -> String {
    format!("\"{agent}\", in \"{room}\", says:")
}
