//! ConsoleTransport -- a single chat room on stdin/stdout.
//!
//! Lines typed by the operator become message events; replies are printed.
//! The room has no history, so startup replay finds nothing to fold.

use std::time::Duration;

use parley_core::transport::Transport;
use parley_types::error::TransportError;
use parley_types::event::{Event, EventId, RoomId, RoomSnapshot, UserId};

pub struct ConsoleTransport {
    agent: UserId,
    operator: UserId,
    room: RoomId,
}

impl ConsoleTransport {
    pub fn new(agent: &str, operator: &str, room: &str) -> Self {
        Self {
            agent: UserId::new(agent),
            operator: UserId::new(operator),
            room: RoomId::new(room),
        }
    }

    /// A message event for one line typed by the operator.
    pub fn event_from_line(&self, line: &str) -> Event {
        Event::message(
            self.room.clone(),
            fresh_id(),
            self.operator.clone(),
            line,
        )
    }

    fn check_room(&self, room: &RoomId) -> Result<(), TransportError> {
        if room == &self.room {
            Ok(())
        } else {
            Err(TransportError::RoomNotFound(room.to_string()))
        }
    }
}

fn fresh_id() -> EventId {
    EventId::new(uuid::Uuid::now_v7().to_string())
}

impl Transport for ConsoleTransport {
    fn user_id(&self) -> &UserId {
        &self.agent
    }

    async fn rooms(&self) -> Result<Vec<RoomSnapshot>, TransportError> {
        Ok(vec![RoomSnapshot {
            room_id: self.room.clone(),
            voice: true,
            history: Vec::new(),
        }])
    }

    async fn voice(&self, room: &RoomId) -> Result<bool, TransportError> {
        self.check_room(room)?;
        Ok(true)
    }

    async fn send(&self, room: &RoomId, text: &str) -> Result<EventId, TransportError> {
        self.check_room(room)?;
        println!("{} {text}", console::style(format!("{}:", self.agent)).cyan().bold());
        Ok(fresh_id())
    }

    async fn typing(&self, room: &RoomId, active: bool, _timeout: Duration) -> Result<(), TransportError> {
        self.check_room(room)?;
        if active {
            tracing::trace!(room = %room, "agent is typing");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> ConsoleTransport {
        ConsoleTransport::new("parley", "operator", "console")
    }

    #[test]
    fn lines_become_operator_messages_with_unique_ids() {
        let t = transport();
        let a = t.event_from_line("hello");
        let b = t.event_from_line("hello");
        assert!(a.is_message());
        assert_eq!(a.sender, UserId::new("operator"));
        assert_eq!(a.room_id, RoomId::new("console"));
        assert_eq!(a.payload, "hello");
        assert_ne!(a.event_id, b.event_id);
    }

    #[tokio::test]
    async fn single_voiced_room_without_history() {
        let t = transport();
        let rooms = t.rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert!(rooms[0].voice);
        assert!(rooms[0].history.is_empty());
        assert!(t.voice(&RoomId::new("console")).await.unwrap());
        assert!(matches!(
            t.voice(&RoomId::new("elsewhere")).await,
            Err(TransportError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn send_returns_fresh_ids() {
        let t = transport();
        let room = RoomId::new("console");
        let first = t.send(&room, "one").await.unwrap();
        let second = t.send(&room, "two").await.unwrap();
        assert_ne!(first, second);
    }
}
