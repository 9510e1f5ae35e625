//! Hand-rolled fakes for the collaborator traits.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parley_types::checkpoint::Checkpoint;
use parley_types::error::{ModelError, PlacementError, StoreError, TransportError};
use parley_types::event::{EventId, RoomId, RoomSnapshot, UserId};
use parley_types::model::{
    Device, Logits, ParamPath, ParamTree, RecurrentState, TokenId, Transition, TransitionMode,
};

use crate::model::{ParameterHost, RecurrentModel};
use crate::store::ContextStore;
use crate::transport::Transport;

const CHAR_BASE: TokenId = 1000;

/// Deterministic model whose greedy output walks a fixed script.
///
/// Ids below 1000 are script entries; every character of input text
/// tokenizes to `1000 + codepoint`. The state is three numbers: tokens
/// folded, script tokens folded, and a rolling hash of everything folded.
/// Full transitions put all logit mass on script entry
/// `script_tokens_folded % script.len()`.
pub struct ScriptedModel {
    script: Vec<String>,
    fail_on: Option<String>,
    log: Mutex<Vec<(TokenId, TransitionMode)>>,
}

impl ScriptedModel {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: script.iter().map(|s| s.to_string()).collect(),
            fail_on: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Make `tokenize` fail for any text containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn transitions(&self) -> Vec<(TokenId, TransitionMode)> {
        self.log.lock().unwrap().clone()
    }
}

impl RecurrentModel for ScriptedModel {
    fn identity(&self) -> &str {
        "scripted"
    }

    fn initial_state(&self) -> RecurrentState {
        RecurrentState::zeros(3)
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, ModelError> {
        if self.fail_on.as_deref().is_some_and(|n| text.contains(n)) {
            return Err(ModelError::Backend("tokenizer rejected input".to_string()));
        }
        Ok(text.chars().map(|c| CHAR_BASE + c as u32).collect())
    }

    async fn detokenize(&self, tokens: &[TokenId]) -> Result<String, ModelError> {
        let mut out = String::new();
        for &token in tokens {
            if token < CHAR_BASE {
                let entry = self
                    .script
                    .get(token as usize)
                    .ok_or_else(|| ModelError::InvalidResponse(format!("unknown token {token}")))?;
                out.push_str(entry);
            } else {
                let c = char::from_u32(token - CHAR_BASE)
                    .ok_or_else(|| ModelError::InvalidResponse(format!("bad char token {token}")))?;
                out.push(c);
            }
        }
        Ok(out)
    }

    async fn transition(
        &self,
        token: TokenId,
        state: &RecurrentState,
        mode: TransitionMode,
    ) -> Result<Transition, ModelError> {
        self.log.lock().unwrap().push((token, mode));

        let s = state.as_slice();
        let folded = s[0] + 1.0;
        let emitted = s[1] + if token < CHAR_BASE { 1.0 } else { 0.0 };
        let hash = ((s[2] as u64 * 31 + token as u64) % 65_521) as f32;
        let state = RecurrentState(vec![folded, emitted, hash]);

        let logits = match mode {
            TransitionMode::StateOnly => None,
            TransitionMode::Full => {
                let mut logits = vec![0.0; self.script.len()];
                if !logits.is_empty() {
                    let len = logits.len();
                    logits[emitted as usize % len] = 1.0;
                }
                Some(Logits(logits))
            }
        };
        Ok(Transition { logits, state })
    }
}

/// Parameter host over a fixed tree that records relocations.
pub struct FakeParameterHost {
    tree: ParamTree,
    accelerator_free: Option<u64>,
    fail_at: Option<ParamPath>,
    relocated: Mutex<Vec<ParamPath>>,
}

impl FakeParameterHost {
    pub fn new(tree: ParamTree) -> Self {
        Self {
            tree,
            accelerator_free: Some(u64::MAX),
            fail_at: None,
            relocated: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, path: ParamPath) -> Self {
        self.fail_at = Some(path);
        self
    }

    pub fn relocations(&self) -> Vec<ParamPath> {
        self.relocated.lock().unwrap().clone()
    }
}

impl ParameterHost for FakeParameterHost {
    async fn parameters(&self) -> Result<ParamTree, PlacementError> {
        Ok(self.tree.clone())
    }

    async fn accelerator_free(&self) -> Result<Option<u64>, PlacementError> {
        Ok(self.accelerator_free)
    }

    async fn relocate(&self, path: &ParamPath, _device: Device) -> Result<(), String> {
        if self.fail_at.as_ref() == Some(path) {
            return Err("device out of memory".to_string());
        }
        self.relocated.lock().unwrap().push(path.clone());
        Ok(())
    }
}

/// Everything a [`RecordingTransport`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message { room: RoomId, text: String },
    React { room: RoomId, event: EventId, key: String },
    Redact { room: RoomId, event: EventId },
    Typing { room: RoomId, active: bool },
    Confirm { room: RoomId, event: EventId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub room: RoomId,
    pub text: String,
}

/// Transport that records calls and hands out predictable ids.
pub struct RecordingTransport {
    user: UserId,
    rooms: Vec<RoomSnapshot>,
    voice: BTreeMap<RoomId, bool>,
    next_ids: Mutex<VecDeque<EventId>>,
    counter: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new(user: &str) -> Self {
        Self {
            user: UserId::new(user),
            rooms: Vec::new(),
            voice: BTreeMap::new(),
            next_ids: Mutex::new(VecDeque::new()),
            counter: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rooms(mut self, rooms: Vec<RoomSnapshot>) -> Self {
        for room in &rooms {
            self.voice.insert(room.room_id.clone(), room.voice);
        }
        self.rooms = rooms;
        self
    }

    pub fn with_voice(mut self, room: &str, voice: bool) -> Self {
        self.voice.insert(RoomId::new(room), voice);
        self
    }

    /// Ids returned by the next `send` calls, in order.
    pub fn with_next_ids<const N: usize>(self, ids: [&str; N]) -> Self {
        self.next_ids
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(EventId::new));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Posted> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { room, text } => Some(Posted { room, text }),
                _ => None,
            })
            .collect()
    }

    pub fn confirmed(&self) -> Vec<EventId> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Confirm { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    fn fresh_id(&self, prefix: &str) -> EventId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        EventId::new(format!("{prefix}-{n}"))
    }

    fn record(&self, entry: Sent) {
        self.sent.lock().unwrap().push(entry);
    }
}

impl Transport for RecordingTransport {
    fn user_id(&self) -> &UserId {
        &self.user
    }

    async fn rooms(&self) -> Result<Vec<RoomSnapshot>, TransportError> {
        Ok(self.rooms.clone())
    }

    async fn voice(&self, room: &RoomId) -> Result<bool, TransportError> {
        self.voice
            .get(room)
            .copied()
            .ok_or_else(|| TransportError::RoomNotFound(room.to_string()))
    }

    async fn send(&self, room: &RoomId, text: &str) -> Result<EventId, TransportError> {
        self.record(Sent::Message {
            room: room.clone(),
            text: text.to_string(),
        });
        let queued = self.next_ids.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| self.fresh_id("sent")))
    }

    async fn react(
        &self,
        room: &RoomId,
        event: &EventId,
        key: &str,
    ) -> Result<Option<EventId>, TransportError> {
        self.record(Sent::React {
            room: room.clone(),
            event: event.clone(),
            key: key.to_string(),
        });
        Ok(Some(self.fresh_id("reaction")))
    }

    async fn redact(&self, room: &RoomId, event: &EventId) -> Result<(), TransportError> {
        self.record(Sent::Redact {
            room: room.clone(),
            event: event.clone(),
        });
        Ok(())
    }

    async fn typing(&self, room: &RoomId, active: bool, _timeout: Duration) -> Result<(), TransportError> {
        self.record(Sent::Typing {
            room: room.clone(),
            active,
        });
        Ok(())
    }

    async fn confirm(&self, room: &RoomId, event: &EventId) -> Result<(), TransportError> {
        self.record(Sent::Confirm {
            room: room.clone(),
            event: event.clone(),
        });
        Ok(())
    }
}

/// In-memory checkpoint store with a save counter.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Checkpoint>>,
    saves: AtomicUsize,
    last: Mutex<Option<Checkpoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preload(&self, key: &str, checkpoint: Checkpoint) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), checkpoint);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<Checkpoint> {
        self.last.lock().unwrap().clone()
    }
}

impl ContextStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Checkpoint, StoreError> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn save(&self, key: &str, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), checkpoint.clone());
        *self.last.lock().unwrap() = Some(checkpoint.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
