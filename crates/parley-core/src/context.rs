//! Conversational context: recurrent state plus the model that advances it.
//!
//! A [`ConversationalContext`] owns one recurrent state and the logits
//! produced by the last fully evaluated token. [`ContextSet`] decides whether
//! all rooms share one context or each room gets its own.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::Stream;

use parley_types::checkpoint::{Checkpoint, Watermarks};
use parley_types::error::ModelError;
use parley_types::event::RoomId;
use parley_types::model::{Logits, RecurrentState, TransitionMode};

use crate::model::RecurrentModel;

/// Recurrent state folded from conversation text.
pub struct ConversationalContext<M> {
    model: Arc<M>,
    state: RecurrentState,
    logits: Option<Logits>,
}

impl<M> Clone for ConversationalContext<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            state: self.state.clone(),
            logits: self.logits.clone(),
        }
    }
}

impl<M: RecurrentModel> ConversationalContext<M> {
    /// A context that has seen no text.
    pub fn fresh(model: Arc<M>) -> Self {
        let state = model.initial_state();
        Self::with_state(model, state)
    }

    /// A context resumed from a persisted state. Logits are not persisted, so
    /// text must be appended before generating.
    pub fn with_state(model: Arc<M>, state: RecurrentState) -> Self {
        Self {
            model,
            state,
            logits: None,
        }
    }

    pub fn state(&self) -> &RecurrentState {
        &self.state
    }

    pub fn logits(&self) -> Option<&Logits> {
        self.logits.as_ref()
    }

    /// Fold `text` into the state.
    ///
    /// Every token but the last is folded state-only; the last is fully
    /// evaluated so next-token logits are ready for generation. Text that
    /// tokenizes to nothing leaves the context untouched.
    pub async fn append(&mut self, text: &str) -> Result<&mut Self, ModelError> {
        let tokens = self.model.tokenize(text).await?;
        let Some((&last, prefix)) = tokens.split_last() else {
            return Ok(self);
        };

        let mut state = self.state.clone();
        for &token in prefix {
            state = self
                .model
                .transition(token, &state, TransitionMode::StateOnly)
                .await?
                .state;
        }

        let step = self
            .model
            .transition(last, &state, TransitionMode::Full)
            .await?;
        let logits = step.logits.ok_or(ModelError::MissingLogits)?;

        self.state = step.state;
        self.logits = Some(logits);
        tracing::trace!(tokens = tokens.len(), "appended text to context");
        Ok(self)
    }

    /// Greedy decoding as an endless stream of text fragments.
    ///
    /// Each step takes the arg-max of the current logits, folds that token
    /// back in, and yields its decoded text. The stream has no terminator;
    /// the consumer decides when to stop. It ends after yielding the first
    /// error.
    pub fn generate_stream(&mut self) -> impl Stream<Item = Result<String, ModelError>> + Send + '_ {
        async_stream::stream! {
            loop {
                match self.step().await {
                    Ok(fragment) => yield Ok(fragment),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    async fn step(&mut self) -> Result<String, ModelError> {
        let token = self
            .logits
            .as_ref()
            .ok_or(ModelError::NotPrimed)?
            .argmax()
            .ok_or(ModelError::EmptyLogits)?;

        let step = self
            .model
            .transition(token, &self.state, TransitionMode::Full)
            .await?;
        self.logits = Some(step.logits.ok_or(ModelError::MissingLogits)?);
        self.state = step.state;

        self.model.detokenize(&[token]).await
    }
}

/// The contexts the dispatcher folds into: one shared by every room, or one
/// per room seeded from a common template.
pub enum ContextSet<M> {
    Shared(ConversationalContext<M>),
    PerRoom {
        template: ConversationalContext<M>,
        rooms: BTreeMap<RoomId, ConversationalContext<M>>,
    },
}

impl<M: RecurrentModel> ContextSet<M> {
    /// Build from a seed context. With `isolate_rooms`, the seed becomes the
    /// template every new room starts from.
    pub fn new(seed: ConversationalContext<M>, isolate_rooms: bool) -> Self {
        if isolate_rooms {
            ContextSet::PerRoom {
                template: seed,
                rooms: BTreeMap::new(),
            }
        } else {
            ContextSet::Shared(seed)
        }
    }

    /// Rebuild from a checkpoint. The shared state doubles as the template
    /// for rooms that have no state of their own yet.
    pub fn from_checkpoint(model: Arc<M>, checkpoint: &Checkpoint, isolate_rooms: bool) -> Self {
        let seed = ConversationalContext::with_state(Arc::clone(&model), checkpoint.state.clone());
        if !isolate_rooms {
            if !checkpoint.room_states.is_empty() {
                tracing::warn!(
                    rooms = checkpoint.room_states.len(),
                    "checkpoint holds per-room states but rooms are shared; using the shared state"
                );
            }
            return ContextSet::Shared(seed);
        }

        let rooms = checkpoint
            .room_states
            .iter()
            .map(|(room, state)| {
                (
                    room.clone(),
                    ConversationalContext::with_state(Arc::clone(&model), state.clone()),
                )
            })
            .collect();
        ContextSet::PerRoom {
            template: seed,
            rooms,
        }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, ContextSet::PerRoom { .. })
    }

    /// The context that `room` folds into, creating it from the template on
    /// first use.
    pub fn for_room(&mut self, room: &RoomId) -> &mut ConversationalContext<M> {
        match self {
            ContextSet::Shared(ctx) => ctx,
            ContextSet::PerRoom { template, rooms } => rooms
                .entry(room.clone())
                .or_insert_with(|| template.clone()),
        }
    }

    /// Snapshot for persistence.
    pub fn to_checkpoint(&self, model: &str, watermarks: &Watermarks) -> Checkpoint {
        let mut checkpoint = match self {
            ContextSet::Shared(ctx) => Checkpoint::new(model, ctx.state().clone()),
            ContextSet::PerRoom { template, rooms } => {
                let mut checkpoint = Checkpoint::new(model, template.state().clone());
                checkpoint.room_states = rooms
                    .iter()
                    .map(|(room, ctx)| (room.clone(), ctx.state().clone()))
                    .collect();
                checkpoint
            }
        };
        checkpoint.watermarks = watermarks.clone();
        checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use futures_util::StreamExt;
    use parley_types::event::EventId;

    fn model(script: &[&str]) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new(script))
    }

    #[tokio::test]
    async fn append_folds_prefix_state_only_and_last_token_fully() {
        let model = model(&["x"]);
        let mut ctx = ConversationalContext::fresh(Arc::clone(&model));
        ctx.append("abc").await.unwrap();

        let modes: Vec<TransitionMode> = model.transitions().into_iter().map(|(_, m)| m).collect();
        assert_eq!(
            modes,
            vec![
                TransitionMode::StateOnly,
                TransitionMode::StateOnly,
                TransitionMode::Full
            ]
        );
        assert!(ctx.logits().is_some());
    }

    #[tokio::test]
    async fn append_is_a_deterministic_fold() {
        let m = model(&["x"]);

        let mut whole = ConversationalContext::fresh(Arc::clone(&m));
        whole.append("hello world").await.unwrap();

        let mut again = ConversationalContext::fresh(Arc::clone(&m));
        again.append("hello world").await.unwrap();
        assert_eq!(whole.state(), again.state());

        let mut expected = m.initial_state();
        for token in m.tokenize("hello world").await.unwrap() {
            expected = m
                .transition(token, &expected, TransitionMode::StateOnly)
                .await
                .unwrap()
                .state;
        }
        assert_eq!(whole.state(), &expected);
    }

    #[tokio::test]
    async fn append_empty_text_is_noop() {
        let m = model(&["x"]);
        let mut ctx = ConversationalContext::fresh(Arc::clone(&m));
        ctx.append("").await.unwrap();
        assert!(m.transitions().is_empty());
        assert!(ctx.logits().is_none());
    }

    #[tokio::test]
    async fn generate_stream_yields_greedy_fragments() {
        let m = model(&["Hel", "lo", "\n", "world"]);
        let mut ctx = ConversationalContext::fresh(Arc::clone(&m));
        ctx.append("hi").await.unwrap();

        let fragments: Vec<String> = ctx
            .generate_stream()
            .take(4)
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "lo", "\n", "world"]);
    }

    #[tokio::test]
    async fn generate_without_logits_errors() {
        let m = model(&["x"]);
        let mut ctx = ConversationalContext::fresh(m);
        let stream = ctx.generate_stream();
        futures_util::pin_mut!(stream);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(ModelError::NotPrimed)));
    }

    #[tokio::test]
    async fn shared_set_uses_one_context_for_all_rooms() {
        let m = model(&["x"]);
        let mut set = ContextSet::new(ConversationalContext::fresh(Arc::clone(&m)), false);
        set.for_room(&RoomId::new("a")).append("one").await.unwrap();
        let after_a = set.for_room(&RoomId::new("b")).state().clone();
        assert_ne!(after_a, m.initial_state());

        let mut marks = Watermarks::new();
        marks.record(RoomId::new("a"), EventId::new("e1"));
        let checkpoint = set.to_checkpoint("tiny", &marks);
        assert!(checkpoint.room_states.is_empty());
        assert_eq!(checkpoint.state, after_a);
        assert_eq!(checkpoint.watermarks, marks);
    }

    #[tokio::test]
    async fn isolated_set_keeps_rooms_apart() {
        let m = model(&["x"]);
        let mut set = ContextSet::new(ConversationalContext::fresh(Arc::clone(&m)), true);
        set.for_room(&RoomId::new("a")).append("one").await.unwrap();

        assert_eq!(set.for_room(&RoomId::new("b")).state(), &m.initial_state());
        let checkpoint = set.to_checkpoint("tiny", &Watermarks::new());
        assert_eq!(checkpoint.room_states.len(), 2);
        assert_eq!(checkpoint.state, m.initial_state());

        let restored = ContextSet::from_checkpoint(Arc::clone(&m), &checkpoint, true);
        assert!(restored.is_isolated());
        let mut restored = restored;
        assert_eq!(
            restored.for_room(&RoomId::new("a")).state(),
            &checkpoint.room_states[&RoomId::new("a")]
        );
    }
}
