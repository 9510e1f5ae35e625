//! The dispatcher: the single worker that owns the conversational state.
//!
//! One cycle runs `Idle → Draining → Batching → Deciding → Generating → Idle`:
//! block for the first event, fold it and everything else already queued,
//! then look at the last folded event to decide whether to speak. Every
//! cycle ends with exactly one checkpoint save.
//!
//! Errors inside a cycle are logged and their text is posted to the room the
//! cycle was working on. Only [`DispatchError::is_fatal`] errors stop
//! [`Dispatcher::run`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use parley_types::checkpoint::Watermarks;
use parley_types::config::AgentConfig;
use parley_types::error::{ModelError, StoreError, TransportError};
use parley_types::event::{Event, EventId, RoomId};

use crate::context::{ContextSet, ConversationalContext};
use crate::gate::ReplayGate;
use crate::generation::{GenerationError, collect_reply};
use crate::model::RecurrentModel;
use crate::prompt::{render_event, speaker_cue};
use crate::queue::EventQueue;
use crate::store::ContextStore;
use crate::transport::Transport;

/// Where the dispatcher is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Draining,
    Batching,
    Deciding,
    Generating,
}

/// Errors that end a dispatch cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Whether the worker must stop after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::Generation(GenerationError::EmbeddedNewline(_))
        )
    }
}

/// Tunables for a dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub reply_limit: usize,
    /// Reaction placed on events while they fold. Empty disables it.
    pub thinking_reaction: String,
    pub typing_timeout: Duration,
}

impl From<&AgentConfig> for DispatchSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            reply_limit: config.reply_limit,
            thinking_reaction: config.thinking_reaction.clone(),
            typing_timeout: Duration::from_millis(config.typing_timeout_ms),
        }
    }
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events folded into context.
    pub absorbed: usize,
    /// Id of the reply sent, if one was.
    pub reply: Option<EventId>,
}

#[derive(Default)]
struct Cycle {
    room: Option<RoomId>,
    thinking: Option<(RoomId, EventId)>,
    absorbed: usize,
    reply: Option<EventId>,
}

pub struct Dispatcher<M, S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    queue: EventQueue,
    gate: ReplayGate,
    contexts: ContextSet<M>,
    watermarks: Watermarks,
    key: String,
    settings: DispatchSettings,
    phase: Phase,
}

impl<M, S, T> Dispatcher<M, S, T>
where
    M: RecurrentModel,
    S: ContextStore,
    T: Transport,
{
    /// Resume from the checkpoint stored under the model's identity, or start
    /// fresh (seeded with the configured default context) when there is none.
    pub async fn restore(
        model: Arc<M>,
        store: Arc<S>,
        transport: Arc<T>,
        queue: EventQueue,
        gate: ReplayGate,
        config: &AgentConfig,
    ) -> Result<Self, DispatchError> {
        let key = model.identity().to_string();

        let (contexts, watermarks) = match store.load(&key).await {
            Ok(checkpoint) => {
                tracing::info!(
                    model = %key,
                    rooms = checkpoint.watermarks.len(),
                    saved_at = %checkpoint.saved_at,
                    "resuming from checkpoint"
                );
                let marks = checkpoint.watermarks.clone();
                (
                    ContextSet::from_checkpoint(model, &checkpoint, config.isolate_rooms),
                    marks,
                )
            }
            Err(StoreError::NotFound) => {
                tracing::info!(model = %key, "no checkpoint found, starting fresh");
                (
                    Self::seed(model, config).await?,
                    Watermarks::new(),
                )
            }
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(model = %key, %reason, "checkpoint unreadable, starting fresh");
                (
                    Self::seed(model, config).await?,
                    Watermarks::new(),
                )
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            store,
            transport,
            queue,
            gate,
            contexts,
            watermarks,
            key,
            settings: DispatchSettings::from(config),
            phase: Phase::Idle,
        })
    }

    async fn seed(model: Arc<M>, config: &AgentConfig) -> Result<ContextSet<M>, DispatchError> {
        let mut seed = ConversationalContext::fresh(model);
        if let Some(text) = config.default_context.as_deref() {
            seed.append(text).await?;
            tracing::debug!(chars = text.chars().count(), "folded default context");
        }
        Ok(ContextSet::new(seed, config.isolate_rooms))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    /// Wait for the next event while idle.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.phase = Phase::Idle;
        self.queue.next().await
    }

    /// Run until `shutdown` fires while idle, every inbox is dropped, or a
    /// fatal error occurs.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), DispatchError> {
        tracing::info!(model = %self.key, isolated = self.contexts.is_isolated(), "dispatcher started");
        loop {
            // Queued events are drained before a cancellation is honoured.
            let first = tokio::select! {
                biased;
                event = self.next_event() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!("all inboxes closed, dispatcher stopping");
                        break;
                    }
                },
                () = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, dispatcher stopping");
                    break;
                }
            };

            match self.handle(first).await {
                Ok(report) => {
                    tracing::debug!(absorbed = report.absorbed, replied = report.reply.is_some(), "cycle complete");
                }
                Err(err) if err.is_fatal() => {
                    tracing::error!(error = %err, "fatal dispatch error");
                    return Err(err);
                }
                Err(_) => {}
            }
        }
        Ok(())
    }

    /// Run one full cycle starting from `first`.
    ///
    /// On error the message is posted to the room being processed before it
    /// is returned.
    pub async fn handle(&mut self, first: Event) -> Result<CycleReport, DispatchError> {
        let mut cycle = Cycle::default();
        let result = self.cycle(first, &mut cycle).await;
        let reached = self.phase;
        self.clear_thinking(&mut cycle).await;
        self.phase = Phase::Idle;

        match result {
            Ok(()) => Ok(CycleReport {
                absorbed: cycle.absorbed,
                reply: cycle.reply,
            }),
            Err(err) => {
                tracing::error!(error = %err, room = ?cycle.room, phase = ?reached, "dispatch cycle failed");
                if let Some(room) = &cycle.room {
                    self.report(room, &err).await;
                }
                Err(err)
            }
        }
    }

    async fn cycle(&mut self, first: Event, cycle: &mut Cycle) -> Result<(), DispatchError> {
        self.phase = Phase::Draining;
        let mut last = self.absorb(first, cycle).await?;

        self.phase = Phase::Batching;
        while let Some(event) = self.queue.try_next() {
            last = self.absorb(event, cycle).await?;
        }

        self.phase = Phase::Deciding;
        let room = last.room_id;
        let speak = last.sender != *self.transport.user_id() && self.transport.voice(&room).await?;

        if speak {
            self.phase = Phase::Generating;
            let reply = self.generate(&room).await?;
            self.clear_thinking(cycle).await;

            if reply.is_empty() {
                tracing::debug!(room = %room, "generated an empty reply, nothing sent");
            } else {
                let id = self.transport.send(&room, &reply).await?;
                self.gate.insert(id.clone());
                self.watermarks.record(room.clone(), id.clone());
                tracing::info!(room = %room, event_id = %id, chars = reply.chars().count(), "reply sent");
                cycle.reply = Some(id);
            }
            best_effort(
                "typing",
                self.transport
                    .typing(&room, false, self.settings.typing_timeout),
            )
            .await;
        } else {
            tracing::debug!(room = %room, sender = %last.sender, "not speaking this cycle");
        }

        self.clear_thinking(cycle).await;
        self.save().await
    }

    /// Fold one event into its room's context.
    async fn absorb(&mut self, event: Event, cycle: &mut Cycle) -> Result<Event, DispatchError> {
        cycle.room = Some(event.room_id.clone());
        self.clear_thinking(cycle).await;
        cycle.thinking = self.mark_thinking(&event).await;

        self.contexts
            .for_room(&event.room_id)
            .append(&render_event(&event))
            .await?;
        self.watermarks
            .record(event.room_id.clone(), event.event_id.clone());
        best_effort(
            "confirm",
            self.transport.confirm(&event.room_id, &event.event_id),
        )
        .await;

        cycle.absorbed += 1;
        log_folded(&event);
        Ok(event)
    }

    /// Cue the agent's turn and decode a reply, keeping the typing indicator
    /// up while it runs.
    async fn generate(&mut self, room: &RoomId) -> Result<String, DispatchError> {
        let agent = self.transport.user_id().clone();
        let timeout = self.settings.typing_timeout;
        let transport = &self.transport;

        let ctx = self.contexts.for_room(room);
        ctx.append(&speaker_cue(&agent, room)).await?;
        best_effort("typing", transport.typing(room, true, timeout)).await;

        let mut ticker = tokio::time::interval((timeout / 2).max(Duration::from_millis(100)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let generation = collect_reply(ctx.generate_stream(), self.settings.reply_limit);
        tokio::pin!(generation);

        let reply = loop {
            tokio::select! {
                reply = &mut generation => break reply,
                _ = ticker.tick() => {
                    best_effort("typing", transport.typing(room, true, timeout)).await;
                }
            }
        };
        Ok(reply?)
    }

    async fn mark_thinking(&self, event: &Event) -> Option<(RoomId, EventId)> {
        if self.settings.thinking_reaction.is_empty() {
            return None;
        }
        best_effort(
            "react",
            self.transport.react(
                &event.room_id,
                &event.event_id,
                &self.settings.thinking_reaction,
            ),
        )
        .await
        .flatten()
        .map(|id| (event.room_id.clone(), id))
    }

    async fn clear_thinking(&self, cycle: &mut Cycle) {
        if let Some((room, id)) = cycle.thinking.take() {
            best_effort("redact", self.transport.redact(&room, &id)).await;
        }
    }

    async fn save(&self) -> Result<(), DispatchError> {
        let checkpoint = self.contexts.to_checkpoint(&self.key, &self.watermarks);
        self.store.save(&self.key, &checkpoint).await?;
        tracing::debug!(model = %self.key, rooms = self.watermarks.len(), "checkpoint saved");
        Ok(())
    }

    /// Post an error to `room`, one message per line.
    async fn report(&self, room: &RoomId, err: &DispatchError) {
        for line in err.to_string().lines().filter(|l| !l.trim().is_empty()) {
            if let Err(send_err) = self.transport.send(room, line).await {
                tracing::warn!(room = %room, error = %send_err, "failed to report error to room");
                return;
            }
        }
    }
}

/// One log line per text line; continuation lines are indented under the
/// sender name.
fn log_folded(event: &Event) {
    let sender = event.sender.as_str();
    let pad = " ".repeat(sender.chars().count());
    for (i, line) in event.text().lines().enumerate() {
        let who = if i == 0 { sender } else { pad.as_str() };
        tracing::info!(room = %event.room_id, event_id = %event.event_id, "{who}: {line}");
    }
}

/// Await a presence signal, logging instead of failing.
async fn best_effort<V, F>(signal: &'static str, fut: F) -> Option<V>
where
    F: Future<Output = Result<V, TransportError>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(signal, error = %err, "presence signal failed");
            None
        }
    }
}
