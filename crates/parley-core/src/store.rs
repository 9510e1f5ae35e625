//! Checkpoint store trait.
//!
//! Persists the agent's [`Checkpoint`] keyed by model identity.
//! Implementations live in parley-infra.

use std::future::Future;

use parley_types::checkpoint::Checkpoint;
use parley_types::error::StoreError;

/// Durable storage for agent checkpoints.
///
/// `load` returns [`StoreError::NotFound`] when nothing was saved under the
/// key yet; callers treat that as a first run. `save` replaces any previous
/// checkpoint under the key and must appear atomic to the caller: a crash
/// mid-save leaves either the old or the new checkpoint, never a torn one.
pub trait ContextStore: Send + Sync {
    fn load(&self, key: &str) -> impl Future<Output = Result<Checkpoint, StoreError>> + Send;

    fn save(
        &self,
        key: &str,
        checkpoint: &Checkpoint,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
