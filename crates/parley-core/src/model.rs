//! Recurrent model traits.
//!
//! The model is an external collaborator: tokenization, the transition
//! function and decoding live behind [`RecurrentModel`], and the parameter
//! inventory used for device placement lives behind [`ParameterHost`].
//! Implementations live in parley-infra.

use std::future::Future;

use parley_types::error::{ModelError, PlacementError};
use parley_types::model::{
    Device, ParamPath, ParamTree, RecurrentState, TokenId, Transition, TransitionMode,
};

/// A stateful language model that folds one token at a time.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait RecurrentModel: Send + Sync {
    /// Model identity, used as the checkpoint key.
    fn identity(&self) -> &str;

    /// State of a model that has seen no text.
    fn initial_state(&self) -> RecurrentState;

    /// Split text into token ids, in order.
    fn tokenize(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<TokenId>, ModelError>> + Send;

    /// Decode token ids back into text.
    fn detokenize(
        &self,
        tokens: &[TokenId],
    ) -> impl Future<Output = Result<String, ModelError>> + Send;

    /// Fold `token` into `state`.
    ///
    /// In [`TransitionMode::Full`] the result must carry next-token logits;
    /// in [`TransitionMode::StateOnly`] logits may be omitted.
    fn transition(
        &self,
        token: TokenId,
        state: &RecurrentState,
        mode: TransitionMode,
    ) -> impl Future<Output = Result<Transition, ModelError>> + Send;
}

/// Access to the model's parameter tensors for placement decisions.
pub trait ParameterHost: Send + Sync {
    /// The full parameter tree with current tensor locations.
    fn parameters(&self) -> impl Future<Output = Result<ParamTree, PlacementError>> + Send;

    /// Free accelerator memory in bytes, `None` without an accelerator.
    fn accelerator_free(&self) -> impl Future<Output = Result<Option<u64>, PlacementError>> + Send;

    /// Move one leaf tensor to `device`.
    fn relocate(
        &self,
        path: &ParamPath,
        device: Device,
    ) -> impl Future<Output = Result<(), String>> + Send;
}
