use thiserror::Error;

use crate::model::ParamPath;

/// Errors reported by a recurrent model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model backend unavailable: {0}")]
    Unavailable(String),

    #[error("model backend error: {0}")]
    Backend(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("full transition returned no logits")]
    MissingLogits,

    #[error("no logits available; append text before generating")]
    NotPrimed,

    #[error("logits contain no selectable token")]
    EmptyLogits,
}

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint not found")]
    NotFound,

    #[error("checkpoint io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint is corrupt: {0}")]
    Corrupt(String),
}

/// Errors from the chat transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport closed")]
    Closed,
}

/// Errors from accelerator placement.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("failed to read parameter tree: {0}")]
    Inventory(String),

    #[error("relocation of '{path}' failed after {moved} tensor(s) were moved: {reason}")]
    PartialRelocation {
        path: ParamPath,
        moved: usize,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_display() {
        assert_eq!(StoreError::NotFound.to_string(), "checkpoint not found");
    }

    #[test]
    fn partial_relocation_display_names_path() {
        let err = PlacementError::PartialRelocation {
            path: ParamPath::from("blocks.3.ffn"),
            moved: 7,
            reason: "out of memory".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("blocks.3.ffn"));
        assert!(msg.contains("7 tensor(s)"));
        assert!(msg.contains("out of memory"));
    }

    #[test]
    fn model_error_display() {
        let err = ModelError::Backend("cuda oom".to_string());
        assert_eq!(err.to_string(), "model backend error: cuda oom");
    }
}
