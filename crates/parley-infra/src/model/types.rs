//! Model server wire types.
//!
//! JSON bodies exchanged with the model server. State and logits travel as
//! base64 of little-endian `f32` (see [`crate::codec`]).

use serde::{Deserialize, Serialize};

use parley_types::model::{Device, TokenId, TransitionMode};

/// Body of `POST /load`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadRequest<'a> {
    pub model: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadResponse {
    /// Number of `f32` values in a recurrent state.
    pub state_len: usize,
}

/// Body of `POST /tokenize`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenizeRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenizeResponse {
    pub tokens: Vec<TokenId>,
}

/// Body of `POST /detokenize`.
#[derive(Debug, Clone, Serialize)]
pub struct DetokenizeRequest<'a> {
    pub tokens: &'a [TokenId],
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetokenizeResponse {
    pub text: String,
}

/// Body of `POST /transition`.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRequest {
    pub token: TokenId,
    pub state: String,
    pub mode: TransitionMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionResponse {
    pub state: String,
    #[serde(default)]
    pub logits: Option<String>,
}

/// Response of `GET /accelerator`.
#[derive(Debug, Clone, Deserialize)]
pub struct AcceleratorResponse {
    /// Free bytes, absent when the server has no accelerator.
    #[serde(default)]
    pub free: Option<u64>,
}

/// Body of `POST /parameters/relocate`.
#[derive(Debug, Clone, Serialize)]
pub struct RelocateRequest {
    /// Dotted leaf path, e.g. `blocks.0.att.key`.
    pub path: String,
    pub device: Device,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_request_shape() {
        let req = TransitionRequest {
            token: 42,
            state: "AACAPw==".to_string(),
            mode: TransitionMode::StateOnly,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["token"], 42);
        assert_eq!(json["mode"], "state_only");
        assert_eq!(json["state"], "AACAPw==");
    }

    #[test]
    fn transition_response_without_logits() {
        let resp: TransitionResponse = serde_json::from_str(r#"{"state":""}"#).unwrap();
        assert!(resp.logits.is_none());
    }

    #[test]
    fn accelerator_response_absent_free() {
        let resp: AcceleratorResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.free.is_none());
        let resp: AcceleratorResponse = serde_json::from_str(r#"{"free":1024}"#).unwrap();
        assert_eq!(resp.free, Some(1024));
    }

    #[test]
    fn relocate_request_shape() {
        let req = RelocateRequest {
            path: "blocks.0.ffn".to_string(),
            device: Device::Accelerator,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["device"], "accelerator");
        assert_eq!(json["path"], "blocks.0.ffn");
    }
}
