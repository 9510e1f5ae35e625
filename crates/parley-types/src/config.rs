//! Agent configuration types.
//!
//! `AgentConfig` mirrors `parley.toml` in the data directory. Every field has
//! a default so an empty or missing file yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::model::ModelSpec;

/// Top-level configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the model server.
    #[serde(default = "default_model_url")]
    pub model_url: String,

    /// Candidate models, largest first. The first one that fits the memory
    /// budget is used.
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,

    /// Text folded into a fresh state when no checkpoint exists.
    #[serde(default)]
    pub default_context: Option<String>,

    /// Give every room its own recurrent state instead of one shared state.
    #[serde(default)]
    pub isolate_rooms: bool,

    /// Maximum reply length in characters before truncation.
    #[serde(default = "default_reply_limit")]
    pub reply_limit: usize,

    /// Reaction key placed on events while they are being folded.
    #[serde(default = "default_thinking_reaction")]
    pub thinking_reaction: String,

    /// How long a typing notification stays up unless refreshed.
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
}

fn default_model_url() -> String {
    "http://127.0.0.1:8960".to_string()
}

fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("RWKV-4-14B", 14_000_000_000),
        ModelSpec::new("RWKV-4-3B", 3_000_000_000),
        ModelSpec::new("RWKV-4-1B5", 1_500_000_000),
        ModelSpec::new("RWKV-4-430M", 430_000_000),
        ModelSpec::new("RWKV-4-169M", 169_000_000),
    ]
}

fn default_reply_limit() -> usize {
    256
}

fn default_thinking_reaction() -> String {
    ":thinking_face:".to_string()
}

fn default_typing_timeout_ms() -> u64 {
    10_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_url: default_model_url(),
            models: default_models(),
            default_context: None,
            isolate_rooms: false,
            reply_limit: default_reply_limit(),
            thinking_reaction: default_thinking_reaction(),
            typing_timeout_ms: default_typing_timeout_ms(),
        }
    }
}
