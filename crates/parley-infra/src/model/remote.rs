//! RemoteModel -- [`RecurrentModel`] and [`ParameterHost`] over HTTP.
//!
//! Talks JSON to a model server that owns the weights. The server keeps no
//! conversational state: every transition carries the full recurrent state
//! in and out.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use parley_core::model::{ParameterHost, RecurrentModel};
use parley_types::error::{ModelError, PlacementError};
use parley_types::model::{
    Device, Logits, ParamPath, ParamTree, RecurrentState, TokenId, Transition, TransitionMode,
};

use super::types::{
    AcceleratorResponse, DetokenizeRequest, DetokenizeResponse, LoadRequest, LoadResponse,
    RelocateRequest, TokenizeRequest, TokenizeResponse, TransitionRequest, TransitionResponse,
};
use crate::codec::{decode_f32, encode_f32};

/// Client for one model loaded on a model server.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    client: reqwest::Client,
    base_url: String,
    name: String,
    state_len: usize,
}

impl RemoteModel {
    /// Ask the server at `base_url` to load `name` and return a client for it.
    pub async fn connect(base_url: &str, name: &str) -> Result<Self, ModelError> {
        let mut model = Self::new(base_url, name, 0)?;
        let loaded: LoadResponse = model.post("/load", &LoadRequest { model: name }).await?;
        model.state_len = loaded.state_len;
        tracing::info!(model = name, url = %model.base_url, state_len = loaded.state_len, "model loaded");
        Ok(model)
    }

    /// Client for a model the server already has loaded.
    pub fn new(base_url: &str, name: &str, state_len: usize) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ModelError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
            state_len,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("POST {path}: {e}")))?;
        Self::decode(path, response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ModelError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("GET {path}: {e}")))?;
        Self::decode(path, response).await
    }

    async fn decode<R: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<R, ModelError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Backend(format!("{path}: HTTP {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("{path}: {e}")))
    }
}

impl RecurrentModel for RemoteModel {
    fn identity(&self) -> &str {
        &self.name
    }

    fn initial_state(&self) -> RecurrentState {
        RecurrentState::zeros(self.state_len)
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, ModelError> {
        let resp: TokenizeResponse = self.post("/tokenize", &TokenizeRequest { text }).await?;
        Ok(resp.tokens)
    }

    async fn detokenize(&self, tokens: &[TokenId]) -> Result<String, ModelError> {
        let resp: DetokenizeResponse = self
            .post("/detokenize", &DetokenizeRequest { tokens })
            .await?;
        Ok(resp.text)
    }

    async fn transition(
        &self,
        token: TokenId,
        state: &RecurrentState,
        mode: TransitionMode,
    ) -> Result<Transition, ModelError> {
        let request = TransitionRequest {
            token,
            state: encode_f32(state.as_slice()),
            mode,
        };
        let resp: TransitionResponse = self.post("/transition", &request).await?;

        let next = decode_f32(&resp.state).map_err(ModelError::InvalidResponse)?;
        if next.len() != state.len() {
            return Err(ModelError::InvalidResponse(format!(
                "state length changed from {} to {}",
                state.len(),
                next.len()
            )));
        }
        let logits = resp
            .logits
            .map(|encoded| decode_f32(&encoded).map(Logits))
            .transpose()
            .map_err(ModelError::InvalidResponse)?;

        Ok(Transition {
            logits,
            state: RecurrentState(next),
        })
    }
}

impl ParameterHost for RemoteModel {
    async fn parameters(&self) -> Result<ParamTree, PlacementError> {
        self.get("/parameters")
            .await
            .map_err(|e| PlacementError::Inventory(e.to_string()))
    }

    async fn accelerator_free(&self) -> Result<Option<u64>, PlacementError> {
        let resp: AcceleratorResponse = self
            .get("/accelerator")
            .await
            .map_err(|e| PlacementError::Inventory(e.to_string()))?;
        Ok(resp.free)
    }

    async fn relocate(&self, path: &ParamPath, device: Device) -> Result<(), String> {
        let request = RelocateRequest {
            path: path.to_string(),
            device,
        };
        let response = self
            .client
            .post(self.url("/parameters/relocate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            tracing::trace!(%path, %device, "relocated tensor");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("HTTP {status}: {body}"))
        }
    }
}
