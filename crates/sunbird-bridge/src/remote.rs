//! Remote inference proxy.
//!
//! Active only when remote mode is configured. Each turn is POSTed to the
//! endpoint as JSON; any transport error, non-success status or malformed
//! payload is logged and answered by the local delegate instead, with a
//! fixed note appended so the user can tell where the answer came from.
//! The proxy never fails outright — the delegate is the backstop.

use serde::Deserialize;
use sunbird_types::{BridgeError, Result, TurnRequest};
use tracing::{debug, warn};

use crate::backend::Backend;

/// Appended to a delegate answer produced in place of the remote one.
pub const LOCAL_FALLBACK_NOTE: &str =
    "\n\n[answered by the local kernel: remote inference was unavailable]";

#[derive(Debug, Deserialize)]
struct RemoteAnswer {
    answer: String,
}

pub struct RemoteProxy {
    endpoint: String,
    client: reqwest::Client,
    delegate: Box<Backend>,
}

impl RemoteProxy {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client, delegate: Backend) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            delegate: Box::new(delegate),
        }
    }

    pub(crate) fn delegate(&self) -> &Backend {
        &self.delegate
    }

    pub async fn ask(&self, turn: &TurnRequest) -> Result<String> {
        match self.infer(turn).await {
            Ok(answer) => Ok(answer),
            Err(error) => {
                warn!(error = %error, "remote inference failed; answering with the local delegate");
                let local = self.delegate.ask_local(turn).await?;
                Ok(format!("{local}{LOCAL_FALLBACK_NOTE}"))
            }
        }
    }

    async fn infer(&self, turn: &TurnRequest) -> Result<String> {
        debug!(endpoint = %self.endpoint, "posting turn to remote inference");
        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(turn)
            .send()
            .await
            .map_err(|error| BridgeError::Transport(format!("request failed: {error}")))?;
        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "endpoint answered with status {}",
                response.status()
            )));
        }
        let body: RemoteAnswer = response
            .json()
            .await
            .map_err(|error| BridgeError::Transport(format!("malformed payload: {error}")))?;
        let answer = body.answer.trim().to_string();
        if answer.is_empty() {
            return Err(BridgeError::Transport(
                "endpoint answered with an empty string".to_string(),
            ));
        }
        Ok(answer)
    }
}
