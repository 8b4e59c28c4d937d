//! OpenAI-compatible chat-completions driver (streaming only).
//!
//! Posts `{model, messages, stream: true}` with `Authorization: Bearer` and
//! reads the reply as an event stream of `data:` lines.

use crate::event_stream::drain_event_stream;
use crate::llm_driver::{CompletionRequest, LlmDriver, LlmError, StreamEnd, StreamEvent};
use async_trait::async_trait;
use chatrelay_types::config::ApiKey;
use chatrelay_types::message::Message;
use serde::Serialize;
use tracing::debug;

/// OpenAI chat-completions driver.
pub struct OpenAiDriver {
    api_key: ApiKey,
    api_url: String,
    client: reqwest::Client,
}

impl OpenAiDriver {
    /// Create a new driver posting to `api_url`.
    pub fn new(api_key: ApiKey, api_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

/// Request body for a streamed chat completion.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[async_trait]
impl LlmDriver for OpenAiDriver {
    async fn stream(
        &self,
        request: CompletionRequest,
        tx: tokio::sync::mpsc::Sender<StreamEvent>,
    ) -> Result<StreamEnd, LlmError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        debug!(url = %self.api_url, model = %request.model, "Sending streaming chat request");

        let resp = self
            .client
            .post(&self.api_url)
            .header("authorization", format!("Bearer {}", self.api_key.expose()))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let _ = tx.send(StreamEvent::Started).await;
        drain_event_stream(resp.bytes_stream(), &tx).await
    }
}
