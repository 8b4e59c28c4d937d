//! LLM driver trait and types.
//!
//! Abstracts over chat-completion providers that stream their reply as an
//! event stream of text deltas.

use async_trait::async_trait;
use chatrelay_types::message::Message;
use thiserror::Error;

/// Error type for LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP error: {0}")]
    Http(String),
    /// API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        message: String,
    },
    /// Reading the streamed body failed part-way through.
    #[error("Stream read error: {0}")]
    Stream(String),
}

/// A request to an LLM for a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// A single-turn request carrying one user message.
    pub fn user(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(text)],
        }
    }
}

/// Events emitted during a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The upstream accepted the request and its body is streaming.
    Started,
    /// Incremental text content. Never empty.
    TextDelta { text: String },
}

/// How a stream finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The `data: [DONE]` sentinel was seen.
    Done,
    /// The body ended without a sentinel.
    Eof,
}

/// Trait for LLM drivers.
#[async_trait]
pub trait LlmDriver: Send + Sync {
    /// Issue one streaming completion request, send [`StreamEvent::Started`]
    /// once the response is obtained, then each text delta in upstream
    /// order. No retries.
    async fn stream(
        &self,
        request: CompletionRequest,
        tx: tokio::sync::mpsc::Sender<StreamEvent>,
    ) -> Result<StreamEnd, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_types::message::Role;

    #[test]
    fn test_user_request() {
        let request = CompletionRequest::user("gpt-4o-mini", "hello");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "hello");
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::Api {
            status: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): bad key");
        assert_eq!(
            LlmError::Http("refused".to_string()).to_string(),
            "HTTP error: refused"
        );
    }

    #[tokio::test]
    async fn test_driver_object_streams_events() {
        use tokio::sync::mpsc;

        struct EchoDriver;

        #[async_trait]
        impl LlmDriver for EchoDriver {
            async fn stream(
                &self,
                request: CompletionRequest,
                tx: mpsc::Sender<StreamEvent>,
            ) -> Result<StreamEnd, LlmError> {
                for message in request.messages {
                    let _ = tx
                        .send(StreamEvent::TextDelta {
                            text: message.content,
                        })
                        .await;
                }
                Ok(StreamEnd::Done)
            }
        }

        let driver: Box<dyn LlmDriver> = Box::new(EchoDriver);
        let (tx, mut rx) = mpsc::channel(4);
        let end = driver
            .stream(CompletionRequest::user("m", "ping"), tx)
            .await
            .unwrap();
        assert_eq!(end, StreamEnd::Done);
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::TextDelta {
                text: "ping".to_string()
            })
        );
        assert_eq!(rx.recv().await, None);
    }
}
