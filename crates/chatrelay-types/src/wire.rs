//! Frames exchanged with browser clients over the `/ws` socket.
//!
//! Both directions use the same shape: `{"text": "<string>"}`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Marker prepended to the first fragment of every streamed reply.
pub const REPLY_PREFIX: &str = "AI: ";

/// Unique identity of an open client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Generate a fresh random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat message received from a client.
///
/// A missing or `null` `text` decodes as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
}

impl ChatMessage {
    /// Decode a client frame. Fails on non-JSON input, a non-object, or a
    /// `text` that is neither a string nor `null`.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A frame written back to a client while a reply streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub text: String,
}

impl OutboundFrame {
    /// The opening frame of a reply, carrying [`REPLY_PREFIX`].
    pub fn first(fragment: &str) -> Self {
        Self {
            text: format!("{REPLY_PREFIX}{fragment}"),
        }
    }

    /// A continuation frame, sent verbatim.
    pub fn continuation(fragment: impl Into<String>) -> Self {
        Self {
            text: fragment.into(),
        }
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
