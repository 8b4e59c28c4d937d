//! HTTP/WebSocket server for the chatrelay daemon.
//!
//! Browsers connect on `/ws`, send `{"text": ...}` frames, and receive the
//! language model's reply streamed back as `{"text": ...}` frames. The
//! chat page itself is served from a static directory.

pub mod registry;
pub mod relay;
pub mod server;
pub mod webchat;
pub mod ws;
