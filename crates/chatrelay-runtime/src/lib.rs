//! Upstream side of the relay.
//!
//! Abstracts the language-model API behind [`llm_driver::LlmDriver`] and
//! provides the incremental event-stream parser the drivers share.

pub mod drivers;
pub mod event_stream;
pub mod llm_driver;
