//! Core types shared across the chatrelay crates.
//!
//! Wire frames exchanged with the browser, the upstream chat message model,
//! and relay configuration.

pub mod config;
pub mod message;
pub mod wire;
