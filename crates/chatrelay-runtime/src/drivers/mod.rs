//! LLM driver implementations.

pub mod openai;
