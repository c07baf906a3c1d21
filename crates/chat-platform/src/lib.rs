//! Browser adapters for the `chat-core` ports.

pub mod config;
pub mod llm;
pub mod storage;
