//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use chat_types::{
    Result,
    chat::ChatDocument,
    message::Message,
};

// ─── LLM Port ────────────────────────────────────────────────

/// Streaming event from an LLM response
#[derive(Debug, Clone, PartialEq)]
pub enum LlmStreamEvent {
    /// A text fragment, in generation order
    Delta(String),
    /// Stream finished
    Done,
    /// The request or the stream failed; nothing follows
    Error(String),
}

/// One streaming completion request: a system prompt plus the full history
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub trait LlmPort {
    /// Streaming completion. The stream is lazy, finite and cannot be
    /// restarted; it ends after `Done` or the first `Error`.
    fn stream_chat(
        &self,
        req: ChatRequest,
    ) -> Pin<Box<dyn Stream<Item = LlmStreamEvent>>>;

    /// Name of this provider (for logging/debug)
    fn provider_name(&self) -> &str;
}

// ─── Document Store Port ─────────────────────────────────────

/// A document database holding one `ChatDocument` per id in a single
/// collection.
#[async_trait(?Send)]
pub trait DocumentStorePort {
    /// Create or fully replace a document
    async fn put(&self, doc_id: &str, doc: &ChatDocument) -> Result<()>;

    /// Delete a document; deleting a missing id is not an error
    async fn delete(&self, doc_id: &str) -> Result<()>;

    /// All documents whose `user_id` field equals `user_id`, as (id, document)
    async fn query_by_user(&self, user_id: &str) -> Result<Vec<(String, ChatDocument)>>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
