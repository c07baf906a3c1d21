//! Chat persistence on top of a `DocumentStorePort`.
//!
//! Each chat is one document keyed `"{user_id}_{chat_id}"` holding the full
//! message list. Writes overwrite the whole document; last write wins.

use std::rc::Rc;
use chat_types::{
    Result,
    chat::{chat_id_from_document, document_id, Chat, ChatDocument, DEFAULT_CHAT_ID},
    message::Message,
};
use crate::chat_store::ChatStore;
use crate::ports::DocumentStorePort;

/// A write the session needs after mutating the chat store
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    /// Overwrite the chat's document with this message list
    Save { chat_id: String, messages: Vec<Message> },
    /// Remove the chat's document
    Delete { chat_id: String },
}

impl PersistOp {
    pub fn chat_id(&self) -> &str {
        match self {
            PersistOp::Save { chat_id, .. } | PersistOp::Delete { chat_id } => chat_id,
        }
    }
}

#[derive(Clone)]
pub struct ChatRepository {
    store: Rc<dyn DocumentStorePort>,
}

impl ChatRepository {
    pub fn new(store: Rc<dyn DocumentStorePort>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    /// Overwrite the full message list of a chat
    pub async fn save_chat(&self, chat_id: &str, messages: &[Message], user_id: &str) -> Result<()> {
        let doc = ChatDocument::new(messages.to_vec(), user_id);
        self.store.put(&document_id(user_id, chat_id), &doc).await?;
        log::debug!("Saved chat '{}' ({} messages) for {}", chat_id, messages.len(), user_id);
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: &str, user_id: &str) -> Result<()> {
        self.store.delete(&document_id(user_id, chat_id)).await?;
        log::debug!("Deleted chat '{}' for {}", chat_id, user_id);
        Ok(())
    }

    /// Load every chat of a user, ordered by document id. An empty result is
    /// replaced by a single empty default chat, which is persisted at once.
    pub async fn load_chats(&self, user_id: &str) -> Result<Vec<Chat>> {
        let mut docs = self.store.query_by_user(user_id).await?;
        docs.sort_by(|a, b| a.0.cmp(&b.0));

        let chats: Vec<Chat> = docs
            .into_iter()
            .filter_map(|(doc_id, doc)| {
                let id = chat_id_from_document(user_id, &doc_id);
                if id.is_none() {
                    log::warn!("Skipping document '{}' not keyed for user {}", doc_id, user_id);
                }
                id.map(|id| Chat { id, messages: doc.messages })
            })
            .collect();

        if chats.is_empty() {
            self.save_chat(DEFAULT_CHAT_ID, &[], user_id).await?;
            return Ok(vec![Chat::new(DEFAULT_CHAT_ID)]);
        }

        Ok(chats)
    }

    /// Start-of-session step: load the user's chats and make sure the
    /// default chat exists, persisting it if it had to be added.
    /// Calling it again against the same backend yields the same store.
    pub async fn initialize(&self, user_id: &str) -> Result<ChatStore> {
        let mut store = ChatStore::from_chats(self.load_chats(user_id).await?);
        if store.ensure_default() {
            self.save_chat(DEFAULT_CHAT_ID, &[], user_id).await?;
        }
        log::info!(
            "Loaded {} chat(s) for {} from {}",
            store.len(),
            user_id,
            self.backend_name()
        );
        Ok(store)
    }

    /// Execute a write produced by the session
    pub async fn apply(&self, op: &PersistOp, user_id: &str) -> Result<()> {
        match op {
            PersistOp::Save { chat_id, messages } => self.save_chat(chat_id, messages, user_id).await,
            PersistOp::Delete { chat_id } => self.delete_chat(chat_id, user_id).await,
        }
    }
}
