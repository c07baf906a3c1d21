use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::Message;

/// Name of the chat every user always has. It cannot be deleted.
pub const DEFAULT_CHAT_ID: &str = "Default Chat";

/// User id used when the app config does not name one
pub const DEFAULT_USER_ID: &str = "default";

/// A named conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub messages: Vec<Message>,
}

impl Chat {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_CHAT_ID
    }
}

/// The persisted form of a chat: one document per (user, chat) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDocument {
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
}

impl ChatDocument {
    pub fn new(messages: Vec<Message>, user_id: impl Into<String>) -> Self {
        Self {
            messages,
            updated_at: Utc::now(),
            user_id: user_id.into(),
        }
    }
}

/// Document id for a chat: `"{user_id}_{chat_id}"`
pub fn document_id(user_id: &str, chat_id: &str) -> String {
    format!("{}_{}", user_id, chat_id)
}

/// Recover the chat id from a document id. Returns None when the document
/// does not belong to `user_id`.
pub fn chat_id_from_document(user_id: &str, doc_id: &str) -> Option<String> {
    doc_id
        .strip_prefix(user_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .map(String::from)
}
