//! In-memory mapping of chat name to ordered message list.
//!
//! Chats keep insertion order so the sidebar lists them the way they were
//! loaded or created.

use chat_types::{
    ChatError, Result,
    chat::{Chat, DEFAULT_CHAT_ID},
    message::Message,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatStore {
    chats: Vec<Chat>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self { chats: Vec::new() }
    }

    pub fn from_chats(chats: Vec<Chat>) -> Self {
        let mut store = Self::new();
        for chat in chats {
            // First occurrence wins if a backend hands back duplicates
            if !store.contains(&chat.id) {
                store.chats.push(chat);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|c| c.id == chat_id)
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.chats.iter().map(|c| c.id.as_str())
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// Messages of a chat, empty if the chat does not exist
    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.get(chat_id).map(|c| c.messages.as_slice()).unwrap_or(&[])
    }

    pub fn append(&mut self, chat_id: &str, message: Message) -> Result<()> {
        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))?;
        chat.messages.push(message);
        Ok(())
    }

    /// Add the default chat if it is missing. Returns true when it was added.
    pub fn ensure_default(&mut self) -> bool {
        if self.contains(DEFAULT_CHAT_ID) {
            return false;
        }
        self.chats.push(Chat::new(DEFAULT_CHAT_ID));
        true
    }

    /// Name a new chat would get: `name` itself if free, else `"name (n)"`
    /// with the smallest free n starting at 1.
    pub fn unique_name(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{} ({})", name, counter);
            if !self.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Create an empty chat and return its final name
    pub fn create(&mut self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidChatName(name.to_string()));
        }
        let final_name = self.unique_name(name);
        self.chats.push(Chat::new(final_name.clone()));
        Ok(final_name)
    }

    /// Remove a chat. The default chat is protected.
    pub fn remove(&mut self, chat_id: &str) -> Result<Chat> {
        if chat_id == DEFAULT_CHAT_ID {
            return Err(ChatError::ProtectedChat(chat_id.to_string()));
        }
        let idx = self
            .chats
            .iter()
            .position(|c| c.id == chat_id)
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))?;
        Ok(self.chats.remove(idx))
    }
}
