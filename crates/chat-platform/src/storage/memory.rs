//! In-memory document store.
//! Fastest option but not persistent across page reloads.

use std::cell::RefCell;
use std::collections::HashMap;
use async_trait::async_trait;
use chat_core::ports::DocumentStorePort;
use chat_types::{Result, chat::ChatDocument};

pub struct MemoryStorage {
    docs: RefCell<HashMap<String, ChatDocument>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            docs: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.borrow().is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl DocumentStorePort for MemoryStorage {
    async fn put(&self, doc_id: &str, doc: &ChatDocument) -> Result<()> {
        self.docs
            .borrow_mut()
            .insert(doc_id.to_string(), doc.clone());
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        self.docs.borrow_mut().remove(doc_id);
        Ok(())
    }

    async fn query_by_user(&self, user_id: &str) -> Result<Vec<(String, ChatDocument)>> {
        let docs = self
            .docs
            .borrow()
            .iter()
            .filter(|(_, d)| d.user_id == user_id)
            .map(|(id, d)| (id.clone(), d.clone()))
            .collect();
        Ok(docs)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
