//! IndexedDB document store.
//! Persistent across page reloads. Works in all modern browsers.
//! Each chat document is stored as JSON bytes under its document id.

use async_trait::async_trait;
use js_sys::{Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{IdbDatabase, IdbTransactionMode};

use chat_core::ports::DocumentStorePort;
use chat_types::{ChatError, Result, chat::ChatDocument};

const DB_NAME: &str = "claude_chat";
const STORE_NAME: &str = "chats";
const DB_VERSION: u32 = 1;

pub struct IndexedDbStorage {
    db: IdbDatabase,
}

fn js_err(e: JsValue) -> ChatError {
    ChatError::Storage(format!("{:?}", e))
}

impl IndexedDbStorage {
    /// Open (or create) the IndexedDB database.
    pub async fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| ChatError::Storage("No window object".to_string()))?;

        let idb_factory = window
            .indexed_db()
            .map_err(js_err)?
            .ok_or_else(|| ChatError::Storage("IndexedDB not available".to_string()))?;

        let open_req = idb_factory
            .open_with_u32(DB_NAME, DB_VERSION)
            .map_err(js_err)?;

        // Handle upgrade: create object store if needed
        let open_req_clone = open_req.clone();
        let onupgrade = Closure::once(move |_event: web_sys::Event| {
            let db = open_req_clone
                .result()
                .ok()
                .and_then(|r| r.dyn_into::<IdbDatabase>().ok());
            if let Some(db) = db {
                // Fails harmlessly if the store already exists
                let _ = db.create_object_store(STORE_NAME);
            }
        });
        open_req.set_onupgradeneeded(Some(onupgrade.as_ref().unchecked_ref()));
        onupgrade.forget();

        let db: IdbDatabase = JsFuture::from(idb_request_to_promise(&open_req))
            .await
            .map_err(js_err)?
            .dyn_into()
            .map_err(js_err)?;

        Ok(Self { db })
    }

    fn object_store(&self, mode: IdbTransactionMode) -> Result<web_sys::IdbObjectStore> {
        let tx = self
            .db
            .transaction_with_str_and_mode(STORE_NAME, mode)
            .map_err(js_err)?;
        tx.object_store(STORE_NAME).map_err(js_err)
    }

    async fn get(&self, doc_id: &str) -> Result<Option<ChatDocument>> {
        let store = self.object_store(IdbTransactionMode::Readonly)?;
        let req = store.get(&JsValue::from_str(doc_id)).map_err(js_err)?;

        let result = JsFuture::from(idb_request_to_promise(&req))
            .await
            .map_err(js_err)?;

        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }

        let bytes = Uint8Array::new(&result).to_vec();
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let store = self.object_store(IdbTransactionMode::Readonly)?;
        let req = store.get_all_keys().map_err(js_err)?;

        let result = JsFuture::from(idb_request_to_promise(&req))
            .await
            .map_err(js_err)?;

        let array: Array = result.dyn_into().map_err(js_err)?;
        Ok(array.iter().filter_map(|k| k.as_string()).collect())
    }
}

#[async_trait(?Send)]
impl DocumentStorePort for IndexedDbStorage {
    async fn put(&self, doc_id: &str, doc: &ChatDocument) -> Result<()> {
        let bytes = serde_json::to_vec(doc)?;
        let store = self.object_store(IdbTransactionMode::Readwrite)?;
        let req = store
            .put_with_key(&Uint8Array::from(bytes.as_slice()), &JsValue::from_str(doc_id))
            .map_err(js_err)?;
        JsFuture::from(idb_request_to_promise(&req))
            .await
            .map_err(js_err)?;
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let store = self.object_store(IdbTransactionMode::Readwrite)?;
        let req = store.delete(&JsValue::from_str(doc_id)).map_err(js_err)?;
        JsFuture::from(idb_request_to_promise(&req))
            .await
            .map_err(js_err)?;
        Ok(())
    }

    async fn query_by_user(&self, user_id: &str) -> Result<Vec<(String, ChatDocument)>> {
        let mut docs = Vec::new();
        for key in self.keys().await? {
            match self.get(&key).await {
                Ok(Some(doc)) if doc.user_id == user_id => docs.push((key, doc)),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping unreadable document '{}': {}", key, e),
            }
        }
        Ok(docs)
    }

    fn backend_name(&self) -> &str {
        "indexeddb"
    }
}

/// Convert an IdbRequest to a JS Promise for use with JsFuture.
/// Wraps the callback-based IDB API into a Future-compatible Promise.
fn idb_request_to_promise(req: &web_sys::IdbRequest) -> js_sys::Promise {
    let req_for_success = req.clone();
    let req_for_callbacks = req.clone();

    js_sys::Promise::new(&mut move |resolve, reject| {
        let req_inner = req_for_success.clone();
        let onsuccess = Closure::once(move |_: web_sys::Event| {
            let _ = resolve.call1(
                &JsValue::NULL,
                &req_inner.result().unwrap_or(JsValue::UNDEFINED),
            );
        });
        let onerror = Closure::once(move |_: web_sys::Event| {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("IDB request failed"));
        });
        req_for_callbacks.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        req_for_callbacks.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onsuccess.forget();
        onerror.forget();
    })
}
