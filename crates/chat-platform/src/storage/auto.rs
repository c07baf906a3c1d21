//! Pick the chat document store from the app configuration.
//!
//! Priority for `Auto`: Firestore (when credentials are configured)
//! → IndexedDB → Memory (fallback)

use std::rc::Rc;
use chat_core::ports::DocumentStorePort;
use chat_types::{
    ChatError, Result,
    config::{AppConfig, StorageBackendType},
};
use super::{FirestoreStorage, IndexedDbStorage, MemoryStorage};

/// Open the configured storage backend.
/// Returns a trait object so callers are backend-agnostic.
pub async fn auto_detect_storage(config: &AppConfig) -> Result<Rc<dyn DocumentStorePort>> {
    match config.storage.backend {
        StorageBackendType::Memory => {
            log::info!("Storage backend: memory");
            Ok(Rc::new(MemoryStorage::new()))
        }
        StorageBackendType::IndexedDb => {
            let idb = IndexedDbStorage::open().await?;
            log::info!("Storage backend: IndexedDB");
            Ok(Rc::new(idb))
        }
        StorageBackendType::Firestore => {
            let firestore = config
                .firestore
                .clone()
                .ok_or_else(|| ChatError::Config("Firestore backend selected without firestore settings".to_string()))
                .and_then(FirestoreStorage::new)?;
            log::info!("Storage backend: Firestore");
            Ok(Rc::new(firestore))
        }
        StorageBackendType::Auto => Ok(auto_select(config).await),
    }
}

async fn auto_select(config: &AppConfig) -> Rc<dyn DocumentStorePort> {
    if let Some(fs) = config.firestore.as_ref().filter(|f| f.has_credentials()) {
        match FirestoreStorage::new(fs.clone()) {
            Ok(firestore) => {
                log::info!("Storage backend: Firestore (project {})", fs.project_id);
                return Rc::new(firestore);
            }
            Err(e) => log::warn!("Firestore unavailable ({}), trying IndexedDB", e),
        }
    }

    match IndexedDbStorage::open().await {
        Ok(idb) => {
            log::info!("Storage backend: IndexedDB");
            Rc::new(idb)
        }
        Err(e) => {
            log::warn!("IndexedDB unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}
