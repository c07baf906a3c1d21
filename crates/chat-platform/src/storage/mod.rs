pub mod memory;
pub mod indexeddb;
pub mod firestore;
pub mod auto;

pub use memory::MemoryStorage;
pub use indexeddb::IndexedDbStorage;
pub use firestore::FirestoreStorage;
pub use auto::auto_detect_storage;
