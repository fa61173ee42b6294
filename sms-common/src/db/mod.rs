//! Local persistent key-value store

pub mod init;
pub mod kv;
pub mod local_store;

pub use init::init_database;
pub use kv::SqliteLocalStore;
pub use local_store::{LocalStore, LocalStoreError, MemoryLocalStore, DEFAULT_CAPACITY_BYTES};
