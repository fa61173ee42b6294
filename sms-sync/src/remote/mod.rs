//! Remote table store
//!
//! Request/response access to the hosted relational backend, one named table
//! at a time. Rows are schemaless JSON objects keyed by `id` (or `key` for
//! settings).

use crate::sync::collections::OrderBy;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod postgrest;

pub use memory::{MemoryRemoteStore, ReadHold, RemoteCall};
pub use postgrest::PostgrestRemoteStore;

/// Remote store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Table-oriented remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every row of `table`, optionally ordered
    async fn select_all(&self, table: &str, order: Option<OrderBy>) -> Result<Vec<Value>, RemoteError>;

    /// Insert-or-replace `rows`, matching existing rows on `on_conflict`
    async fn upsert(&self, table: &str, rows: &[Value], on_conflict: &str) -> Result<(), RemoteError>;

    /// Delete rows where `column == value`
    async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError>;

    /// Delete rows where `column != value`
    async fn delete_neq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError>;
}
