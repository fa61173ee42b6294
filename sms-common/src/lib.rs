//! # SMS Common Library
//!
//! Shared code for the school management sync service including:
//! - Domain record types (students, marks, fees, ...)
//! - Local key-value persistence (SQLite-backed)
//! - Sync event types and the event bus
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, SyncEvent};
