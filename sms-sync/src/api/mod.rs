//! HTTP API handlers for sms-sync

pub mod collections;
pub mod error;
pub mod health;
pub mod identity;
pub mod settings;
pub mod sse;
pub mod sync;

pub use collections::{clear_collection, delete_record, list_collection, replace_collection, upsert_record};
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use identity::{get_identity, get_modules, login, logout};
pub use settings::{get_settings, save_settings};
pub use sse::event_stream;
pub use sync::{get_status, refresh};
