//! Offline-first state synchronization
//!
//! - `collections`: tracked collections and their merge/push policies
//! - `state`: the in-memory store and sync status
//! - `manager`: fetch cycles, write-through mutations, settings, identity
//! - `settings`: institutional branding
//! - `access`: role-based module visibility

pub mod access;
pub mod collections;
pub mod manager;
pub mod settings;
pub mod state;

pub use access::{visible_modules, ModuleType};
pub use collections::{Collection, CollectionPolicy, MergeStrategy};
pub use manager::{FetchOutcome, MutationOutcome, PushOutcome, PushSkip, SyncManager};
pub use settings::{Branding, BrandingField};
pub use state::{Phase, SyncStatus};
