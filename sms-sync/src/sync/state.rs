//! In-memory state store
//!
//! Owns every tracked collection, the branding fields, the logged-in identity
//! and the sync status. Holds no I/O; the manager wraps it in a lock and
//! performs the side effects.

use super::collections::Collection;
use super::settings::Branding;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sms_common::models::AuthUser;
use sms_common::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Store lifecycle
///
/// Outbound collection pushes are only permitted in `Ready`. The transition
/// happens once, after the first successful fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Ready,
}

/// Sync indicator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: Phase,
    pub is_first_load: bool,
    pub is_syncing: bool,
    /// Wall-clock time of the last successful sync (`HH:MM:SS`)
    pub last_synced: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last fetch-cycle or settings-save error
    pub sync_error: Option<String>,
    /// Set when local persistence hit the storage quota
    pub storage_warning: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Loading,
            is_first_load: true,
            is_syncing: false,
            last_synced: None,
            last_synced_at: None,
            sync_error: None,
            storage_warning: None,
        }
    }
}

/// Authoritative in-memory copy of all collections
#[derive(Debug)]
pub struct StateStore {
    collections: HashMap<Collection, Vec<Value>>,
    /// Bumped by every local mutation; fetch cycles compare before applying
    generations: HashMap<Collection, u64>,
    branding: Branding,
    identity: Option<AuthUser>,
    status: SyncStatus,
    /// Newest fetch cycle whose results were applied
    applied_cycle: u64,
}

impl StateStore {
    pub fn new(
        collections: HashMap<Collection, Vec<Value>>,
        branding: Branding,
        identity: Option<AuthUser>,
    ) -> Self {
        let mut collections = collections;
        for collection in Collection::ALL {
            collections.entry(collection).or_default();
        }

        Self {
            collections,
            generations: Collection::ALL.into_iter().map(|c| (c, 0)).collect(),
            branding,
            identity,
            status: SyncStatus::default(),
            applied_cycle: 0,
        }
    }

    pub fn records(&self, collection: Collection) -> &[Value] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Deserialize a collection into its record type
    pub fn typed<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.records(collection)
            .iter()
            .map(|r| serde_json::from_value(r.clone()).map_err(Error::from))
            .collect()
    }

    /// Replace a collection on behalf of a local mutation
    pub fn replace(&mut self, collection: Collection, records: Vec<Value>) -> u64 {
        self.collections.insert(collection, records);
        let generation = self.generations.entry(collection).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Replace a collection with fetched remote data
    pub fn overwrite_from_remote(&mut self, collection: Collection, records: Vec<Value>) {
        self.collections.insert(collection, records);
    }

    pub fn generation(&self, collection: Collection) -> u64 {
        self.generations.get(&collection).copied().unwrap_or(0)
    }

    pub fn generations(&self) -> HashMap<Collection, u64> {
        self.generations.clone()
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    pub fn branding_mut(&mut self) -> &mut Branding {
        &mut self.branding
    }

    pub fn identity(&self) -> Option<&AuthUser> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Option<AuthUser>) {
        self.identity = identity;
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut SyncStatus {
        &mut self.status
    }

    pub fn phase(&self) -> Phase {
        self.status.phase
    }

    /// Enter `Ready`; returns true only on the first call
    pub fn mark_ready(&mut self) -> bool {
        if self.status.phase == Phase::Ready {
            return false;
        }
        self.status.phase = Phase::Ready;
        self.status.is_first_load = false;
        true
    }

    pub fn applied_cycle(&self) -> u64 {
        self.applied_cycle
    }

    pub fn set_applied_cycle(&mut self, cycle: u64) {
        self.applied_cycle = cycle;
    }
}

/// Record id, if the record is an object with a string `id`
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Every record must be an object with a non-empty string `id`, unique
/// within the collection
pub fn validate_records(collection: Collection, records: &[Value]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let id = match record_id(record) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{} record {} has no string id",
                    collection, index
                )))
            }
        };
        if !seen.insert(id) {
            return Err(Error::InvalidInput(format!(
                "Duplicate id {} in {}",
                id, collection
            )));
        }
    }
    Ok(())
}
