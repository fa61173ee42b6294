//! State synchronization manager
//!
//! Keeps the in-memory collections eventually consistent with the remote
//! store and mirrors them to the local store for offline availability.
//!
//! - Initialization reads every collection from the local store.
//! - A fetch cycle pulls every synced table concurrently and applies the
//!   results all-or-nothing.
//! - A mutation replaces a whole collection, persists it locally and pushes
//!   it to the remote store as an upsert keyed by `id`.
//!
//! Local persistence is best-effort and remote push failures are logged and
//! swallowed; only fetch cycles and settings saves surface `sync_error`.
//!
//! Every write to a collection's local key or remote table happens under
//! that collection's write lock, and the value written is the in-memory
//! value current at that point. The last local write therefore always
//! matches memory, and pushes for one collection reach the remote store in
//! the order their edits were applied.

use super::access::AUTH_USER_KEY;
use super::collections::{
    Collection, CollectionPolicy, InitialValue, CLEAR_ALL_SENTINEL, SETTINGS_TABLE,
};
use super::settings::{Branding, BrandingField};
use super::state::{record_id, validate_records, Phase, StateStore, SyncStatus};
use crate::remote::{RemoteError, RemoteStore};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sms_common::db::LocalStore;
use sms_common::events::ChangeSource;
use sms_common::models::{default_grade_scales, AuthUser};
use sms_common::time::{human_time_of_day, now};
use sms_common::{Error, EventBus, Result, SyncEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Warning recorded when the local store rejects a write for quota
pub const STORAGE_FULL_MESSAGE: &str = "Storage full: local cache disabled, cloud sync only";

/// Error recorded when the settings upsert fails
pub const SETTINGS_SAVE_FAILED_MESSAGE: &str = "Failed to save settings to cloud.";

/// Why a mutation was not pushed to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushSkip {
    /// Collection has no remote table
    LocalOnly,
    /// No fetch cycle has completed yet
    FirstLoad,
    /// Empty collections are never pushed
    Empty,
}

/// Remote side effect of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed { rows: usize },
    Skipped { reason: PushSkip },
    Failed { error: String },
}

/// Result of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub collection: Collection,
    pub count: usize,
    /// Whether the local store accepted the write
    pub persisted: bool,
    pub push: PushOutcome,
}

/// Result of a fetch cycle that reached the remote store successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub cycle: u64,
    /// Overwritten from remote
    pub applied: Vec<Collection>,
    /// Left alone by merge policy or a concurrent local edit
    pub skipped: Vec<Collection>,
    /// Branding fields updated from the settings table
    pub settings_applied: usize,
    /// A newer cycle already applied; these results were discarded
    pub stale: bool,
}

/// Decrements the in-flight counter when a fetch cycle ends, however it ends
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the synchronized state and its local/remote side effects
pub struct SyncManager {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    events: Arc<EventBus>,
    state: RwLock<StateStore>,
    /// One per collection, indexed by `Collection as usize`
    write_locks: Vec<Mutex<()>>,
    /// Serializes branding writes to the local store and the settings table
    settings_lock: Mutex<()>,
    cycle_seq: AtomicU64,
    in_flight: AtomicUsize,
}

impl SyncManager {
    /// Build the manager from whatever the local store holds
    ///
    /// Missing or unparsable entries fall back to the collection's initial
    /// value. Nothing is pushed: population from the local store is not a
    /// user change.
    pub async fn load(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let records = load_collection(local.as_ref(), collection.policy()).await;
            collections.insert(collection, records);
        }

        let branding = load_branding(local.as_ref()).await;
        let identity = load_identity(local.as_ref()).await;

        info!(
            students = collections[&Collection::Students].len(),
            identity = identity.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
            "Loaded local state"
        );

        Self {
            local,
            remote,
            events,
            state: RwLock::new(StateStore::new(collections, branding, identity)),
            write_locks: Collection::ALL.iter().map(|_| Mutex::new(())).collect(),
            settings_lock: Mutex::new(()),
            cycle_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    async fn lock_collection(&self, collection: Collection) -> MutexGuard<'_, ()> {
        self.write_locks[collection as usize].lock().await
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Snapshot of the sync indicator
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.state.read().await.status().clone();
        status.is_syncing = self.in_flight.load(Ordering::SeqCst) > 0;
        status
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase()
    }

    pub async fn records(&self, collection: Collection) -> Vec<Value> {
        self.state.read().await.records(collection).to_vec()
    }

    pub async fn typed<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.state.read().await.typed(collection)
    }

    pub async fn branding(&self) -> Branding {
        self.state.read().await.branding().clone()
    }

    pub async fn identity(&self) -> Option<AuthUser> {
        self.state.read().await.identity().cloned()
    }

    // ---------------------------------------------------------------------
    // Fetch cycle
    // ---------------------------------------------------------------------

    /// Pull every synced table and apply the results all-or-nothing
    ///
    /// Any failed read aborts the cycle before any collection changes and
    /// records the first error message as `sync_error`.
    pub async fn fetch_cycle(&self) -> Result<FetchOutcome> {
        let _guard = InFlightGuard::enter(&self.in_flight);
        let cycle = self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let generations = {
            let mut state = self.state.write().await;
            state.status_mut().sync_error = None;
            state.generations()
        };
        self.events.emit_lossy(SyncEvent::SyncStarted {
            cycle,
            timestamp: now(),
        });
        debug!(cycle, "Fetch cycle started");

        let remote = self.remote.as_ref();
        let collection_reads = join_all(Collection::synced().map(|collection| async move {
            let policy = collection.policy();
            let table = policy.remote_table.unwrap_or_default();
            (collection, remote.select_all(table, policy.order).await)
        }));
        let (results, settings) = tokio::join!(
            collection_reads,
            remote.select_all(SETTINGS_TABLE, None)
        );

        let first_error = results
            .iter()
            .filter_map(|(collection, r)| r.as_ref().err().map(|e| (collection.name(), e)))
            .chain(settings.as_ref().err().map(|e| (SETTINGS_TABLE, e)))
            .next()
            .map(|(table, e)| (table, remote_error_message(e)));

        if let Some((table, message)) = first_error {
            return Err(self.fail_cycle(cycle, table, message).await);
        }

        let results: Vec<(Collection, Vec<Value>)> = results
            .into_iter()
            .filter_map(|(collection, r)| r.ok().map(|rows| (collection, rows)))
            .collect();
        let settings = settings.unwrap_or_default();

        let mut outcome = FetchOutcome {
            cycle,
            applied: Vec::new(),
            skipped: Vec::new(),
            settings_applied: 0,
            stale: false,
        };
        let (last_synced, became_ready) = {
            let mut state = self.state.write().await;

            if cycle < state.applied_cycle() {
                debug!(
                    cycle,
                    applied = state.applied_cycle(),
                    "Discarding stale fetch results"
                );
                outcome.stale = true;
                return Ok(outcome);
            }

            for (collection, rows) in results {
                let policy = collection.policy();
                if !policy.merge.should_replace(rows.len()) {
                    debug!(collection = %collection, "Remote result empty, keeping local data");
                    outcome.skipped.push(collection);
                    continue;
                }
                if state.generation(collection) != generations.get(&collection).copied().unwrap_or(0) {
                    debug!(collection = %collection, "Local edit during fetch, keeping local data");
                    outcome.skipped.push(collection);
                    continue;
                }
                if let Err(e) = validate_records(collection, &rows) {
                    warn!(collection = %collection, error = %e, "Ignoring invalid remote rows");
                    outcome.skipped.push(collection);
                    continue;
                }

                state.overwrite_from_remote(collection, rows);
                outcome.applied.push(collection);
            }

            outcome.settings_applied = state.branding_mut().apply_rows(&settings).len();

            let at = now();
            let last_synced = human_time_of_day(at);
            let status = state.status_mut();
            status.last_synced = Some(last_synced.clone());
            status.last_synced_at = Some(at);
            state.set_applied_cycle(cycle);
            let became_ready = state.mark_ready();
            (last_synced, became_ready)
        };

        if became_ready {
            info!(cycle, "First fetch complete, outbound sync enabled");
        }

        for collection in &outcome.applied {
            let count = self.persist_collection(*collection).await;
            self.events.emit_lossy(SyncEvent::CollectionChanged {
                collection: collection.name().to_string(),
                count,
                source: ChangeSource::Remote,
                timestamp: now(),
            });
        }
        if outcome.settings_applied > 0 {
            self.persist_branding().await;
        }
        self.events.emit_lossy(SyncEvent::SyncCompleted {
            cycle,
            last_synced,
            applied: outcome.applied.iter().map(|c| c.name().to_string()).collect(),
            skipped: outcome.skipped.iter().map(|c| c.name().to_string()).collect(),
            timestamp: now(),
        });
        info!(
            cycle,
            applied = outcome.applied.len(),
            skipped = outcome.skipped.len(),
            settings = outcome.settings_applied,
            "Fetch cycle complete"
        );

        Ok(outcome)
    }

    /// Write a collection's current in-memory value to the local store;
    /// returns the record count written
    async fn persist_collection(&self, collection: Collection) -> usize {
        let _write = self.lock_collection(collection).await;
        let (count, serialized) = {
            let state = self.state.read().await;
            let records = state.records(collection);
            (records.len(), serde_json::to_string(records))
        };
        match serialized {
            Ok(serialized) => {
                self.persist_local(collection.policy().local_key, &serialized).await;
            }
            Err(e) => warn!(collection = %collection, error = %e, "Cannot serialize collection"),
        }
        count
    }

    /// Write the current branding fields to the local store
    async fn persist_branding(&self) {
        let _write = self.settings_lock.lock().await;
        let branding = self.state.read().await.branding().clone();
        for field in BrandingField::ALL {
            self.persist_local(field.local_key(), branding.get(field)).await;
        }
    }

    async fn fail_cycle(&self, cycle: u64, table: &str, message: String) -> Error {
        error!(cycle, table = %table, error = %message, "Cloud sync failed");
        {
            let mut state = self.state.write().await;
            if cycle >= state.applied_cycle() {
                state.status_mut().sync_error = Some(message.clone());
            }
        }
        self.events.emit_lossy(SyncEvent::SyncFailed {
            cycle,
            error: message.clone(),
            timestamp: now(),
        });
        Error::Remote(message)
    }

    /// Run a fetch cycle immediately and then every `period` until
    /// `shutdown` flips to true
    ///
    /// Each cycle runs in its own task: stopping the timer never cancels a
    /// fetch that is already in flight.
    pub fn spawn_periodic(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Sync timer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let manager = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = manager.fetch_cycle().await {
                                debug!(error = %e, "Timer fetch cycle failed");
                            }
                        });
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Sync timer stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    // ---------------------------------------------------------------------
    // Write-through
    // ---------------------------------------------------------------------

    /// Replace a whole collection and run the write-through side effects
    ///
    /// The in-memory value always updates. Local persistence and the remote
    /// push are attempted independently; neither failure is returned.
    pub async fn mutate(&self, collection: Collection, records: Vec<Value>) -> Result<MutationOutcome> {
        let _write = self.lock_collection(collection).await;
        self.apply_locked(collection, move |current| *current = records)
            .await
    }

    /// Insert a record, or replace the record with the same id in place
    ///
    /// The lookup and the replacement happen against the same in-memory
    /// value, so concurrent upserts of different ids are all kept.
    pub async fn upsert_record(&self, collection: Collection, record: Value) -> Result<MutationOutcome> {
        let id = record_id(&record)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("{} record has no string id", collection)))?
            .to_string();

        let _write = self.lock_collection(collection).await;
        self.apply_locked(collection, move |records| {
            match records.iter_mut().find(|r| record_id(r) == Some(id.as_str())) {
                Some(slot) => *slot = record,
                None => records.push(record),
            }
        })
        .await
    }

    /// Remove one record
    ///
    /// Collections that propagate deletes remove the remote row first and
    /// keep the local record if that fails. Other collections only change
    /// locally, so a later fetch cycle may bring the record back.
    pub async fn delete_record(&self, collection: Collection, id: &str) -> Result<MutationOutcome> {
        let _write = self.lock_collection(collection).await;
        let exists = self
            .state
            .read()
            .await
            .records(collection)
            .iter()
            .any(|r| record_id(r) == Some(id));
        if !exists {
            return Err(Error::NotFound(format!("{} {}", collection, id)));
        }

        let policy = collection.policy();
        if let (true, Some(table)) = (policy.propagate_deletes, policy.remote_table) {
            self.remote
                .delete_eq(table, "id", id)
                .await
                .map_err(|e| {
                    error!(collection = %collection, id = %id, error = %e, "Remote delete failed");
                    Error::Remote(format!("Record could not be removed from cloud: {}", e))
                })?;
        }

        self.apply_locked(collection, |records| {
            records.retain(|r| record_id(r) != Some(id))
        })
        .await
    }

    /// Empty a collection; delete-propagating collections wipe the remote
    /// table first
    pub async fn clear_collection(&self, collection: Collection) -> Result<MutationOutcome> {
        let _write = self.lock_collection(collection).await;
        let policy = collection.policy();
        if let (true, Some(table)) = (policy.propagate_deletes, policy.remote_table) {
            self.remote
                .delete_neq(table, "id", CLEAR_ALL_SENTINEL)
                .await
                .map_err(|e| {
                    error!(collection = %collection, error = %e, "Remote wipe failed");
                    Error::Remote(format!("Collection could not be cleared from cloud: {}", e))
                })?;
        }
        self.apply_locked(collection, Vec::clear).await
    }

    /// Edit the in-memory collection and run the write-through side effects
    ///
    /// Callers hold the collection's write lock. The edit runs against the
    /// current records and is discarded if the result fails validation.
    async fn apply_locked<F>(&self, collection: Collection, edit: F) -> Result<MutationOutcome>
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let policy = collection.policy();
        let (records, serialized, phase) = {
            let mut state = self.state.write().await;
            let mut records = state.records(collection).to_vec();
            edit(&mut records);
            validate_records(collection, &records)?;
            let serialized = serde_json::to_string(&records)?;
            state.replace(collection, records.clone());
            (records, serialized, state.phase())
        };
        let count = records.len();
        self.events.emit_lossy(SyncEvent::CollectionChanged {
            collection: collection.name().to_string(),
            count,
            source: ChangeSource::Local,
            timestamp: now(),
        });

        let persisted = self.persist_local(policy.local_key, &serialized).await;
        let push = self.push_remote(policy, &records, phase).await;

        Ok(MutationOutcome {
            collection,
            count,
            persisted,
            push,
        })
    }

    async fn push_remote(&self, policy: &CollectionPolicy, records: &[Value], phase: Phase) -> PushOutcome {
        let Some(table) = policy.remote_table else {
            return PushOutcome::Skipped {
                reason: PushSkip::LocalOnly,
            };
        };
        if phase == Phase::Loading {
            debug!(table = %table, "Skipping push before first fetch");
            return PushOutcome::Skipped {
                reason: PushSkip::FirstLoad,
            };
        }
        if records.is_empty() {
            return PushOutcome::Skipped {
                reason: PushSkip::Empty,
            };
        }

        match self.remote.upsert(table, records, "id").await {
            Ok(()) => {
                debug!(table = %table, rows = records.len(), "Pushed collection");
                PushOutcome::Pushed {
                    rows: records.len(),
                }
            }
            Err(e) => {
                error!(table = %table, error = %e, "Failed to sync collection");
                PushOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Best-effort local write; a quota failure records the storage warning
    async fn persist_local(&self, key: &str, value: &str) -> bool {
        match self.local.set(key, value).await {
            Ok(()) => true,
            Err(e) if e.is_quota() => {
                warn!(key = %key, error = %e, "Local storage limit reached, relying on cloud sync");
                self.state.write().await.status_mut().storage_warning =
                    Some(STORAGE_FULL_MESSAGE.to_string());
                self.events.emit_lossy(SyncEvent::StorageWarning {
                    key: key.to_string(),
                    message: STORAGE_FULL_MESSAGE.to_string(),
                    timestamp: now(),
                });
                false
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Local persistence failed");
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Save branding: memory and local store first, then one remote upsert
    ///
    /// Always user-initiated, so the first-load guard does not apply. Local
    /// fields stay updated when the remote upsert fails.
    pub async fn save_settings(&self, branding: Branding) -> Result<()> {
        let _write = self.settings_lock.lock().await;
        *self.state.write().await.branding_mut() = branding.clone();

        // A fetch may have applied remote branding since the line above
        let current = self.state.read().await.branding().clone();
        for field in BrandingField::ALL {
            self.persist_local(field.local_key(), current.get(field)).await;
        }

        let rows: Vec<Value> = branding
            .to_rows()
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;

        match self.remote.upsert(SETTINGS_TABLE, &rows, "key").await {
            Ok(()) => {
                let at = now();
                {
                    let mut state = self.state.write().await;
                    let status = state.status_mut();
                    status.last_synced = Some(human_time_of_day(at));
                    status.last_synced_at = Some(at);
                }
                info!("Branding settings saved");
                self.events.emit_lossy(SyncEvent::SettingsSaved { timestamp: at });
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Manual branding sync failed");
                self.state.write().await.status_mut().sync_error =
                    Some(SETTINGS_SAVE_FAILED_MESSAGE.to_string());
                self.events.emit_lossy(SyncEvent::SettingsSaveFailed {
                    error: e.to_string(),
                    timestamp: now(),
                });
                Err(Error::Remote(SETTINGS_SAVE_FAILED_MESSAGE.to_string()))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Identity
    // ---------------------------------------------------------------------

    /// Record the logged-in identity and cache it locally
    pub async fn login(&self, user: AuthUser) -> Result<()> {
        let serialized = serde_json::to_string(&user)?;
        let user_id = user.id.clone();
        self.state.write().await.set_identity(Some(user));
        self.persist_local(AUTH_USER_KEY, &serialized).await;

        info!(user = %user_id, "Identity set");
        self.events.emit_lossy(SyncEvent::IdentityChanged {
            user_id: Some(user_id),
            timestamp: now(),
        });
        Ok(())
    }

    pub async fn logout(&self) {
        self.state.write().await.set_identity(None);
        if let Err(e) = self.local.remove(AUTH_USER_KEY).await {
            warn!(error = %e, "Failed to clear cached identity");
        }
        info!("Identity cleared");
        self.events.emit_lossy(SyncEvent::IdentityChanged {
            user_id: None,
            timestamp: now(),
        });
    }
}

fn remote_error_message(e: &RemoteError) -> String {
    match e {
        RemoteError::Api(_, message) if !message.is_empty() => message.clone(),
        other => other.to_string(),
    }
}

fn initial_value(policy: &CollectionPolicy) -> Vec<Value> {
    match policy.initial {
        InitialValue::Empty => Vec::new(),
        InitialValue::DefaultGradeScale => default_grade_scales()
            .iter()
            .filter_map(|scale| serde_json::to_value(scale).ok())
            .collect(),
    }
}

async fn load_collection(local: &dyn LocalStore, policy: &CollectionPolicy) -> Vec<Value> {
    match local.get(policy.local_key).await {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(key = %policy.local_key, error = %e, "Unparsable cached collection, using initial value");
                initial_value(policy)
            }
        },
        Ok(None) => initial_value(policy),
        Err(e) => {
            warn!(key = %policy.local_key, error = %e, "Cannot read cached collection, using initial value");
            initial_value(policy)
        }
    }
}

async fn load_branding(local: &dyn LocalStore) -> Branding {
    let mut branding = Branding::default();
    for field in BrandingField::ALL {
        match local.get(field.local_key()).await {
            Ok(Some(value)) => branding.set(field, value),
            Ok(None) => {}
            Err(e) => warn!(key = %field.local_key(), error = %e, "Cannot read branding field"),
        }
    }
    branding
}

async fn load_identity(local: &dyn LocalStore) -> Option<AuthUser> {
    let raw = match local.get(AUTH_USER_KEY).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(error = %e, "Cannot read cached identity");
            return None;
        }
    };
    match serde_json::from_str::<Option<AuthUser>>(&raw) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Ignoring unparsable cached identity");
            None
        }
    }
}
