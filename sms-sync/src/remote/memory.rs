//! In-process remote store
//!
//! Used for `--offline` runs and as the test double for the sync manager.
//! Test instances built with [`MemoryRemoteStore::recording`] keep a call
//! log; they also support per-table read failures, write failures, and read
//! holds that delay `select_all` responses until released.

use super::{RemoteError, RemoteStore};
use crate::sync::collections::OrderBy;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tokio::sync::{watch, Mutex};

/// One call observed by a recording store
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Select { table: String },
    Upsert { table: String, rows: Vec<Value> },
    DeleteEq { table: String, column: String, value: String },
    DeleteNeq { table: String, column: String, value: String },
}

/// Delays the responses of the reads it captured until released or dropped
///
/// The rows a held read returns are taken when the read is issued, so a
/// held response carries the table as it was at request time.
#[derive(Debug)]
pub struct ReadHold {
    release: watch::Sender<bool>,
}

impl ReadHold {
    pub fn release(self) {}
}

impl Drop for ReadHold {
    fn drop(&mut self) {
        self.release.send_replace(true);
    }
}

/// Reads still to be captured by the most recent hold
#[derive(Debug)]
struct PendingHold {
    remaining: usize,
    released: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct MemoryRemoteStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing_reads: Mutex<HashSet<String>>,
    fail_writes: Mutex<Option<String>>,
    /// `None` unless built with [`recording`](Self::recording)
    calls: Option<Mutex<Vec<RemoteCall>>>,
    pending_hold: Mutex<Option<PendingHold>>,
}

impl MemoryRemoteStore {
    /// Store that keeps no call log
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store that logs every call for later inspection
    pub fn recording() -> Self {
        Self::build(Some(Mutex::new(Vec::new())))
    }

    fn build(calls: Option<Mutex<Vec<RemoteCall>>>) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            failing_reads: Mutex::new(HashSet::new()),
            fail_writes: Mutex::new(None),
            calls,
            pending_hold: Mutex::new(None),
        }
    }

    /// Replace the contents of a table
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().await.insert(table.to_string(), rows);
    }

    /// Current contents of a table (empty if never written)
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make reads of `table` fail with an API error
    pub async fn fail_reads(&self, table: &str) {
        self.failing_reads.lock().await.insert(table.to_string());
    }

    /// Make every upsert/delete fail with `message` (`None` restores writes)
    pub async fn fail_writes(&self, message: Option<&str>) {
        *self.fail_writes.lock().await = message.map(str::to_string);
    }

    pub async fn clear_failures(&self) {
        self.failing_reads.lock().await.clear();
        *self.fail_writes.lock().await = None;
    }

    /// Hold the responses of the next `count` reads
    ///
    /// Reads issued after those `count` pass straight through.
    pub async fn hold_reads(&self, count: usize) -> ReadHold {
        let (release, released) = watch::channel(count == 0);
        if count > 0 {
            *self.pending_hold.lock().await = Some(PendingHold {
                remaining: count,
                released,
            });
        }
        ReadHold { release }
    }

    /// Reads the most recent hold has yet to capture
    pub async fn unclaimed_holds(&self) -> usize {
        self.pending_hold
            .lock()
            .await
            .as_ref()
            .map_or(0, |hold| hold.remaining)
    }

    /// Logged calls; always empty for a non-recording store
    pub async fn calls(&self) -> Vec<RemoteCall> {
        match &self.calls {
            Some(calls) => calls.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn clear_calls(&self) {
        if let Some(calls) = &self.calls {
            calls.lock().await.clear();
        }
    }

    /// Rows of every upsert issued against `table`, in call order
    pub async fn upserts_for(&self, table: &str) -> Vec<Vec<Value>> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Upsert { table: t, rows } if t == table => Some(rows),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: impl FnOnce() -> RemoteCall) {
        if let Some(calls) = &self.calls {
            calls.lock().await.push(call());
        }
    }

    /// Claim a slot of the pending hold, if any
    async fn take_hold(&self) -> Option<watch::Receiver<bool>> {
        let mut pending = self.pending_hold.lock().await;
        let hold = pending.as_mut()?;
        hold.remaining = hold.remaining.saturating_sub(1);
        let released = hold.released.clone();
        if hold.remaining == 0 {
            *pending = None;
        }
        Some(released)
    }

    async fn check_writable(&self) -> Result<(), RemoteError> {
        match self.fail_writes.lock().await.as_ref() {
            Some(message) => Err(RemoteError::Api(500, message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict_key<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn compare_by(a: &Value, b: &Value, column: &str) -> Ordering {
    let left = a.get(column).map(Value::to_string).unwrap_or_default();
    let right = b.get(column).map(Value::to_string).unwrap_or_default();
    left.cmp(&right)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn select_all(&self, table: &str, order: Option<OrderBy>) -> Result<Vec<Value>, RemoteError> {
        self.record(|| RemoteCall::Select {
            table: table.to_string(),
        })
        .await;

        let response = if self.failing_reads.lock().await.contains(table) {
            Err(RemoteError::Api(
                503,
                format!("Table {} is unavailable", table),
            ))
        } else {
            let mut rows = self.rows(table).await;
            if let Some(order) = order {
                rows.sort_by(|a, b| {
                    let ord = compare_by(a, b, order.column);
                    if order.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
            }
            Ok(rows)
        };

        if let Some(mut released) = self.take_hold().await {
            // A dropped hold also sends the release first
            let _ = released.wait_for(|open| *open).await;
        }
        response
    }

    async fn upsert(&self, table: &str, rows: &[Value], on_conflict: &str) -> Result<(), RemoteError> {
        self.record(|| RemoteCall::Upsert {
            table: table.to_string(),
            rows: rows.to_vec(),
        })
        .await;
        self.check_writable().await?;

        let mut tables = self.tables.lock().await;
        let existing = tables.entry(table.to_string()).or_default();
        for row in rows {
            let key = conflict_key(row, on_conflict);
            match existing
                .iter_mut()
                .find(|r| key.is_some() && conflict_key(r, on_conflict) == key)
            {
                Some(slot) => *slot = row.clone(),
                None => existing.push(row.clone()),
            }
        }
        Ok(())
    }

    async fn delete_eq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError> {
        self.record(|| RemoteCall::DeleteEq {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })
        .await;
        self.check_writable().await?;

        if let Some(rows) = self.tables.lock().await.get_mut(table) {
            rows.retain(|r| conflict_key(r, column) != Some(value));
        }
        Ok(())
    }

    async fn delete_neq(&self, table: &str, column: &str, value: &str) -> Result<(), RemoteError> {
        self.record(|| RemoteCall::DeleteNeq {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        })
        .await;
        self.check_writable().await?;

        if let Some(rows) = self.tables.lock().await.get_mut(table) {
            rows.retain(|r| conflict_key(r, column) == Some(value));
        }
        Ok(())
    }
}
