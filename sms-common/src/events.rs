//! Sync event types and broadcast bus
//!
//! Events are emitted by the sync manager and streamed to connected clients
//! (sync indicator, feature modules) over SSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Where a collection change originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Mutation by a feature module
    Local,
    /// Overwrite applied by a fetch cycle
    Remote,
}

/// Events broadcast by the sync manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A fetch cycle began
    SyncStarted {
        cycle: u64,
        timestamp: DateTime<Utc>,
    },

    /// A fetch cycle applied its results
    SyncCompleted {
        cycle: u64,
        last_synced: String,
        /// Collections overwritten from the remote store
        applied: Vec<String>,
        /// Collections left alone (empty grade scale, local edit in flight)
        skipped: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A fetch cycle failed and nothing was applied
    SyncFailed {
        cycle: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A collection's in-memory value was replaced
    CollectionChanged {
        collection: String,
        count: usize,
        source: ChangeSource,
        timestamp: DateTime<Utc>,
    },

    /// Local persistence failed (quota) and was skipped
    StorageWarning {
        key: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Branding settings saved locally and remotely
    SettingsSaved {
        timestamp: DateTime<Utc>,
    },

    /// Branding settings saved locally but the remote upsert failed
    SettingsSaveFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Logged-in identity changed (`None` after logout)
    IdentityChanged {
        user_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::SyncStarted { .. } => "SyncStarted",
            SyncEvent::SyncCompleted { .. } => "SyncCompleted",
            SyncEvent::SyncFailed { .. } => "SyncFailed",
            SyncEvent::CollectionChanged { .. } => "CollectionChanged",
            SyncEvent::StorageWarning { .. } => "StorageWarning",
            SyncEvent::SettingsSaved { .. } => "SettingsSaved",
            SyncEvent::SettingsSaveFailed { .. } => "SettingsSaveFailed",
            SyncEvent::IdentityChanged { .. } => "IdentityChanged",
        }
    }
}

/// Broadcast bus for [`SyncEvent`]s
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SyncEvent) -> Result<usize, broadcast::error::SendError<SyncEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = SyncEvent::SyncStarted {
            cycle: 1,
            timestamp: now(),
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .emit(SyncEvent::SettingsSaved { timestamp: now() })
            .is_err());
        // Lossy emit must not panic
        bus.emit_lossy(SyncEvent::SettingsSaved { timestamp: now() });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = SyncEvent::CollectionChanged {
            collection: "students".to_string(),
            count: 3,
            source: ChangeSource::Local,
            timestamp: now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CollectionChanged");
        assert_eq!(json["source"], "local");
        assert_eq!(event.event_type(), "CollectionChanged");
    }
}
