//! Event types for the registry event system
//!
//! Import sessions publish on an `EventBus`; downstream caches subscribe and
//! drop whatever they hold for a region when `RegionDataChanged` arrives.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Registry event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    /// An import session started for a region
    ImportSessionStarted {
        session_id: Uuid,
        region_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An import session reached a terminal state
    ImportSessionCompleted {
        session_id: Uuid,
        region_id: i64,
        processed_count: usize,
        error_count: usize,
        warning_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Facilities or snapshots of a region changed; cached views are stale
    ///
    /// Triggers:
    /// - API caches: drop region listings and tiles
    RegionDataChanged {
        region_id: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for registry events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RegistryEvent,
    ) -> Result<usize, broadcast::error::SendError<RegistryEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RegistryEvent) {
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
