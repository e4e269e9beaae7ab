//! Region cache invalidation

use registry_common::events::{EventBus, RegistryEvent};

/// Notified once per successful import so cached region views are dropped
///
/// Fire-and-forget: implementations must not fail the import.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, region_id: i64);
}

impl CacheInvalidator for EventBus {
    fn invalidate(&self, region_id: i64) {
        self.emit_lossy(RegistryEvent::RegionDataChanged {
            region_id,
            timestamp: registry_common::time::now(),
        });
    }
}
