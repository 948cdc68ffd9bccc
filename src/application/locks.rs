use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::resource::ResourceId;

/// Per-resource lock table shared by the loan ledger and the reservation
/// queue.
///
/// Every mutation of a resource's loan/reservation state takes this lock
/// first, so concurrent grants, returns, reservations, cancellations and
/// monitor-driven transitions on one resource observe a single total
/// order. Operations on different resources proceed in parallel.
///
/// Locks are created lazily on first use and never removed; the table
/// grows with the catalog, not with traffic.
#[derive(Default)]
pub struct ResourceLocks {
    table: Mutex<HashMap<ResourceId, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &ResourceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().await;
            Arc::clone(table.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }
}
