use async_trait::async_trait;
use std::sync::Arc;

use super::resource::{ResourceId, ResourceRecord, ResourceState};
use super::user::{User, UserId};
use crate::error::Result;

/// Catalog of lendable resources, owned outside the circulation engine.
///
/// The engine only reads records and writes state transitions through this
/// port; it never stores resource objects itself.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn find(&self, id: &ResourceId) -> Result<Option<ResourceRecord>>;
    async fn list_available(&self) -> Result<Vec<ResourceRecord>>;
    async fn update_state(&self, id: &ResourceId, state: ResourceState) -> Result<()>;
}

/// Registry of users, owned outside the engine. Only lookup is needed:
/// user identity travels through the engine as an opaque `UserId`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find(&self, id: &UserId) -> Result<Option<User>>;
}

/// Delivery capability for user-facing notifications.
///
/// `Ok(false)` means the channel declined delivery (e.g. it is offline);
/// either way delivery is best-effort and callers must not depend on it.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, user: &User, message: &str, urgent: bool) -> Result<bool>;
}

/// The narrow seam the loan ledger uses to honor reservation claims.
///
/// A resource sitting in `Reserved` state belongs to exactly one claimant:
/// either the user whose fulfilled reservation put a hold on it, or the
/// user at the head of its active queue. Only that claimant may loan it.
///
/// Both methods assume the caller already holds the per-resource lock;
/// they must not acquire it themselves.
#[async_trait]
pub trait ReservationHolds: Send + Sync {
    /// The user currently entitled to loan this resource, if any.
    async fn holder_of(&self, resource_id: &ResourceId) -> Option<UserId>;

    /// Consumes the claimant's entitlement once their loan is granted:
    /// clears a pending hold and retires their head-of-queue reservation.
    async fn release_hold(&self, resource_id: &ResourceId, user_id: &UserId);
}

pub type ResourceDirectoryRef = Arc<dyn ResourceDirectory>;
pub type UserDirectoryRef = Arc<dyn UserDirectory>;
pub type NotificationChannelRef = Arc<dyn NotificationChannel>;
pub type ReservationHoldsRef = Arc<dyn ReservationHolds>;
