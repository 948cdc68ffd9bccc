use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use uuid::Uuid;

use super::resource::ResourceId;
use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A queued request to be next in line for a resource.
///
/// Duplicate reservations per (user, resource) are allowed. Cancelled and
/// fulfilled reservations stay in the manager with `active = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub requested_at: DateTime<Utc>,
    pub priority: u8,
    pub active: bool,
}

impl Reservation {
    pub fn new(
        resource_id: ResourceId,
        user_id: UserId,
        priority: u8,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::generate(),
            resource_id,
            user_id,
            requested_at,
            priority,
            active: true,
        }
    }

    /// Queue ordering key: higher priority first, then earliest request.
    ///
    /// Exact ties are broken by queue insertion order, which callers get
    /// for free from `min_by_key` over the queue in insertion order.
    pub fn rank(&self) -> (Reverse<u8>, DateTime<Utc>) {
        (Reverse(self.priority), self.requested_at)
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
