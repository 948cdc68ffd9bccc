use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::locks::ResourceLocks;
use crate::config::CirculationConfig;
use crate::domain::ports::{ReservationHolds, ResourceDirectoryRef};
use crate::domain::reservation::{Reservation, ReservationId};
use crate::domain::resource::{ResourceId, ResourceState};
use crate::domain::user::UserId;
use crate::error::{CirculationError, Result};

/// A fulfilled reservation keeping a resource parked in `Reserved` state
/// until its claimant picks it up or the hold window lapses.
#[derive(Debug, Clone)]
struct Hold {
    user_id: UserId,
    placed_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    reservations: HashMap<ReservationId, Reservation>,
    /// Per-resource queues in insertion order; ranking is applied on read.
    queues: HashMap<ResourceId, Vec<ReservationId>>,
    holds: HashMap<ResourceId, Hold>,
}

/// Highest-ranked active reservation in a resource's queue.
///
/// `min_by_key` over insertion order keeps the selection stable when two
/// reservations tie on both priority and timestamp.
fn head_id(state: &QueueState, resource_id: &ResourceId) -> Option<ReservationId> {
    let queue = state.queues.get(resource_id)?;
    queue
        .iter()
        .filter_map(|id| state.reservations.get(id))
        .filter(|reservation| reservation.active)
        .min_by_key(|reservation| reservation.rank())
        .map(|reservation| reservation.id)
}

/// Owner of reservation records, per-resource queues and claimant holds.
///
/// Shares the per-resource lock table with the loan ledger, so queue
/// mutations and the resource-state transitions tied to them serialize
/// with loan grants and returns on the same resource.
pub struct ReservationQueue {
    resources: ResourceDirectoryRef,
    locks: Arc<ResourceLocks>,
    retention: Duration,
    hold_window: Duration,
    state: RwLock<QueueState>,
}

impl ReservationQueue {
    pub fn new(
        resources: ResourceDirectoryRef,
        locks: Arc<ResourceLocks>,
        config: &CirculationConfig,
    ) -> Self {
        Self {
            resources,
            locks,
            retention: Duration::days(config.reservation_retention_days),
            hold_window: Duration::days(config.hold_window_days),
            state: RwLock::new(QueueState::default()),
        }
    }

    /// Queues a reservation for `resource_id`.
    ///
    /// The queue is created lazily on first use. An `Available` resource
    /// flips to `Reserved` so it cannot be loaned past the queue.
    pub async fn reserve(
        &self,
        resource_id: &ResourceId,
        user_id: &UserId,
        priority: u8,
    ) -> Result<Reservation> {
        let _guard = self.locks.acquire(resource_id).await;

        let resource = self
            .resources
            .find(resource_id)
            .await?
            .ok_or_else(|| CirculationError::ResourceNotFound(resource_id.clone()))?;

        let reservation = Reservation::new(
            resource_id.clone(),
            user_id.clone(),
            priority,
            Utc::now(),
        );
        {
            let mut state = self.state.write().await;
            state
                .queues
                .entry(resource_id.clone())
                .or_default()
                .push(reservation.id);
            state.reservations.insert(reservation.id, reservation.clone());
        }

        if resource.state == ResourceState::Available {
            self.resources
                .update_state(resource_id, ResourceState::Reserved)
                .await?;
        }

        debug!(reservation = %reservation.id, resource = %resource_id, user = %user_id, priority, "reservation queued");
        Ok(reservation)
    }

    /// Cancels a reservation.
    ///
    /// Returns `Ok(false)` if it was already inactive. When the last
    /// active reservation leaves the queue and no hold is pending, a
    /// `Reserved` resource goes back to `Available`.
    pub async fn cancel(&self, reservation_id: ReservationId) -> Result<bool> {
        let resource_id = {
            let state = self.state.read().await;
            let reservation = state
                .reservations
                .get(&reservation_id)
                .ok_or(CirculationError::ReservationNotFound(reservation_id))?;
            if !reservation.active {
                return Ok(false);
            }
            reservation.resource_id.clone()
        };

        let _guard = self.locks.acquire(&resource_id).await;

        let frees_resource = {
            let mut state = self.state.write().await;
            let reservation = state
                .reservations
                .get_mut(&reservation_id)
                .ok_or(CirculationError::ReservationNotFound(reservation_id))?;
            if !reservation.active {
                return Ok(false);
            }
            reservation.deactivate();
            if let Some(queue) = state.queues.get_mut(&resource_id) {
                queue.retain(|id| *id != reservation_id);
            }
            let queue_empty = state
                .queues
                .get(&resource_id)
                .is_none_or(|queue| queue.is_empty());
            queue_empty && !state.holds.contains_key(&resource_id)
        };

        if frees_resource
            && let Some(record) = self.resources.find(&resource_id).await?
            && record.state == ResourceState::Reserved
        {
            self.resources
                .update_state(&resource_id, ResourceState::Available)
                .await?;
        }

        debug!(reservation = %reservation_id, resource = %resource_id, "reservation cancelled");
        Ok(true)
    }

    /// The reservation currently first in line, without removing it.
    ///
    /// Repeated calls with no intervening mutation return the same
    /// reservation.
    pub async fn head_of(&self, resource_id: &ResourceId) -> Option<Reservation> {
        let state = self.state.read().await;
        head_id(&state, resource_id).and_then(|id| state.reservations.get(&id).cloned())
    }

    /// Removes and returns the reservation first in line, recording a
    /// hold so only that user can loan the resource while it sits
    /// `Reserved`.
    pub async fn take_head(&self, resource_id: &ResourceId) -> Option<Reservation> {
        let _guard = self.locks.acquire(resource_id).await;
        let mut state = self.state.write().await;
        Self::take_head_locked(&mut state, resource_id, Utc::now())
    }

    fn take_head_locked(
        state: &mut QueueState,
        resource_id: &ResourceId,
        now: DateTime<Utc>,
    ) -> Option<Reservation> {
        let taken_id = head_id(state, resource_id)?;
        if let Some(queue) = state.queues.get_mut(resource_id) {
            queue.retain(|id| *id != taken_id);
        }
        let reservation = state.reservations.get_mut(&taken_id)?;
        reservation.deactivate();
        let taken = reservation.clone();
        state.holds.insert(
            resource_id.clone(),
            Hold {
                user_id: taken.user_id.clone(),
                placed_at: now,
            },
        );
        Some(taken)
    }

    /// Atomic fulfillment step for the reservation monitor: if the
    /// resource is `Available` and has a waiting reservation, takes the
    /// head, flips the resource to `Reserved` and records the hold, all
    /// under the resource lock.
    pub async fn claim_next(&self, resource_id: &ResourceId) -> Result<Option<Reservation>> {
        let _guard = self.locks.acquire(resource_id).await;

        let Some(record) = self.resources.find(resource_id).await? else {
            return Ok(None);
        };
        if record.state != ResourceState::Available {
            return Ok(None);
        }

        let taken = {
            let mut state = self.state.write().await;
            Self::take_head_locked(&mut state, resource_id, Utc::now())
        };
        let Some(reservation) = taken else {
            return Ok(None);
        };

        self.resources
            .update_state(resource_id, ResourceState::Reserved)
            .await?;
        debug!(reservation = %reservation.id, resource = %resource_id, user = %reservation.user_id, "reservation fulfilled");
        Ok(Some(reservation))
    }

    /// Cancels every active reservation older than the retention window,
    /// through the regular `cancel` path so resource-state side effects
    /// apply. Returns how many were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let expired: Vec<ReservationId> = {
            let state = self.state.read().await;
            state
                .reservations
                .values()
                .filter(|reservation| reservation.active && reservation.requested_at < cutoff)
                .map(|reservation| reservation.id)
                .collect()
        };

        let mut purged = 0;
        for id in expired {
            match self.cancel(id).await {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(reservation = %id, %error, "failed to purge expired reservation");
                }
            }
        }
        purged
    }

    /// Releases holds older than the hold window. A released resource
    /// goes back to `Available` unless other reservations are still
    /// queued, in which case it stays `Reserved` for the next head.
    pub async fn purge_expired_holds(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.hold_window;
        let stale: Vec<ResourceId> = {
            let state = self.state.read().await;
            state
                .holds
                .iter()
                .filter(|(_, hold)| hold.placed_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut released = 0;
        for resource_id in stale {
            let _guard = self.locks.acquire(&resource_id).await;
            let still_queued = {
                let mut state = self.state.write().await;
                // Re-check under the lock; the claimant may have borrowed
                // in the meantime.
                let still_stale = state
                    .holds
                    .get(&resource_id)
                    .is_some_and(|hold| hold.placed_at < cutoff);
                if !still_stale {
                    continue;
                }
                state.holds.remove(&resource_id);
                head_id(&state, &resource_id).is_some()
            };

            if !still_queued {
                match self.resources.find(&resource_id).await {
                    Ok(Some(record)) if record.state == ResourceState::Reserved => {
                        if let Err(error) = self
                            .resources
                            .update_state(&resource_id, ResourceState::Available)
                            .await
                        {
                            warn!(resource = %resource_id, %error, "failed to release held resource");
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(resource = %resource_id, %error, "failed to look up held resource");
                    }
                }
            }
            debug!(resource = %resource_id, "hold lapsed");
            released += 1;
        }
        released
    }

    pub async fn find_reservation(&self, reservation_id: ReservationId) -> Option<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .get(&reservation_id)
            .cloned()
    }

    pub async fn active_reservations(&self) -> Vec<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .values()
            .filter(|reservation| reservation.active)
            .cloned()
            .collect()
    }

    pub async fn active_reservations_for(&self, resource_id: &ResourceId) -> Vec<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .values()
            .filter(|reservation| reservation.active && &reservation.resource_id == resource_id)
            .cloned()
            .collect()
    }

    pub async fn reservations_for_user(&self, user_id: &UserId) -> Vec<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .values()
            .filter(|reservation| reservation.active && &reservation.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Full reservation history, inactive entries included.
    pub async fn all_reservations(&self) -> Vec<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReservationHolds for ReservationQueue {
    async fn holder_of(&self, resource_id: &ResourceId) -> Option<UserId> {
        let state = self.state.read().await;
        if let Some(hold) = state.holds.get(resource_id) {
            return Some(hold.user_id.clone());
        }
        head_id(&state, resource_id)
            .and_then(|id| state.reservations.get(&id))
            .map(|reservation| reservation.user_id.clone())
    }

    async fn release_hold(&self, resource_id: &ResourceId, user_id: &UserId) {
        let mut state = self.state.write().await;
        if state
            .holds
            .get(resource_id)
            .is_some_and(|hold| &hold.user_id == user_id)
        {
            state.holds.remove(resource_id);
        }
        // If heading the queue is what entitled the claimant, that
        // reservation is now fulfilled.
        if let Some(head) = head_id(&state, resource_id)
            && state
                .reservations
                .get(&head)
                .is_some_and(|reservation| &reservation.user_id == user_id)
        {
            if let Some(reservation) = state.reservations.get_mut(&head) {
                reservation.deactivate();
            }
            if let Some(queue) = state.queues.get_mut(resource_id) {
                queue.retain(|id| *id != head);
            }
        }
    }
}
