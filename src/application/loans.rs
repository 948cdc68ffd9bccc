use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::locks::ResourceLocks;
use crate::domain::loan::{Loan, LoanId};
use crate::domain::ports::{ReservationHoldsRef, ResourceDirectoryRef};
use crate::domain::resource::{ResourceId, ResourceState};
use crate::domain::user::UserId;
use crate::error::{CirculationError, Result};

#[derive(Default)]
struct GrantStats {
    by_resource: HashMap<ResourceId, u64>,
    by_user: HashMap<UserId, u64>,
}

/// The loan ledger: sole owner and sole writer of loan records.
///
/// Enforces at most one active loan per resource by serializing every
/// grant/return/renewal for a resource through the shared per-resource
/// lock table. Loans are retained after return for history and
/// statistics.
///
/// The ledger is notification-agnostic: callers decide what, if anything,
/// to announce about a successful mutation.
pub struct LoanLedger {
    resources: ResourceDirectoryRef,
    holds: ReservationHoldsRef,
    locks: Arc<ResourceLocks>,
    loans: RwLock<HashMap<LoanId, Loan>>,
    stats: RwLock<GrantStats>,
}

impl LoanLedger {
    pub fn new(
        resources: ResourceDirectoryRef,
        holds: ReservationHoldsRef,
        locks: Arc<ResourceLocks>,
    ) -> Self {
        Self {
            resources,
            holds,
            locks,
            loans: RwLock::new(HashMap::new()),
            stats: RwLock::new(GrantStats::default()),
        }
    }

    /// Grants a loan of `resource_id` to `user_id`.
    ///
    /// The availability check and the state flip happen atomically with
    /// respect to every other mutation of the same resource. A resource
    /// in `Reserved` state can only be loaned by its claimant (the user
    /// whose fulfilled reservation holds it, or the head of its queue).
    pub async fn grant_loan(&self, resource_id: &ResourceId, user_id: &UserId) -> Result<Loan> {
        let _guard = self.locks.acquire(resource_id).await;

        let resource = self
            .resources
            .find(resource_id)
            .await?
            .ok_or_else(|| CirculationError::ResourceNotFound(resource_id.clone()))?;

        if !resource.policy.loanable {
            return Err(CirculationError::ResourceUnavailable {
                id: resource_id.clone(),
                reason: "this resource cannot be loaned".into(),
            });
        }

        match resource.state {
            ResourceState::Available => {}
            ResourceState::Reserved => {
                let holder = self.holds.holder_of(resource_id).await;
                if holder.as_ref() != Some(user_id) {
                    return Err(CirculationError::ResourceUnavailable {
                        id: resource_id.clone(),
                        reason: "reserved for another user".into(),
                    });
                }
            }
            ResourceState::Loaned => {
                return Err(CirculationError::ResourceUnavailable {
                    id: resource_id.clone(),
                    reason: "currently loaned".into(),
                });
            }
            ResourceState::UnderRepair => {
                return Err(CirculationError::ResourceUnavailable {
                    id: resource_id.clone(),
                    reason: "under repair".into(),
                });
            }
        }

        let loan = Loan::new(
            resource_id.clone(),
            user_id.clone(),
            Utc::now(),
            resource.policy.loan_term_days,
        );

        self.resources
            .update_state(resource_id, ResourceState::Loaned)
            .await?;
        if resource.state == ResourceState::Reserved {
            self.holds.release_hold(resource_id, user_id).await;
        }

        self.loans.write().await.insert(loan.id, loan.clone());
        self.record_grant(resource_id, user_id).await;

        debug!(loan = %loan.id, resource = %resource_id, user = %user_id, due = %loan.due_at, "loan granted");
        Ok(loan)
    }

    /// Marks a loan returned and frees its resource.
    ///
    /// Returns `Ok(false)` without touching anything if the loan was
    /// already returned.
    pub async fn return_loan(&self, loan_id: LoanId) -> Result<bool> {
        let resource_id = {
            let loans = self.loans.read().await;
            let loan = loans
                .get(&loan_id)
                .ok_or(CirculationError::LoanNotFound(loan_id))?;
            if !loan.active {
                return Ok(false);
            }
            loan.resource_id.clone()
        };

        let _guard = self.locks.acquire(&resource_id).await;

        // Re-check under the lock; a concurrent return may have won.
        {
            let loans = self.loans.read().await;
            match loans.get(&loan_id) {
                None => return Err(CirculationError::LoanNotFound(loan_id)),
                Some(loan) if !loan.active => return Ok(false),
                Some(_) => {}
            }
        }

        self.resources
            .update_state(&resource_id, ResourceState::Available)
            .await?;

        if let Some(loan) = self.loans.write().await.get_mut(&loan_id) {
            loan.finish();
        }

        debug!(loan = %loan_id, resource = %resource_id, "loan returned");
        Ok(true)
    }

    /// Extends an active loan by `extension_days`, within the renewal
    /// budget of the resource's kind. Returns the new due timestamp.
    pub async fn renew_loan(
        &self,
        loan_id: LoanId,
        extension_days: i64,
    ) -> Result<DateTime<Utc>> {
        let resource_id = {
            let loans = self.loans.read().await;
            let loan = loans
                .get(&loan_id)
                .ok_or(CirculationError::LoanNotFound(loan_id))?;
            loan.resource_id.clone()
        };

        let _guard = self.locks.acquire(&resource_id).await;

        let resource = self
            .resources
            .find(&resource_id)
            .await?
            .ok_or_else(|| CirculationError::ResourceNotFound(resource_id.clone()))?;

        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&loan_id)
            .ok_or(CirculationError::LoanNotFound(loan_id))?;

        if !loan.active {
            return Err(CirculationError::AlreadyReturned(loan_id));
        }
        if !resource.policy.renewable() {
            return Err(CirculationError::NotRenewable {
                id: loan_id,
                reason: format!("{} loans cannot be renewed", resource_id),
            });
        }
        if loan.renewals >= resource.policy.max_renewals {
            return Err(CirculationError::NotRenewable {
                id: loan_id,
                reason: format!(
                    "renewal limit of {} reached",
                    resource.policy.max_renewals
                ),
            });
        }

        let new_due = loan.extend(extension_days);
        debug!(loan = %loan_id, due = %new_due, renewals = loan.renewals, "loan renewed");
        Ok(new_due)
    }

    pub async fn find_loan(&self, loan_id: LoanId) -> Option<Loan> {
        self.loans.read().await.get(&loan_id).cloned()
    }

    /// Active loans whose due date has passed as of `as_of`.
    pub async fn loans_overdue(&self, as_of: DateTime<Utc>) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|loan| loan.is_overdue(as_of))
            .cloned()
            .collect()
    }

    /// Active loans falling due within `days` of `as_of`, overdue excluded.
    pub async fn loans_due_within(&self, days: i64, as_of: DateTime<Utc>) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|loan| loan.due_within(days, as_of))
            .cloned()
            .collect()
    }

    pub async fn active_loans_for(&self, user_id: &UserId) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|loan| loan.active && &loan.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Full loan history, for statistics and reporting collaborators.
    pub async fn all_loans(&self) -> Vec<Loan> {
        self.loans.read().await.values().cloned().collect()
    }

    /// Resources ranked by total grants, most borrowed first.
    pub async fn most_borrowed(&self, limit: usize) -> Vec<(ResourceId, u64)> {
        let stats = self.stats.read().await;
        let mut ranked: Vec<_> = stats
            .by_resource
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Users ranked by total grants, most active first.
    pub async fn most_active_users(&self, limit: usize) -> Vec<(UserId, u64)> {
        let stats = self.stats.read().await;
        let mut ranked: Vec<_> = stats
            .by_user
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    async fn record_grant(&self, resource_id: &ResourceId, user_id: &UserId) {
        let mut stats = self.stats.write().await;
        *stats.by_resource.entry(resource_id.clone()).or_default() += 1;
        *stats.by_user.entry(user_id.clone()).or_default() += 1;
    }
}
