use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::resource::ResourceId;
use super::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(Uuid);

impl LoanId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A record of a resource granted to a user for a bounded term.
///
/// Loans are never deleted: a returned loan stays in the ledger with
/// `active = false` for history and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub resource_id: ResourceId,
    pub user_id: UserId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub active: bool,
    pub renewals: u32,
}

impl Loan {
    pub fn new(
        resource_id: ResourceId,
        user_id: UserId,
        borrowed_at: DateTime<Utc>,
        term_days: i64,
    ) -> Self {
        Self {
            id: LoanId::generate(),
            resource_id,
            user_id,
            borrowed_at,
            due_at: borrowed_at + Duration::days(term_days),
            active: true,
            renewals: 0,
        }
    }

    pub fn is_overdue(&self, as_of: DateTime<Utc>) -> bool {
        self.active && as_of > self.due_at
    }

    /// Whether the loan falls due within the next `days`, overdue excluded.
    pub fn due_within(&self, days: i64, as_of: DateTime<Utc>) -> bool {
        self.active && as_of <= self.due_at && self.due_at <= as_of + Duration::days(days)
    }

    pub fn finish(&mut self) {
        self.active = false;
    }

    /// Pushes the due date out by `extension_days` and bumps the renewal
    /// counter. Policy checks live in the ledger, not here.
    pub fn extend(&mut self, extension_days: i64) -> DateTime<Utc> {
        self.due_at += Duration::days(extension_days);
        self.renewals += 1;
        self.due_at
    }
}
