use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::resource::{LendingPolicy, ResourceKind};

/// Externally supplied tuning for the circulation engine.
///
/// Nothing in the engine hard-codes these values; components take what
/// they need from this struct at construction time. The demo binary can
/// load it from a JSON file, and every field falls back to its default
/// when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CirculationConfig {
    /// Lending policy per resource kind.
    pub book_policy: LendingPolicy,
    pub magazine_policy: LendingPolicy,
    pub audiobook_policy: LendingPolicy,

    /// Window for "due soon" reminders from the expiry monitor.
    pub due_soon_window_days: i64,
    /// Active reservations older than this are purged.
    pub reservation_retention_days: i64,
    /// How long a fulfilled reservation keeps a resource held for its
    /// claimant before the hold lapses.
    pub hold_window_days: i64,

    /// Polling interval of the expiry monitor, in seconds.
    pub expiry_check_interval_secs: u64,
    /// Polling interval of the reservation monitor, in seconds.
    pub reservation_check_interval_secs: u64,
    /// How long `stop()` waits for an in-flight monitor run before
    /// aborting it.
    pub monitor_stop_grace_secs: u64,
    /// How long dispatcher shutdown waits for the in-flight delivery.
    pub dispatcher_grace_secs: u64,
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            book_policy: LendingPolicy {
                loanable: true,
                loan_term_days: 15,
                max_renewals: 2,
            },
            magazine_policy: LendingPolicy {
                loanable: true,
                loan_term_days: 7,
                max_renewals: 0,
            },
            audiobook_policy: LendingPolicy {
                loanable: true,
                loan_term_days: 10,
                max_renewals: 2,
            },
            due_soon_window_days: 3,
            reservation_retention_days: 7,
            hold_window_days: 3,
            expiry_check_interval_secs: 86_400,
            reservation_check_interval_secs: 3_600,
            monitor_stop_grace_secs: 5,
            dispatcher_grace_secs: 5,
        }
    }
}

impl CirculationConfig {
    pub fn policy_for(&self, kind: ResourceKind) -> LendingPolicy {
        match kind {
            ResourceKind::Book => self.book_policy,
            ResourceKind::Magazine => self.magazine_policy,
            ResourceKind::Audiobook => self.audiobook_policy,
        }
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }

    pub fn reservation_check_interval(&self) -> Duration {
        Duration::from_secs(self.reservation_check_interval_secs)
    }

    pub fn monitor_stop_grace(&self) -> Duration {
        Duration::from_secs(self.monitor_stop_grace_secs)
    }

    pub fn dispatcher_grace(&self) -> Duration {
        Duration::from_secs(self.dispatcher_grace_secs)
    }
}
