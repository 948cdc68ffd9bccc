use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a lendable resource, assigned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Circulation state of a resource.
///
/// `UnderRepair` is opaque to the circulation engine: it is treated as
/// unavailable and never set by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Available,
    Loaned,
    Reserved,
    UnderRepair,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceState::Available => "available",
            ResourceState::Loaned => "loaned",
            ResourceState::Reserved => "reserved",
            ResourceState::UnderRepair => "under repair",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Book,
    Magazine,
    Audiobook,
}

/// Lending capabilities of a resource kind.
///
/// Supplied by configuration when the catalog is seeded; the engine never
/// inspects concrete resource types, only this descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPolicy {
    pub loanable: bool,
    pub loan_term_days: i64,
    pub max_renewals: u32,
}

impl LendingPolicy {
    pub fn renewable(&self) -> bool {
        self.max_renewals > 0
    }
}

/// A catalog entry as handed back by the resource directory.
///
/// The circulation engine borrows these records; it never stores them.
/// State changes go back through `ResourceDirectory::update_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub title: String,
    pub author: String,
    pub kind: ResourceKind,
    pub state: ResourceState,
    pub policy: LendingPolicy,
}

impl ResourceRecord {
    pub fn new(
        id: impl Into<ResourceId>,
        title: impl Into<String>,
        author: impl Into<String>,
        kind: ResourceKind,
        policy: LendingPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            kind,
            state: ResourceState::Available,
            policy,
        }
    }

    pub fn available(&self) -> bool {
        self.state == ResourceState::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_available() {
        let policy = LendingPolicy {
            loanable: true,
            loan_term_days: 15,
            max_renewals: 2,
        };
        let record = ResourceRecord::new("L001", "1984", "George Orwell", ResourceKind::Book, policy);
        assert_eq!(record.state, ResourceState::Available);
        assert!(record.available());
    }

    #[test]
    fn test_policy_renewable() {
        let magazine = LendingPolicy {
            loanable: true,
            loan_term_days: 7,
            max_renewals: 0,
        };
        assert!(!magazine.renewable());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ResourceState::UnderRepair).unwrap();
        assert_eq!(json, "\"under_repair\"");
    }
}
