use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::ports::{ResourceDirectory, UserDirectory};
use crate::domain::resource::{ResourceId, ResourceKind, ResourceRecord, ResourceState};
use crate::domain::user::{User, UserId};
use crate::error::{CirculationError, Result};

/// A thread-safe in-memory resource catalog.
///
/// Uses `Arc<RwLock<HashMap<..>>>` for shared concurrent access. The
/// search and listing helpers beyond the `ResourceDirectory` port exist
/// for reporting collaborators and demo wiring.
#[derive(Default, Clone)]
pub struct InMemoryResourceDirectory {
    records: Arc<RwLock<HashMap<ResourceId, ResourceRecord>>>,
}

impl InMemoryResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, record: ResourceRecord) {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
    }

    pub async fn remove(&self, id: &ResourceId) -> bool {
        self.records.write().await.remove(id).is_some()
    }

    /// Case-insensitive substring match on titles.
    pub async fn search_title(&self, needle: &str) -> Vec<ResourceRecord> {
        let needle = needle.to_lowercase();
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.title.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub async fn by_kind(&self, kind: ResourceKind) -> Vec<ResourceRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect()
    }

    /// Every record, ordered by title.
    pub async fn all_sorted(&self) -> Vec<ResourceRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.title.cmp(&b.title));
        records
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ResourceDirectory for InMemoryResourceDirectory {
    async fn find(&self, id: &ResourceId) -> Result<Option<ResourceRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_available(&self) -> Result<Vec<ResourceRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.available())
            .cloned()
            .collect())
    }

    async fn update_state(&self, id: &ResourceId, state: ResourceState) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| CirculationError::ResourceNotFound(id.clone()))?;
        record.state = state;
        Ok(())
    }
}

/// A thread-safe in-memory user registry.
#[derive(Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user: User) {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user);
    }

    pub async fn all(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }
}
