use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{Id, Task, Version};
use crate::store::traits::{SortOrder, Store, TaskStore, VersionQuery, VersionStore};

/// Map-backed store used by tests and local development. Each call takes
/// the lock once, so single calls are atomic; there is no cross-call
/// transaction, matching the persistence contract of the real store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<Id, Task>>,
    versions: RwLock<HashMap<Id, Version>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn versions_of(&self, task_id: &Id) -> Vec<Version> {
        self.versions
            .read()
            .values()
            .filter(|v| &v.task_id == task_id)
            .cloned()
            .collect()
    }
}

fn sort_versions(versions: &mut [Version], order: SortOrder) {
    versions.sort_by(|a, b| {
        let key = (a.created_at, a.version_number).cmp(&(b.created_at, b.version_number));
        match order {
            SortOrder::Ascending => key,
            SortOrder::Descending => key.reverse(),
        }
    });
}

#[async_trait::async_trait]
impl TaskStore for InMemoryStore {
    async fn get_task(&self, id: &Id) -> Result<Option<Task>> {
        Ok(self.tasks.read().get(id).cloned())
    }

    async fn upsert_task(&self, task: Task) -> Result<()> {
        self.tasks.write().insert(task.id.clone(), task);
        Ok(())
    }

    async fn delete_task(&self, id: &Id) -> Result<bool> {
        Ok(self.tasks.write().remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl VersionStore for InMemoryStore {
    async fn get_version(&self, id: &Id) -> Result<Option<Version>> {
        Ok(self.versions.read().get(id).cloned())
    }

    async fn upsert_version(&self, version: Version) -> Result<()> {
        self.versions.write().insert(version.id.clone(), version);
        Ok(())
    }

    async fn delete_version(&self, id: &Id) -> Result<bool> {
        Ok(self.versions.write().remove(id).is_some())
    }

    async fn list_versions_for_task(&self, task_id: &Id, order: SortOrder) -> Result<Vec<Version>> {
        let mut versions = self.versions_of(task_id);
        sort_versions(&mut versions, order);
        Ok(versions)
    }

    async fn query_versions(&self, task_id: &Id, query: &VersionQuery) -> Result<Vec<Version>> {
        let mut versions = self.versions_of(task_id);
        if let Some(types) = &query.types {
            if !types.is_empty() {
                versions.retain(|v| types.contains(&v.version_type));
            }
        }
        if let Some(after) = query.created_after {
            versions.retain(|v| v.created_at >= after);
        }
        if let Some(before) = query.created_before {
            versions.retain(|v| v.created_at <= before);
        }
        if let Some(min) = query.min_number {
            versions.retain(|v| v.version_number >= min);
        }
        if let Some(max) = query.max_number {
            versions.retain(|v| v.version_number <= max);
        }
        sort_versions(&mut versions, SortOrder::Descending);
        Ok(versions)
    }

    async fn latest_version_for_task(&self, task_id: &Id) -> Result<Option<Version>> {
        Ok(self
            .versions_of(task_id)
            .into_iter()
            .max_by_key(|v| v.version_number))
    }
}

impl Store for InMemoryStore {}
