use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{Id, Task, Version, VersionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filters pushed down to the store when listing a task's versions.
/// Status and tag filters stay in the engine: status is derived and tags
/// live inside the payload document.
#[derive(Debug, Clone, Default)]
pub struct VersionQuery {
    pub types: Option<Vec<VersionType>>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub min_number: Option<i32>,
    pub max_number: Option<i32>,
}

#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: &Id) -> Result<Option<Task>>;
    async fn upsert_task(&self, task: Task) -> Result<()>;
    async fn delete_task(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    async fn get_version(&self, id: &Id) -> Result<Option<Version>>;
    async fn upsert_version(&self, version: Version) -> Result<()>;
    async fn delete_version(&self, id: &Id) -> Result<bool>;
    /// All versions of a task ordered by creation time.
    async fn list_versions_for_task(&self, task_id: &Id, order: SortOrder) -> Result<Vec<Version>>;
    /// Filtered listing, newest first.
    async fn query_versions(&self, task_id: &Id, query: &VersionQuery) -> Result<Vec<Version>>;
    /// The version with the highest number in the task, if any.
    async fn latest_version_for_task(&self, task_id: &Id) -> Result<Option<Version>>;
}

/// Byte-blob retrieval for pre-built archives, keyed by storage key.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

pub trait Store: TaskStore + VersionStore + Send + Sync {}
