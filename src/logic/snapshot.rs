use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Result, TimelineError};
use crate::model::{generate_id, Id, SnapshotPayload, TimelineEntry, Version, VersionType};
use crate::store::traits::{SortOrder, Store, VersionQuery};

/// The sole writer of new versions. Owns version-number allocation, which
/// must stay collision-free when the pipeline, branching, and import all
/// write into the same task concurrently.
#[async_trait::async_trait]
pub trait SnapshotCreator: Send + Sync {
    async fn create_snapshot(
        &self,
        task_id: &Id,
        tenant_id: &Id,
        version_type: VersionType,
        payload: SnapshotPayload,
    ) -> Result<Version>;
}

/// Snapshot lifecycle: creation, timeline projection, field-level compare,
/// rollback, and deletion (single and number-cutoff bulk).
pub struct SnapshotService<S> {
    store: Arc<S>,
    /// Serializes number allocation per task. Entries are never evicted;
    /// tasks are few and the guard is two words.
    task_locks: Mutex<HashMap<Id, Arc<AsyncMutex<()>>>>,
}

impl<S: Store> SnapshotService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            task_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, task_id: &Id) -> Arc<AsyncMutex<()>> {
        let mut locks = self.task_locks.lock();
        locks.entry(task_id.clone()).or_default().clone()
    }

    /// Version history of a task, newest first.
    pub async fn get_timeline(&self, task_id: &Id) -> Result<Vec<TimelineEntry>> {
        let versions = self
            .store
            .list_versions_for_task(task_id, SortOrder::Descending)
            .await?;
        Ok(versions.iter().map(TimelineEntry::from_version).collect())
    }

    pub async fn get_version(&self, version_id: &Id) -> Result<Version> {
        self.store
            .get_version(version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))
    }

    /// Top-level field diff between two snapshots: which payload keys were
    /// added, removed, or changed. For file-granular output use the diff
    /// engine instead.
    pub async fn compare_versions(&self, version1_id: &Id, version2_id: &Id) -> Result<VersionDiff> {
        let v1 = self.get_version(version1_id).await?;
        let v2 = self.get_version(version2_id).await?;

        let differences = calculate_field_diff(v1.payload.as_map(), v2.payload.as_map());
        let change_summary = summarize_changes(&differences);
        let has_major_changes = detect_major_changes(&differences);
        let change_count = differences.len();

        Ok(VersionDiff {
            version1: v1,
            version2: v2,
            differences,
            change_count,
            change_summary,
            has_major_changes,
        })
    }

    /// Restore an earlier state by appending a ROLLBACK version that wraps
    /// the target's payload. The target itself is untouched; the rollback
    /// carries a parent pointer back to it.
    pub async fn rollback_to_version(&self, version_id: &Id) -> Result<Version> {
        let target = self.get_version(version_id).await?;

        let mut payload = SnapshotPayload::new();
        payload.insert("rollback_from_version_id", json!(target.id));
        payload.insert(
            "rollback_from_version_number",
            json!(target.version_number),
        );
        payload.insert("rollback_at", json!(Utc::now().to_rfc3339()));
        payload.insert("original_snapshot", Value::Object(target.payload.as_map().clone()));

        let mut rollback = self
            .create_snapshot(&target.task_id, &target.tenant_id, VersionType::Rollback, payload)
            .await?;

        rollback.parent_version_id = Some(target.id.clone());
        self.store.upsert_version(rollback.clone()).await?;

        log::info!(
            "rolled back task {} to version #{} as version #{}",
            target.task_id,
            target.version_number,
            rollback.version_number
        );

        Ok(rollback)
    }

    /// Hard delete. Later lookups of this id fail with NotFound.
    pub async fn delete_version(&self, version_id: &Id) -> Result<()> {
        let version = self.get_version(version_id).await?;

        if let Some(parent) = &version.parent_version_id {
            log::warn!(
                "deleting version {} which references parent {}",
                version_id,
                parent
            );
        }

        self.store.delete_version(version_id).await?;
        log::info!("deleted version {}", version_id);
        Ok(())
    }

    /// Delete every version of the task with a number above the cutoff.
    /// Returns how many were removed.
    pub async fn delete_versions_after(&self, task_id: &Id, after_number: i32) -> Result<usize> {
        log::warn!(
            "bulk-deleting versions of task {} above #{}",
            task_id,
            after_number
        );

        let query = VersionQuery {
            min_number: Some(after_number + 1),
            ..Default::default()
        };
        let doomed = self.store.query_versions(task_id, &query).await?;

        for version in &doomed {
            self.store.delete_version(&version.id).await?;
        }

        log::info!("deleted {} versions of task {}", doomed.len(), task_id);
        Ok(doomed.len())
    }
}

#[async_trait::async_trait]
impl<S: Store> SnapshotCreator for SnapshotService<S> {
    async fn create_snapshot(
        &self,
        task_id: &Id,
        tenant_id: &Id,
        version_type: VersionType,
        payload: SnapshotPayload,
    ) -> Result<Version> {
        let lock = self.lock_for(task_id);
        let _guard = lock.lock().await;

        let latest = self.store.latest_version_for_task(task_id).await?;

        let mut created_at = Utc::now();
        let next_number = match &latest {
            Some(latest) => {
                // Keep creation times strictly increasing even when the
                // clock collides or runs behind the newest version.
                if latest.created_at >= created_at {
                    created_at = latest.created_at + Duration::seconds(1);
                }
                latest.version_number + 1
            }
            None => 1,
        };

        let mut payload = payload;
        payload.insert("version_type_display", json!(version_type.display_name()));
        payload.insert(
            "version_type_description",
            json!(version_type.description()),
        );
        payload.insert("created_at", json!(created_at.to_rfc3339()));

        let version = Version {
            id: generate_id(),
            task_id: task_id.clone(),
            tenant_id: tenant_id.clone(),
            version_number: next_number,
            version_type,
            payload,
            parent_version_id: None,
            created_at,
        };

        self.store.upsert_version(version.clone()).await?;

        log::info!(
            "created {} snapshot #{} for task {}",
            version_type,
            next_number,
            task_id
        );

        Ok(version)
    }
}

/// Result of a top-level snapshot comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    pub version1: Version,
    pub version2: Version,
    pub differences: Map<String, Value>,
    pub change_count: usize,
    pub change_summary: String,
    pub has_major_changes: bool,
}

fn calculate_field_diff(map1: &Map<String, Value>, map2: &Map<String, Value>) -> Map<String, Value> {
    let mut diff = Map::new();

    let mut keys: Vec<&String> = map1.keys().chain(map2.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (map1.get(key), map2.get(key)) {
            (None, Some(value)) => {
                diff.insert(key.clone(), json!({ "type": "added", "value": value }));
            }
            (Some(value), None) => {
                diff.insert(key.clone(), json!({ "type": "removed", "value": value }));
            }
            (Some(old), Some(new)) if old != new => {
                diff.insert(
                    key.clone(),
                    json!({ "type": "changed", "old_value": old, "new_value": new }),
                );
            }
            _ => {}
        }
    }

    diff
}

fn summarize_changes(diff: &Map<String, Value>) -> String {
    if diff.is_empty() {
        return "no changes".to_string();
    }

    let mut added = 0;
    let mut removed = 0;
    let mut changed = 0;
    for entry in diff.values() {
        match entry.get("type").and_then(Value::as_str) {
            Some("added") => added += 1,
            Some("removed") => removed += 1,
            Some("changed") => changed += 1,
            _ => {}
        }
    }

    let mut parts = Vec::new();
    if added > 0 {
        parts.push(format!("{} added", added));
    }
    if removed > 0 {
        parts.push(format!("{} removed", removed));
    }
    if changed > 0 {
        parts.push(format!("{} changed", changed));
    }
    parts.join("; ")
}

/// Schema, code, entity, or table movement counts as a major change.
fn detect_major_changes(diff: &Map<String, Value>) -> bool {
    diff.keys().any(|key| {
        key.contains("schema") || key.contains("code") || key.contains("entity") || key.contains("table")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use crate::store::memory::InMemoryStore;
    use crate::store::traits::{TaskStore, VersionStore};

    fn demo_task() -> Task {
        let now = Utc::now();
        Task {
            id: generate_id(),
            tenant_id: generate_id(),
            user_id: generate_id(),
            task_name: Some("demo".to_string()),
            user_requirement: Some("a bookstore".to_string()),
            status: "running".to_string(),
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_numbers_increase_and_timestamps_stay_monotonic() {
        let store = Arc::new(InMemoryStore::new());
        let service = SnapshotService::new(store.clone());
        let task = demo_task();
        store.upsert_task(task.clone()).await.unwrap();

        let first = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Plan, SnapshotPayload::new())
            .await
            .unwrap();
        let second = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Schema, SnapshotPayload::new())
            .await
            .unwrap();

        assert_eq!(first.version_number, 1);
        assert_eq!(second.version_number, 2);
        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_rollback_points_at_target_and_wraps_payload() {
        let store = Arc::new(InMemoryStore::new());
        let service = SnapshotService::new(store.clone());
        let task = demo_task();
        store.upsert_task(task.clone()).await.unwrap();

        let mut payload = SnapshotPayload::new();
        payload.insert("entities", json!({"Book": "class Book {}"}));
        let target = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Code, payload)
            .await
            .unwrap();

        let rollback = service.rollback_to_version(&target.id).await.unwrap();

        assert_eq!(rollback.version_type, VersionType::Rollback);
        assert_eq!(rollback.version_number, target.version_number + 1);
        assert_eq!(rollback.parent_version_id.as_ref(), Some(&target.id));
        assert_eq!(
            rollback.payload.get("rollback_from_version_number"),
            Some(&json!(target.version_number))
        );
        let wrapped = rollback.payload.get("original_snapshot").unwrap();
        assert_eq!(
            wrapped.get("entities"),
            Some(&json!({"Book": "class Book {}"}))
        );

        let persisted = store.get_version(&rollback.id).await.unwrap().unwrap();
        assert_eq!(persisted.parent_version_id.as_ref(), Some(&target.id));
    }

    #[tokio::test]
    async fn test_compare_versions_counts_field_changes() {
        let store = Arc::new(InMemoryStore::new());
        let service = SnapshotService::new(store.clone());
        let task = demo_task();
        store.upsert_task(task.clone()).await.unwrap();

        let mut p1 = SnapshotPayload::new();
        p1.insert("entity_count", json!(2));
        p1.insert("table_count", json!(2));
        let v1 = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Plan, p1)
            .await
            .unwrap();

        let mut p2 = SnapshotPayload::new();
        p2.insert("entity_count", json!(3));
        p2.insert("file_count", json!(9));
        let v2 = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Code, p2)
            .await
            .unwrap();

        let diff = service.compare_versions(&v1.id, &v2.id).await.unwrap();

        // entity_count changed, table_count removed, file_count added, plus
        // the enrichment keys that differ between the two types.
        assert!(diff.change_count >= 3);
        assert_eq!(
            diff.differences["entity_count"]["type"],
            json!("changed")
        );
        assert_eq!(diff.differences["table_count"]["type"], json!("removed"));
        assert_eq!(diff.differences["file_count"]["type"], json!("added"));
        assert!(diff.has_major_changes);
        assert!(!diff.change_summary.is_empty());
    }

    #[tokio::test]
    async fn test_self_compare_reports_no_changes() {
        let store = Arc::new(InMemoryStore::new());
        let service = SnapshotService::new(store.clone());
        let task = demo_task();
        store.upsert_task(task.clone()).await.unwrap();

        let v = service
            .create_snapshot(&task.id, &task.tenant_id, VersionType::Plan, SnapshotPayload::new())
            .await
            .unwrap();
        let diff = service.compare_versions(&v.id, &v.id).await.unwrap();

        assert_eq!(diff.change_count, 0);
        assert_eq!(diff.change_summary, "no changes");
        assert!(!diff.has_major_changes);
    }
}
