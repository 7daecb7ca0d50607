use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::error::{Result, TimelineError};
use crate::logic::snapshot::SnapshotCreator;
use crate::model::{generate_id, Id, Task, VersionType};
use crate::store::traits::Store;

pub struct BranchOperations;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchResult {
    pub branch_task_id: Id,
    pub branch_version_id: Id,
    pub branch_name: String,
    pub source_version_id: Id,
    pub source_version_number: i32,
    pub created_at: DateTime<Utc>,
}

impl BranchOperations {
    /// Derive a new task from an existing version. The new task copies the
    /// source version's payload into a seed version and starts its own
    /// numbering sequence; lineage is recorded on both the task metadata
    /// and the seed payload.
    ///
    /// Task insert and seed insert are two separate persistence calls. If
    /// the seed insert fails the task is left behind without versions; the
    /// error surfaces to the caller either way.
    pub async fn create_branch<S: Store, C: SnapshotCreator>(
        store: &S,
        snapshots: &C,
        source_version_id: &Id,
        branch_name: &str,
    ) -> Result<BranchResult> {
        let source_version = store
            .get_version(source_version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(source_version_id.clone()))?;
        let source_task = store
            .get_task(&source_version.task_id)
            .await?
            .ok_or_else(|| TimelineError::TaskNotFound(source_version.task_id.clone()))?;

        let now = Utc::now();

        let task_name = match &source_task.task_name {
            Some(name) => format!("{} [branch: {}]", name, branch_name),
            None => format!("Branch task: {}", branch_name),
        };
        let user_requirement = source_task
            .user_requirement
            .clone()
            .unwrap_or_else(|| format!("Branched from version {}", source_version_id));

        let mut metadata = Map::new();
        metadata.insert("branch_name".to_string(), json!(branch_name));
        metadata.insert("source_task_id".to_string(), json!(source_task.id));
        metadata.insert("source_version_id".to_string(), json!(source_version.id));
        metadata.insert(
            "source_version_number".to_string(),
            json!(source_version.version_number),
        );
        metadata.insert("branched_at".to_string(), json!(now.to_rfc3339()));

        let branch_task = Task {
            id: generate_id(),
            tenant_id: source_task.tenant_id.clone(),
            user_id: source_task.user_id.clone(),
            task_name: Some(task_name),
            user_requirement: Some(user_requirement),
            status: "pending".to_string(),
            metadata,
            created_at: now,
            updated_at: now,
        };

        store.upsert_task(branch_task.clone()).await?;

        let mut seed_payload = source_version.payload.clone();
        seed_payload.record_branch_source(
            &source_task.id,
            &source_version.id,
            source_version.version_number,
            branch_name,
        );

        let seed_version = snapshots
            .create_snapshot(
                &branch_task.id,
                &branch_task.tenant_id,
                VersionType::Plan,
                seed_payload,
            )
            .await?;

        log::info!(
            "branched {:?} off version #{} of task {}: new task {}",
            branch_name,
            source_version.version_number,
            source_task.id,
            branch_task.id
        );

        Ok(BranchResult {
            branch_task_id: branch_task.id,
            branch_version_id: seed_version.id,
            branch_name: branch_name.to_string(),
            source_version_id: source_version.id,
            source_version_number: source_version.version_number,
            created_at: now,
        })
    }
}
