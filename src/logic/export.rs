use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TimelineError};
use crate::logic::snapshot::SnapshotCreator;
use crate::model::{Id, SnapshotPayload, Version, VersionType};
use crate::store::traits::Store;

/// Format tag stamped on every exported record.
pub const EXPORT_FORMAT_VERSION: &str = "2.0";

pub struct ExportOperations;

/// Portable, self-describing serialization of one version, suitable for
/// backup or for re-import into another task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionExportData {
    pub exported_at: DateTime<Utc>,
    pub export_version: String,
    pub version_id: Id,
    pub version_number: i32,
    /// Kept as the raw label so records survive enum evolution; re-parsed
    /// (case-insensitively) on import.
    pub version_type: String,
    pub task_id: Id,
    pub tenant_id: Id,
    pub snapshot: SnapshotPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl ExportOperations {
    /// Bundle a version into a portable record. The owning task's metadata
    /// is attached when the task still exists; its absence is tolerated.
    pub async fn export_version<S: Store>(
        store: &S,
        version_id: &Id,
    ) -> Result<VersionExportData> {
        let version = store
            .get_version(version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))?;

        let task = store.get_task(&version.task_id).await?;

        log::info!("exported version {} of task {}", version_id, version.task_id);

        Ok(VersionExportData {
            exported_at: Utc::now(),
            export_version: EXPORT_FORMAT_VERSION.to_string(),
            version_id: version.id,
            version_number: version.version_number,
            version_type: version.version_type.as_str().to_string(),
            task_id: version.task_id,
            tenant_id: version.tenant_id,
            snapshot: version.payload,
            task_metadata: task.map(|t| t.metadata),
            created_at: version.created_at,
        })
    }

    /// Re-create an exported version inside `target_task_id` as a brand-new
    /// version. The target task's own numbering applies; the original
    /// number is only retained inside the provenance block.
    pub async fn import_version<S: Store, C: SnapshotCreator>(
        store: &S,
        snapshots: &C,
        target_task_id: &Id,
        data: &VersionExportData,
    ) -> Result<Version> {
        let target_task = store
            .get_task(target_task_id)
            .await?
            .ok_or_else(|| TimelineError::TaskNotFound(target_task_id.clone()))?;

        let version_type: VersionType = data.version_type.parse()?;

        let mut payload = data.snapshot.clone();
        payload.record_import_source(
            &data.version_id,
            &data.task_id,
            Utc::now(),
            data.created_at,
        );

        let imported = snapshots
            .create_snapshot(
                target_task_id,
                &target_task.tenant_id,
                version_type,
                payload,
            )
            .await?;

        log::info!(
            "imported version {} into task {} as version #{}",
            data.version_id,
            target_task_id,
            imported.version_number
        );

        Ok(imported)
    }
}
