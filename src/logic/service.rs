use std::sync::Arc;

use crate::error::Result;
use crate::logic::archive::ArchiveExporter;
use crate::logic::branch::{BranchOperations, BranchResult};
use crate::logic::diff::{CodeLevelDiff, DiffEngine};
use crate::logic::export::{ExportOperations, VersionExportData};
use crate::logic::search::{SearchOperations, VersionSearchParams};
use crate::logic::snapshot::{SnapshotCreator, SnapshotService, VersionDiff};
use crate::logic::stats::{StatisticsOperations, VersionStatistics};
use crate::logic::tags::{BatchTagOutcome, TagOperations};
use crate::model::{Id, SnapshotPayload, TimelineEntry, Version, VersionType};
use crate::store::traits::{ObjectStore, Store};

/// One public surface over the timeline engine. Every method delegates to
/// the operation modules; this type only wires the store, the snapshot
/// creator, and object storage together.
pub struct TimelineService<S> {
    store: Arc<S>,
    snapshots: SnapshotService<S>,
    objects: Arc<dyn ObjectStore>,
}

impl<S: Store> TimelineService<S> {
    pub fn new(store: Arc<S>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            snapshots: SnapshotService::new(store.clone()),
            store,
            objects,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotService<S> {
        &self.snapshots
    }

    /// Entry point for the generation pipeline: record a completed stage.
    pub async fn create_snapshot(
        &self,
        task_id: &Id,
        tenant_id: &Id,
        version_type: VersionType,
        payload: SnapshotPayload,
    ) -> Result<Version> {
        self.snapshots
            .create_snapshot(task_id, tenant_id, version_type, payload)
            .await
    }

    pub async fn get_timeline(&self, task_id: &Id) -> Result<Vec<TimelineEntry>> {
        self.snapshots.get_timeline(task_id).await
    }

    pub async fn get_version(&self, version_id: &Id) -> Result<Version> {
        self.snapshots.get_version(version_id).await
    }

    pub async fn compare_versions(
        &self,
        version1_id: &Id,
        version2_id: &Id,
    ) -> Result<VersionDiff> {
        self.snapshots
            .compare_versions(version1_id, version2_id)
            .await
    }

    pub async fn rollback_to_version(&self, version_id: &Id) -> Result<Version> {
        self.snapshots.rollback_to_version(version_id).await
    }

    pub async fn delete_version(&self, version_id: &Id) -> Result<()> {
        self.snapshots.delete_version(version_id).await
    }

    pub async fn delete_versions_after(&self, task_id: &Id, after_number: i32) -> Result<usize> {
        self.snapshots
            .delete_versions_after(task_id, after_number)
            .await
    }

    pub async fn add_tag(&self, version_id: &Id, tag: &str) -> Result<Version> {
        TagOperations::add_tag(&*self.store, version_id, tag).await
    }

    pub async fn remove_tag(&self, version_id: &Id, tag: &str) -> Result<Version> {
        TagOperations::remove_tag(&*self.store, version_id, tag).await
    }

    pub async fn versions_by_tag(&self, task_id: &Id, tag: &str) -> Result<Vec<Version>> {
        TagOperations::versions_by_tag(&*self.store, task_id, tag).await
    }

    pub async fn batch_add_tag(&self, version_ids: &[Id], tag: &str) -> BatchTagOutcome {
        TagOperations::batch_add_tag(&*self.store, version_ids, tag).await
    }

    pub async fn create_branch(
        &self,
        source_version_id: &Id,
        branch_name: &str,
    ) -> Result<BranchResult> {
        BranchOperations::create_branch(&*self.store, &self.snapshots, source_version_id, branch_name)
            .await
    }

    pub async fn code_level_diff(
        &self,
        version1_id: &Id,
        version2_id: &Id,
    ) -> Result<CodeLevelDiff> {
        DiffEngine::code_level_diff(&*self.store, version1_id, version2_id).await
    }

    pub async fn search_versions(
        &self,
        task_id: &Id,
        params: &VersionSearchParams,
    ) -> Result<Vec<TimelineEntry>> {
        SearchOperations::search_versions(&*self.store, task_id, params).await
    }

    pub async fn get_statistics(&self, task_id: &Id) -> Result<VersionStatistics> {
        StatisticsOperations::get_statistics(&*self.store, task_id).await
    }

    pub async fn export_version(&self, version_id: &Id) -> Result<VersionExportData> {
        ExportOperations::export_version(&*self.store, version_id).await
    }

    pub async fn import_version(
        &self,
        target_task_id: &Id,
        data: &VersionExportData,
    ) -> Result<Version> {
        ExportOperations::import_version(&*self.store, &self.snapshots, target_task_id, data).await
    }

    pub async fn export_as_zip(&self, version_id: &Id) -> Result<Vec<u8>> {
        ArchiveExporter::export_as_zip(&*self.store, &*self.objects, version_id).await
    }

    pub async fn latest_version_for_task(&self, task_id: &Id) -> Result<Option<Version>> {
        Ok(self.store.latest_version_for_task(task_id).await?)
    }
}
