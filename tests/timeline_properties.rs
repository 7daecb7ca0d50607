use std::io::{Cursor, Read};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};
use sha2::{Digest, Sha256};

use codegen_timeline::{
    generate_id, InMemoryStore, MemoryObjectStore, ObjectStore, SnapshotPayload, Task, TaskStore,
    TimelineError, TimelineService, Version, VersionSearchParams, VersionType, ARCHIVE_KEY,
};

fn test_service() -> (Arc<InMemoryStore>, Arc<MemoryObjectStore>, TimelineService<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let service = TimelineService::new(store.clone(), objects.clone());
    (store, objects, service)
}

async fn new_task(service: &TimelineService<InMemoryStore>) -> Task {
    let now = Utc::now();
    let task = Task {
        id: generate_id(),
        tenant_id: generate_id(),
        user_id: generate_id(),
        task_name: Some("Bookstore generation".to_string()),
        user_requirement: Some("An online bookstore".to_string()),
        status: "running".to_string(),
        metadata: Map::new(),
        created_at: now,
        updated_at: now,
    };
    service.store().upsert_task(task.clone()).await.unwrap();
    task
}

async fn snapshot(
    service: &TimelineService<InMemoryStore>,
    task: &Task,
    version_type: VersionType,
    payload: SnapshotPayload,
) -> Version {
    service
        .create_snapshot(&task.id, &task.tenant_id, version_type, payload)
        .await
        .unwrap()
}

fn code_payload(content: &str) -> SnapshotPayload {
    let mut payload = SnapshotPayload::new();
    payload.insert("services", json!({ "UserService": content }));
    payload
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries.sort();
    entries
}

// ==================== Tagging ====================

#[tokio::test]
async fn remove_tag_restores_prior_tag_set() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Code, SnapshotPayload::new()).await;

    service.add_tag(&version.id, "milestone").await.unwrap();
    let before = service.get_version(&version.id).await.unwrap().payload.tags();

    service.add_tag(&version.id, "stable").await.unwrap();
    service.remove_tag(&version.id, "stable").await.unwrap();

    let after = service.get_version(&version.id).await.unwrap().payload.tags();
    assert_eq!(after, before);
}

#[tokio::test]
async fn add_tag_is_idempotent() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Code, SnapshotPayload::new()).await;

    service.add_tag(&version.id, "stable").await.unwrap();
    let tagged = service.add_tag(&version.id, "stable").await.unwrap();

    assert_eq!(tagged.payload.tags(), vec!["stable".to_string()]);
}

#[tokio::test]
async fn tag_operations_on_missing_version_fail_not_found() {
    let (_, _, service) = test_service();
    let missing = generate_id();

    let err = service.add_tag(&missing, "stable").await.unwrap_err();
    assert!(matches!(err, TimelineError::VersionNotFound(id) if id == missing));
}

// ==================== Code-level diff ====================

#[tokio::test]
async fn self_diff_is_all_zero() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Code, code_payload("A\nB\nC")).await;

    let diff = service.code_level_diff(&version.id, &version.id).await.unwrap();

    assert_eq!(diff.added_files, 0);
    assert_eq!(diff.removed_files, 0);
    assert_eq!(diff.modified_files, 0);
    assert_eq!(diff.total_lines_added, 0);
    assert_eq!(diff.total_lines_removed, 0);
    assert!(diff.file_diffs.is_empty());
}

#[tokio::test]
async fn diff_is_mirrored_when_arguments_swap() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let mut p1 = code_payload("A\nB\nC");
    p1.insert("entities", json!({ "Book": "class Book {}" }));
    let v1 = snapshot(&service, &task, VersionType::Code, p1).await;

    let mut p2 = code_payload("A\nB\nD");
    p2.insert("pages", json!({ "Home": "<html/>" }));
    let v2 = snapshot(&service, &task, VersionType::Code, p2).await;

    let forward = service.code_level_diff(&v1.id, &v2.id).await.unwrap();
    let backward = service.code_level_diff(&v2.id, &v1.id).await.unwrap();

    assert_eq!(forward.added_files, backward.removed_files);
    assert_eq!(forward.removed_files, backward.added_files);
    assert_eq!(forward.modified_files, backward.modified_files);
    assert_eq!(forward.total_lines_added, backward.total_lines_removed);
    assert_eq!(forward.total_lines_removed, backward.total_lines_added);

    let forward_added: Vec<&str> = forward
        .file_diffs
        .iter()
        .filter(|f| f.change_type == codegen_timeline::ChangeType::Added)
        .map(|f| f.file_path.as_str())
        .collect();
    let backward_removed: Vec<&str> = backward
        .file_diffs
        .iter()
        .filter(|f| f.change_type == codegen_timeline::ChangeType::Removed)
        .map(|f| f.file_path.as_str())
        .collect();
    assert_eq!(forward_added, backward_removed);
}

// ==================== Branching ====================

#[tokio::test]
async fn branch_carries_lineage_and_every_group_key() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let mut payload = code_payload("class UserService {}");
    payload.insert("entities", json!({ "Book": "class Book {}" }));
    payload.insert("migration_sql", json!("CREATE TABLE books;"));
    let source = snapshot(&service, &task, VersionType::Code, payload).await;

    let result = service.create_branch(&source.id, "variant-a").await.unwrap();

    let branch_task = service
        .store()
        .get_task(&result.branch_task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        branch_task.metadata.get("source_version_number"),
        Some(&json!(source.version_number))
    );
    assert_eq!(branch_task.status, "pending");

    let seed = service.get_version(&result.branch_version_id).await.unwrap();
    assert_eq!(seed.version_number, 1);
    for group in source.payload.group_keys() {
        assert!(
            seed.payload.get(&group).is_some(),
            "seed payload is missing group {:?}",
            group
        );
    }
    assert_eq!(
        seed.payload.get("migration_sql"),
        source.payload.get("migration_sql")
    );
}

// ==================== Search & statistics ====================

#[tokio::test]
async fn search_without_criteria_returns_all_newest_first() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    for version_type in [VersionType::Plan, VersionType::Schema, VersionType::Code] {
        snapshot(&service, &task, version_type, SnapshotPayload::new()).await;
    }

    let entries = service
        .search_versions(&task.id, &VersionSearchParams::default())
        .await
        .unwrap();

    let numbers: Vec<i32> = entries.iter().map(|e| e.version_number).collect();
    assert_eq!(numbers, vec![3, 2, 1]);
    let mut timestamps: Vec<_> = entries.iter().map(|e| e.timestamp).collect();
    let sorted = {
        let mut t = timestamps.clone();
        t.sort_by(|a, b| b.cmp(a));
        t
    };
    assert_eq!(timestamps, sorted);
    timestamps.dedup();
    assert_eq!(timestamps.len(), entries.len());
}

#[tokio::test]
async fn statistics_of_empty_task_are_zero_without_error() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let stats = service.get_statistics(&task.id).await.unwrap();

    assert_eq!(stats.total_versions, 0);
    assert!(stats.versions_by_type.is_empty());
    assert!(stats.versions_by_status.is_empty());
    assert_eq!(stats.rollback_count, 0);
    assert_eq!(stats.tagged_version_count, 0);
}

// ==================== Export / import ====================

#[tokio::test]
async fn import_of_export_preserves_artifact_groups() {
    let (_, _, service) = test_service();
    let source_task = new_task(&service).await;
    let target_task = new_task(&service).await;

    let mut payload = code_payload("class UserService {}");
    payload.insert("components", json!({ "App.vue": "<template/>" }));
    let version = snapshot(&service, &source_task, VersionType::Code, payload).await;

    let record = service.export_version(&version.id).await.unwrap();
    let imported = service.import_version(&target_task.id, &record).await.unwrap();

    assert_eq!(imported.task_id, target_task.id);
    assert_eq!(imported.version_number, 1);
    for group in version.payload.group_keys() {
        assert_eq!(
            imported.payload.get(&group),
            version.payload.get(&group),
            "group {:?} was not preserved",
            group
        );
    }
    let provenance = imported.payload.get("imported_from").unwrap();
    assert_eq!(provenance.get("source_version_id"), Some(&json!(version.id)));
    assert_eq!(
        provenance.get("source_task_id"),
        Some(&json!(source_task.id))
    );
}

#[tokio::test]
async fn import_into_missing_task_fails_not_found() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Plan, SnapshotPayload::new()).await;
    let record = service.export_version(&version.id).await.unwrap();

    let missing = generate_id();
    let err = service.import_version(&missing, &record).await.unwrap_err();
    assert!(matches!(err, TimelineError::TaskNotFound(id) if id == missing));
}

// ==================== Deletion ====================

#[tokio::test]
async fn delete_versions_after_cutoff_spares_earlier_versions() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let mut versions = Vec::new();
    for index in 0..4 {
        versions.push(
            snapshot(
                &service,
                &task,
                VersionType::Code,
                code_payload(&format!("rev {}", index)),
            )
            .await,
        );
    }

    let deleted = service.delete_versions_after(&task.id, 2).await.unwrap();
    assert_eq!(deleted, 2);

    for survivor in &versions[..2] {
        let found = service.get_version(&survivor.id).await.unwrap();
        assert_eq!(&found, survivor);
    }
    for doomed in &versions[2..] {
        let err = service.get_version(&doomed.id).await.unwrap_err();
        assert!(matches!(err, TimelineError::VersionNotFound(_)));
    }
}

#[tokio::test]
async fn reads_after_hard_delete_fail_explicitly() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Code, code_payload("A")).await;

    service.delete_version(&version.id).await.unwrap();

    assert!(matches!(
        service.get_version(&version.id).await.unwrap_err(),
        TimelineError::VersionNotFound(_)
    ));
    assert!(matches!(
        service.export_version(&version.id).await.unwrap_err(),
        TimelineError::VersionNotFound(_)
    ));
    assert!(matches!(
        service.delete_version(&version.id).await.unwrap_err(),
        TimelineError::VersionNotFound(_)
    ));
}

// ==================== Archive export ====================

#[tokio::test]
async fn archive_of_artifact_free_version_is_an_empty_payload_error() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;
    let version = snapshot(&service, &task, VersionType::Plan, SnapshotPayload::new()).await;

    let err = service.export_as_zip(&version.id).await.unwrap_err();
    assert!(matches!(err, TimelineError::EmptyPayload(id) if id == version.id));
}

#[tokio::test]
async fn completed_archive_pointer_is_served_verbatim() {
    let (_, objects, service) = test_service();
    let task = new_task(&service).await;

    let blob = b"prebuilt-archive-bytes".to_vec();
    objects.put_object("archives/v1.zip", &blob).await.unwrap();

    let mut payload = SnapshotPayload::new();
    payload.insert(
        ARCHIVE_KEY,
        json!({
            "status": "success",
            "storage_key": "archives/v1.zip",
            "zip_checksum": hex::encode(Sha256::digest(&blob)),
        }),
    );
    let version = snapshot(&service, &task, VersionType::Final, payload).await;

    let bytes = service.export_as_zip(&version.id).await.unwrap();
    assert_eq!(bytes, blob);
}

#[tokio::test]
async fn unreadable_blob_degrades_to_reconstruction() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let mut payload = code_payload("class UserService {}");
    payload.insert(
        ARCHIVE_KEY,
        json!({ "status": "success", "storage_key": "archives/gone.zip" }),
    );
    let version = snapshot(&service, &task, VersionType::Code, payload).await;

    let bytes = service.export_as_zip(&version.id).await.unwrap();
    let entries = zip_entries(&bytes);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "backend/services/UserService");
    assert_eq!(entries[0].1, "class UserService {}");
}

#[tokio::test]
async fn checksum_mismatch_degrades_to_reconstruction() {
    let (_, objects, service) = test_service();
    let task = new_task(&service).await;

    objects
        .put_object("archives/tampered.zip", b"tampered")
        .await
        .unwrap();

    let mut payload = code_payload("class UserService {}");
    payload.insert(
        ARCHIVE_KEY,
        json!({
            "status": "success",
            "storage_key": "archives/tampered.zip",
            "zip_checksum": hex::encode(Sha256::digest(b"the-original-bytes")),
        }),
    );
    let version = snapshot(&service, &task, VersionType::Code, payload).await;

    let bytes = service.export_as_zip(&version.id).await.unwrap();
    assert_ne!(bytes, b"tampered".to_vec());
    let entries = zip_entries(&bytes);
    assert_eq!(entries[0].0, "backend/services/UserService");
}

#[tokio::test]
async fn unreadable_blob_without_artifacts_is_a_storage_error() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let mut payload = SnapshotPayload::new();
    payload.insert(
        ARCHIVE_KEY,
        json!({ "status": "success", "storage_key": "archives/gone.zip" }),
    );
    let version = snapshot(&service, &task, VersionType::Final, payload).await;

    let err = service.export_as_zip(&version.id).await.unwrap_err();
    assert!(matches!(err, TimelineError::StorageRead { version_id, .. } if version_id == version.id));
}

// ==================== End-to-end scenario ====================

#[tokio::test]
async fn bookstore_scenario_diff_tag_and_cutoff() {
    let (_, _, service) = test_service();
    let task = new_task(&service).await;

    let v1 = snapshot(&service, &task, VersionType::Plan, SnapshotPayload::new()).await;
    let v2 = snapshot(&service, &task, VersionType::Schema, SnapshotPayload::new()).await;
    let v3 = snapshot(&service, &task, VersionType::Code, code_payload("A\nB\nC")).await;
    let v4 = snapshot(&service, &task, VersionType::Code, code_payload("A\nB\nD")).await;
    assert_eq!(
        (v1.version_number, v2.version_number, v3.version_number, v4.version_number),
        (1, 2, 3, 4)
    );

    let diff = service.code_level_diff(&v3.id, &v4.id).await.unwrap();
    assert_eq!(diff.modified_files, 1);
    assert_eq!(diff.added_files, 0);
    assert_eq!(diff.removed_files, 0);
    assert_eq!(diff.total_lines_added, 1);
    assert_eq!(diff.total_lines_removed, 1);
    assert_eq!(diff.file_diffs[0].file_path, "services/UserService");

    service.add_tag(&v3.id, "stable").await.unwrap();
    let tagged = service.versions_by_tag(&task.id, "stable").await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, v3.id);

    let deleted = service.delete_versions_after(&task.id, 2).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(service.get_version(&v3.id).await.is_err());
    assert!(service.get_version(&v4.id).await.is_err());
    assert_eq!(service.get_version(&v1.id).await.unwrap(), v1);
    assert_eq!(service.get_version(&v2.id).await.unwrap(), v2);
}
