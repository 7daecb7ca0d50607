use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::model::Id;

/// Reserved payload keys. Everything else is an open extension area owned
/// by the generators.
pub const TAGS_KEY: &str = "tags";
pub const TAGGED_AT_KEY: &str = "tagged_at";
pub const BRANCH_SOURCE_KEY: &str = "branch_source";
pub const BRANCH_NAME_KEY: &str = "branch_name";
pub const IMPORTED_FROM_KEY: &str = "imported_from";
pub const ARCHIVE_KEY: &str = "archive";
pub const MIGRATION_SQL_KEY: &str = "migration_sql";

/// Flattened path the migration script appears under.
pub const MIGRATION_FILE_NAME: &str = "migration.sql";

/// Artifact groups recognized when flattening a payload into files.
/// Groups outside this list are preserved in the payload but never
/// flattened, diffed, or packaged.
pub const ARTIFACT_GROUPS: [&str; 5] = ["entities", "services", "controllers", "components", "pages"];

/// The semi-structured document stored inside a version.
///
/// Schema-on-read: a handful of reserved keys (tags, provenance, archive
/// pointer) are interpreted here; named artifact groups and anything else
/// pass through untouched. The body is immutable once written; only the
/// tag/provenance annex is ever updated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotPayload(Map<String, Value>);

impl SnapshotPayload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    // ---- tag annex ----

    pub fn tags(&self) -> Vec<String> {
        match self.0.get(TAGS_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    /// Appends `tag` with set semantics. Returns false when it was already
    /// present and the payload is unchanged.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let mut tags = self.tags();
        if tags.iter().any(|t| t == tag) {
            return false;
        }
        tags.push(tag.to_string());
        self.0.insert(TAGS_KEY.to_string(), json!(tags));
        true
    }

    /// Removes `tag` if present. Returns false when there was nothing to do.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let tags = self.tags();
        if !tags.iter().any(|t| t == tag) {
            return false;
        }
        let remaining: Vec<String> = tags.into_iter().filter(|t| t != tag).collect();
        self.0.insert(TAGS_KEY.to_string(), json!(remaining));
        true
    }

    pub fn stamp_tagged_at(&mut self, at: DateTime<Utc>) {
        self.0
            .insert(TAGGED_AT_KEY.to_string(), json!(at.to_rfc3339()));
    }

    // ---- provenance annex ----

    pub fn record_branch_source(
        &mut self,
        source_task_id: &Id,
        source_version_id: &Id,
        source_version_number: i32,
        branch_name: &str,
    ) {
        self.0.insert(
            BRANCH_SOURCE_KEY.to_string(),
            json!({
                "task_id": source_task_id,
                "version_id": source_version_id,
                "version_number": source_version_number,
            }),
        );
        self.0
            .insert(BRANCH_NAME_KEY.to_string(), json!(branch_name));
    }

    pub fn record_import_source(
        &mut self,
        source_version_id: &Id,
        source_task_id: &Id,
        imported_at: DateTime<Utc>,
        original_created_at: DateTime<Utc>,
    ) {
        self.0.insert(
            IMPORTED_FROM_KEY.to_string(),
            json!({
                "source_version_id": source_version_id,
                "source_task_id": source_task_id,
                "imported_at": imported_at.to_rfc3339(),
                "original_created_at": original_created_at.to_rfc3339(),
            }),
        );
    }

    // ---- archive pointer ----

    pub fn archive_ref(&self) -> Option<ArchiveRef> {
        self.0
            .get(ARCHIVE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    // ---- artifact flattening ----

    /// Flattens the recognized artifact groups plus the migration script
    /// into a path -> content map ("services/UserService" and so on).
    /// Extension keys outside [`ARTIFACT_GROUPS`] are not flattened.
    pub fn code_files(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for group in ARTIFACT_GROUPS {
            if let Some(Value::Object(entries)) = self.0.get(group) {
                for (name, content) in entries {
                    match content {
                        Value::String(text) => {
                            files.insert(format!("{}/{}", group, name), text.clone());
                        }
                        Value::Null => {}
                        other => {
                            files.insert(format!("{}/{}", group, name), other.to_string());
                        }
                    }
                }
            }
        }
        match self.0.get(MIGRATION_SQL_KEY) {
            Some(Value::String(sql)) => {
                files.insert(MIGRATION_FILE_NAME.to_string(), sql.clone());
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                files.insert(MIGRATION_FILE_NAME.to_string(), other.to_string());
            }
        }
        files
    }

    pub fn has_artifacts(&self) -> bool {
        !self.code_files().is_empty()
    }

    /// Artifact group keys present in this payload.
    pub fn group_keys(&self) -> Vec<String> {
        ARTIFACT_GROUPS
            .iter()
            .filter(|g| matches!(self.0.get(**g), Some(Value::Object(_))))
            .map(|g| g.to_string())
            .collect()
    }
}

/// Pointer to a pre-built archive blob in object storage, written by the
/// archive-producing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRef {
    pub status: String,
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub zip_checksum: Option<String>,
}

impl ArchiveRef {
    pub fn is_complete(&self) -> bool {
        self.status == "success" && self.storage_key.is_some()
    }
}
