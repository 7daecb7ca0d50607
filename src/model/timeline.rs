use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Id, Version, VersionType};

/// Display-oriented projection of a version used for listing and searching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub version_id: Id,
    pub version_number: i32,
    pub version_type: VersionType,
    pub version_type_display: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub summary: String,
    pub can_rollback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TimelineEntry {
    pub fn from_version(version: &Version) -> Self {
        let display = match version.payload.get("version_type_display") {
            Some(Value::String(label)) if !label.is_empty() => label.clone(),
            _ => version.version_type.display_name().to_string(),
        };

        Self {
            version_id: version.id.clone(),
            version_number: version.version_number,
            version_type: version.version_type,
            version_type_display: display,
            timestamp: version.created_at,
            status: version.version_type.derived_status().to_string(),
            summary: summarize(version),
            can_rollback: version.version_type != VersionType::Rollback,
            parent_version_id: version.parent_version_id.clone(),
            tags: version.payload.tags(),
        }
    }
}

/// One-line human summary of what a snapshot captured, built from the
/// counters the generators leave in the payload.
fn summarize(version: &Version) -> String {
    let payload = &version.payload;
    match version.version_type {
        VersionType::Plan => format!(
            "Analyzed requirements, extracted {} entities",
            field(payload.get("entity_count"), "0")
        ),
        VersionType::Schema => format!(
            "Generated DDL for {} tables",
            field(payload.get("table_count"), "0")
        ),
        VersionType::Code => format!(
            "Generated {} code files",
            field(payload.get("file_count"), "0")
        ),
        VersionType::Fix => format!(
            "Fix: {}",
            field(payload.get("fix_description"), "bug fix")
        ),
        VersionType::ValidationFailed => format!(
            "Tests failed: {}",
            field(payload.get("failure_reason"), "unknown error")
        ),
        VersionType::ValidationSuccess => format!(
            "All tests passed, coverage {}%",
            field(payload.get("coverage"), "0")
        ),
        VersionType::Rollback => format!(
            "Rolled back to version {}",
            field(payload.get("rollback_from_version_number"), "?")
        ),
        VersionType::Final => "Version snapshot".to_string(),
    }
}

fn field(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}
