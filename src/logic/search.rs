use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Id, TimelineEntry, VersionType};
use crate::store::traits::{Store, VersionQuery};

pub struct SearchOperations;

/// Multi-criteria version filter. Type, time, and number-range criteria
/// are pushed down to the store; status and tags are derived/embedded and
/// filtered here after the fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_types: Option<Vec<VersionType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_version: Option<i32>,
}

impl SearchOperations {
    /// Search a task's versions; no criteria returns the full history,
    /// newest first, projected to timeline entries.
    pub async fn search_versions<S: Store>(
        store: &S,
        task_id: &Id,
        params: &VersionSearchParams,
    ) -> Result<Vec<TimelineEntry>> {
        let query = VersionQuery {
            types: params.version_types.clone(),
            created_after: params.start_time,
            created_before: params.end_time,
            min_number: params.min_version,
            max_number: params.max_version,
        };

        let mut versions = store.query_versions(task_id, &query).await?;

        if let Some(statuses) = &params.statuses {
            if !statuses.is_empty() {
                versions.retain(|v| {
                    statuses
                        .iter()
                        .any(|s| s == v.version_type.derived_status())
                });
            }
        }

        if let Some(tags) = &params.tags {
            if !tags.is_empty() {
                versions.retain(|v| tags.iter().any(|t| v.payload.has_tag(t)));
            }
        }

        Ok(versions.iter().map(TimelineEntry::from_version).collect())
    }
}
