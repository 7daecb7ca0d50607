use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{Id, VersionType};
use crate::store::traits::{SortOrder, Store};

pub struct StatisticsOperations;

/// Aggregate view of a task's version history. A task without versions
/// gets an all-zero summary, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionStatistics {
    pub total_versions: usize,
    pub versions_by_type: BTreeMap<String, usize>,
    pub versions_by_status: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_version_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_version_time: Option<DateTime<Utc>>,
    pub rollback_count: usize,
    pub tagged_version_count: usize,
}

impl StatisticsOperations {
    pub async fn get_statistics<S: Store>(store: &S, task_id: &Id) -> Result<VersionStatistics> {
        let versions = store
            .list_versions_for_task(task_id, SortOrder::Ascending)
            .await?;

        if versions.is_empty() {
            return Ok(VersionStatistics::default());
        }

        let versions_by_type: BTreeMap<String, usize> = versions
            .iter()
            .counts_by(|v| v.version_type.as_str().to_string())
            .into_iter()
            .collect();

        let versions_by_status: BTreeMap<String, usize> = versions
            .iter()
            .counts_by(|v| v.version_type.derived_status().to_string())
            .into_iter()
            .collect();

        let rollback_count = versions
            .iter()
            .filter(|v| v.version_type == VersionType::Rollback)
            .count();

        let tagged_version_count = versions
            .iter()
            .filter(|v| !v.payload.tags().is_empty())
            .count();

        Ok(VersionStatistics {
            total_versions: versions.len(),
            versions_by_type,
            versions_by_status,
            first_version_time: versions.first().map(|v| v.created_at),
            last_version_time: versions.last().map(|v| v.created_at),
            rollback_count,
            tagged_version_count,
        })
    }
}
