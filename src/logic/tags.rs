use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::model::{Id, Version};
use crate::store::traits::{SortOrder, Store};

pub struct TagOperations;

/// Per-item outcome of a best-effort tag batch. The batch never fails as a
/// whole; callers that only care about the old count contract can use
/// [`BatchTagOutcome::success_count`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchTagOutcome {
    pub succeeded: Vec<Id>,
    pub failed: Vec<BatchTagFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTagFailure {
    pub version_id: Id,
    pub reason: String,
}

impl BatchTagOutcome {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }
}

impl TagOperations {
    /// Add `tag` to the version's tag set. Idempotent: a tag that is
    /// already present leaves the version untouched.
    pub async fn add_tag<S: Store>(store: &S, version_id: &Id, tag: &str) -> Result<Version> {
        let mut version = store
            .get_version(version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))?;

        if version.payload.add_tag(tag) {
            version.payload.stamp_tagged_at(Utc::now());
            store.upsert_version(version.clone()).await?;
            log::info!("tagged version {} with {:?}", version_id, tag);
        }

        Ok(version)
    }

    /// Remove `tag` if present; a missing tag is a no-op, not an error.
    pub async fn remove_tag<S: Store>(store: &S, version_id: &Id, tag: &str) -> Result<Version> {
        let mut version = store
            .get_version(version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))?;

        if version.payload.remove_tag(tag) {
            store.upsert_version(version.clone()).await?;
            log::info!("untagged version {}: removed {:?}", version_id, tag);
        }

        Ok(version)
    }

    /// All versions of the task carrying `tag`, newest first. Tags live
    /// inside the payload document, so this is a scan over the task's
    /// versions, not an indexed lookup.
    pub async fn versions_by_tag<S: Store>(
        store: &S,
        task_id: &Id,
        tag: &str,
    ) -> Result<Vec<Version>> {
        let versions = store
            .list_versions_for_task(task_id, SortOrder::Descending)
            .await?;
        Ok(versions
            .into_iter()
            .filter(|v| v.payload.has_tag(tag))
            .collect())
    }

    /// Tag many versions sequentially, best effort. Failures are recorded
    /// and logged per item; versions tagged before a failure stay tagged.
    pub async fn batch_add_tag<S: Store>(
        store: &S,
        version_ids: &[Id],
        tag: &str,
    ) -> BatchTagOutcome {
        let mut outcome = BatchTagOutcome::default();

        for version_id in version_ids {
            match Self::add_tag(store, version_id, tag).await {
                Ok(_) => outcome.succeeded.push(version_id.clone()),
                Err(err) => {
                    log::warn!("batch tag skipped version {}: {}", version_id, err);
                    outcome.failed.push(BatchTagFailure {
                        version_id: version_id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        outcome
    }
}
