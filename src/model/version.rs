use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Id, SnapshotPayload, VersionType};

/// One immutable snapshot produced at a pipeline stage.
///
/// `version_number` increases strictly within the owning task; allocation
/// is serialized by the snapshot creator. The payload body is never
/// rewritten after creation; only its tag/provenance annex changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: Id,
    pub task_id: Id,
    pub tenant_id: Id,
    pub version_number: i32,
    pub version_type: VersionType,
    pub payload: SnapshotPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}
