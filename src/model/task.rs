use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Id;

/// A generation job owning an ordered sequence of versions.
///
/// Tasks are created and driven by the generation pipeline; the timeline
/// engine only reads them and writes lineage fields into `metadata` when a
/// branch is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub tenant_id: Id,
    pub user_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_requirement: Option<String>,
    pub status: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
