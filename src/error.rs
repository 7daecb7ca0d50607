use thiserror::Error;

use crate::model::Id;

/// Failure taxonomy for the timeline engine.
///
/// Hard failures carry the offending id so callers can report it. Store
/// errors are passed through untouched; best-effort paths (batch tagging,
/// optional task metadata on export) never surface here.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("version not found: {0}")]
    VersionNotFound(Id),

    #[error("task not found: {0}")]
    TaskNotFound(Id),

    #[error("unknown version type label: {0}")]
    InvalidVersionType(String),

    #[error("version {0} has no packageable content")]
    EmptyPayload(Id),

    #[error("archive blob unreadable for version {version_id}: {reason}")]
    StorageRead { version_id: Id, reason: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
