use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TimelineError;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// The pipeline stage a snapshot was taken at.
///
/// Stored and serialized as the lowercase label; parsing is
/// case-insensitive and fails hard on labels outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Plan,
    Schema,
    Code,
    Fix,
    ValidationFailed,
    ValidationSuccess,
    Rollback,
    Final,
}

impl VersionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Plan => "plan",
            VersionType::Schema => "schema",
            VersionType::Code => "code",
            VersionType::Fix => "fix",
            VersionType::ValidationFailed => "validation_failed",
            VersionType::ValidationSuccess => "validation_success",
            VersionType::Rollback => "rollback",
            VersionType::Final => "final",
        }
    }

    /// Human-readable label, recorded into payloads at snapshot creation.
    pub fn display_name(&self) -> &'static str {
        match self {
            VersionType::Plan => "Requirement plan",
            VersionType::Schema => "Database schema",
            VersionType::Code => "Generated code",
            VersionType::Fix => "Fix",
            VersionType::ValidationFailed => "Validation failed",
            VersionType::ValidationSuccess => "Validation passed",
            VersionType::Rollback => "Rollback",
            VersionType::Final => "Final release",
        }
    }

    /// Coarse outcome label derived purely from the type. Every call path
    /// that reports a status goes through here; the generic label is
    /// always "in_progress".
    pub fn derived_status(&self) -> &'static str {
        match self {
            VersionType::ValidationFailed => "failed",
            VersionType::ValidationSuccess | VersionType::Final => "success",
            _ => "in_progress",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VersionType::Plan => "Requirement analysis result",
            VersionType::Schema => "Generated database DDL",
            VersionType::Code => "Generated application code",
            VersionType::Fix => "Targeted repair of an earlier snapshot",
            VersionType::ValidationFailed => "Validation run that did not pass",
            VersionType::ValidationSuccess => "Validation run that passed",
            VersionType::Rollback => "Restoration of an earlier snapshot",
            VersionType::Final => "Released snapshot",
        }
    }
}

impl std::fmt::Display for VersionType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VersionType {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plan" => Ok(VersionType::Plan),
            "schema" => Ok(VersionType::Schema),
            "code" => Ok(VersionType::Code),
            "fix" => Ok(VersionType::Fix),
            "validation_failed" => Ok(VersionType::ValidationFailed),
            "validation_success" => Ok(VersionType::ValidationSuccess),
            "rollback" => Ok(VersionType::Rollback),
            "final" => Ok(VersionType::Final),
            _ => Err(TimelineError::InvalidVersionType(s.to_string())),
        }
    }
}
