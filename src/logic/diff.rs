use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::{Result, TimelineError};
use crate::model::{Id, Version};
use crate::store::traits::Store;

pub struct DiffEngine;

/// File-granular comparison of two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeLevelDiff {
    pub version1_id: Id,
    pub version2_id: Id,
    pub version1_number: i32,
    pub version2_number: i32,
    pub file_diffs: Vec<FileDiff>,
    pub added_files: usize,
    pub removed_files: usize,
    pub modified_files: usize,
    pub total_lines_added: usize,
    pub total_lines_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub file_path: String,
    pub change_type: ChangeType,
    pub lines_added: usize,
    pub lines_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_hunks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl DiffEngine {
    /// Compare the flattened artifact files of two snapshots. Only the
    /// recognized artifact groups take part; extension keys are ignored.
    pub async fn code_level_diff<S: Store>(
        store: &S,
        version1_id: &Id,
        version2_id: &Id,
    ) -> Result<CodeLevelDiff> {
        let v1 = load(store, version1_id).await?;
        let v2 = load(store, version2_id).await?;

        let files1 = v1.payload.code_files();
        let files2 = v2.payload.code_files();

        let all_paths: BTreeSet<&String> = files1.keys().chain(files2.keys()).collect();

        let mut diff = CodeLevelDiff {
            version1_id: v1.id.clone(),
            version2_id: v2.id.clone(),
            version1_number: v1.version_number,
            version2_number: v2.version_number,
            file_diffs: Vec::new(),
            added_files: 0,
            removed_files: 0,
            modified_files: 0,
            total_lines_added: 0,
            total_lines_removed: 0,
        };

        for path in all_paths {
            match (files1.get(path), files2.get(path)) {
                (None, Some(new_content)) => {
                    let lines = count_lines(new_content);
                    diff.added_files += 1;
                    diff.total_lines_added += lines;
                    diff.file_diffs.push(FileDiff {
                        file_path: path.clone(),
                        change_type: ChangeType::Added,
                        lines_added: lines,
                        lines_removed: 0,
                        old_content: None,
                        new_content: Some(new_content.clone()),
                        diff_hunks: Vec::new(),
                    });
                }
                (Some(old_content), None) => {
                    let lines = count_lines(old_content);
                    diff.removed_files += 1;
                    diff.total_lines_removed += lines;
                    diff.file_diffs.push(FileDiff {
                        file_path: path.clone(),
                        change_type: ChangeType::Removed,
                        lines_added: 0,
                        lines_removed: lines,
                        old_content: Some(old_content.clone()),
                        new_content: None,
                        diff_hunks: Vec::new(),
                    });
                }
                (Some(old_content), Some(new_content)) if old_content != new_content => {
                    let delta = line_delta(old_content, new_content);
                    diff.modified_files += 1;
                    diff.total_lines_added += delta.added;
                    diff.total_lines_removed += delta.removed;
                    diff.file_diffs.push(FileDiff {
                        file_path: path.clone(),
                        change_type: ChangeType::Modified,
                        lines_added: delta.added,
                        lines_removed: delta.removed,
                        old_content: Some(old_content.clone()),
                        new_content: Some(new_content.clone()),
                        diff_hunks: delta.hunks,
                    });
                }
                _ => {}
            }
        }

        Ok(diff)
    }
}

async fn load<S: Store>(store: &S, version_id: &Id) -> Result<Version> {
    store
        .get_version(version_id)
        .await?
        .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))
}

fn count_lines(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        content.split('\n').count()
    }
}

struct LineDelta {
    added: usize,
    removed: usize,
    hunks: Vec<String>,
}

/// Set-membership line delta: a line of the old content counts as removed
/// when it appears nowhere in the new content, and vice versa. Order- and
/// duplicate-insensitive by construction: this is a cheap approximation,
/// not a sequence alignment, and reordered or repeated lines can skew the
/// counts.
fn line_delta(old_content: &str, new_content: &str) -> LineDelta {
    let old_lines: Vec<&str> = old_content.split('\n').collect();
    let new_lines: Vec<&str> = new_content.split('\n').collect();

    let old_set: HashSet<&str> = old_lines.iter().copied().collect();
    let new_set: HashSet<&str> = new_lines.iter().copied().collect();

    let removed = old_lines.iter().filter(|l| !new_set.contains(**l)).count();
    let added = new_lines.iter().filter(|l| !old_set.contains(**l)).count();

    let mut hunks = Vec::new();
    if removed > 0 {
        hunks.push(format!("- {} lines removed", removed));
    }
    if added > 0 {
        hunks.push(format!("+ {} lines added", added));
    }

    LineDelta {
        added,
        removed,
        hunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_delta_counts_set_membership() {
        let delta = line_delta("A\nB\nC", "A\nB\nD");
        assert_eq!(delta.removed, 1);
        assert_eq!(delta.added, 1);
        assert_eq!(
            delta.hunks,
            vec!["- 1 lines removed".to_string(), "+ 1 lines added".to_string()]
        );
    }

    #[test]
    fn test_line_delta_is_order_insensitive() {
        // Reordering produces no counted changes; that is the documented
        // approximation.
        let delta = line_delta("A\nB", "B\nA");
        assert_eq!(delta.added, 0);
        assert_eq!(delta.removed, 0);
        assert!(delta.hunks.is_empty());
    }

    #[test]
    fn test_line_delta_counts_duplicates_per_occurrence() {
        let delta = line_delta("X\nX\nY", "Y");
        assert_eq!(delta.removed, 2);
        assert_eq!(delta.added, 0);
    }

    #[test]
    fn test_count_lines_handles_empty_content() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("one"), 1);
        assert_eq!(count_lines("a\nb\n"), 3);
    }
}
