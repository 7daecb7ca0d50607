use anyhow::Context;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, TimelineError};
use crate::model::{ArchiveRef, Id, MIGRATION_FILE_NAME};
use crate::store::traits::{ObjectStore, Store};

pub struct ArchiveExporter;

impl ArchiveExporter {
    /// Produce the downloadable archive for a version.
    ///
    /// A completed archive pointer is served from object storage after a
    /// checksum check. When the blob is unreadable or fails the check, the
    /// archive is rebuilt from the payload's artifact groups; only when no
    /// groups exist to rebuild from does the storage failure surface. A
    /// version with neither groups nor a usable pointer is an EmptyPayload
    /// error.
    pub async fn export_as_zip<S: Store>(
        store: &S,
        objects: &dyn ObjectStore,
        version_id: &Id,
    ) -> Result<Vec<u8>> {
        let version = store
            .get_version(version_id)
            .await?
            .ok_or_else(|| TimelineError::VersionNotFound(version_id.clone()))?;

        let files = version.payload.code_files();
        let archive = version.payload.archive_ref().filter(ArchiveRef::is_complete);

        if files.is_empty() && archive.is_none() {
            return Err(TimelineError::EmptyPayload(version_id.clone()));
        }

        if let Some(archive) = archive {
            if let Some(key) = &archive.storage_key {
                match objects.get_object(key).await {
                    Ok(bytes) if checksum_matches(&archive, &bytes) => {
                        log::info!(
                            "served pre-built archive {:?} for version {}",
                            key,
                            version_id
                        );
                        return Ok(bytes);
                    }
                    Ok(_) => {
                        log::warn!(
                            "archive {:?} for version {} failed its checksum, rebuilding from payload",
                            key,
                            version_id
                        );
                    }
                    Err(err) => {
                        log::warn!(
                            "archive {:?} for version {} unreadable ({}), rebuilding from payload",
                            key,
                            version_id,
                            err
                        );
                    }
                }
            }

            if files.is_empty() {
                return Err(TimelineError::StorageRead {
                    version_id: version_id.clone(),
                    reason: "pre-built archive is unreadable and the payload has no artifact groups to rebuild from"
                        .to_string(),
                });
            }
        }

        let bytes = build_zip(&files)?;
        log::info!(
            "reconstructed archive for version {} ({} files)",
            version_id,
            files.len()
        );
        Ok(bytes)
    }
}

fn checksum_matches(archive: &ArchiveRef, bytes: &[u8]) -> bool {
    match &archive.zip_checksum {
        Some(expected) => {
            let actual = hex::encode(Sha256::digest(bytes));
            actual.eq_ignore_ascii_case(expected)
        }
        None => true,
    }
}

/// Build an archive in memory, re-rooting each file under `backend/` or
/// `frontend/` based on its artifact group.
fn build_zip(files: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, content) in files {
        let entry = format!("{}/{}", zip_root(path), path);
        writer
            .start_file(entry, options)
            .context("Failed to start archive entry")?;
        writer
            .write_all(content.as_bytes())
            .context("Failed to write archive entry")?;
    }

    let cursor = writer.finish().context("Failed to finalize archive")?;
    Ok(cursor.into_inner())
}

/// Server-side groups land under `backend/`, browser-side groups under
/// `frontend/`; anything unrecognized is routed by file extension.
fn zip_root(path: &str) -> &'static str {
    if path == MIGRATION_FILE_NAME {
        return "backend";
    }
    match path.split('/').next().unwrap_or_default() {
        "entities" | "services" | "controllers" => "backend",
        "components" | "pages" => "frontend",
        _ => {
            let extension = path.rsplit('.').next().unwrap_or_default();
            match extension {
                "vue" | "tsx" | "jsx" | "css" | "html" => "frontend",
                _ => "backend",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_entries(bytes: &[u8]) -> BTreeMap<String, String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entries = BTreeMap::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).unwrap();
            let mut content = String::new();
            file.read_to_string(&mut content).unwrap();
            entries.insert(file.name().to_string(), content);
        }
        entries
    }

    #[test]
    fn test_zip_root_heuristic() {
        assert_eq!(zip_root("services/UserService"), "backend");
        assert_eq!(zip_root("entities/Book"), "backend");
        assert_eq!(zip_root("components/App.vue"), "frontend");
        assert_eq!(zip_root("pages/Home"), "frontend");
        assert_eq!(zip_root(MIGRATION_FILE_NAME), "backend");
        assert_eq!(zip_root("widgets/Button.tsx"), "frontend");
        assert_eq!(zip_root("jobs/Cleanup.java"), "backend");
    }

    #[test]
    fn test_build_zip_re_roots_groups() {
        let mut files = BTreeMap::new();
        files.insert("services/UserService".to_string(), "class U {}".to_string());
        files.insert("components/App.vue".to_string(), "<template/>".to_string());
        files.insert(MIGRATION_FILE_NAME.to_string(), "CREATE TABLE t;".to_string());

        let bytes = build_zip(&files).unwrap();
        let entries = read_entries(&bytes);

        assert_eq!(entries["backend/services/UserService"], "class U {}");
        assert_eq!(entries["frontend/components/App.vue"], "<template/>");
        assert_eq!(entries["backend/migration.sql"], "CREATE TABLE t;");
    }

    #[test]
    fn test_checksum_matches_is_case_insensitive_and_optional() {
        let bytes = b"archive-bytes";
        let digest = hex::encode(Sha256::digest(bytes));

        let mut archive = ArchiveRef {
            status: "success".to_string(),
            storage_key: Some("k".to_string()),
            zip_checksum: Some(digest.to_uppercase()),
        };
        assert!(checksum_matches(&archive, bytes));

        archive.zip_checksum = Some("deadbeef".to_string());
        assert!(!checksum_matches(&archive, bytes));

        archive.zip_checksum = None;
        assert!(checksum_matches(&archive, bytes));
    }
}
