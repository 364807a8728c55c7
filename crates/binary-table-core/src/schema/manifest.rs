//! Persistence of the schema manifest and query text artifacts.
//!
//! This module owns the two metadata artifacts of a published table:
//!
//! - `_schema.json`: the [`TableManifest`] (format version, total row
//!   count, and the output column name/type pairs in original order).
//! - `_query.txt`: the verbatim query text that produced the table.
//!
//! Writes go through the staged atomic path and only become visible at
//! publish. The manifest encoding is deterministic for identical input so
//! rewriting the same table yields byte-identical artifacts.

use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

use crate::schema::logical::ColumnDetails;
use crate::storage::{StorageError, TableLocation, io, layout};

/// Current manifest format version.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Schema manifest describing a published binary table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableManifest {
    /// Manifest format version, for forward compatibility.
    pub format_version: u32,
    /// Total number of rows written to every column artifact.
    pub row_count: u64,
    /// Output column name/type pairs in original column order.
    pub columns: Vec<ColumnDetails>,
}

impl TableManifest {
    /// Build a manifest for the given output columns and row count.
    pub fn new(columns: Vec<ColumnDetails>, row_count: u64) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            row_count,
            columns,
        }
    }
}

/// Errors reading or writing the table metadata artifacts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ManifestError {
    /// Storage failure while reading or writing a metadata artifact.
    #[snafu(display("Storage error for table metadata: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// A metadata artifact exists but does not parse.
    #[snafu(display("Corrupt table metadata at {path}: {msg}"))]
    Corrupt {
        /// Path of the artifact that failed to parse.
        path: String,
        /// Parse failure details.
        msg: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

/// Serialize the manifest to its canonical JSON encoding.
pub fn manifest_to_bytes(manifest: &TableManifest) -> Result<Vec<u8>, ManifestError> {
    let mut bytes = serde_json::to_vec_pretty(manifest).map_err(|e| ManifestError::Corrupt {
        path: layout::SCHEMA_FILE_NAME.to_string(),
        msg: format!("failed to serialize manifest: {e}"),
        backtrace: Backtrace::capture(),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write the schema manifest into the staging directory.
pub async fn write_manifest(
    location: &TableLocation,
    manifest: &TableManifest,
) -> Result<(), ManifestError> {
    let bytes = manifest_to_bytes(manifest)?;
    io::write_staged_atomic(location, &layout::schema_rel_path(), &bytes)
        .await
        .context(StorageSnafu)
}

/// Write the originating query text into the staging directory.
pub async fn write_query(location: &TableLocation, query: &str) -> Result<(), ManifestError> {
    io::write_staged_atomic(location, &layout::query_rel_path(), query.as_bytes())
        .await
        .context(StorageSnafu)
}

/// Read the schema manifest of a published table.
pub async fn read_manifest(location: &TableLocation) -> Result<TableManifest, ManifestError> {
    let rel = layout::schema_rel_path();
    let json = io::read_to_string(location, &rel)
        .await
        .context(StorageSnafu)?;

    serde_json::from_str(&json).map_err(|e| ManifestError::Corrupt {
        path: rel.display().to_string(),
        msg: format!("failed to parse manifest: {e}"),
        backtrace: Backtrace::capture(),
    })
}

/// Read the query text artifact of a published table.
pub async fn read_query(location: &TableLocation) -> Result<String, ManifestError> {
    io::read_to_string(location, &layout::query_rel_path())
        .await
        .context(StorageSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::logical::LogicalDataType;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample_manifest() -> TableManifest {
        TableManifest::new(
            vec![
                ColumnDetails::new("id", LogicalDataType::Int64),
                ColumnDetails::new("name", LogicalDataType::Utf8),
            ],
            42,
        )
    }

    #[test]
    fn manifest_json_roundtrip() {
        let manifest = sample_manifest();
        let bytes = manifest_to_bytes(&manifest).expect("serialize manifest");
        let back: TableManifest = serde_json::from_slice(&bytes).expect("parse manifest");
        assert_eq!(back, manifest);
    }

    #[test]
    fn manifest_encoding_is_deterministic() {
        let a = manifest_to_bytes(&sample_manifest()).expect("serialize");
        let b = manifest_to_bytes(&sample_manifest()).expect("serialize");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn write_then_read_after_publish() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path().join("table"));
        io::create_staging(&location).await?;

        let manifest = sample_manifest();
        write_manifest(&location, &manifest).await?;
        write_query(&location, "read trades | write out").await?;
        io::publish(&location).await?;

        let read_back = read_manifest(&location).await?;
        assert_eq!(read_back, manifest);
        let query = read_query(&location).await?;
        assert_eq!(query, "read trades | write out");
        Ok(())
    }

    #[tokio::test]
    async fn read_manifest_rejects_corrupt_json() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path().join("table"));
        io::create_staging(&location).await?;
        io::write_staged_atomic(&location, &layout::schema_rel_path(), b"not json").await?;
        io::publish(&location).await?;

        let err = read_manifest(&location)
            .await
            .expect_err("expected corrupt manifest");
        assert!(matches!(err, ManifestError::Corrupt { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn read_manifest_of_unpublished_table_is_not_found() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path().join("table"));

        let err = read_manifest(&location)
            .await
            .expect_err("expected storage error");
        assert!(matches!(
            err,
            ManifestError::Storage {
                source: StorageError::NotFound { .. }
            }
        ));
        Ok(())
    }
}
