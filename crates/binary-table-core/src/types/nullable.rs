//! Validity tracking for nullable columns.
//!
//! Every column writer is wrapped in a [`NullableWriter`] so null handling
//! is uniform across direct and converted columns. Null positions are
//! tracked as global row indices in a roaring bitmap; the sidecar artifact
//! is written once at finish, and only for columns that observed at least
//! one null, so all-non-null columns carry no overhead. Nothing in the
//! staging directory is reader-visible before publish, which is why
//! deferring the sidecar to finish loses no durability.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use arrow::array::{Array, ArrayRef};
use roaring::RoaringTreemap;
use snafu::prelude::*;

use crate::storage::{TableLocation, layout};
use crate::types::{ColumnWriteError, ColumnWriter, ValiditySidecarSnafu};

/// Wraps an inner [`ColumnWriter`] with an out-of-band validity channel.
pub struct NullableWriter {
    inner: Box<dyn ColumnWriter>,
    nulls_path: PathBuf,
    rows: u64,
    nulls: RoaringTreemap,
}

impl NullableWriter {
    /// Wrap `inner` for `column`'s artifacts under `location`'s staging
    /// directory.
    pub fn new(location: &TableLocation, column: &str, inner: Box<dyn ColumnWriter>) -> Self {
        Self {
            inner,
            nulls_path: location.staging_root().join(layout::nulls_rel_path(column)),
            rows: 0,
            nulls: RoaringTreemap::new(),
        }
    }
}

impl ColumnWriter for NullableWriter {
    fn append(&mut self, values: &ArrayRef) -> Result<(), ColumnWriteError> {
        if values.null_count() > 0 {
            for i in 0..values.len() {
                if values.is_null(i) {
                    self.nulls.insert(self.rows + i as u64);
                }
            }
        }
        self.rows += values.len() as u64;

        // The typed value sequence is forwarded unchanged.
        self.inner.append(values)
    }

    fn finish(self: Box<Self>) -> Result<(), ColumnWriteError> {
        let NullableWriter {
            inner,
            nulls_path,
            nulls,
            ..
        } = *self;

        if !nulls.is_empty() {
            let path = nulls_path.display().to_string();
            let file = File::create(&nulls_path).context(ValiditySidecarSnafu { path: path.clone() })?;
            let mut writer = BufWriter::new(file);
            nulls
                .serialize_into(&mut writer)
                .context(ValiditySidecarSnafu { path: path.clone() })?;
            writer
                .flush()
                .context(ValiditySidecarSnafu { path: path.clone() })?;
            writer
                .get_ref()
                .sync_all()
                .context(ValiditySidecarSnafu { path })?;
        }

        inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::io::create_staging;
    use crate::types::varlen::VarLenProvider;
    use crate::types::TypeProvider;
    use arrow::array::StringArray;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    async fn nullable_utf8_writer(
        location: &TableLocation,
        column: &str,
    ) -> Result<Box<dyn ColumnWriter>, Box<dyn std::error::Error>> {
        let inner = VarLenProvider::utf8().binary_writer(location, column)?;
        Ok(Box::new(NullableWriter::new(location, column, inner)))
    }

    #[tokio::test]
    async fn all_valid_column_produces_no_sidecar() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path().join("table"));
        create_staging(&location).await?;

        let mut writer = nullable_utf8_writer(&location, "name").await?;
        let batch: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), Some("b")]));
        writer.append(&batch)?;
        writer.finish()?;

        assert!(!location.staging_root().join("name.nulls").exists());
        Ok(())
    }

    #[tokio::test]
    async fn sidecar_records_global_row_indices_across_appends() -> TestResult {
        let tmp = TempDir::new()?;
        let location = TableLocation::local(tmp.path().join("table"));
        create_staging(&location).await?;

        let mut writer = nullable_utf8_writer(&location, "name").await?;
        let first: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), Some("b")]));
        let second: ArrayRef = Arc::new(StringArray::from(vec![None, Some("c"), None]));
        writer.append(&first)?;
        writer.append(&second)?;
        writer.finish()?;

        let bytes = std::fs::read(location.staging_root().join("name.nulls"))?;
        let nulls = RoaringTreemap::deserialize_from(&mut Cursor::new(&bytes))?;
        assert_eq!(nulls.iter().collect::<Vec<_>>(), vec![2u64, 4]);
        Ok(())
    }
}
