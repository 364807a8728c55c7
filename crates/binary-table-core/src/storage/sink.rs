//! Buffered per-column file sinks.
//!
//! Column writers stream encoded values through a [`ColumnSink`]. Sinks
//! write directly into the staging directory: unlike metadata artifacts
//! there is no per-file temp-and-rename step, because the staging
//! directory as a whole is the atomicity unit and publish is the only
//! visibility gate.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::storage::{
    TableLocation,
    error::{BackendError, OtherIoSnafu, StorageResult},
};

/// Buffered file sink for one column artifact in the staging directory.
///
/// Uses `std::fs` because column codecs stream through `std::io::Write`;
/// the async layer never touches these handles.
pub struct ColumnSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ColumnSink {
    /// Create the sink for `rel_path` inside the staging directory,
    /// truncating any stale artifact at that path.
    pub fn create(location: &TableLocation, rel_path: &Path) -> StorageResult<Self> {
        let path = location.staging_root().join(rel_path);

        let file = File::create(&path)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: path.display().to_string(),
            })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Path of the artifact being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw encoded bytes to the artifact.
    pub fn write_all(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.path.display().to_string(),
            })
    }

    /// Flush buffered bytes and fsync the artifact.
    pub fn finish(mut self) -> StorageResult<()> {
        self.writer
            .flush()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.path.display().to_string(),
            })?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.path.display().to_string(),
            })
    }
}
