//! Storage backend for table artifacts.
//!
//! This module centralizes all filesystem interactions for
//! `binary-table-core`. It is responsible for:
//!
//! - Mapping a table root to its staging directory and to the locations of
//!   column artifacts, validity sidecars, and metadata artifacts
//!   (`layout`).
//! - Clearing, staging, and atomically publishing a table directory
//!   (`io`).
//! - The buffered per-column file sink column writers stream encoded
//!   bytes through (`sink`).
//!
//! The staging directory is the unit of atomicity: every artifact is
//! written under `<root>.staging/` and becomes visible in a single rename
//! when the table is published. Nothing in this module writes into the
//! published root directly.
//!
//! Only the local filesystem is supported, but the API is shaped so that
//! future backends (for example, object storage) can be introduced without
//! rewriting the writer logic.

pub mod error;
pub mod io;
pub mod layout;
pub mod sink;

pub use error::{BackendError, StorageError, StorageResult};
pub use sink::ColumnSink;

use std::path::{Path, PathBuf};

/// Represents the location of a binary table.
///
/// This enum abstracts over different storage backends, currently
/// supporting local filesystem paths.
#[derive(Clone, Debug)]
pub enum TableLocation {
    /// A table stored on the local filesystem at the given root path.
    Local(PathBuf),
    // Future:
    // S3 { bucket: String, prefix: String },
}

impl TableLocation {
    /// Creates a new `TableLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        TableLocation::Local(root.into())
    }

    /// The published root path of the table.
    pub fn root(&self) -> &Path {
        match self {
            TableLocation::Local(root) => root,
        }
    }

    /// The staging directory all artifacts are written into before
    /// publish.
    pub fn staging_root(&self) -> PathBuf {
        match self {
            TableLocation::Local(root) => layout::staging_dir(root),
        }
    }
}
