//! # binary-table-format
//!
//! Column-per-file binary table format with an atomic publish gate.
//!
//! A pull-based stream of row batches is written as one binary artifact
//! per column plus a schema manifest and the originating query text; the
//! table directory becomes visible to readers only through a final atomic
//! publish, so no reader ever observes a half-written table.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust,ignore
//! use binary_table_format::prelude::*;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Storage namespace (wrapper-only).
pub mod storage {
    pub use binary_table_core::storage::{StorageError, TableLocation};
}

pub use binary_table_core::reader::TableReader;
pub use binary_table_core::storage::TableLocation;
pub use binary_table_core::schema::{
    ColumnDetails, LogicalDataType, LogicalTimestampUnit, TableManifest, TableSchema,
};
pub use binary_table_core::types::{TypeProvider, TypeRegistry};
pub use binary_table_core::writer::{
    BinaryTableWriter, RecordBatchSource, RowBatchSource, SourceError, WriteError, WriteSummary,
};
