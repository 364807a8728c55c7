//! Error types and SNAFU context selectors for the table writer.
//!
//! This module centralizes the `WriteError` enum used by the public API
//! and exposes context selectors (via `#[snafu(visibility(pub(crate)))]`)
//! so implementation details in sibling modules can attach error context
//! without re-exporting everything at the crate root. Keep new variants
//! here to ensure consistent user-facing messages.

use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::schema::{ManifestError, SchemaError};
use crate::storage::StorageError;
use crate::types::ColumnWriteError;
use crate::types::convert::ConvertError;
use crate::writer::source::SourceError;

/// Errors from binary table write operations.
///
/// Each variant carries enough context for callers to surface actionable
/// messages. Setup errors (unsupported column types) appear at session
/// creation; everything else propagates from the failing step, leaving the
/// table unpublished.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    /// The source column set is not a valid table schema (setup error).
    #[snafu(display("Invalid source schema: {source}"))]
    Schema {
        /// Underlying schema validation error.
        source: SchemaError,
    },

    /// A column's type has no binary writer capability and no conversion
    /// path to the fallback text type (setup/configuration error).
    #[snafu(display("Cannot plan column '{column}': {source}"))]
    UnsupportedColumnType {
        /// Column that could not be planned.
        column: String,
        /// Underlying conversion resolution error.
        source: ConvertError,
    },

    /// The registry has no writer capability for the fallback text type,
    /// so converted columns cannot be materialized (setup error).
    #[snafu(display("No fallback text writer capability available for column '{column}'"))]
    FallbackWriterUnavailable {
        /// Column whose fallback writer could not be resolved.
        column: String,
    },

    /// Storage failure while clearing, staging, or publishing the table.
    #[snafu(display("Storage error for table destination: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// Storage failure while constructing a column's writer.
    #[snafu(display("Cannot open writer for column '{column}': {source}"))]
    OpenColumn {
        /// Column whose writer failed to open.
        column: String,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The upstream batch source failed.
    #[snafu(display("Batch source error: {source}"))]
    Source {
        /// Underlying source error.
        source: SourceError,
    },

    /// Converting a column batch to the fallback text type failed at
    /// runtime.
    #[snafu(display("Failed to convert batch for column '{column}': {source}"))]
    Convert {
        /// Column whose batch failed to convert.
        column: String,
        /// Underlying Arrow cast error.
        source: ArrowError,
    },

    /// A column writer failed while appending or finishing.
    #[snafu(display("Write failed for column '{column}': {source}"))]
    ColumnWrite {
        /// Column whose writer failed.
        column: String,
        /// Underlying column writer error.
        source: ColumnWriteError,
    },

    /// A parallel append task was cancelled or panicked.
    #[snafu(display("Append task for column '{column}' did not complete: {source}"))]
    AppendTask {
        /// Column whose append task failed to complete.
        column: String,
        /// Underlying task join error.
        source: tokio::task::JoinError,
    },

    /// A column writer was unavailable when a batch was dispatched
    /// (internal lifecycle invariant violation).
    #[snafu(display("No open writer for column '{column}' during dispatch"))]
    MissingWriter {
        /// Column whose writer was missing.
        column: String,
    },

    /// Failure persisting the schema manifest or query artifact.
    #[snafu(display("Failed to persist table metadata: {source}"))]
    Metadata {
        /// Underlying manifest persistence error.
        source: ManifestError,
    },

    /// The session already propagated a write failure; only `reset` or
    /// `abandon` are valid.
    #[snafu(display("Write session is in a failed state after a previous error"))]
    SessionFailed,
}
