//! Type dispatch and physical column encoding.
//!
//! This module owns everything between a logical column type and bytes on
//! disk:
//!
//! - `registry`: the writer-capability lookup keyed by logical type.
//! - `fixed` / `varlen`: the built-in binary column writers (little-endian
//!   fixed-width values, u32-length-prefixed variable-length values).
//! - `nullable`: the uniform validity-tracking wrapper every column writer
//!   is placed behind.
//! - `convert`: fallback conversion to the canonical text type for column
//!   types without a direct writer capability.

pub mod convert;
pub mod fixed;
pub mod nullable;
pub mod registry;
pub mod varlen;

pub use nullable::NullableWriter;
pub use registry::{TypeProvider, TypeRegistry};

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use snafu::{Backtrace, Snafu};

use crate::storage::StorageError;

/// Per-column sink for typed value batches.
///
/// `append` accepts batches of any length, including zero (a no-op), and
/// buffers encoded bytes internally; `finish` flushes everything to the
/// underlying artifact and releases the handle. A writer is never appended
/// to concurrently with itself; writers for distinct columns are
/// independent and safe to drive concurrently with each other.
pub trait ColumnWriter: Send {
    /// Append one batch of values in this writer's physical type.
    fn append(&mut self, values: &ArrayRef) -> Result<(), ColumnWriteError>;

    /// Flush all buffered bytes and release the artifact handle.
    fn finish(self: Box<Self>) -> Result<(), ColumnWriteError>;
}

/// Errors raised by column writers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ColumnWriteError {
    /// Storage failure on the column artifact.
    #[snafu(display("Column artifact error: {source}"))]
    Sink {
        /// Underlying storage error from the column sink.
        source: StorageError,
    },

    /// The batch's Arrow type does not match the writer's physical type.
    #[snafu(display("Batch type mismatch: writer expects {expected}, batch is {actual}"))]
    TypeMismatch {
        /// Arrow type the writer encodes.
        expected: DataType,
        /// Arrow type of the rejected batch.
        actual: DataType,
    },

    /// A variable-length value exceeds the u32 length prefix.
    #[snafu(display("Value of {len} bytes exceeds the maximum encodable length"))]
    ValueTooLong {
        /// Byte length of the rejected value.
        len: usize,
    },

    /// I/O failure writing the validity sidecar.
    #[snafu(display("Failed to write validity sidecar at {path}: {source}"))]
    ValiditySidecar {
        /// Sidecar path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}
