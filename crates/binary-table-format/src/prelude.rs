//! Wrapper prelude.
//!
//! The `binary-table-format` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::storage;
pub use crate::{
    BinaryTableWriter, ColumnDetails, LogicalDataType, LogicalTimestampUnit, RecordBatchSource,
    RowBatchSource, SourceError, TableLocation, TableManifest, TableReader, TableSchema,
    TypeProvider, TypeRegistry, WriteError, WriteSummary,
};
