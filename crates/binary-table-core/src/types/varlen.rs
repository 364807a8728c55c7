//! Variable-length binary column writers.
//!
//! Text and binary values are encoded as a little-endian `u32` byte length
//! followed by the value bytes. Null slots encode as length 0; the
//! validity sidecar is the source of truth for nulls, so readers never
//! confuse a null with a genuinely empty value.

use arrow::array::{Array, ArrayRef, BinaryArray, StringArray};
use arrow::datatypes::DataType;
use snafu::prelude::*;

use crate::schema::LogicalDataType;
use crate::storage::{ColumnSink, StorageResult, TableLocation, layout};
use crate::types::registry::TypeProvider;
use crate::types::{ColumnWriteError, ColumnWriter, SinkSnafu, TypeMismatchSnafu, ValueTooLongSnafu};

fn put_value(out: &mut Vec<u8>, value: &[u8]) -> Result<(), ColumnWriteError> {
    let len = u32::try_from(value.len()).ok().context(ValueTooLongSnafu {
        len: value.len(),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(value);
    Ok(())
}

/// Column writer for variable-length values (text and raw bytes).
pub struct VarLenWriter {
    expected: DataType,
    sink: ColumnSink,
    buf: Vec<u8>,
}

impl ColumnWriter for VarLenWriter {
    fn append(&mut self, values: &ArrayRef) -> Result<(), ColumnWriteError> {
        if values.is_empty() {
            return Ok(());
        }

        self.buf.clear();
        match (&self.expected, values.data_type()) {
            (DataType::Utf8, DataType::Utf8) => {
                let typed: &StringArray =
                    values.as_any().downcast_ref().context(TypeMismatchSnafu {
                        expected: self.expected.clone(),
                        actual: values.data_type().clone(),
                    })?;
                for i in 0..typed.len() {
                    let value = if typed.is_null(i) { "" } else { typed.value(i) };
                    put_value(&mut self.buf, value.as_bytes())?;
                }
            }
            (DataType::Binary, DataType::Binary) => {
                let typed: &BinaryArray =
                    values.as_any().downcast_ref().context(TypeMismatchSnafu {
                        expected: self.expected.clone(),
                        actual: values.data_type().clone(),
                    })?;
                for i in 0..typed.len() {
                    let value: &[u8] = if typed.is_null(i) { b"" } else { typed.value(i) };
                    put_value(&mut self.buf, value)?;
                }
            }
            (expected, actual) => {
                return TypeMismatchSnafu {
                    expected: expected.clone(),
                    actual: actual.clone(),
                }
                .fail();
            }
        }

        self.sink.write_all(&self.buf).context(SinkSnafu)
    }

    fn finish(self: Box<Self>) -> Result<(), ColumnWriteError> {
        self.sink.finish().context(SinkSnafu)
    }
}

/// Provider for variable-length columns.
pub struct VarLenProvider {
    data_type: LogicalDataType,
    physical: DataType,
}

impl VarLenProvider {
    /// Provider for UTF-8 text columns (the canonical fallback type).
    pub fn utf8() -> Self {
        Self {
            data_type: LogicalDataType::Utf8,
            physical: DataType::Utf8,
        }
    }

    /// Provider for raw binary columns.
    pub fn binary() -> Self {
        Self {
            data_type: LogicalDataType::Binary,
            physical: DataType::Binary,
        }
    }
}

impl TypeProvider for VarLenProvider {
    fn data_type(&self) -> LogicalDataType {
        self.data_type.clone()
    }

    fn binary_writer(
        &self,
        location: &TableLocation,
        column: &str,
    ) -> StorageResult<Box<dyn ColumnWriter>> {
        let sink = ColumnSink::create(location, &layout::column_rel_path(column))?;
        Ok(Box::new(VarLenWriter {
            expected: self.physical.clone(),
            sink,
            buf: Vec::new(),
        }))
    }
}
