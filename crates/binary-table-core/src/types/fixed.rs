//! Fixed-width binary column writers.
//!
//! Numeric and temporal values are encoded as consecutive little-endian
//! values, booleans as one byte per value (0 or 1). Values at null slots
//! are written like any other so every artifact holds exactly one value
//! per row; the validity sidecar is the source of truth for nulls.

use std::marker::PhantomData;

use arrow::array::{Array, ArrayRef, BooleanArray, PrimitiveArray};
use arrow::datatypes::{ArrowPrimitiveType, DataType};
use snafu::prelude::*;

use crate::schema::LogicalDataType;
use crate::storage::{ColumnSink, StorageResult, TableLocation, layout};
use crate::types::registry::TypeProvider;
use crate::types::{ColumnWriteError, ColumnWriter, SinkSnafu, TypeMismatchSnafu};

/// Little-endian encoding for fixed-width native values.
pub(crate) trait LeBytes: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Append the little-endian encoding of `self` to `out`.
    fn put_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_le_bytes {
    ($($native:ty),*) => {$(
        impl LeBytes for $native {
            const WIDTH: usize = std::mem::size_of::<$native>();

            fn put_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

impl_le_bytes!(i32, i64, f32, f64);

/// Column writer for one fixed-width primitive type.
pub struct PrimitiveWriter<T: ArrowPrimitiveType> {
    sink: ColumnSink,
    buf: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ArrowPrimitiveType> PrimitiveWriter<T>
where
    T::Native: LeBytes,
{
    fn new(sink: ColumnSink) -> Self {
        Self {
            sink,
            buf: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: ArrowPrimitiveType> ColumnWriter for PrimitiveWriter<T>
where
    T::Native: LeBytes,
{
    fn append(&mut self, values: &ArrayRef) -> Result<(), ColumnWriteError> {
        if values.is_empty() {
            return Ok(());
        }

        let typed: &PrimitiveArray<T> =
            values.as_any().downcast_ref().context(TypeMismatchSnafu {
                expected: T::DATA_TYPE,
                actual: values.data_type().clone(),
            })?;

        self.buf.clear();
        self.buf.reserve(typed.len() * <T::Native as LeBytes>::WIDTH);
        for value in typed.values().iter() {
            value.put_le(&mut self.buf);
        }

        self.sink.write_all(&self.buf).context(SinkSnafu)
    }

    fn finish(self: Box<Self>) -> Result<(), ColumnWriteError> {
        self.sink.finish().context(SinkSnafu)
    }
}

/// Column writer for boolean values, one byte per value.
pub struct BooleanWriter {
    sink: ColumnSink,
    buf: Vec<u8>,
}

impl ColumnWriter for BooleanWriter {
    fn append(&mut self, values: &ArrayRef) -> Result<(), ColumnWriteError> {
        if values.is_empty() {
            return Ok(());
        }

        let typed: &BooleanArray = values.as_any().downcast_ref().context(TypeMismatchSnafu {
            expected: DataType::Boolean,
            actual: values.data_type().clone(),
        })?;

        self.buf.clear();
        self.buf.reserve(typed.len());
        for i in 0..typed.len() {
            self.buf.push(typed.value(i) as u8);
        }

        self.sink.write_all(&self.buf).context(SinkSnafu)
    }

    fn finish(self: Box<Self>) -> Result<(), ColumnWriteError> {
        self.sink.finish().context(SinkSnafu)
    }
}

/// Provider for fixed-width primitive columns.
pub struct PrimitiveProvider<T: ArrowPrimitiveType> {
    data_type: LogicalDataType,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ArrowPrimitiveType> PrimitiveProvider<T>
where
    T::Native: LeBytes,
{
    /// Create a provider mapping `data_type` to `T`'s physical encoding.
    pub fn new(data_type: LogicalDataType) -> Self {
        Self {
            data_type,
            _marker: PhantomData,
        }
    }
}

impl<T: ArrowPrimitiveType> TypeProvider for PrimitiveProvider<T>
where
    T::Native: LeBytes,
{
    fn data_type(&self) -> LogicalDataType {
        self.data_type.clone()
    }

    fn binary_writer(
        &self,
        location: &TableLocation,
        column: &str,
    ) -> StorageResult<Box<dyn ColumnWriter>> {
        let sink = ColumnSink::create(location, &layout::column_rel_path(column))?;
        Ok(Box::new(PrimitiveWriter::<T>::new(sink)))
    }
}

/// Provider for boolean columns.
pub struct BooleanProvider;

impl TypeProvider for BooleanProvider {
    fn data_type(&self) -> LogicalDataType {
        LogicalDataType::Bool
    }

    fn binary_writer(
        &self,
        location: &TableLocation,
        column: &str,
    ) -> StorageResult<Box<dyn ColumnWriter>> {
        let sink = ColumnSink::create(location, &layout::column_rel_path(column))?;
        Ok(Box::new(BooleanWriter {
            sink,
            buf: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::io::create_staging;
    use arrow::array::{Int64Array, TimestampMillisecondArray};
    use arrow::datatypes::{Int64Type, TimestampMillisecondType};
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    async fn staged_table(tmp: &TempDir) -> Result<TableLocation, Box<dyn std::error::Error>> {
        let location = TableLocation::local(tmp.path().join("table"));
        create_staging(&location).await?;
        Ok(location)
    }

    #[tokio::test]
    async fn int64_writer_encodes_little_endian_values() -> TestResult {
        let tmp = TempDir::new()?;
        let location = staged_table(&tmp).await?;

        let provider = PrimitiveProvider::<Int64Type>::new(LogicalDataType::Int64);
        let mut writer = provider.binary_writer(&location, "id")?;

        let batch: ArrayRef = Arc::new(Int64Array::from(vec![1i64, -2, 300]));
        writer.append(&batch)?;
        writer.finish()?;

        let written = std::fs::read(location.staging_root().join("id.col"))?;
        let mut expected = Vec::new();
        for v in [1i64, -2, 300] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(written, expected);
        Ok(())
    }

    #[tokio::test]
    async fn timestamp_writer_encodes_raw_epoch_values() -> TestResult {
        let tmp = TempDir::new()?;
        let location = staged_table(&tmp).await?;

        let provider = PrimitiveProvider::<TimestampMillisecondType>::new(
            LogicalDataType::Timestamp {
                unit: crate::schema::LogicalTimestampUnit::Millis,
            },
        );
        let mut writer = provider.binary_writer(&location, "ts")?;

        let batch: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![1_000i64, 2_000]));
        writer.append(&batch)?;
        writer.finish()?;

        let written = std::fs::read(location.staging_root().join("ts.col"))?;
        let mut expected = Vec::new();
        expected.extend_from_slice(&1_000i64.to_le_bytes());
        expected.extend_from_slice(&2_000i64.to_le_bytes());
        assert_eq!(written, expected);
        Ok(())
    }

    #[tokio::test]
    async fn boolean_writer_encodes_one_byte_per_value() -> TestResult {
        let tmp = TempDir::new()?;
        let location = staged_table(&tmp).await?;

        let mut writer = BooleanProvider.binary_writer(&location, "flag")?;
        let batch: ArrayRef = Arc::new(BooleanArray::from(vec![true, false, true]));
        writer.append(&batch)?;
        writer.finish()?;

        let written = std::fs::read(location.staging_root().join("flag.col"))?;
        assert_eq!(written, vec![1u8, 0, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_batches_are_a_no_op() -> TestResult {
        let tmp = TempDir::new()?;
        let location = staged_table(&tmp).await?;

        let provider = PrimitiveProvider::<Int64Type>::new(LogicalDataType::Int64);
        let mut writer = provider.binary_writer(&location, "id")?;
        let batch: ArrayRef = Arc::new(Int64Array::from(Vec::<i64>::new()));
        writer.append(&batch)?;
        writer.finish()?;

        let written = std::fs::read(location.staging_root().join("id.col"))?;
        assert!(written.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_batch_type_is_rejected() -> TestResult {
        let tmp = TempDir::new()?;
        let location = staged_table(&tmp).await?;

        let provider = PrimitiveProvider::<Int64Type>::new(LogicalDataType::Int64);
        let mut writer = provider.binary_writer(&location, "id")?;

        let batch: ArrayRef = Arc::new(BooleanArray::from(vec![true]));
        let err = writer.append(&batch).expect_err("expected type mismatch");
        assert!(matches!(err, ColumnWriteError::TypeMismatch { .. }));
        Ok(())
    }
}
