//! The upstream row-batch source interface and an in-memory
//! implementation.
//!
//! Sources are pull-based: the writer calls [`RowBatchSource::next`] to
//! advance the current row window, then reads each column's slice of that
//! window through [`RowBatchSource::column_batch`]. A window of 0 rows is
//! the end-of-stream sentinel.

use std::{error::Error, fmt};

use arrow::array::ArrayRef;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;

use crate::schema::{ColumnDetails, LogicalDataType};

/// Opaque error produced by a batch source implementation.
///
/// Sources sit outside this crate's error taxonomy, so their failures are
/// carried as an opaque boxed error and wrapped into
/// [`crate::writer::WriteError::Source`] by the orchestrator.
#[derive(Debug)]
pub struct SourceError(Box<dyn Error + Send + Sync + 'static>);

impl SourceError {
    /// Wrap any error raised by a source implementation.
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self(error.into())
    }

    /// Build a source error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_ref() as &(dyn Error + 'static))
    }
}

/// A pull-based source of columnar row batches.
///
/// The writer owns exactly one source per session. `next` advances the
/// window across all columns at once; `column_batch` results are valid
/// only relative to the most recent `next` call.
pub trait RowBatchSource {
    /// Ordered column descriptors for this source.
    fn columns(&self) -> &[ColumnDetails];

    /// Pull the next window of up to `desired` rows across all columns.
    ///
    /// Returns the actual row count; 0 means the source is exhausted.
    fn next(&mut self, desired: usize) -> Result<usize, SourceError>;

    /// The current window's values for one column, in the column's native
    /// type. Valid only relative to the most recent successful
    /// [`RowBatchSource::next`].
    fn column_batch(&mut self, index: usize) -> Result<ArrayRef, SourceError>;

    /// Rewind the source to its initial position.
    fn reset(&mut self) -> Result<(), SourceError>;
}

/// In-memory [`RowBatchSource`] over materialized Arrow record batches.
///
/// Column details are derived from the Arrow schema; Arrow types outside
/// the logical vocabulary surface as [`LogicalDataType::Other`] and plan
/// as fallback conversions. Windows never span record batch boundaries.
pub struct RecordBatchSource {
    columns: Vec<ColumnDetails>,
    batches: Vec<RecordBatch>,
    cursor: usize,
    offset: usize,
    window: Option<RecordBatch>,
}

impl RecordBatchSource {
    /// Build a source over `batches` described by `schema`.
    pub fn new(schema: &Schema, batches: Vec<RecordBatch>) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                ColumnDetails::new(
                    field.name(),
                    LogicalDataType::from_arrow_datatype(field.data_type()),
                )
            })
            .collect();

        Self {
            columns,
            batches,
            cursor: 0,
            offset: 0,
            window: None,
        }
    }
}

impl RowBatchSource for RecordBatchSource {
    fn columns(&self) -> &[ColumnDetails] {
        &self.columns
    }

    fn next(&mut self, desired: usize) -> Result<usize, SourceError> {
        if desired == 0 {
            self.window = None;
            return Ok(0);
        }

        while let Some(batch) = self.batches.get(self.cursor) {
            let remaining = batch.num_rows() - self.offset;
            if remaining == 0 {
                self.cursor += 1;
                self.offset = 0;
                continue;
            }

            let take = remaining.min(desired);
            self.window = Some(batch.slice(self.offset, take));
            self.offset += take;
            return Ok(take);
        }

        self.window = None;
        Ok(0)
    }

    fn column_batch(&mut self, index: usize) -> Result<ArrayRef, SourceError> {
        let window = self
            .window
            .as_ref()
            .ok_or_else(|| SourceError::message("column_batch called with no current window"))?;
        Ok(window.column(index).clone())
    }

    fn reset(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        self.offset = 0;
        self.window = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field};
    use std::sync::Arc;

    fn id_schema() -> Schema {
        Schema::new(vec![Field::new("id", DataType::Int64, false)])
    }

    fn id_batch(values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(id_schema()),
            vec![Arc::new(Int64Array::from(values))],
        )
        .expect("valid batch")
    }

    #[test]
    fn windows_are_limited_by_desired_count() {
        let mut source = RecordBatchSource::new(&id_schema(), vec![id_batch(vec![1, 2, 3, 4, 5])]);

        assert_eq!(source.next(2).unwrap(), 2);
        assert_eq!(source.next(2).unwrap(), 2);
        assert_eq!(source.next(2).unwrap(), 1);
        assert_eq!(source.next(2).unwrap(), 0);
    }

    #[test]
    fn windows_do_not_span_batches() {
        let mut source = RecordBatchSource::new(
            &id_schema(),
            vec![id_batch(vec![1, 2, 3]), id_batch(vec![4])],
        );

        assert_eq!(source.next(10).unwrap(), 3);
        assert_eq!(source.next(10).unwrap(), 1);
        assert_eq!(source.next(10).unwrap(), 0);
    }

    #[test]
    fn column_batch_tracks_the_current_window() {
        let mut source = RecordBatchSource::new(&id_schema(), vec![id_batch(vec![1, 2, 3])]);

        assert_eq!(source.next(2).unwrap(), 2);
        let window = source.column_batch(0).unwrap();
        let ids = window.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.values(), &[1, 2]);

        assert_eq!(source.next(2).unwrap(), 1);
        let window = source.column_batch(0).unwrap();
        let ids = window.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.values(), &[3]);
    }

    #[test]
    fn column_batch_before_next_is_an_error() {
        let mut source = RecordBatchSource::new(&id_schema(), vec![id_batch(vec![1])]);
        assert!(source.column_batch(0).is_err());
    }

    #[test]
    fn reset_rewinds_to_the_start() {
        let mut source = RecordBatchSource::new(&id_schema(), vec![id_batch(vec![1, 2])]);

        assert_eq!(source.next(10).unwrap(), 2);
        assert_eq!(source.next(10).unwrap(), 0);

        source.reset().unwrap();
        assert_eq!(source.next(10).unwrap(), 2);
    }

    #[test]
    fn column_details_follow_the_arrow_schema() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        let source = RecordBatchSource::new(&schema, vec![]);

        assert_eq!(
            source.columns(),
            &[
                ColumnDetails::new("id", LogicalDataType::Int64),
                ColumnDetails::new("name", LogicalDataType::Utf8),
            ]
        );
    }
}
