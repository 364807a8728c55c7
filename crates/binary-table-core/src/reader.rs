//! Read-back support for published binary tables.
//!
//! A [`TableReader`] opens a table that went through the full write
//! lifecycle (schema manifest, query text, publish) and decodes any column
//! artifact back into an Arrow array, applying the validity sidecar when
//! the column ever contained a null. Opening an unpublished destination is
//! a `NotFound` storage error, since staged artifacts are invisible until
//! publish.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array,
    Int64Array, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray,
};
use bytes::Bytes;
use roaring::RoaringTreemap;
use snafu::{Backtrace, prelude::*};

use crate::schema::{ColumnDetails, LogicalDataType, LogicalTimestampUnit, ManifestError, TableManifest, manifest};
use crate::storage::{StorageError, TableLocation, io, layout};

/// Errors raised while reading a published table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReadError {
    /// Failure reading the schema manifest or query artifact.
    #[snafu(display("Table metadata error: {source}"))]
    Metadata {
        /// Underlying manifest error.
        source: ManifestError,
    },

    /// Storage failure reading a column artifact.
    #[snafu(display("Storage error reading column artifact: {source}"))]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// The requested column is not part of the table schema.
    #[snafu(display("Column '{column}' is not part of the table schema"))]
    UnknownColumn {
        /// The requested column name.
        column: String,
    },

    /// A column artifact does not decode under its recorded type.
    #[snafu(display("Corrupt column artifact for '{column}': {msg}"))]
    CorruptColumn {
        /// Column whose artifact failed to decode.
        column: String,
        /// Decode failure details.
        msg: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The column's recorded logical type has no reader support.
    #[snafu(display("Column '{column}' has unreadable type {data_type}"))]
    UnsupportedColumnType {
        /// Column with the unreadable type.
        column: String,
        /// The recorded logical type.
        data_type: LogicalDataType,
    },
}

/// Reader over one published binary table.
pub struct TableReader {
    location: TableLocation,
    manifest: TableManifest,
    query: String,
}

impl TableReader {
    /// Open a published table, loading its schema manifest and query
    /// text.
    pub async fn open(location: TableLocation) -> Result<Self, ReadError> {
        let manifest = manifest::read_manifest(&location)
            .await
            .context(MetadataSnafu)?;
        let query = manifest::read_query(&location)
            .await
            .context(MetadataSnafu)?;

        Ok(Self {
            location,
            manifest,
            query,
        })
    }

    /// Column details recorded in the schema manifest, in original order.
    pub fn columns(&self) -> &[ColumnDetails] {
        &self.manifest.columns
    }

    /// Total row count recorded at finalization.
    pub fn row_count(&self) -> u64 {
        self.manifest.row_count
    }

    /// The query text that produced this table.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Decode one column artifact into an Arrow array, applying the
    /// validity sidecar when present. Column lookup is case-insensitive,
    /// matching the schema's uniqueness rule.
    pub async fn read_column(&self, column: &str) -> Result<ArrayRef, ReadError> {
        let details = self
            .manifest
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .context(UnknownColumnSnafu { column })?;

        let bytes = io::read_all_bytes(&self.location, &layout::column_rel_path(&details.name))
            .await
            .context(StorageSnafu)?;
        let bytes = Bytes::from(bytes);
        let nulls = self.read_nulls(&details.name).await?;

        decode_column(details, &bytes, &nulls)
    }

    /// Load the validity sidecar for `column`; absent sidecar means all
    /// rows are valid.
    async fn read_nulls(&self, column: &str) -> Result<RoaringTreemap, ReadError> {
        match io::read_all_bytes(&self.location, &layout::nulls_rel_path(column)).await {
            Ok(bytes) => {
                RoaringTreemap::deserialize_from(&mut Cursor::new(&bytes)).map_err(|e| {
                    ReadError::CorruptColumn {
                        column: column.to_string(),
                        msg: format!("invalid validity sidecar: {e}"),
                        backtrace: Backtrace::capture(),
                    }
                })
            }
            Err(StorageError::NotFound { .. }) => Ok(RoaringTreemap::new()),
            Err(source) => Err(ReadError::Storage { source }),
        }
    }
}

fn fixed_chunks<'a, const WIDTH: usize>(
    column: &str,
    bytes: &'a [u8],
) -> Result<impl Iterator<Item = [u8; WIDTH]> + 'a, ReadError> {
    ensure!(
        bytes.len() % WIDTH == 0,
        CorruptColumnSnafu {
            column,
            msg: format!("length {} is not a multiple of {WIDTH}", bytes.len()),
        }
    );

    Ok(bytes.chunks_exact(WIDTH).map(|chunk| {
        let mut buf = [0u8; WIDTH];
        buf.copy_from_slice(chunk);
        buf
    }))
}

fn valid<T>(nulls: &RoaringTreemap, index: usize, value: T) -> Option<T> {
    if nulls.contains(index as u64) {
        None
    } else {
        Some(value)
    }
}

fn decode_varlen(column: &str, bytes: &[u8]) -> Result<Vec<Vec<u8>>, ReadError> {
    let mut values = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        ensure!(
            pos + 4 <= bytes.len(),
            CorruptColumnSnafu {
                column,
                msg: format!("truncated length prefix at offset {pos}"),
            }
        );
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&bytes[pos..pos + 4]);
        let len = u32::from_le_bytes(len_buf) as usize;
        pos += 4;

        ensure!(
            pos + len <= bytes.len(),
            CorruptColumnSnafu {
                column,
                msg: format!("value of {len} bytes overruns the artifact at offset {pos}"),
            }
        );
        values.push(bytes[pos..pos + len].to_vec());
        pos += len;
    }

    Ok(values)
}

fn decode_column(
    details: &ColumnDetails,
    bytes: &[u8],
    nulls: &RoaringTreemap,
) -> Result<ArrayRef, ReadError> {
    let column = details.name.as_str();

    Ok(match &details.data_type {
        LogicalDataType::Bool => {
            let array: BooleanArray = bytes
                .iter()
                .enumerate()
                .map(|(i, b)| valid(nulls, i, *b != 0))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Int32 => {
            let array: Int32Array = fixed_chunks::<4>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, i32::from_le_bytes(chunk)))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Int64 => {
            let array: Int64Array = fixed_chunks::<8>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, i64::from_le_bytes(chunk)))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Float32 => {
            let array: Float32Array = fixed_chunks::<4>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, f32::from_le_bytes(chunk)))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Float64 => {
            let array: Float64Array = fixed_chunks::<8>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, f64::from_le_bytes(chunk)))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Date32 => {
            let array: Date32Array = fixed_chunks::<4>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, i32::from_le_bytes(chunk)))
                .collect();
            Arc::new(array)
        }

        LogicalDataType::Timestamp { unit } => {
            let values = fixed_chunks::<8>(column, bytes)?
                .enumerate()
                .map(|(i, chunk)| valid(nulls, i, i64::from_le_bytes(chunk)));
            match unit {
                LogicalTimestampUnit::Millis => {
                    Arc::new(values.collect::<TimestampMillisecondArray>())
                }
                LogicalTimestampUnit::Micros => {
                    Arc::new(values.collect::<TimestampMicrosecondArray>())
                }
                LogicalTimestampUnit::Nanos => {
                    Arc::new(values.collect::<TimestampNanosecondArray>())
                }
            }
        }

        LogicalDataType::Utf8 => {
            let raw = decode_varlen(column, bytes)?;
            let mut values = Vec::with_capacity(raw.len());
            for (i, value) in raw.into_iter().enumerate() {
                let text = String::from_utf8(value).map_err(|e| ReadError::CorruptColumn {
                    column: column.to_string(),
                    msg: format!("value at row {i} is not valid UTF-8: {e}"),
                    backtrace: Backtrace::capture(),
                })?;
                values.push(valid(nulls, i, text));
            }
            Arc::new(values.into_iter().collect::<StringArray>())
        }

        LogicalDataType::Binary => {
            let raw = decode_varlen(column, bytes)?;
            let values: Vec<Option<Vec<u8>>> = raw
                .into_iter()
                .enumerate()
                .map(|(i, value)| valid(nulls, i, value))
                .collect();
            Arc::new(values.into_iter().collect::<BinaryArray>())
        }

        data_type @ (LogicalDataType::Decimal { .. } | LogicalDataType::Other(_)) => {
            return UnsupportedColumnTypeSnafu {
                column,
                data_type: data_type.clone(),
            }
            .fail();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn fixed_chunks_rejects_ragged_artifacts() {
        let err = fixed_chunks::<8>("id", &[0u8; 12])
            .err()
            .expect("ragged artifact rejected");
        assert!(matches!(err, ReadError::CorruptColumn { .. }));
    }

    #[test]
    fn decode_varlen_rejects_overrunning_values() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(b"abc");

        let err = decode_varlen("name", &bytes).expect_err("overrun rejected");
        assert!(matches!(err, ReadError::CorruptColumn { .. }));
    }

    #[test]
    fn decode_applies_the_null_mask() {
        let mut bytes = Vec::new();
        for v in [10i64, 20, 30] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut nulls = RoaringTreemap::new();
        nulls.insert(1);

        let details = ColumnDetails::new("id", LogicalDataType::Int64);
        let array = decode_column(&details, &bytes, &nulls).expect("decode succeeds");
        let ids = array.as_any().downcast_ref::<Int64Array>().expect("int64");

        assert_eq!(ids.len(), 3);
        assert_eq!(ids.value(0), 10);
        assert!(ids.is_null(1));
        assert_eq!(ids.value(2), 30);
    }

    #[test]
    fn decimal_manifest_entries_are_unreadable() {
        let details = ColumnDetails::new(
            "amount",
            LogicalDataType::Decimal {
                precision: 10,
                scale: 2,
            },
        );
        let err = decode_column(&details, &[], &RoaringTreemap::new())
            .expect_err("decimal never appears in published manifests");
        assert!(matches!(err, ReadError::UnsupportedColumnType { .. }));
    }
}
