//! Logical column types, column details, and schema validation.
//!
//! This module models the logical types a column can declare, along with
//! conversion to and from Arrow data types. Logical types are used purely
//! as dispatch keys: the type registry decides from them whether a column
//! has a direct binary writer, and the fallback converter decides whether
//! a cast path to the canonical text type exists.
use std::{collections::HashSet, fmt};

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Units for logical timestamps recorded in column details.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogicalTimestampUnit {
    /// Millisecond precision timestamps.
    Millis,
    /// Microsecond precision timestamps.
    Micros,
    /// Nanosecond precision timestamps.
    Nanos,
}

impl LogicalTimestampUnit {
    fn to_arrow_time_unit(self) -> TimeUnit {
        match self {
            LogicalTimestampUnit::Millis => TimeUnit::Millisecond,
            LogicalTimestampUnit::Micros => TimeUnit::Microsecond,
            LogicalTimestampUnit::Nanos => TimeUnit::Nanosecond,
        }
    }
}

impl fmt::Display for LogicalTimestampUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalTimestampUnit::Millis => write!(f, "ms"),
            LogicalTimestampUnit::Micros => write!(f, "us"),
            LogicalTimestampUnit::Nanos => write!(f, "ns"),
        }
    }
}

/// Logical data types a column can declare.
///
/// Every type except [`LogicalDataType::Other`] maps to an Arrow
/// [`DataType`], the in-memory batch representation. Whether a type has a
/// direct binary writer is a separate question answered by the type
/// registry; types without one are converted to [`LogicalDataType::Utf8`],
/// the canonical fallback text type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogicalDataType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 encoded string. The canonical fallback text type.
    Utf8,
    /// Variable-length binary data.
    Binary,
    /// Days since the Unix epoch.
    Date32,
    /// Timestamp value with a precision unit.
    Timestamp {
        /// Timestamp precision unit (millis, micros, nanos).
        unit: LogicalTimestampUnit,
    },
    /// Fixed-precision decimal value with declared precision and scale.
    Decimal {
        /// Total number of decimal digits (both sides of the decimal point).
        precision: i32,
        /// Number of digits to the right of the decimal point.
        scale: i32,
    },
    /// Catch-all logical data type referenced by name.
    Other(String),
}

impl LogicalDataType {
    /// Convert this logical type to its Arrow [`DataType`].
    ///
    /// Fails for [`LogicalDataType::Other`] and for decimal definitions
    /// outside the supported bounds (see [`SchemaConvertError`]).
    pub fn to_arrow_datatype(&self, column: &str) -> Result<DataType, SchemaConvertError> {
        Ok(match self {
            LogicalDataType::Bool => DataType::Boolean,
            LogicalDataType::Int32 => DataType::Int32,
            LogicalDataType::Int64 => DataType::Int64,
            LogicalDataType::Float32 => DataType::Float32,
            LogicalDataType::Float64 => DataType::Float64,
            LogicalDataType::Utf8 => DataType::Utf8,
            LogicalDataType::Binary => DataType::Binary,
            LogicalDataType::Date32 => DataType::Date32,

            LogicalDataType::Timestamp { unit } => {
                DataType::Timestamp(unit.to_arrow_time_unit(), None)
            }

            LogicalDataType::Decimal { precision, scale } => {
                let precision = *precision;
                let scale = *scale;
                if precision <= 0 || precision > 38 {
                    return DecimalInvalidSnafu {
                        column,
                        precision,
                        scale,
                        details: "precision must be in 1..=38".to_string(),
                    }
                    .fail();
                }
                if scale < 0 || scale > precision {
                    return DecimalInvalidSnafu {
                        column,
                        precision,
                        scale,
                        details: "scale must be in 0..=precision".to_string(),
                    }
                    .fail();
                }
                DataType::Decimal128(precision as u8, scale as i8)
            }

            LogicalDataType::Other(name) => {
                return OtherTypeUnsupportedSnafu {
                    column,
                    name: name.clone(),
                }
                .fail();
            }
        })
    }

    /// Derive the logical type for an Arrow [`DataType`].
    ///
    /// Types outside the supported vocabulary map to
    /// [`LogicalDataType::Other`], which plans as a fallback conversion (or
    /// a planning error when no cast path exists).
    pub fn from_arrow_datatype(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => LogicalDataType::Bool,
            DataType::Int32 => LogicalDataType::Int32,
            DataType::Int64 => LogicalDataType::Int64,
            DataType::Float32 => LogicalDataType::Float32,
            DataType::Float64 => LogicalDataType::Float64,
            DataType::Utf8 => LogicalDataType::Utf8,
            DataType::Binary => LogicalDataType::Binary,
            DataType::Date32 => LogicalDataType::Date32,
            DataType::Timestamp(TimeUnit::Millisecond, None) => LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Millis,
            },
            DataType::Timestamp(TimeUnit::Microsecond, None) => LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Micros,
            },
            DataType::Timestamp(TimeUnit::Nanosecond, None) => LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Nanos,
            },
            DataType::Decimal128(precision, scale) => LogicalDataType::Decimal {
                precision: *precision as i32,
                scale: *scale as i32,
            },
            other => LogicalDataType::Other(format!("{other:?}")),
        }
    }
}

impl fmt::Display for LogicalDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalDataType::Bool => write!(f, "bool"),
            LogicalDataType::Int32 => write!(f, "int32"),
            LogicalDataType::Int64 => write!(f, "int64"),
            LogicalDataType::Float32 => write!(f, "float32"),
            LogicalDataType::Float64 => write!(f, "float64"),
            LogicalDataType::Utf8 => write!(f, "utf8"),
            LogicalDataType::Binary => write!(f, "binary"),
            LogicalDataType::Date32 => write!(f, "date32"),
            LogicalDataType::Timestamp { unit } => write!(f, "timestamp[{unit}]"),
            LogicalDataType::Decimal { precision, scale } => {
                write!(f, "decimal(precision={precision}, scale={scale})")
            }
            LogicalDataType::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Logical column definition.
///
/// Details are immutable once captured into a write plan; when a column is
/// converted to the fallback text type a copy with the changed type is
/// produced via [`ColumnDetails::with_data_type`], never a mutation in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDetails {
    /// Column name, unique within a table (case-insensitively).
    pub name: String,
    /// Logical data type for the column.
    pub data_type: LogicalDataType,
}

impl ColumnDetails {
    /// Create column details.
    pub fn new(name: impl Into<String>, data_type: LogicalDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// A copy of these details with a different data type.
    pub fn with_data_type(&self, data_type: LogicalDataType) -> Self {
        Self {
            name: self.name.clone(),
            data_type,
        }
    }
}

impl fmt::Display for ColumnDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// Errors that can occur while constructing or validating a table schema.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
pub enum SchemaError {
    /// Duplicate column names (case-insensitive) are not allowed.
    #[snafu(display("Duplicate column name: {column}"))]
    DuplicateColumn {
        /// The duplicate column name as declared.
        column: String,
    },

    /// Column names must be non-empty.
    #[snafu(display("Column name must be non-empty"))]
    EmptyColumnName,
}

/// Ordered collection of logical columns with validated names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    /// All logical columns that compose the schema in their defined order.
    columns: Vec<ColumnDetails>,
}

impl TableSchema {
    /// Construct a validated table schema.
    ///
    /// Rejects empty column names and duplicate names; names are compared
    /// case-insensitively since column artifacts land on filesystems that
    /// may not distinguish case.
    pub fn new(columns: Vec<ColumnDetails>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for col in &columns {
            if col.name.trim().is_empty() {
                return EmptyColumnNameSnafu.fail();
            }
            if !seen.insert(col.name.to_ascii_lowercase()) {
                return DuplicateColumnSnafu {
                    column: col.name.clone(),
                }
                .fail();
            }
        }

        Ok(Self { columns })
    }

    /// Borrow the logical columns.
    pub fn columns(&self) -> &[ColumnDetails] {
        &self.columns
    }
}

/// Errors encountered while converting a logical type to Arrow.
#[derive(Debug, Snafu)]
pub enum SchemaConvertError {
    /// Decimal precision/scale is out of supported bounds.
    #[snafu(display(
        "invalid decimal definition for column '{column}': precision={precision}, scale={scale} ({details})"
    ))]
    DecimalInvalid {
        /// Column name that failed conversion.
        column: String,
        /// Declared total precision.
        precision: i32,
        /// Declared scale (digits to the right of the decimal point).
        scale: i32,
        /// Human-readable details describing the constraint violation.
        details: String,
    },

    /// Catch-all "Other" types have no Arrow representation.
    #[snafu(display("Other type '{name}' has no Arrow representation for column '{column}'"))]
    OtherTypeUnsupported {
        /// Column name that failed conversion.
        column: String,
        /// Type name reported by the source.
        name: String,
    },
}
