//! Fallback conversion to the canonical text type.
//!
//! Columns whose logical type has no registered binary writer capability
//! are converted to [`CANONICAL_FALLBACK`] (variable-length UTF-8 text),
//! which is universally representable for any primitive. Resolution
//! failure is a configuration error surfaced at planning time, never a
//! runtime data error.

use arrow::array::ArrayRef;
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use snafu::prelude::*;

use crate::schema::{LogicalDataType, SchemaConvertError};

/// The canonical fallback text type used when no direct binary writer
/// capability exists for a column's native type.
pub const CANONICAL_FALLBACK: LogicalDataType = LogicalDataType::Utf8;

/// Errors resolving a fallback conversion.
///
/// These are setup/configuration errors: they indicate a column type the
/// deployment cannot persist at all, and are surfaced when the write
/// session is planned rather than when data flows.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConvertError {
    /// The source logical type has no Arrow representation to convert
    /// from.
    #[snafu(display("Column '{column}' has no representation to convert from: {source}"))]
    Unrepresentable {
        /// Column that failed conversion resolution.
        column: String,
        /// Underlying schema conversion error.
        source: SchemaConvertError,
    },

    /// No cast path exists from the source type to the fallback text
    /// type.
    #[snafu(display("No conversion from {from} to the fallback text type for column '{column}'"))]
    NoCastPath {
        /// Column that failed conversion resolution.
        column: String,
        /// Arrow type conversion was attempted from.
        from: DataType,
    },
}

/// A resolved conversion from a source Arrow type to the fallback text
/// type.
#[derive(Debug, Clone)]
pub struct Converter {
    from: DataType,
    to: DataType,
}

impl Converter {
    /// Arrow type this converter accepts.
    pub fn from(&self) -> &DataType {
        &self.from
    }

    /// Arrow type this converter produces.
    pub fn to(&self) -> &DataType {
        &self.to
    }

    /// Apply the conversion to one materialized batch.
    pub fn convert(&self, values: &ArrayRef) -> Result<ArrayRef, ArrowError> {
        cast(values, &self.to)
    }
}

/// Resolve the conversion from `column`'s native type to the canonical
/// fallback text type.
///
/// Fails if the type is not representable or has no cast path. That is a
/// programming/setup invariant violation, not an expected runtime
/// condition.
pub fn resolve_converter(
    column: &str,
    data_type: &LogicalDataType,
) -> Result<Converter, ConvertError> {
    let from = data_type
        .to_arrow_datatype(column)
        .context(UnrepresentableSnafu { column })?;
    let to = DataType::Utf8;

    ensure!(
        can_cast_types(&from, &to),
        NoCastPathSnafu {
            column,
            from: from.clone(),
        }
    );

    Ok(Converter { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Decimal128Array, StringArray};
    use std::sync::Arc;

    #[test]
    fn decimal_resolves_to_a_text_conversion() {
        let converter = resolve_converter(
            "amount",
            &LogicalDataType::Decimal {
                precision: 10,
                scale: 2,
            },
        )
        .expect("decimal converts to text");

        assert_eq!(converter.from(), &DataType::Decimal128(10, 2));
        assert_eq!(converter.to(), &DataType::Utf8);
    }

    #[test]
    fn converter_preserves_values_and_nulls() {
        let converter = resolve_converter(
            "amount",
            &LogicalDataType::Decimal {
                precision: 10,
                scale: 2,
            },
        )
        .expect("decimal converts to text");

        let source = Decimal128Array::from(vec![Some(1234i128), None])
            .with_precision_and_scale(10, 2)
            .expect("valid decimal array");
        let values: ArrayRef = Arc::new(source);

        let converted = converter.convert(&values).expect("cast succeeds");
        let text = converted
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8 output");

        assert_eq!(text.value(0), "12.34");
        assert!(text.is_null(1));
    }

    #[test]
    fn other_type_is_a_setup_error() {
        let err = resolve_converter("opaque", &LogicalDataType::Other("engine::Blob".to_string()))
            .expect_err("other has no conversion");
        assert!(matches!(err, ConvertError::Unrepresentable { .. }));
    }
}
