//! Per-column write plans.
//!
//! A [`ColumnPlan`] captures, once at session construction, how one source
//! column reaches disk: its resolved output type, whether its batches pass
//! through the fallback converter, which provider materializes its writer,
//! and (after writers open) the exclusively-owned writer itself. The
//! capability-or-fallback decision is made here exactly once, before any
//! writer is constructed, and never revisited.

use arrow::array::ArrayRef;
use snafu::prelude::*;

use crate::schema::ColumnDetails;
use crate::types::ColumnWriter;
use crate::types::convert::{self, CANONICAL_FALLBACK, Converter};
use crate::types::registry::{TypeProvider, TypeRegistry};
use crate::writer::error::{
    ConvertSnafu, FallbackWriterUnavailableSnafu, SourceSnafu, UnsupportedColumnTypeSnafu,
    WriteError,
};
use crate::writer::source::RowBatchSource;

use std::sync::Arc;

/// Resolved write plan for one source column.
pub struct ColumnPlan {
    details: ColumnDetails,
    source_index: usize,
    converter: Option<Converter>,
    provider: Arc<dyn TypeProvider>,
    pub(crate) writer: Option<Box<dyn ColumnWriter>>,
}

impl ColumnPlan {
    /// Output column details (the fallback text type when a conversion is
    /// planned, the declared type otherwise).
    pub fn details(&self) -> &ColumnDetails {
        &self.details
    }

    /// Whether batches are converted to the fallback text type.
    pub fn is_converted(&self) -> bool {
        self.converter.is_some()
    }

    /// Provider that materializes this column's writer.
    pub(crate) fn provider(&self) -> &Arc<dyn TypeProvider> {
        &self.provider
    }

    /// Materialize this column's output batch for the current window: the
    /// native batch, passed through the converter when one is planned.
    pub(crate) fn materialize<S: RowBatchSource>(
        &self,
        source: &mut S,
    ) -> Result<ArrayRef, WriteError> {
        let native = source
            .column_batch(self.source_index)
            .context(SourceSnafu)?;

        match &self.converter {
            Some(converter) => converter.convert(&native).context(ConvertSnafu {
                column: self.details.name.clone(),
            }),
            None => Ok(native),
        }
    }
}

/// Resolve the capability-or-fallback decision for every source column.
///
/// Columns with a registered binary writer capability keep their native
/// type and getter. All others are forced to the canonical fallback text
/// type with a converting getter; a column that cannot convert is a fatal
/// setup error.
pub(crate) fn plan_columns(
    columns: &[ColumnDetails],
    registry: &TypeRegistry,
) -> Result<Vec<ColumnPlan>, WriteError> {
    let mut plans = Vec::with_capacity(columns.len());

    for (index, column) in columns.iter().enumerate() {
        let plan = match registry.binary_writer_provider(&column.data_type) {
            Some(provider) => ColumnPlan {
                details: column.clone(),
                source_index: index,
                converter: None,
                provider: Arc::clone(provider),
                writer: None,
            },
            None => {
                let converter = convert::resolve_converter(&column.name, &column.data_type)
                    .context(UnsupportedColumnTypeSnafu {
                        column: column.name.clone(),
                    })?;
                let provider = registry
                    .binary_writer_provider(&CANONICAL_FALLBACK)
                    .context(FallbackWriterUnavailableSnafu {
                        column: column.name.clone(),
                    })?;

                ColumnPlan {
                    details: column.with_data_type(CANONICAL_FALLBACK),
                    source_index: index,
                    converter: Some(converter),
                    provider: Arc::clone(provider),
                    writer: None,
                }
            }
        };
        plans.push(plan);
    }

    Ok(plans)
}
