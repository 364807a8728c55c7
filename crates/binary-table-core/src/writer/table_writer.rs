//! The binary table write orchestrator.
//!
//! This module contains the core pull-loop implementation plus the public
//! wrappers. It is responsible for:
//! - planning every source column at construction (writer capability or
//!   fallback conversion, decided exactly once),
//! - clearing and staging the destination before any writer opens,
//! - opening column writers lazily on the first non-empty batch,
//! - fanning out per-column appends in parallel within each step,
//! - finalizing (schema manifest + query text + atomic publish) on stream
//!   exhaustion.
//!   Keep new write-time invariants here so the flow remains centralized.

use std::collections::HashMap;

use arrow::array::ArrayRef;
use log::{debug, warn};
use snafu::prelude::*;
use tokio::task::JoinSet;

use crate::schema::{ColumnDetails, TableManifest, TableSchema, manifest};
use crate::storage::{TableLocation, io};
use crate::types::ColumnWriter;
use crate::types::nullable::NullableWriter;
use crate::types::registry::TypeRegistry;
use crate::writer::error::{
    MetadataSnafu, MissingWriterSnafu, OpenColumnSnafu, SchemaSnafu, SessionFailedSnafu,
    SourceSnafu, StorageSnafu, WriteError,
};
use crate::writer::plan::{self, ColumnPlan};
use crate::writer::source::RowBatchSource;

/// Write session lifecycle.
///
/// Planning is eager (at construction); writers open lazily on the first
/// non-empty batch; `Finalized` is terminal for the happy path. A failed
/// step moves the session to `Failed`, from which only `reset` and
/// `abandon` are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Planned,
    Writing,
    Finalized,
    Failed,
}

/// Summary of a completed table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Total rows pulled from the source and written to every column.
    pub rows_written: u64,
    /// Output column details in original column order.
    pub columns: Vec<ColumnDetails>,
}

/// Pull-driven writer producing a published binary table from a row-batch
/// source.
///
/// A session is bound to one destination and one source. The caller steps
/// it repeatedly; when the source reports exhaustion the session closes
/// all writers, persists the schema manifest and query text, and publishes
/// the staged directory atomically. A table only ever becomes visible
/// through that final publish, so an abandoned or failed write leaves no
/// readable table behind.
///
/// ```rust,ignore
/// let writer = BinaryTableWriter::create(source, location, query).await?;
/// let summary = writer.write_all(16 * 1024).await?;
/// ```
pub struct BinaryTableWriter<S> {
    source: S,
    location: TableLocation,
    query: String,
    plans: Vec<ColumnPlan>,
    rows_written: u64,
    lifecycle: Lifecycle,
}

impl<S: RowBatchSource> BinaryTableWriter<S> {
    /// Create a write session bound to `location` and `source`.
    ///
    /// Clears any pre-existing destination content (published and staged)
    /// before planning, guarding against mixing stale and fresh column
    /// artifacts, then resolves the capability-or-fallback plan for every
    /// source column. Both failures are fatal to the write; nothing
    /// partial is left publishable.
    pub async fn create(
        source: S,
        location: TableLocation,
        query: impl Into<String>,
    ) -> Result<Self, WriteError> {
        Self::create_with_registry(source, location, query, TypeRegistry::global()).await
    }

    /// As [`BinaryTableWriter::create`], with an explicit type registry.
    pub async fn create_with_registry(
        source: S,
        location: TableLocation,
        query: impl Into<String>,
        registry: &TypeRegistry,
    ) -> Result<Self, WriteError> {
        io::delete_table(&location).await.context(StorageSnafu)?;
        io::create_staging(&location).await.context(StorageSnafu)?;

        // Column names double as artifact names, so the case-insensitive
        // uniqueness rule is enforced before any plan exists.
        TableSchema::new(source.columns().to_vec()).context(SchemaSnafu)?;
        let plans = plan::plan_columns(source.columns(), registry)?;

        Ok(Self {
            source,
            location,
            query: query.into(),
            plans,
            rows_written: 0,
            lifecycle: Lifecycle::Planned,
        })
    }

    /// Output column details in original order (post-conversion types).
    pub fn output_columns(&self) -> Vec<ColumnDetails> {
        self.plans.iter().map(|p| p.details().clone()).collect()
    }

    /// Total rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Whether the session has finalized.
    pub fn is_finalized(&self) -> bool {
        self.lifecycle == Lifecycle::Finalized
    }

    /// Pull and write the next window of up to `desired_rows` rows
    /// (`desired_rows` must be at least 1).
    ///
    /// Returns the number of rows written this step. 0 means the source is
    /// exhausted and the session has finalized: writers are closed, the
    /// schema manifest and query text are persisted, and the table is
    /// published (unless zero columns were planned, in which case nothing
    /// is published at all). Stepping a finalized session is a no-op
    /// returning 0.
    pub async fn step(&mut self, desired_rows: usize) -> Result<usize, WriteError> {
        match self.lifecycle {
            Lifecycle::Finalized => return Ok(0),
            Lifecycle::Failed => return SessionFailedSnafu.fail(),
            Lifecycle::Planned | Lifecycle::Writing => {}
        }

        match self.step_inner(desired_rows).await {
            Ok(count) => Ok(count),
            Err(error) => {
                // The window may have advanced past rows that never
                // reached their writers; the session cannot continue.
                self.lifecycle = Lifecycle::Failed;
                Err(error)
            }
        }
    }

    async fn step_inner(&mut self, desired_rows: usize) -> Result<usize, WriteError> {
        // 1) Pull before any writer exists: a source that is exhausted on
        //    the very first pull must never create column artifacts.
        let count = self.source.next(desired_rows).context(SourceSnafu)?;
        if count == 0 {
            self.drain().await?;
            return Ok(0);
        }

        // 2) First data: open one writer per planned column.
        if self.lifecycle == Lifecycle::Planned {
            self.open_writers()?;
            self.lifecycle = Lifecycle::Writing;
        }

        // 3) Materialize output batches sequentially; converting getters
        //    may share state with the source.
        let mut batches = Vec::with_capacity(self.plans.len());
        for plan in &self.plans {
            batches.push(plan.materialize(&mut self.source)?);
        }

        // 4) Dispatch the appends in parallel, one task per column. The
        //    batches are materialized, immutable values and every writer
        //    owns its own artifact, so this phase is safe; all appends
        //    complete before the step returns.
        self.append_parallel(batches).await?;

        self.rows_written += count as u64;
        Ok(count)
    }

    /// Construct the writer for every planned column, wrapping each in a
    /// [`NullableWriter`] so null handling is uniform across direct and
    /// converted columns.
    fn open_writers(&mut self) -> Result<(), WriteError> {
        debug!(
            "opening {} column writers under {:?}",
            self.plans.len(),
            self.location.staging_root()
        );

        for plan in &mut self.plans {
            let column = plan.details().name.clone();
            let inner = plan
                .provider()
                .binary_writer(&self.location, &column)
                .context(OpenColumnSnafu { column: column.clone() })?;
            let writer = NullableWriter::new(&self.location, &column, inner);
            plan.writer = Some(Box::new(writer));
        }

        Ok(())
    }

    async fn append_parallel(&mut self, batches: Vec<ArrayRef>) -> Result<(), WriteError> {
        let mut join_set = JoinSet::new();
        let mut columns_by_task = HashMap::new();

        for (index, (plan, batch)) in self.plans.iter_mut().zip(batches).enumerate() {
            let column = plan.details().name.clone();
            let Some(mut writer) = plan.writer.take() else {
                return MissingWriterSnafu { column }.fail();
            };

            let task_column = column.clone();
            let handle = join_set.spawn_blocking(move || {
                let result = writer.append(&batch);
                (index, task_column, writer, result)
            });
            columns_by_task.insert(handle.id(), column);
        }

        let mut first_error: Option<WriteError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, column, writer, result)) => {
                    // Hand the writer back even on failure so teardown can
                    // still flush and close it.
                    self.plans[index].writer = Some(writer);
                    if let Err(source) = result {
                        if first_error.is_none() {
                            first_error = Some(WriteError::ColumnWrite { column, source });
                        }
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        let column = columns_by_task
                            .get(&join_error.id())
                            .cloned()
                            .unwrap_or_default();
                        first_error = Some(WriteError::AppendTask {
                            column,
                            source: join_error,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Close all open writers, flushing their buffered bytes. Close order
    /// is unspecified since writers are independent.
    async fn close_writers(&mut self) -> Result<(), WriteError> {
        let mut join_set = JoinSet::new();
        let mut columns_by_task = HashMap::new();

        for plan in &mut self.plans {
            if let Some(writer) = plan.writer.take() {
                let column = plan.details().name.clone();
                let task_column = column.clone();
                let handle = join_set.spawn_blocking(move || (task_column, writer.finish()));
                columns_by_task.insert(handle.id(), column);
            }
        }

        let mut first_error: Option<WriteError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((column, Err(source))) => {
                    if first_error.is_none() {
                        first_error = Some(WriteError::ColumnWrite { column, source });
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        let column = columns_by_task
                            .get(&join_error.id())
                            .cloned()
                            .unwrap_or_default();
                        first_error = Some(WriteError::AppendTask {
                            column,
                            source: join_error,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Close every writer and, when at least one column was planned,
    /// persist the schema manifest and query text and publish the table.
    async fn drain(&mut self) -> Result<(), WriteError> {
        self.close_writers().await?;

        // A table with zero planned columns is never published; the empty
        // staging directory is removed as well.
        if self.plans.is_empty() {
            io::delete_table(&self.location)
                .await
                .context(StorageSnafu)?;
            self.lifecycle = Lifecycle::Finalized;
            return Ok(());
        }

        let table_manifest = TableManifest::new(self.output_columns(), self.rows_written);
        manifest::write_manifest(&self.location, &table_manifest)
            .await
            .context(MetadataSnafu)?;
        manifest::write_query(&self.location, &self.query)
            .await
            .context(MetadataSnafu)?;

        io::publish(&self.location).await.context(StorageSnafu)?;
        debug!(
            "published binary table at {:?} ({} rows)",
            self.location.root(),
            self.rows_written
        );

        self.lifecycle = Lifecycle::Finalized;
        Ok(())
    }

    /// Reinitialize the session: rewind the source, discard any open
    /// writers without finalizing, and clear the destination of partial
    /// output. Available from any state, including `Failed`.
    pub async fn reset(&mut self) -> Result<(), WriteError> {
        self.source.reset().context(SourceSnafu)?;

        let discarded = self
            .plans
            .iter_mut()
            .filter_map(|plan| plan.writer.take())
            .count();
        if discarded > 0 {
            warn!("discarding {discarded} open column writers without finalizing");
        }

        io::delete_table(&self.location)
            .await
            .context(StorageSnafu)?;
        io::create_staging(&self.location)
            .await
            .context(StorageSnafu)?;

        self.rows_written = 0;
        self.lifecycle = Lifecycle::Planned;
        Ok(())
    }

    /// Tear down without publishing: close open writers, skip the schema
    /// manifest, query text, and publish.
    ///
    /// The destination retains unpublished staged artifacts; readers never
    /// observe them since publish is the sole visibility gate. A session
    /// that already finalized tears down as a no-op.
    pub async fn abandon(mut self) -> Result<(), WriteError> {
        if self.lifecycle == Lifecycle::Finalized {
            return Ok(());
        }

        warn!(
            "abandoning write session for {:?} after {} rows",
            self.location.root(),
            self.rows_written
        );
        self.close_writers().await
    }

    /// Drive the session to completion, pulling windows of `batch_rows`
    /// rows until the source is exhausted, and return a summary of the
    /// published table.
    pub async fn write_all(mut self, batch_rows: usize) -> Result<WriteSummary, WriteError> {
        loop {
            if self.step(batch_rows).await? == 0 {
                break;
            }
        }

        Ok(WriteSummary {
            rows_written: self.rows_written,
            columns: self.output_columns(),
        })
    }
}
