//! The binary table write orchestrator and its collaborators.
//!
//! - `source`: the pull-based upstream batch source interface and an
//!   in-memory implementation over Arrow record batches.
//! - `plan`: per-column write plans (output type, conversion decision,
//!   writer ownership).
//! - `table_writer`: the `BinaryTableWriter` state machine driving the
//!   pull loop, the parallel append fan-out, and finalization.
//! - `error`: the `WriteError` enum shared across the write path.

pub mod error;
pub mod plan;
pub mod source;
pub mod table_writer;

pub use error::WriteError;
pub use plan::ColumnPlan;
pub use source::{RecordBatchSource, RowBatchSource, SourceError};
pub use table_writer::{BinaryTableWriter, WriteSummary};
