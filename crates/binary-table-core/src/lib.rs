//! Core engine for the `binary-table-format` columnar table writer.
//!
//! This crate provides the foundational pieces for `binary-table-format`:
//!
//! - A logical schema model that doubles as the dispatch vocabulary for
//!   physical column encodings (`schema` module).
//! - A storage backend with staged writes and an atomic publish gate so
//!   that readers never observe a partially-written table (`storage`
//!   module).
//! - A pluggable type registry, the built-in binary column writers, and
//!   the uniform validity-tracking wrapper (`types` module).
//! - The pull-driven `BinaryTableWriter` orchestrator that plans columns,
//!   fans out per-column appends in parallel, and finalizes a table with
//!   schema + query + publish (`writer` module).
//! - Read-back support for published tables (`reader` module).
//!
//! Higher-level integration crates (for example, a query engine binding or
//! a CLI) are expected to depend on this core crate rather than
//! re-implementing the write path.
#![deny(missing_docs)]
pub mod reader;
pub mod schema;
pub mod storage;
pub mod types;
pub mod writer;
