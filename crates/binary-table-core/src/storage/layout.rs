//! On-disk layout helpers for a table root.
//!
//! This module centralizes all path conventions for a published table and
//! its staging directory:
//!
//! - One value artifact per column (`<column>.col`).
//! - One optional validity sidecar per column (`<column>.nulls`).
//! - The schema manifest (`_schema.json`) and query text (`_query.txt`),
//!   underscore-prefixed to keep them clear of column artifact names.
//! - The staging directory (`<root>.staging`), a sibling of the published
//!   root so publish is a single same-filesystem rename.
//!
//! The functions here return relative [`std::path::PathBuf`] values except
//! for [`staging_dir`]. Callers are expected to join relative paths with a
//! table root (or its staging directory) before doing IO.

use std::path::{Path, PathBuf};

/// File extension for per-column binary value artifacts.
pub const COLUMN_EXT: &str = "col";

/// File extension for per-column validity sidecars.
pub const NULLS_EXT: &str = "nulls";

/// Name of the schema manifest artifact.
pub const SCHEMA_FILE_NAME: &str = "_schema.json";

/// Name of the query text artifact.
pub const QUERY_FILE_NAME: &str = "_query.txt";

/// Suffix appended to the table root name to form the staging directory.
pub const STAGING_SUFFIX: &str = ".staging";

/// Relative path: `<column>.col`
pub fn column_rel_path(column: &str) -> PathBuf {
    PathBuf::from(format!("{column}.{COLUMN_EXT}"))
}

/// Relative path: `<column>.nulls`
pub fn nulls_rel_path(column: &str) -> PathBuf {
    PathBuf::from(format!("{column}.{NULLS_EXT}"))
}

/// Relative path: `_schema.json`
pub fn schema_rel_path() -> PathBuf {
    PathBuf::from(SCHEMA_FILE_NAME)
}

/// Relative path: `_query.txt`
pub fn query_rel_path() -> PathBuf {
    PathBuf::from(QUERY_FILE_NAME)
}

/// Staging directory for a table root: `<root>.staging`.
///
/// The staging directory is a sibling of the published directory, never a
/// child, so the published root only ever appears complete.
pub fn staging_dir(root: &Path) -> PathBuf {
    let mut name = root
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(STAGING_SUFFIX);
    root.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_is_a_sibling_of_the_root() {
        let staging = staging_dir(Path::new("/tables/trades"));
        assert_eq!(staging, PathBuf::from("/tables/trades.staging"));
    }

    #[test]
    fn staging_dir_keeps_dotted_root_names_intact() {
        // with_extension would have clobbered the `.v2` suffix.
        let staging = staging_dir(Path::new("/tables/trades.v2"));
        assert_eq!(staging, PathBuf::from("/tables/trades.v2.staging"));
    }

    #[test]
    fn column_paths_are_named_by_column() {
        assert_eq!(column_rel_path("price"), PathBuf::from("price.col"));
        assert_eq!(nulls_rel_path("price"), PathBuf::from("price.nulls"));
    }
}
