//! Async storage operations for clearing, staging, and publishing tables.
//!
//! All writes target the staging directory; the published root is only
//! ever created by [`publish`], which renames the fully-written staging
//! directory into place. This keeps the publish step the sole visibility
//! gate for readers.

use std::{
    io,
    path::{Path, PathBuf},
};

use snafu::prelude::*;
use tokio::{fs, io::AsyncWriteExt};

use crate::storage::{
    TableLocation,
    error::{BackendError, NotFoundSnafu, OtherIoSnafu, StorageResult},
};

async fn remove_dir_if_present(path: &Path) -> StorageResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
            path: path.display().to_string(),
        }),
    }
}

async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we're likely already handling another error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Delete all on-disk state for a table: the published root and any
/// staging directory left behind by an earlier write.
///
/// Missing directories are not an error, so this is safe to call on a
/// destination that was never written.
pub async fn delete_table(location: &TableLocation) -> StorageResult<()> {
    remove_dir_if_present(location.root()).await?;
    remove_dir_if_present(&location.staging_root()).await
}

/// Create a fresh staging directory for the table.
pub async fn create_staging(location: &TableLocation) -> StorageResult<()> {
    let staging = location.staging_root();
    fs::create_dir_all(&staging)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: staging.display().to_string(),
        })
}

/// Write `contents` to `rel_path` inside the staging directory using an
/// atomic write.
///
/// This performs a write-then-rename sequence: it writes the payload to a
/// temporary file next to the target path, syncs the file, and then
/// renames it into place. Used for metadata artifacts that are produced in
/// one shot (the schema manifest and the query text).
///
/// # Errors
///
/// Returns `StorageError::OtherIo` when filesystem I/O fails.
pub async fn write_staged_atomic(
    location: &TableLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    let abs = location.staging_root().join(rel_path);

    create_parent_dir(&abs).await?;

    let tmp_path = abs.with_extension("tmp");
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.write_all(contents)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.sync_all()
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;
    }

    fs::rename(&tmp_path, &abs)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: abs.display().to_string(),
        })?;

    // Success - don't remove the temp file (it's been renamed)
    guard.disarm();

    Ok(())
}

/// Atomically publish the staged table.
///
/// Renames the staging directory into the published root in one step, so
/// readers observe either the complete table or nothing. The destination
/// must have been cleared when the write session was created; publish does
/// not overwrite an existing root.
pub async fn publish(location: &TableLocation) -> StorageResult<()> {
    let staging = location.staging_root();
    let root = location.root();

    create_parent_dir(root).await?;

    fs::rename(&staging, root)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: root.display().to_string(),
        })
}

/// Read the file at `rel_path` under the published table root and return
/// its contents as a `String`.
///
/// On success this returns the file contents; if the file cannot be found
/// a `StorageError::NotFound` is returned, while other filesystem problems
/// produce `StorageError::OtherIo`.
pub async fn read_to_string(location: &TableLocation, rel_path: &Path) -> StorageResult<String> {
    let abs = location.root().join(rel_path);

    match fs::read_to_string(&abs).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BackendError::Local(e)).context(NotFoundSnafu {
                path: abs.display().to_string(),
            })
        }
        Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
            path: abs.display().to_string(),
        }),
    }
}

/// Read the full contents of a file at `rel_path` under the published
/// table root and return them as a `Vec<u8>`.
///
/// # Errors
///
/// - If the file does not exist this returns `StorageError::NotFound`.
/// - On any other I/O error this returns `StorageError::OtherIo`.
pub async fn read_all_bytes(location: &TableLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    let abs = location.root().join(rel_path);

    match fs::read(&abs).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BackendError::Local(e)).context(NotFoundSnafu {
                path: abs.display().to_string(),
            })
        }
        Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
            path: abs.display().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn table_in(tmp: &TempDir) -> TableLocation {
        TableLocation::local(tmp.path().join("table"))
    }

    #[tokio::test]
    async fn staged_write_does_not_touch_the_published_root() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);
        create_staging(&location).await?;

        write_staged_atomic(&location, Path::new("a.col"), b"payload").await?;

        assert!(!location.root().exists());
        let staged = location.staging_root().join("a.col");
        assert_eq!(tokio::fs::read(&staged).await?, b"payload");
        Ok(())
    }

    #[tokio::test]
    async fn staged_write_leaves_no_tmp_file() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);
        create_staging(&location).await?;

        write_staged_atomic(&location, Path::new("clean.txt"), b"data").await?;

        assert!(!location.staging_root().join("clean.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn publish_makes_staged_contents_visible() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);
        create_staging(&location).await?;
        write_staged_atomic(&location, Path::new("a.col"), b"payload").await?;

        publish(&location).await?;

        assert!(!location.staging_root().exists());
        let read_back = read_all_bytes(&location, Path::new("a.col")).await?;
        assert_eq!(read_back, b"payload");
        Ok(())
    }

    #[tokio::test]
    async fn delete_table_removes_root_and_staging() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);

        create_staging(&location).await?;
        write_staged_atomic(&location, Path::new("a.col"), b"x").await?;
        publish(&location).await?;
        create_staging(&location).await?;
        write_staged_atomic(&location, Path::new("b.col"), b"y").await?;

        delete_table(&location).await?;

        assert!(!location.root().exists());
        assert!(!location.staging_root().exists());
        Ok(())
    }

    #[tokio::test]
    async fn delete_table_tolerates_missing_destination() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);

        delete_table(&location).await?;
        Ok(())
    }

    #[tokio::test]
    async fn read_to_string_returns_not_found_for_missing_file() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);
        create_staging(&location).await?;
        publish(&location).await?;

        let result = read_to_string(&location, Path::new("does_not_exist.txt")).await;

        let err = result.expect_err("expected NotFound error");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn read_all_bytes_returns_not_found_for_unpublished_table() -> TestResult {
        let tmp = TempDir::new()?;
        let location = table_in(&tmp);
        create_staging(&location).await?;
        write_staged_atomic(&location, Path::new("a.col"), b"payload").await?;

        // Never published: reads against the root must not see staged data.
        let err = read_all_bytes(&location, Path::new("a.col"))
            .await
            .expect_err("expected NotFound error");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }
}
