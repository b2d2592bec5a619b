use shortly_core::storage::Result;
use shortly_core::{Record, StorageError};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// The whole-state snapshot file of the in-memory engine.
///
/// The file holds a JSON array of [`Record`]s in insertion order and is
/// rewritten wholesale on every flush: the new contents go to a sibling
/// `*.tmp` file which is synced and then renamed over the old snapshot, so
/// a crash leaves either the previous or the new snapshot, never a torn one.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        Self { path, tmp_path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot, creating an empty one if the file does not exist.
    pub(crate) async fn load_or_create(&self) -> Result<Vec<Record>> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => {
                let records: Vec<Record> = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::InvalidData(format!(
                        "cannot decode snapshot {}: {e}",
                        self.path.display()
                    ))
                })?;
                info!(path = %self.path.display(), records = records.len(), "loaded snapshot");
                Ok(records)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.write(&[]).await?;
                info!(path = %self.path.display(), "created empty snapshot");
                Ok(Vec::new())
            }
            Err(err) => Err(io_error(&self.path, "read", err)),
        }
    }

    /// Atomically replaces the snapshot with `records`.
    pub(crate) async fn write(&self, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec(records)
            .map_err(|e| StorageError::Persistence(format!("cannot encode snapshot: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, "create directory", e))?;
        }

        let mut file = fs::File::create(&self.tmp_path)
            .await
            .map_err(|e| io_error(&self.tmp_path, "create", e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| io_error(&self.tmp_path, "write", e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error(&self.tmp_path, "sync", e))?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|e| io_error(&self.path, "replace", e))?;

        debug!(path = %self.path.display(), records = records.len(), "wrote snapshot");
        Ok(())
    }
}

fn io_error(path: &Path, action: &str, err: std::io::Error) -> StorageError {
    StorageError::Persistence(format!("cannot {action} {}: {err}", path.display()))
}
