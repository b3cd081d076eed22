//! Filesystem storage for snapshots and finished documents.

use crate::error::{ExportError, Result};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Directory under the content root that holds snapshots.
pub const SNAPSHOT_DIR_NAME: &str = "snapshots";

/// Stores snapshot PNGs as `plot_<id>_<unix seconds>.png`.
///
/// Names are unique per plot per second. Older snapshots of a plot are
/// left in place; nothing here removes files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store in the `snapshots` directory under `content_dir`.
    pub fn in_content_dir(content_dir: impl AsRef<Path>) -> Self {
        Self::new(content_dir.as_ref().join(SNAPSHOT_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot filename for `plot_id` generated at `timestamp` (unix seconds).
    pub fn filename_for(plot_id: i64, timestamp: i64) -> String {
        format!("plot_{}_{}.png", plot_id, timestamp)
    }

    /// Whether `filename` names an existing snapshot. Invalid names never exist.
    pub fn exists(&self, filename: &str) -> bool {
        match self.resolve(filename) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    /// Stores `bytes` under a fresh name stamped with the current time.
    pub fn save(&self, plot_id: i64, bytes: &[u8]) -> Result<String> {
        self.save_at(plot_id, Utc::now().timestamp(), bytes)
    }

    /// Stores `bytes` under the name for `plot_id` at `timestamp`.
    pub fn save_at(&self, plot_id: i64, timestamp: i64, bytes: &[u8]) -> Result<String> {
        let filename = Self::filename_for(plot_id, timestamp);
        let path = self.dir.join(&filename);

        ensure_dir(&self.dir)?;
        write_replacing(&self.dir, &path, bytes)?;

        info!(
            plot_id = plot_id,
            filename = %filename,
            bytes = bytes.len(),
            "Snapshot stored"
        );
        Ok(filename)
    }

    /// Reads a stored snapshot.
    pub fn load(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve(filename)?;
        let bytes = fs::read(&path).map_err(|source| ExportError::Read {
            path: path.clone(),
            source,
        })?;
        debug!(filename = %filename, bytes = bytes.len(), "Snapshot loaded");
        Ok(bytes)
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.dir.join(filename))
    }
}

/// Writes finished documents into an output directory.
///
/// An existing file with the same name is replaced without warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStore;

impl DocumentStore {
    pub fn new() -> Self {
        Self
    }

    /// Writes `bytes` to `directory/filename`, creating `directory` if needed.
    ///
    /// # Returns
    ///
    /// The full path of the written file.
    pub fn save(&self, bytes: &[u8], filename: &str, directory: &Path) -> Result<PathBuf> {
        validate_filename(filename)?;
        let path = directory.join(filename);

        ensure_dir(directory)?;
        write_replacing(directory, &path, bytes)?;

        info!(path = %path.display(), bytes = bytes.len(), "Document written");
        Ok(path)
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    let invalid = filename.is_empty()
        || filename == "."
        || filename.contains("..")
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ExportError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes through a temporary file in `dir`, then renames it over `path`.
fn write_replacing(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
