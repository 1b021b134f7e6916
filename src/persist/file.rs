//! File-per-key backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::trace;

use super::{validate_key, PersistenceBackend};
use crate::error::AuthStoreError;
use crate::Result;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary file in the same directory and are renamed
/// into place, so a reader never sees a half-written value. Each write gets
/// its own temporary name, so concurrent writers (in this process or
/// another) never share one.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthStoreError::BackendRead(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let write_err = |e: std::io::Error| {
            AuthStoreError::BackendWrite(format!("{}: {}", path.display(), e))
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;
        let written = match tokio::fs::write(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        trace!(path = %path.display(), bytes = value.len(), "session file written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthStoreError::BackendWrite(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}
