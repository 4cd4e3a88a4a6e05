use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use devsignal_common::Identity;
use tempfile::NamedTempFile;
use tracing::debug;

use super::key::CacheKey;
use crate::error::{CacheError, Result};

/// Where cache envelopes live. Implementations must replace entries atomically:
/// a reader sees either the old bytes or the new bytes, never a mix.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &CacheKey) -> Result<()>;
    async fn purge_identity(&self, identity: &Identity) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FsStorage
// ---------------------------------------------------------------------------

/// `<base>/<identity>/<source>/<digest>.json`
pub struct FsStorage {
    base: PathBuf,
}

impl FsStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.base
            .join(key.identity().as_str())
            .join(key.source().as_str())
            .join(format!("{}.json", key.digest()))
    }
}

#[async_trait]
impl CacheStorage for FsStorage {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<()> {
        let path = self.entry_path(key);
        // Temp file in the target directory, then rename over the old entry.
        // Runs to completion on the blocking pool even if the caller is dropped.
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_identity(&self, identity: &Identity) -> Result<()> {
        let dir = self.base.join(identity.as_str());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(dir = %dir.display(), "Purged cache directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::Task(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process storage keyed by the same relative path `FsStorage` would use.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(key: &CacheKey) -> String {
        format!("{}/{}/{}", key.identity(), key.source(), key.digest())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(&Self::slot(key)).cloned())
    }

    async fn write(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<()> {
        self.lock().insert(Self::slot(key), bytes);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.lock().remove(&Self::slot(key));
        Ok(())
    }

    async fn purge_identity(&self, identity: &Identity) -> Result<()> {
        let prefix = format!("{identity}/");
        self.lock().retain(|slot, _| !slot.starts_with(&prefix));
        Ok(())
    }
}
