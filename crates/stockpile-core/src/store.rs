//! Record stores: where the existing product list lives
//!
//! A store only knows how to read the whole list and replace the whole list.
//! Imports never write individual rows.

use crate::error::{Error, Result};
use crate::record::Record;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the current record list
    async fn read(&self) -> Result<Vec<Record>>;

    /// Replace the stored list with `records` in one write
    async fn replace_all(&self, records: &[Record]) -> Result<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn read(&self) -> Result<Vec<Record>> {
        (**self).read().await
    }

    async fn replace_all(&self, records: &[Record]) -> Result<()> {
        (**self).replace_all(records).await
    }
}

/// Store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self) -> Result<Vec<Record>> {
        Ok(self.records.read().await.clone())
    }

    async fn replace_all(&self, records: &[Record]) -> Result<()> {
        *self.records.write().await = records.to_vec();
        Ok(())
    }
}

/// Store backed by a JSON array on disk.
///
/// A missing file reads as an empty list. Writes go to a sibling temp file
/// that is then renamed over the original, so a failed write leaves the old
/// list intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read(&self) -> Result<Vec<Record>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::FileRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("{}: {}", self.path.display(), e)))
    }

    async fn replace_all(&self, records: &[Record]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| Error::FileWrite {
                path: temp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| Error::FileWrite {
                path: self.path.clone(),
                source: e,
            })?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "replaced record store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_replace_and_read() {
        let store = MemoryStore::new(vec![Record::new("A", "a")]);
        store
            .replace_all(&[Record::new("B", "b"), Record::new("C", "c")])
            .await
            .unwrap();

        let records = store.read().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "B");
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("products.json"));
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("products.json");
        let store = JsonFileStore::new(&path);

        let records = vec![Record::new("P1", "Ball").with_price(9.5).with_stock(3)];
        store.replace_all(&records).await.unwrap();

        assert_eq!(store.read().await.unwrap(), records);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.read().await, Err(Error::Store(_))));
    }
}
