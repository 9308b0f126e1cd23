//! Flat-file record collection: a typed list backed by one JSON array
//! document, rewritten in full on every mutation.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// A small JSON-array database for flat records.
///
/// Records are cached in memory; every mutating call rewrites the whole
/// backing file. Suited to the same workloads as the session [`FileStore`]:
/// small data, one sequential writer.
///
/// [`FileStore`]: crate::session::FileStore
pub struct LocalDb<T> {
    path: PathBuf,
    records: Mutex<Vec<T>>,
}

impl<T> LocalDb<T>
where
    T: Serialize + DeserializeOwned + Clone + Send,
{
    /// Open (or create) the collection at `path`. An unreadable document
    /// is logged and replaced with an empty collection.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!("db file {} is unreadable ({e}), starting empty", path.display());
                    Vec::new()
                }
            },
            Err(_) => {
                let db = LocalDb {
                    path,
                    records: Mutex::new(Vec::new()),
                };
                db.save(&[]).await?;
                return Ok(db);
            }
        };
        Ok(LocalDb {
            path,
            records: Mutex::new(records),
        })
    }

    async fn save(&self, records: &[T]) -> Result<()> {
        let rendered =
            serde_json::to_vec_pretty(records).context("failed to serialize db records")?;
        tokio::fs::write(&self.path, rendered)
            .await
            .with_context(|| format!("failed to write db file {}", self.path.display()))?;
        Ok(())
    }

    /// Append a record.
    pub async fn push(&self, item: T) -> Result<()> {
        let mut records = self.records.lock().await;
        records.push(item);
        self.save(&records).await
    }

    /// First record matching the predicate.
    pub async fn find_one(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let records = self.records.lock().await;
        records.iter().find(|r| predicate(r)).cloned()
    }

    /// All records matching the predicate.
    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let records = self.records.lock().await;
        records.iter().filter(|r| predicate(r)).cloned().collect()
    }

    /// Mutate the first record matching the predicate. Returns whether a
    /// record was found.
    pub async fn update(
        &self,
        predicate: impl Fn(&T) -> bool,
        mutate: impl FnOnce(&mut T),
    ) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| predicate(r)) {
            Some(record) => {
                mutate(record);
                self.save(&records).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every record matching the predicate.
    pub async fn delete(&self, predicate: impl Fn(&T) -> bool) -> Result<()> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| !predicate(r));
        if records.len() != before {
            self.save(&records).await?;
        }
        Ok(())
    }

    /// Snapshot of every record, as a defensive copy.
    pub async fn get_all(&self) -> Vec<T> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
