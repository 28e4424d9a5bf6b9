//! Durable store: one JSON snapshot per collection at `<dir>/<collection>.json`.
//!
//! The snapshot is loaded on open and rewritten on every mutation (write to a
//! temp file, then rename). The in-memory view is swapped only after the write
//! succeeds, so a failed write leaves both disk and memory at the old state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Distance, ExampleCollection, ExampleStore, StoreError, UpsertOutcome};
use crate::models::{ExampleMetadata, ExampleRecord, StoreHit};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    collection: String,
    dimensions: usize,
    distance: Distance,
    embedder: String,
    records: Vec<ExampleRecord>,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    name: String,
    dimensions: usize,
    distance: Distance,
    signature: String,
    inner: RwLock<ExampleCollection>,
}

impl FileStore {
    /// Open (or create) the collection under `dir`.
    ///
    /// Fails if the snapshot was written with different dimensions or a
    /// different embedder signature.
    pub async fn open(
        dir: impl AsRef<Path>,
        collection: &str,
        dimensions: usize,
        distance: Distance,
        signature: &str,
    ) -> Result<Self, StoreError> {
        // Validates the name before it is used as a file stem.
        let empty = ExampleCollection::new(collection, dimensions, distance)?;

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.json", collection));

        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.dimensions != dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected: dimensions,
                        actual: snapshot.dimensions,
                    });
                }
                if snapshot.embedder != signature {
                    return Err(StoreError::SignatureMismatch {
                        stored: snapshot.embedder,
                        current: signature.to_string(),
                    });
                }
                if snapshot.distance != distance {
                    tracing::warn!(
                        stored = %snapshot.distance,
                        configured = %distance,
                        "Snapshot distance differs from config; ranking with configured metric"
                    );
                }
                ExampleCollection::from_records(collection, dimensions, distance, snapshot.records)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => empty,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            collection = %collection,
            count = inner.len(),
            "File example store opened"
        );

        Ok(Self {
            path,
            name: collection.to_string(),
            dimensions,
            distance,
            signature: signature.to_string(),
            inner: RwLock::new(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, collection: &ExampleCollection) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            collection: self.name.clone(),
            dimensions: self.dimensions,
            distance: self.distance,
            embedder: self.signature.clone(),
            records: collection.records().into_iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ExampleStore for FileStore {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        input_text: &str,
        metadata: ExampleMetadata,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let mut next = inner.clone();
        let outcome = next.upsert(id, vector, input_text, metadata, Utc::now())?;
        self.persist(&next).await?;
        *inner = next;
        tracing::debug!(id = %id, outcome = ?outcome, count = inner.len(), "Example persisted");
        Ok(outcome)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>, StoreError> {
        self.inner.read().await.query(vector, k)
    }

    async fn get(&self, id: &str) -> Result<Option<ExampleRecord>, StoreError> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.get(id).is_none() {
            return Ok(false);
        }
        let mut next = inner.clone();
        next.delete(id);
        self.persist(&next).await?;
        *inner = next;
        Ok(true)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.len())
    }

    fn name(&self) -> &str {
        "file"
    }

    fn collection(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn distance(&self) -> Distance {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(output: serde_json::Value) -> ExampleMetadata {
        ExampleMetadata {
            output,
            category: "apparel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
                .await
                .unwrap();
            store.upsert("a", vec![1.0, 0.0], "blue hoodie", meta(json!({"Color": "Blue"}))).await.unwrap();
            store.upsert("b", vec![0.0, 1.0], "red mug", meta(json!({"Color": "Red"}))).await.unwrap();
            assert!(store.path().exists());
        }

        let reopened = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let a = reopened.get("a").await.unwrap().unwrap();
        assert_eq!(a.expected_output, json!({"Color": "Blue"}));
        assert_eq!(a.category, "apparel");

        let hits = reopened.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].input_text, "blue hoodie");

        // Insertion order survives the round trip.
        reopened.upsert("c", vec![1.0, 1.0], "green hat", meta(json!(null))).await.unwrap();
        assert_eq!(reopened.get("c").await.unwrap().unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_reopen_with_other_embedder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        store.upsert("a", vec![1.0, 0.0], "x", meta(json!(null))).await.unwrap();
        drop(store);

        let err = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "openai/text-embedding-3-small/2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SignatureMismatch { .. }));

        let err = FileStore::open(dir.path(), "orders", 3, Distance::Cosine, "hash/2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn test_collections_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileStore::open(dir.path(), "a", 2, Distance::Cosine, "hash/2").await.unwrap();
        let b = FileStore::open(dir.path(), "b", 2, Distance::Cosine, "hash/2").await.unwrap();
        a.upsert("x", vec![1.0, 0.0], "x", meta(json!(null))).await.unwrap();
        assert_eq!(a.count().await.unwrap(), 1);
        assert_eq!(b.count().await.unwrap(), 0);
        assert!(dir.path().join("a.json").exists());
        assert!(!dir.path().join("b.json").exists(), "no file until first write");
    }

    #[tokio::test]
    async fn test_rejected_upsert_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        assert!(store.upsert("a", vec![1.0], "x", meta(json!(null))).await.is_err());
        assert!(!store.path().exists());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        store.upsert("a", vec![1.0, 0.0], "x", meta(json!(null))).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        drop(store);

        let reopened = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_upsert_keeps_snapshot_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        store.upsert("a", vec![1.0, 0.0], "blue hoodie", meta(json!(null))).await.unwrap();

        let err = store
            .upsert("b", vec![f32::NAN, 0.0], "red mug", meta(json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        drop(store);

        let reopened = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.get("b").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_upserts_see_whole_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(
            FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
                .await
                .unwrap(),
        );
        store.upsert("same", vec![1.0, 0.0], "input 0", meta(json!(0))).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 1..40 {
                    store
                        .upsert("same", vec![1.0, i as f32], &format!("input {}", i), meta(json!(i)))
                        .await
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let hits = store.query(&[1.0, 0.5], 1).await.unwrap();
                    let output = hits[0].output.clone().unwrap();
                    assert_eq!(hits[0].input_text, format!("input {}", output));
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        let reopened = FileStore::open(dir.path(), "orders", 2, Distance::Cosine, "hash/2")
            .await
            .unwrap();
        let record = reopened.get("same").await.unwrap().unwrap();
        assert_eq!(record.input_text, "input 39");
        assert_eq!(record.expected_output, json!(39));
    }
}
