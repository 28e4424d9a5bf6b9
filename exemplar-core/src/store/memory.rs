use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Distance, ExampleCollection, ExampleStore, StoreError, UpsertOutcome};
use crate::models::{ExampleMetadata, ExampleRecord, StoreHit};

/// Process-lifetime store. Contents are lost on restart.
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    dimensions: usize,
    distance: Distance,
    inner: RwLock<ExampleCollection>,
}

impl InMemoryStore {
    pub fn new(collection: &str, dimensions: usize, distance: Distance) -> Result<Self, StoreError> {
        Ok(Self {
            name: collection.to_string(),
            dimensions,
            distance,
            inner: RwLock::new(ExampleCollection::new(collection, dimensions, distance)?),
        })
    }
}

#[async_trait]
impl ExampleStore for InMemoryStore {
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        input_text: &str,
        metadata: ExampleMetadata,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let outcome = inner.upsert(id, vector, input_text, metadata, Utc::now())?;
        tracing::debug!(id = %id, outcome = ?outcome, count = inner.len(), "Example upserted");
        Ok(outcome)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>, StoreError> {
        self.inner.read().await.query(vector, k)
    }

    async fn get(&self, id: &str) -> Result<Option<ExampleRecord>, StoreError> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.delete(id))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
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
