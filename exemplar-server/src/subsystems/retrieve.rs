//! Retrieval subsystem: nearest taught examples for a user input
//!
//! - Embeds the input with the configured backend
//! - Queries the example store for the `n` closest records
//! - Normalises raw hits into ranked `Candidate`s (closest first)
//!
//! Never mutates the store.

use std::sync::Arc;

use exemplar_core::embeddings::EmbeddingBackend;
use exemplar_core::store::ExampleStore;
use exemplar_core::{Candidate, ExemplarError};

pub struct Retriever {
    embedder: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn ExampleStore>,
    fail_open: bool,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, store: Arc<dyn ExampleStore>) -> Self {
        Self {
            embedder,
            store,
            fail_open: false,
        }
    }

    /// When set, embedding or store failures are logged and yield no candidates.
    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Find up to `n_results` similar examples, closest first.
    ///
    /// # Constraints
    /// * `n_results <= 0` returns an empty list without embedding anything
    /// * Fewer stored examples than `n_results` returns all of them
    /// * Missing outputs become `null`, missing distances `0.0`
    pub async fn find_similar(
        &self,
        user_input: &str,
        n_results: i64,
    ) -> Result<Vec<Candidate>, ExemplarError> {
        if n_results <= 0 {
            return Ok(Vec::new());
        }

        match self.lookup(user_input, n_results as usize).await {
            Ok(candidates) => {
                tracing::debug!(
                    requested = n_results,
                    found = candidates.len(),
                    "Retrieved similar examples"
                );
                Ok(candidates)
            }
            Err(e) if self.fail_open => {
                tracing::warn!(error = %e, code = e.code(), "Retrieval failed, continuing without examples");
                Ok(Vec::new())
            }
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed");
                Err(e)
            }
        }
    }

    async fn lookup(&self, user_input: &str, k: usize) -> Result<Vec<Candidate>, ExemplarError> {
        let vector = self.embedder.embed(user_input).await?;

        let hits = self
            .store
            .query(&vector, k)
            .await
            .map_err(ExemplarError::RetrievalUnavailable)?;

        Ok(hits.into_iter().map(Candidate::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exemplar_core::embeddings::EmbeddingError;
    use exemplar_core::models::{example_id, ExampleMetadata, ExampleRecord, StoreHit};
    use exemplar_core::store::{Distance, InMemoryStore, StoreError, UpsertOutcome};
    use exemplar_core::HashEmbedder;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIMS: usize = 64;

    /// Counts calls; always fails.
    struct FailingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingBackend for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::Api {
                code: 503,
                message: "down".to_string(),
            })
        }
        fn dimensions(&self) -> usize {
            DIMS
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Returns hits without output/distance, like a sparse external index.
    struct SparseStore;

    #[async_trait]
    impl ExampleStore for SparseStore {
        async fn upsert(
            &self,
            _id: &str,
            _vector: Vec<f32>,
            _input_text: &str,
            _metadata: ExampleMetadata,
        ) -> Result<UpsertOutcome, StoreError> {
            Ok(UpsertOutcome::Inserted)
        }
        async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<StoreHit>, StoreError> {
            Ok(vec![StoreHit {
                id: "sparse".to_string(),
                input_text: "something".to_string(),
                output: None,
                distance: None,
            }])
        }
        async fn get(&self, _id: &str) -> Result<Option<ExampleRecord>, StoreError> {
            Ok(None)
        }
        async fn delete(&self, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn count(&self) -> Result<usize, StoreError> {
            Ok(1)
        }
        fn name(&self) -> &str {
            "sparse"
        }
        fn collection(&self) -> &str {
            "sparse"
        }
        fn dimensions(&self) -> usize {
            DIMS
        }
        fn distance(&self) -> Distance {
            Distance::Cosine
        }
    }

    async fn seeded() -> Retriever {
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(DIMS).unwrap());
        let store: Arc<dyn ExampleStore> =
            Arc::new(InMemoryStore::new("orders", DIMS, Distance::Cosine).unwrap());

        for (text, color) in [
            ("blue hoodie size M", "Blue"),
            ("red ceramic mug", "Red"),
            ("green canvas tote bag", "Green"),
        ] {
            let v = embedder.embed(text).await.unwrap();
            store
                .upsert(
                    &example_id(text),
                    v,
                    text,
                    ExampleMetadata {
                        output: json!([{"Color": color}]),
                        category: "general".to_string(),
                    },
                )
                .await
                .unwrap();
        }
        Retriever::new(embedder, store)
    }

    #[tokio::test]
    async fn test_find_similar_bounded_and_ranked() {
        let retriever = seeded().await;

        let one = retriever.find_similar("blue hoodie size L", 1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].input, "blue hoodie size M");
        assert_eq!(one[0].output, json!([{"Color": "Blue"}]));
        assert_eq!(one[0].id, example_id("blue hoodie size M"));

        let all = retriever.find_similar("blue hoodie size L", 10).await.unwrap();
        assert_eq!(all.len(), 3, "fewer records than requested returns all");
        assert!(all.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_non_positive_n_skips_embedding() {
        let failing = Arc::new(FailingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let store: Arc<dyn ExampleStore> =
            Arc::new(InMemoryStore::new("orders", DIMS, Distance::Cosine).unwrap());
        let retriever = Retriever::new(failing.clone(), store);

        assert!(retriever.find_similar("anything", 0).await.unwrap().is_empty());
        assert!(retriever.find_similar("anything", -3).await.unwrap().is_empty());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces() {
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(FailingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let store: Arc<dyn ExampleStore> =
            Arc::new(InMemoryStore::new("orders", DIMS, Distance::Cosine).unwrap());
        let retriever = Retriever::new(embedder, store);

        let err = retriever.find_similar("blue hoodie", 3).await.unwrap_err();
        assert_eq!(err.code(), "embedding_unavailable");
    }

    #[tokio::test]
    async fn test_store_failure_is_retrieval_unavailable() {
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(8).unwrap());
        let store: Arc<dyn ExampleStore> =
            Arc::new(InMemoryStore::new("orders", DIMS, Distance::Cosine).unwrap());
        let retriever = Retriever::new(embedder, store);

        let err = retriever.find_similar("blue hoodie", 3).await.unwrap_err();
        assert_eq!(err.code(), "retrieval_unavailable");
    }

    #[tokio::test]
    async fn test_fail_open_returns_empty() {
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(FailingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let store: Arc<dyn ExampleStore> =
            Arc::new(InMemoryStore::new("orders", DIMS, Distance::Cosine).unwrap());
        let retriever = Retriever::new(embedder, store).fail_open(true);

        assert!(retriever.find_similar("blue hoodie", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_hit_fields_get_defaults() {
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(DIMS).unwrap());
        let retriever = Retriever::new(embedder, Arc::new(SparseStore));

        let found = retriever.find_similar("anything", 3).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].output, serde_json::Value::Null);
        assert_eq!(found[0].distance, 0.0);
    }
}
