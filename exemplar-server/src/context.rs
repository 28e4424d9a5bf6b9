use std::sync::Arc;

use exemplar_core::completion::CompletionBackend;
use exemplar_core::embeddings::EmbeddingBackend;
use exemplar_core::store::{open_store, ExampleStore, InMemoryStore};
use exemplar_core::{Distance, ExemplarConfig, ExemplarError, HashEmbedder};

use crate::subsystems::embedder::{create_backend_from_config, create_completion_from_config};
use crate::subsystems::retrieve::Retriever;

/// Collaborators shared by every request: embedder, store, optional
/// completion client and the loaded config.
#[derive(Clone)]
pub struct AppContext {
    pub config: ExemplarConfig,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub store: Arc<dyn ExampleStore>,
    pub completion: Option<Arc<dyn CompletionBackend>>,
}

impl AppContext {
    pub fn new(
        config: ExemplarConfig,
        embedder: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn ExampleStore>,
        completion: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            completion,
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(config: ExemplarConfig) -> Result<Self, ExemplarError> {
        let embedder = create_backend_from_config(&config)?;
        let store = open_store(&config.store, embedder.dimensions(), &embedder.signature()).await?;
        let completion = create_completion_from_config(&config)?;

        tracing::info!(
            embedder = embedder.name(),
            store = store.name(),
            collection = store.collection(),
            generation = completion.is_some(),
            "Exemplar context initialised"
        );

        Ok(Self::new(config, embedder, store, completion))
    }

    /// Hash embedder over an in-memory store; needs no network or disk.
    pub fn offline(dimensions: usize) -> Result<Self, ExemplarError> {
        let config = ExemplarConfig::offline(dimensions);
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(dimensions)?);
        let store: Arc<dyn ExampleStore> = Arc::new(InMemoryStore::new(
            &config.store.collection,
            dimensions,
            Distance::Cosine,
        )?);
        Ok(Self::new(config, embedder, store, None))
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.embedder.clone(), self.store.clone())
            .fail_open(self.config.retrieval.fail_open)
    }
}
