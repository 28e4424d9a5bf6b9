//! Backend construction from configuration: the embedder and the optional
//! chat-completion client.

use std::sync::Arc;

use exemplar_core::completion::{CompletionBackend, CompletionError, OpenAiChatClient};
use exemplar_core::embeddings::{create_backend, BackendConfig, EmbeddingBackend, EmbeddingError};
use exemplar_core::ExemplarConfig;

/// Create an embedding backend from the application config.
///
/// Reads `[embedding] backend` to select OpenAI or the offline hash embedder.
pub fn create_backend_from_config(
    config: &ExemplarConfig,
) -> Result<Arc<dyn EmbeddingBackend>, EmbeddingError> {
    let backend = create_backend(BackendConfig::from_settings(&config.embedding)?)?;
    tracing::info!(
        backend = backend.name(),
        dimensions = backend.dimensions(),
        "Embedding backend ready"
    );
    Ok(Arc::from(backend))
}

/// Create the completion client when `[generation] enabled` is set.
pub fn create_completion_from_config(
    config: &ExemplarConfig,
) -> Result<Option<Arc<dyn CompletionBackend>>, CompletionError> {
    if !config.generation.enabled {
        return Ok(None);
    }
    let client = OpenAiChatClient::new(config.generation.clone())?;
    tracing::info!(model = %config.generation.model, "Completion backend ready");
    Ok(Some(Arc::new(client)))
}
