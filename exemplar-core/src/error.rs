use thiserror::Error;

use crate::completion::CompletionError;
use crate::embeddings::EmbeddingError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ExemplarError {
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(StoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed config: {0}")]
    MalformedConfig(String),

    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(#[from] CompletionError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExemplarError {
    /// Stable machine-readable code, carried in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ExemplarError::EmbeddingUnavailable(_) => "embedding_unavailable",
            ExemplarError::RetrievalUnavailable(_) => "retrieval_unavailable",
            ExemplarError::Store(_) => "store_error",
            ExemplarError::MalformedConfig(_) => "malformed_config",
            ExemplarError::MalformedOutput(_) => "malformed_output",
            ExemplarError::InvalidInput(_) => "invalid_input",
            ExemplarError::GenerationUnavailable(_) => "generation_unavailable",
            ExemplarError::Config(_) => "config_error",
            ExemplarError::Io(_) => "io_error",
        }
    }
}
