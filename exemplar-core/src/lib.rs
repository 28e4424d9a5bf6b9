pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod hash_embedder;
pub mod models;
pub mod prompt;
pub mod protocol;
pub mod store;
pub mod validate;

pub use completion::{CompletionBackend, CompletionError, OpenAiChatClient};
pub use config::{ExemplarConfig, DEFAULT_COLLECTION, DEFAULT_N_RESULTS};
pub use embeddings::{
    create_backend, BackendConfig, EmbeddingBackend, EmbeddingConfig, EmbeddingError,
    OpenAiEmbeddingClient, OPENAI_DIMENSIONS,
};
pub use error::ExemplarError;
pub use hash_embedder::HashEmbedder;
pub use models::{Candidate, ConfigField, ExampleMetadata, ExampleRecord};
pub use prompt::assemble_prompt;
pub use store::{open_store, Distance, ExampleStore, StoreError, UpsertOutcome};
pub use validate::{validate_output, validate_response_text, ValidationReport};
