//! Embeddings module for Exemplar: text → fixed-dimension vectors
//!
//! Provides an `EmbeddingBackend` trait with implementations for:
//! - **OpenAI** — live embeddings via an OpenAI-compatible `/embeddings` endpoint
//! - **Hash** — deterministic offline feature-hashing embedder (see `hash_embedder`)
//!
//! Both backends share the same contract: newlines are folded to spaces before
//! vectorisation, empty input is rejected, and every vector has exactly
//! `dimensions()` components.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::hash_embedder::HashEmbedder;

/// Dimensions of `text-embedding-3-small`
pub const OPENAI_DIMENSIONS: usize = 1536;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension.
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Identifies the embedding function. Vectors from backends with different
    /// signatures are not comparable.
    fn signature(&self) -> String {
        format!("{}/{}", self.name(), self.dimensions())
    }
}

/// Fold line breaks to spaces and reject blank input.
pub fn normalize_input(text: &str) -> Result<String, EmbeddingError> {
    let normalized: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    if normalized.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }

    Ok(normalized)
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed: {last}")]
    RetryExhausted { attempts: usize, last: String },

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Unknown embedding backend '{0}' (expected \"openai\" or \"hash\")")]
    UnknownBackend(String),

    #[error("Embedding dimensions must be greater than zero")]
    ZeroDimensions,
}

// ============================================================================
// Config types
// ============================================================================

/// OpenAI embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            dimensions,
            max_retries: 0,
            retry_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Configuration union for the backend factory.
pub enum BackendConfig {
    OpenAi {
        config: EmbeddingConfig,
        base_url: String,
    },
    Hash {
        dimensions: usize,
    },
}

impl BackendConfig {
    /// Select a backend from the `[embedding]` settings.
    pub fn from_settings(settings: &crate::config::EmbeddingSettings) -> Result<Self, EmbeddingError> {
        match settings.backend.trim().to_ascii_lowercase().as_str() {
            "openai" => {
                let mut config = EmbeddingConfig::new(
                    settings.api_key.clone().filter(|k| !k.is_empty()),
                    settings.model.clone(),
                    settings.dimensions,
                );
                config.max_retries = settings.max_retries;
                config.retry_delay_ms = settings.retry_delay_ms;
                config.timeout_secs = settings.timeout_secs;
                Ok(BackendConfig::OpenAi {
                    config,
                    base_url: settings.base_url.clone(),
                })
            }
            "hash" => Ok(BackendConfig::Hash {
                dimensions: settings.dimensions,
            }),
            other => Err(EmbeddingError::UnknownBackend(other.to_string())),
        }
    }
}

/// Create the appropriate backend from configuration.
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    match config {
        BackendConfig::OpenAi { config, base_url } => {
            Ok(Box::new(OpenAiEmbeddingClient::with_base_url(config, base_url)?))
        }
        BackendConfig::Hash { dimensions } => Ok(Box::new(HashEmbedder::new(dimensions)?)),
    }
}

// ============================================================================
// OpenAI API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub(crate) error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub(crate) message: String,
}

/// Extract the `error.message` of an OpenAI-style error body, or the raw body.
pub(crate) fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorResponse>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(body)
}

// ============================================================================
// OpenAiEmbeddingClient
// ============================================================================

/// OpenAI embedding client: calls `POST {base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
    base_url: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, OPENAI_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / compatible gateways)
    pub fn with_base_url(
        config: EmbeddingConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }
        if config.dimensions == 0 {
            return Err(EmbeddingError::ZeroDimensions);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Generate an embedding, retrying up to `max_retries` extra times.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = normalize_input(text)?;

        if self.config.max_retries == 0 {
            return self.embed_once(&text).await;
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match Retry::spawn(retry_strategy, || self.embed_once(&text)).await {
            Ok(vec) => Ok(vec),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                    last: e.to_string(),
                })
            }
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingsRequest {
            input: vec![text],
            model: &self.config.model,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = api_error_message(error_body);
            let code = status.as_u16();

            tracing::error!(code = code, message = %message, "Embeddings API error");

            return Err(EmbeddingError::Api { code, message });
        }

        let body: EmbeddingsResponse = response.json().await?;

        let values = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_raw(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn signature(&self) -> String {
        format!("openai/{}/{}", self.config.model, self.config.dimensions)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingSettings;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_DIMS: usize = 8;

    fn test_config(api_key: &str, max_retries: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: api_key.to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: TEST_DIMS,
            max_retries,
            retry_delay_ms: 10,
            timeout_secs: 5,
        }
    }

    fn mock_embedding_response(dims: usize) -> serde_json::Value {
        let values: Vec<f32> = (0..dims).map(|i| (i as f32) / dims as f32).collect();
        serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": values }],
            "model": "text-embedding-3-small"
        })
    }

    #[test]
    fn test_normalize_input_folds_newlines() {
        assert_eq!(normalize_input("blue\nhoodie\r\nM").unwrap(), "blue hoodie  M");
        assert!(matches!(normalize_input(""), Err(EmbeddingError::EmptyInput)));
        assert!(matches!(normalize_input(" \n\t"), Err(EmbeddingError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_embed_calls_api_with_normalized_text() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 0), mock_server.uri())
                .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "input": ["blue hoodie size M"],
                "model": "text-embedding-3-small",
                "dimensions": TEST_DIMS
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(TEST_DIMS)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.embed_raw("blue hoodie\nsize M").await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap().len(), TEST_DIMS);
    }

    #[tokio::test]
    async fn test_embed_without_retries_surfaces_api_error() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 0), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 3), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(TEST_DIMS)))
            .mount(&mock_server)
            .await;

        let result = client.embed_raw("hello world").await;
        assert!(result.is_ok(), "Expected success after retry");
    }

    #[tokio::test]
    async fn test_embed_retry_exhausted() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 2), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(last.contains("upstream exploded"));
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimensions() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 0), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(3)))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, TEST_DIMS);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_missing_data_is_error() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 0), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.embed_raw("hello").await,
            Err(EmbeddingError::MissingEmbedding)
        ));
    }

    #[tokio::test]
    async fn test_empty_input_never_reaches_api() {
        let mock_server = MockServer::start().await;
        let client =
            OpenAiEmbeddingClient::with_base_url(test_config("sk-test", 0), mock_server.uri())
                .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(TEST_DIMS)))
            .expect(0)
            .mount(&mock_server)
            .await;

        assert!(matches!(client.embed("\n\n").await, Err(EmbeddingError::EmptyInput)));
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiEmbeddingClient::new(test_config("", 0));
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }

    #[test]
    fn test_backend_config_from_settings() {
        let settings = EmbeddingSettings {
            backend: "HASH".to_string(),
            dimensions: 16,
            ..EmbeddingSettings::default()
        };
        let backend = create_backend(BackendConfig::from_settings(&settings).unwrap()).unwrap();
        assert_eq!(backend.name(), "hash");
        assert_eq!(backend.dimensions(), 16);

        let settings = EmbeddingSettings {
            backend: "word2vec".to_string(),
            ..EmbeddingSettings::default()
        };
        assert!(matches!(
            BackendConfig::from_settings(&settings),
            Err(EmbeddingError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_openai_signature_includes_model() {
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", 0)).unwrap();
        assert_eq!(client.signature(), "openai/text-embedding-3-small/8");
        assert_eq!(client.name(), "openai");
    }
}
