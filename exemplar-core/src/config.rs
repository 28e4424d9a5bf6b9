use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::embeddings::{OPENAI_BASE_URL, OPENAI_DIMENSIONS};

/// Collection used when `[store] collection` is not set.
pub const DEFAULT_COLLECTION: &str = "order_examples";

/// Neighbours retrieved per prediction when `[retrieval] n_results` is not set.
pub const DEFAULT_N_RESULTS: i64 = 3;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExemplarConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "openai" or "hash"
    pub backend: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: OPENAI_DIMENSIONS,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: None,
            max_retries: 0,
            retry_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the durable store. Empty or unset keeps everything in memory.
    pub path: Option<String>,
    pub collection: String,
    /// "cosine" or "euclidean"
    pub distance: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            collection: DEFAULT_COLLECTION.to_string(),
            distance: "cosine".to_string(),
        }
    }
}

impl StoreConfig {
    /// The persistence directory, if one is configured and non-blank.
    pub fn persistence_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub n_results: i64,
    /// Degrade retrieval failures to an empty candidate list.
    pub fail_open: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: DEFAULT_N_RESULTS,
            fail_open: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
            system_prompt: "You extract structured order data and answer with JSON only."
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8766,
        }
    }
}

impl ExemplarConfig {
    /// Load from an optional TOML file, then `EXEMPLAR__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("EXEMPLAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    /// Offline configuration: hash embeddings, in-memory store.
    pub fn offline(dimensions: usize) -> Self {
        let mut config = Self::default();
        config.embedding.backend = "hash".to_string();
        config.embedding.dimensions = dimensions;
        config
    }
}
