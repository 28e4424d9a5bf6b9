//! Example store: a nearest-neighbour index over taught examples.
//!
//! Two backends share one contract:
//! - `InMemoryStore`: lives for the process lifetime
//! - `FileStore`: JSON snapshot per collection, rewritten atomically on every mutation
//!
//! Upserts replace by id under a single writer lock; queries read one consistent
//! snapshot and rank by ascending distance, ties broken by insertion order.

pub mod collection;
pub mod file;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::models::{ExampleMetadata, ExampleRecord, StoreHit};

pub use collection::ExampleCollection;
pub use file::FileStore;
pub use memory::InMemoryStore;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Store was built with embedder '{stored}', current embedder is '{current}'")]
    SignatureMismatch { stored: String, current: String },

    #[error("Unknown distance metric '{0}' (expected \"cosine\" or \"euclidean\")")]
    UnknownDistance(String),

    #[error("Store dimensions must be greater than zero")]
    ZeroDimensions,

    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Distance
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// 1 − cosine similarity; zero vectors are at distance 1.
    #[default]
    Cosine,
    Euclidean,
}

impl Distance {
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Distance::Cosine => {
                let mut dot = 0.0f64;
                let mut norm_a = 0.0f64;
                let mut norm_b = 0.0f64;
                for (x, y) in a.iter().zip(b.iter()) {
                    let x = *x as f64;
                    let y = *y as f64;
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denom = norm_a.sqrt() * norm_b.sqrt();
                if denom < 1e-10 {
                    return 1.0;
                }
                (1.0 - dot / denom) as f32
            }
            Distance::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = *x as f64 - *y as f64;
                    d * d
                })
                .sum::<f64>()
                .sqrt() as f32,
        }
    }
}

impl FromStr for Distance {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "euclidean" | "l2" => Ok(Distance::Euclidean),
            other => Err(StoreError::UnknownDistance(other.to_string())),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Cosine => write!(f, "cosine"),
            Distance::Euclidean => write!(f, "euclidean"),
        }
    }
}

// ============================================================================
// ExampleStore trait
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

impl UpsertOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, UpsertOutcome::Replaced)
    }
}

/// Abstraction over nearest-neighbour example stores.
#[async_trait]
pub trait ExampleStore: Send + Sync {
    /// Insert or replace the record with this id.
    async fn upsert(
        &self,
        id: &str,
        vector: Vec<f32>,
        input_text: &str,
        metadata: ExampleMetadata,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Up to `k` nearest records, closest first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ExampleRecord>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;

    fn collection(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn distance(&self) -> Distance;
}

/// Open the store selected by `[store]`: in-memory when no path is set,
/// otherwise a durable `FileStore` under that directory.
pub async fn open_store(
    config: &StoreConfig,
    dimensions: usize,
    signature: &str,
) -> Result<Arc<dyn ExampleStore>, StoreError> {
    let distance: Distance = config.distance.parse()?;

    match config.persistence_path() {
        None => {
            tracing::info!(collection = %config.collection, "Using in-memory example store");
            Ok(Arc::new(InMemoryStore::new(
                &config.collection,
                dimensions,
                distance,
            )?))
        }
        Some(path) => {
            let store =
                FileStore::open(path, &config.collection, dimensions, distance, signature).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let d = Distance::Cosine;
        assert!(d.compute(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((d.compute(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((d.compute(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(d.compute(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let d = Distance::Euclidean;
        assert!((d.compute(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_parse() {
        assert_eq!("Cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("l2".parse::<Distance>().unwrap(), Distance::Euclidean);
        assert!("manhattan".parse::<Distance>().is_err());
        assert_eq!(Distance::Euclidean.to_string(), "euclidean");
    }

    #[tokio::test]
    async fn test_open_store_blank_path_is_in_memory() {
        let config = StoreConfig {
            path: Some(String::new()),
            ..StoreConfig::default()
        };
        let store = open_store(&config, 4, "hash/4").await.unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.collection(), crate::config::DEFAULT_COLLECTION);
    }

    #[tokio::test]
    async fn test_open_store_with_path_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            path: Some(dir.path().to_string_lossy().to_string()),
            collection: "orders".to_string(),
            distance: "euclidean".to_string(),
        };
        let store = open_store(&config, 4, "hash/4").await.unwrap();
        assert_eq!(store.name(), "file");
        assert_eq!(store.distance(), Distance::Euclidean);
    }
}
