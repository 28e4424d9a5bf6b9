//! Hash embedding backend: deterministic, offline feature hashing
//!
//! Lowercased alphanumeric words and their character trigrams are hashed with
//! SHA-256 into signed buckets, then the vector is L2-normalised. Texts that
//! share vocabulary land close together, which is enough to exercise retrieval
//! without network access. Vectors are stable across processes and platforms.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::embeddings::{normalize_input, EmbeddingBackend, EmbeddingError};

/// Word features count this much more than a single trigram.
const WORD_WEIGHT: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, EmbeddingError> {
        if dimensions == 0 {
            return Err(EmbeddingError::ZeroDimensions);
        }
        Ok(Self { dimensions })
    }

    /// Synchronous embedding; the async trait method delegates here.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = normalize_input(text)?.to_lowercase();
        let mut vector = vec![0.0f32; self.dimensions];

        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            // Punctuation-only input still gets a stable, non-zero vector.
            self.add_feature(&mut vector, "raw", text.trim(), 1.0);
        }

        for word in &words {
            self.add_feature(&mut vector, "w", word, WORD_WEIGHT);

            let chars: Vec<char> = format!("^{}$", word).chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, "t", &gram, 1.0);
            }
        }

        l2_normalize_in_place(&mut vector);
        Ok(vector)
    }

    fn add_feature(&self, vector: &mut [f32], kind: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

pub(crate) fn l2_normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}
