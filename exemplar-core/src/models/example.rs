use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category assigned to examples taught without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Content id of an example: lowercase hex SHA-256 of the exact input bytes.
pub fn example_id(input_text: &str) -> String {
    let digest = Sha256::digest(input_text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Payload stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleMetadata {
    pub output: serde_json::Value,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub id: String,
    pub input_text: String,
    pub embedding: Vec<f32>,
    pub expected_output: serde_json::Value,
    pub category: String,
    /// Insertion order; kept when the record is replaced.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw nearest-neighbour hit as a store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: String,
    pub input_text: String,
    pub output: Option<serde_json::Value>,
    pub distance: Option<f32>,
}

/// A retrieved example, ranked by ascending distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub input: String,
    pub output: serde_json::Value,
    pub distance: f32,
    pub id: String,
}

impl From<StoreHit> for Candidate {
    fn from(hit: StoreHit) -> Self {
        Self {
            input: hit.input_text,
            output: hit.output.unwrap_or(serde_json::Value::Null),
            distance: hit.distance.unwrap_or(0.0),
            id: hit.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_id_is_sha256_hex() {
        assert_eq!(
            example_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(example_id("blue hoodie"), example_id("blue hoodie"));
        assert_ne!(example_id("blue hoodie"), example_id("Blue hoodie"));
    }

    #[test]
    fn test_candidate_from_hit_fills_defaults() {
        let hit = StoreHit {
            id: "x".to_string(),
            input_text: "mug".to_string(),
            output: None,
            distance: None,
        };
        let c = Candidate::from(hit);
        assert_eq!(c.output, serde_json::Value::Null);
        assert_eq!(c.distance, 0.0);
        assert_eq!(c.input, "mug");
    }
}
