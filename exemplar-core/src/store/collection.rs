use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Distance, StoreError, UpsertOutcome};
use crate::models::{ExampleMetadata, ExampleRecord, StoreHit};

/// Record set shared by every store backend. Exact brute-force scan.
#[derive(Debug, Clone)]
pub struct ExampleCollection {
    name: String,
    dimensions: usize,
    distance: Distance,
    records: HashMap<String, ExampleRecord>,
    next_seq: u64,
}

impl ExampleCollection {
    pub fn new(name: &str, dimensions: usize, distance: Distance) -> Result<Self, StoreError> {
        validate_collection_name(name)?;
        if dimensions == 0 {
            return Err(StoreError::ZeroDimensions);
        }
        Ok(Self {
            name: name.to_string(),
            dimensions,
            distance,
            records: HashMap::new(),
            next_seq: 0,
        })
    }

    /// Rebuild from persisted records, re-checking every vector.
    pub fn from_records(
        name: &str,
        dimensions: usize,
        distance: Distance,
        records: Vec<ExampleRecord>,
    ) -> Result<Self, StoreError> {
        let mut collection = Self::new(name, dimensions, distance)?;
        for record in records {
            collection.check_dimensions(&record.embedding)?;
            collection.next_seq = collection.next_seq.max(record.seq + 1);
            collection.records.insert(record.id.clone(), record);
        }
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ExampleRecord> {
        self.records.get(id)
    }

    /// Records in insertion order.
    pub fn records(&self) -> Vec<&ExampleRecord> {
        let mut all: Vec<&ExampleRecord> = self.records.values().collect();
        all.sort_by_key(|r| r.seq);
        all
    }

    pub fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        input_text: &str,
        metadata: ExampleMetadata,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidRecord("id is empty".to_string()));
        }
        if input_text.trim().is_empty() {
            return Err(StoreError::InvalidRecord("input text is empty".to_string()));
        }
        self.check_dimensions(&vector)?;

        match self.records.get_mut(id) {
            Some(existing) => {
                existing.input_text = input_text.to_string();
                existing.embedding = vector;
                existing.expected_output = metadata.output;
                existing.category = metadata.category;
                existing.updated_at = now;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.records.insert(
                    id.to_string(),
                    ExampleRecord {
                        id: id.to_string(),
                        input_text: input_text.to_string(),
                        embedding: vector,
                        expected_output: metadata.output,
                        category: metadata.category,
                        seq,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>, StoreError> {
        self.check_dimensions(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, u64, &ExampleRecord)> = self
            .records
            .values()
            .map(|r| (self.distance.compute(vector, &r.embedding), r.seq, r))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, _, r)| StoreHit {
                id: r.id.clone(),
                input_text: r.input_text.clone(),
                output: Some(r.expected_output.clone()),
                distance: Some(distance),
            })
            .collect())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        // NaN and infinities cannot round-trip through the JSON snapshot.
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::InvalidRecord(format!(
                "vector component {} is not finite",
                pos
            )));
        }
        Ok(())
    }
}

/// Collection names double as file stems.
fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
