//! The vector index external collaborator (`spec.md` §6): an
//! approximate-nearest-neighbor store keyed by memory id, supporting upsert,
//! cosine-similarity query with an optional flat metadata filter, get,
//! delete, and count. Metadata values are restricted to primitives; nested
//! structures must pass through [`crate::cognition::metadata_codec`] first.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::types::MemoryId;

/// A single upserted vector record.
#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    metadata: HashMap<String, Value>,
}

/// Operations the cognition engine needs from a vector index, mirroring the
/// shape of [`crate::storage::backend::StorageBackend`]: a `Send + Sync`
/// trait with documented methods and no interior mutability assumptions
/// beyond what implementations choose.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector and metadata for `id`.
    fn upsert(&self, id: MemoryId, embedding: Vec<f32>, metadata: HashMap<String, Value>) -> Result<()>;

    /// Return up to `k` nearest neighbors by cosine similarity, optionally
    /// restricted to entries whose metadata matches every key/value pair in
    /// `filter`. Returns `(id, cosine_similarity, metadata)` tuples, ordered
    /// by descending similarity. Returns an empty vec when the index is
    /// empty; never raises for an empty index.
    fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &HashMap<String, Value>,
    ) -> Result<Vec<(MemoryId, f32, HashMap<String, Value>)>>;

    /// Fetch a single entry's metadata, if present.
    fn get(&self, id: MemoryId) -> Result<Option<HashMap<String, Value>>>;

    /// Remove an entry. A delete of an absent id is a no-op, not an error.
    fn delete(&self, id: MemoryId) -> Result<()>;

    /// Total number of indexed vectors.
    fn count(&self) -> Result<usize>;
}

/// In-process reference implementation backed by a `Vec` under a
/// `parking_lot::RwLock`, matching the teacher's lock discipline elsewhere
/// (`storage::connection::Storage` uses the same crate for its SQLite
/// connection guard). Suitable for the single-user, local-only scope this
/// spec targets; swappable for a real ANN backend without changing callers.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<HashMap<MemoryId, IndexEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(metadata: &HashMap<String, Value>, filter: &HashMap<String, Value>) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

impl VectorIndex for InMemoryVectorIndex {
    fn upsert(&self, id: MemoryId, embedding: Vec<f32>, metadata: HashMap<String, Value>) -> Result<()> {
        self.entries.write().insert(id, IndexEntry { embedding, metadata });
        Ok(())
    }

    fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &HashMap<String, Value>,
    ) -> Result<Vec<(MemoryId, f32, HashMap<String, Value>)>> {
        let entries = self.entries.read();
        let mut scored: Vec<(MemoryId, f32, HashMap<String, Value>)> = entries
            .iter()
            .filter(|(_, entry)| matches_filter(&entry.metadata, filter))
            .map(|(id, entry)| {
                let sim = cosine_similarity(embedding, &entry.embedding);
                (*id, sim, entry.metadata.clone())
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn get(&self, id: MemoryId) -> Result<Option<HashMap<String, Value>>> {
        Ok(self.entries.read().get(&id).map(|e| e.metadata.clone()))
    }

    fn delete(&self, id: MemoryId) -> Result<()> {
        self.entries.write().remove(&id);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(domain: &str) -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("domain".to_string(), Value::String(domain.to_string()));
        m
    }

    #[test]
    fn empty_index_query_returns_empty() {
        let index = InMemoryVectorIndex::new();
        let result = index.query(&[1.0, 0.0], 10, &HashMap::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn query_orders_by_descending_similarity() {
        let index = InMemoryVectorIndex::new();
        index.upsert(1, vec![1.0, 0.0], meta("general")).unwrap();
        index.upsert(2, vec![0.0, 1.0], meta("general")).unwrap();
        index.upsert(3, vec![0.9, 0.1], meta("general")).unwrap();

        let result = index.query(&[1.0, 0.0], 10, &HashMap::new()).unwrap();
        assert_eq!(result[0].0, 1);
        assert_eq!(result[1].0, 3);
        assert_eq!(result[2].0, 2);
    }

    #[test]
    fn query_respects_metadata_filter() {
        let index = InMemoryVectorIndex::new();
        index.upsert(1, vec![1.0, 0.0], meta("project")).unwrap();
        index.upsert(2, vec![1.0, 0.0], meta("general")).unwrap();

        let mut filter = HashMap::new();
        filter.insert("domain".to_string(), Value::String("project".to_string()));
        let result = index.query(&[1.0, 0.0], 10, &filter).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 1);
    }

    #[test]
    fn delete_is_a_no_op_for_absent_id() {
        let index = InMemoryVectorIndex::new();
        assert!(index.delete(999).is_ok());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let index = InMemoryVectorIndex::new();
        index.upsert(1, vec![1.0, 0.0], meta("a")).unwrap();
        index.upsert(1, vec![0.0, 1.0], meta("b")).unwrap();
        assert_eq!(index.count().unwrap(), 1);
        let stored = index.get(1).unwrap().unwrap();
        assert_eq!(stored.get("domain"), Some(&Value::String("b".to_string())));
    }
}
