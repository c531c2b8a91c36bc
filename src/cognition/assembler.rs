//! Candidate Assembler: turns a [`QueryAnalysis`] into a bounded, hydrated
//! set of [`Candidate`]s for the Cognitive Scorer, in the style of the
//! teacher's `search::hybrid::hybrid_search` dispatch — query the backend
//! once, map hits into a typed shape, dedup, hand off ranking to the caller.

use std::collections::HashMap;

use serde_json::Value;

use crate::cognition::metadata_codec::decode_cognitive_fields;
use crate::cognition::query_analysis::QueryAnalysis;
use crate::cognition::vector_index::VectorIndex;
use crate::error::Result;
use crate::types::{Memory, MemoryId};

/// A candidate pulled from the vector index and hydrated with its decoded
/// cognitive fields, ready for scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub memory: Memory,
    /// Cosine similarity mapped to `[0, 1]`.
    pub vector_score: f32,
}

/// Maps raw cosine similarity (`[-1, 1]`) onto `[0, 1]`. In the common
/// unit-norm case the value is already non-negative and close to this range;
/// the mapping clips floating-point drift outside `[-1, 1]`.
fn normalize_cosine(cos: f32) -> f32 {
    ((cos + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Rebuild a [`Memory`] shell from a vector-index hit's metadata map. The
/// index only ever stores what [`crate::cognition::metadata_codec`] put
/// there, so a memory missing a typed field degrades to the Metadata Codec's
/// documented defaults rather than failing the whole candidate.
fn hydrate(id: MemoryId, metadata: &HashMap<String, Value>) -> Memory {
    let decoded = decode_cognitive_fields(metadata);
    let content = metadata
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Memory {
        id,
        content,
        memory_type: crate::types::MemoryType::Note,
        tags: Vec::new(),
        metadata: metadata.clone(),
        importance: 0.5,
        access_count: 0,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        last_accessed_at: None,
        owner_id: None,
        visibility: Default::default(),
        scope: Default::default(),
        workspace: "default".to_string(),
        tier: Default::default(),
        version: 1,
        has_embedding: true,
        expires_at: None,
        content_hash: None,
        event_time: None,
        event_duration_seconds: None,
        trigger_pattern: None,
        procedure_success_count: 0,
        procedure_failure_count: 0,
        summary_of_id: None,
        lifecycle_state: Default::default(),
        domain: decoded.domain,
        layer: decoded.layer,
        sublayer: decoded.sublayer,
        concepts: decoded.concepts,
        surfaces_when: decoded.surfaces_when,
        authority_score: decoded.authority_score,
        superseded_by_id: decoded.superseded_by_id,
        contradicts: decoded.contradicts,
        potential_conflicts: decoded.potential_conflicts,
    }
}

/// Produce a bounded candidate set for `query`, querying up to
/// `max(limit_k * 3, 30)` nearest neighbors, optionally restricted by
/// `filter` (e.g. `{"domain": "project"}`), deduplicated by memory id
/// (highest vector score wins). Returns an empty vec when the index is
/// empty; propagates only catastrophic backend errors.
pub fn assemble(
    query: &QueryAnalysis,
    limit_k: usize,
    vector_index: &dyn VectorIndex,
    filter: &HashMap<String, Value>,
) -> Result<Vec<Candidate>> {
    let k = (limit_k * 3).max(30);
    let hits = vector_index.query(&query.embedding, k, filter)?;

    let mut best: HashMap<MemoryId, Candidate> = HashMap::new();
    for (id, cosine, metadata) in hits {
        let vector_score = normalize_cosine(cosine);
        let entry = best.entry(id).or_insert_with(|| Candidate {
            memory: hydrate(id, &metadata),
            vector_score,
        });
        if vector_score > entry.vector_score {
            entry.vector_score = vector_score;
        }
    }

    Ok(best.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::metadata_codec::encode_cognitive_fields;
    use crate::cognition::query_analysis::Intent;
    use crate::cognition::vector_index::InMemoryVectorIndex;

    fn query(embedding: Vec<f32>) -> QueryAnalysis {
        QueryAnalysis {
            text: "q".to_string(),
            embedding,
            concepts: vec![],
            domain: "general".to_string(),
            intent: Intent::Reference,
        }
    }

    fn sample_memory(id: MemoryId, domain: &str) -> Memory {
        Memory {
            id,
            content: "c".into(),
            memory_type: crate::types::MemoryType::Note,
            tags: vec![],
            metadata: HashMap::new(),
            importance: 0.5,
            access_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_accessed_at: None,
            owner_id: None,
            visibility: Default::default(),
            scope: Default::default(),
            workspace: "default".into(),
            tier: Default::default(),
            version: 1,
            has_embedding: true,
            expires_at: None,
            content_hash: None,
            event_time: None,
            event_duration_seconds: None,
            trigger_pattern: None,
            procedure_success_count: 0,
            procedure_failure_count: 0,
            summary_of_id: None,
            lifecycle_state: Default::default(),
            domain: domain.to_string(),
            layer: Default::default(),
            sublayer: String::new(),
            concepts: vec!["auth".into()],
            surfaces_when: vec![],
            authority_score: 0.7,
            superseded_by_id: None,
            contradicts: Default::default(),
            potential_conflicts: Default::default(),
        }
    }

    #[test]
    fn empty_index_yields_empty_candidates() {
        let index = InMemoryVectorIndex::new();
        let result = assemble(&query(vec![1.0, 0.0]), 5, &index, &HashMap::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn candidates_are_deduplicated_keeping_highest_score() {
        let index = InMemoryVectorIndex::new();
        let memory = sample_memory(1, "general");
        index.upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&memory)).unwrap();

        let result = assemble(&query(vec![1.0, 0.0]), 5, &index, &HashMap::new()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].memory.id, 1);
        assert!(result[0].vector_score > 0.9);
    }

    #[test]
    fn filter_restricts_candidates_by_domain() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&sample_memory(1, "project")))
            .unwrap();
        index
            .upsert(2, vec![1.0, 0.0], encode_cognitive_fields(&sample_memory(2, "general")))
            .unwrap();

        let mut filter = HashMap::new();
        filter.insert("domain".to_string(), Value::String("project".to_string()));
        let result = assemble(&query(vec![1.0, 0.0]), 5, &index, &filter).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].memory.id, 1);
    }

    #[test]
    fn pool_size_is_at_least_thirty_even_for_small_limit() {
        let index = InMemoryVectorIndex::new();
        for id in 1..=40 {
            index
                .upsert(id, vec![1.0, 0.0], encode_cognitive_fields(&sample_memory(id, "general")))
                .unwrap();
        }
        let result = assemble(&query(vec![1.0, 0.0]), 1, &index, &HashMap::new()).unwrap();
        assert_eq!(result.len(), 30);
    }
}
