//! Proactive Surfacer: answers "what memories might matter right now"
//! without an explicit query, given ambient context (file path, error
//! message, conversation snippet).
//!
//! The pre-filter gate structure is grounded on
//! `intelligence::suggestions::SuggestionEngine`'s trigger-then-score shape;
//! the top-N cut reuses `scorer::rank`'s ordering, the same ordering
//! `intelligence::salience::SalienceCalculator::priority_queue` applies via
//! its reversed `Ord` on `ScoredMemory`.

use crate::cognition::canonical::canonicalize;
use crate::cognition::query_analysis::{analyze_query, Intent, IntentClassifier, QueryAnalysis};
use crate::cognition::scorer::{rank, score_candidate, Explanation, ScorerConfig};
use crate::cognition::vector_index::VectorIndex;
use crate::cognition::assembler::{assemble, Candidate};
use crate::embedding::Embedder;
use crate::types::{Memory, MemoryId};

/// Ambient context the surfacer is given in place of an explicit query. Any
/// subset may be populated; all-empty yields an empty result.
#[derive(Debug, Clone, Default)]
pub struct ProactiveContext {
    pub file_path: Option<String>,
    pub error_message: Option<String>,
    pub conversation_snippet: Option<String>,
}

impl ProactiveContext {
    fn is_empty(&self) -> bool {
        self.file_path.is_none() && self.error_message.is_none() && self.conversation_snippet.is_none()
    }

    /// Concatenate the populated fields with newlines, in a fixed field
    /// order, for the synthetic query.
    fn synthetic_text(&self) -> String {
        [&self.file_path, &self.error_message, &self.conversation_snippet]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: std::collections::HashSet<&String> = a.iter().collect();
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    if intersection == 0 {
        return 0.0;
    }
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Whether `memory` has at least one active trigger against `context_text`
/// and the derived query. `domain_match` is an optional third gate.
fn has_active_trigger(
    memory: &Memory,
    context_canon: &str,
    query: &QueryAnalysis,
    check_domain: bool,
    concept_trigger_threshold: f32,
) -> bool {
    let surfaces_trigger = memory
        .surfaces_when
        .iter()
        .any(|phrase| !phrase.is_empty() && context_canon.contains(phrase.as_str()));

    let concept_trigger = jaccard(&query.concepts, &memory.concepts) > concept_trigger_threshold;

    let domain_trigger = check_domain && query.domain == memory.domain;

    surfaces_trigger || concept_trigger || domain_trigger
}

/// Produce up to `limit` `(memory, explanation)` pairs relevant to `context`.
/// Never raises: any backend error collapses to an empty result, per the
/// spec's "proactive suggestions convert every error to empty silently" rule.
#[allow(clippy::too_many_arguments)]
pub fn suggest(
    context: &ProactiveContext,
    limit: usize,
    vector_index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    classifier: &dyn IntentClassifier,
    recent_access_window: &[MemoryId],
    config: &ScorerConfig,
    check_domain_trigger: bool,
    concept_trigger_threshold: f32,
) -> Vec<(Memory, Explanation)> {
    if context.is_empty() || limit == 0 {
        return Vec::new();
    }

    let synthetic_text = context.synthetic_text();
    let query = match analyze_query(&synthetic_text, embedder, classifier) {
        Ok(q) => q,
        Err(_) => return Vec::new(),
    };
    // Proactive suggestions treat unknown intent as reference-like browsing,
    // not a specific tagged lookup; force it explicitly so callers can rely
    // on this invariant rather than whatever the classifier happened to say.
    let query = QueryAnalysis { intent: Intent::Reference, ..query };

    let candidates: Vec<Candidate> = match assemble(&query, limit, vector_index, &std::collections::HashMap::new()) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let context_canon = canonicalize(&synthetic_text);
    let gated: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| has_active_trigger(&c.memory, &context_canon, &query, check_domain_trigger, concept_trigger_threshold))
        .collect();

    let scored: Vec<(Candidate, f32, Explanation)> = gated
        .into_iter()
        .map(|candidate| {
            let (composite, explanation) = score_candidate(&query, &candidate, recent_access_window, config);
            (candidate, composite, explanation)
        })
        .collect();

    rank(scored, limit)
        .into_iter()
        .map(|(candidate, _, explanation)| (candidate.memory, explanation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::metadata_codec::encode_cognitive_fields;
    use crate::cognition::query_analysis::HeuristicIntentClassifier;
    use crate::cognition::vector_index::InMemoryVectorIndex;
    use crate::embedding::Embedder;
    use std::collections::HashMap;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            let v = if text.to_lowercase().contains("deploy") { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
            Ok(v)
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn memory_with(id: MemoryId, concepts: Vec<String>, surfaces_when: Vec<String>, domain: &str) -> Memory {
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
            last_accessed_at: Some(chrono::Utc::now()),
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
            concepts,
            surfaces_when,
            authority_score: 0.5,
            superseded_by_id: None,
            contradicts: Default::default(),
            potential_conflicts: Default::default(),
        }
    }

    #[test]
    fn empty_context_yields_empty_result() {
        let index = InMemoryVectorIndex::new();
        let result = suggest(
            &ProactiveContext::default(),
            3,
            &index,
            &StubEmbedder,
            &HeuristicIntentClassifier,
            &[],
            &ScorerConfig::default(),
            false,
            0.3,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn surfaces_trigger_gates_a_candidate_in() {
        let index = InMemoryVectorIndex::new();
        let memory = memory_with(1, vec![], vec!["on deploy".into()], "general");
        index.upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&memory)).unwrap();

        let context = ProactiveContext { error_message: Some("failure on deploy step 3".to_string()), ..Default::default() };
        let result = suggest(&context, 3, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.id, 1);
    }

    #[test]
    fn candidate_without_any_trigger_is_excluded() {
        let index = InMemoryVectorIndex::new();
        let memory = memory_with(1, vec!["unrelated".into()], vec!["never matches".into()], "billing");
        index.upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&memory)).unwrap();

        let context = ProactiveContext { error_message: Some("deploy failed".to_string()), ..Default::default() };
        let result = suggest(&context, 3, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);
        assert!(result.is_empty());
    }

    #[test]
    fn result_length_never_exceeds_limit() {
        let index = InMemoryVectorIndex::new();
        for id in 1..=10 {
            let memory = memory_with(id, vec![], vec!["on deploy".into()], "general");
            index.upsert(id, vec![1.0, 0.0], encode_cognitive_fields(&memory)).unwrap();
        }
        let context = ProactiveContext { error_message: Some("on deploy".to_string()), ..Default::default() };
        let result = suggest(&context, 2, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);
        assert!(result.len() <= 2);
    }
}
