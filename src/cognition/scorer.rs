//! Cognitive Scorer: ranks [`Candidate`]s against a [`QueryAnalysis`] using
//! six fixed-weight signals and produces a per-candidate [`Explanation`].
//!
//! `SignalWeights` follows the named-field weighted-config shape of
//! `intelligence::salience::SalienceConfig`; `Explanation`/`SignalExplanation`
//! generalize `intelligence::quality::QualityScore`'s
//! `{overall, grade, metrics, suggestions}` shape into an ordered
//! array-of-structs suitable for the fixed six-signal contract below.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cognition::assembler::Candidate;
use crate::cognition::query_analysis::QueryAnalysis;
use crate::types::{Memory, MemoryId};

/// Names of the six signals, in the fixed order the explanation contract
/// requires.
pub const SIGNAL_NAMES: [&str; 6] = [
    "vector_similarity",
    "concept_overlap",
    "domain_match",
    "coactivation",
    "authority",
    "temporal",
];

/// Named per-signal weights, summing to 1.0 by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub vector_similarity: f32,
    pub concept_overlap: f32,
    pub domain_match: f32,
    pub coactivation: f32,
    pub authority: f32,
    pub temporal: f32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            vector_similarity: 0.30,
            concept_overlap: 0.20,
            domain_match: 0.15,
            coactivation: 0.10,
            authority: 0.15,
            temporal: 0.10,
        }
    }
}

impl SignalWeights {
    fn as_array(&self) -> [f32; 6] {
        [
            self.vector_similarity,
            self.concept_overlap,
            self.domain_match,
            self.coactivation,
            self.authority,
            self.temporal,
        ]
    }
}

/// Tunable knobs for signals that aren't pure weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerConfig {
    pub weights: SignalWeights,
    /// λ in the temporal decay `exp(-λ * days_since_access)`.
    pub lambda_decay: f32,
    /// Size of the recent-access window for the coactivation signal.
    pub coactivation_window: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            lambda_decay: 0.01,
            coactivation_window: 20,
        }
    }
}

/// One signal's contribution to a composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalExplanation {
    pub name: String,
    pub score: f32,
    pub weight: f32,
    pub weighted: f32,
    pub reason: String,
    pub details: Value,
}

/// Full explanation for one scored candidate: exactly six signal entries, in
/// fixed order, whose weighted sum equals `composite_score` within `1e-3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub composite_score: f32,
    pub signals: Vec<SignalExplanation>,
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&String> = a.iter().collect();
    let set_b: HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    if intersection == 0 {
        return 0.0;
    }
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

fn matched_concepts(a: &[String], b: &[String]) -> Vec<String> {
    let set_b: HashSet<&String> = b.iter().collect();
    a.iter().filter(|c| set_b.contains(c)).cloned().collect()
}

fn signal_vector_similarity(vector_score: f32) -> (f32, Value, String) {
    let score = vector_score.clamp(0.0, 1.0);
    (score, json!({}), format!("cosine similarity mapped to {:.3}", score))
}

fn signal_concept_overlap(query_concepts: &[String], memory_concepts: &[String]) -> (f32, Value, String) {
    let score = jaccard(query_concepts, memory_concepts);
    let matched = matched_concepts(query_concepts, memory_concepts);
    let reason = if score > 0.0 {
        format!("{} shared concept(s)", matched.len())
    } else {
        "no shared concepts".to_string()
    };
    (score, json!({ "matched": matched }), reason)
}

fn signal_domain_match(query_domain: &str, memory_domain: &str) -> (f32, Value, String) {
    let (score, reason) = if query_domain == memory_domain {
        (1.0, "domains match exactly")
    } else if query_domain == "general" || memory_domain == "general" {
        (0.5, "one side is the general domain")
    } else {
        (0.0, "domains differ")
    };
    (score, json!({ "domain": memory_domain }), reason.to_string())
}

fn signal_coactivation(memory_id: MemoryId, recent_access_window: &[MemoryId]) -> (f32, Value, String) {
    if recent_access_window.is_empty() {
        return (0.0, json!({}), "no access history".to_string());
    }
    let hits = recent_access_window.iter().filter(|id| **id == memory_id).count();
    let score = (hits as f32 / recent_access_window.len() as f32).clamp(0.0, 1.0);
    (score, json!({}), format!("seen in {hits} of last {} accesses", recent_access_window.len()))
}

fn signal_authority(memory: &Memory) -> (f32, Value, String) {
    let access_term = (memory.access_count as f32 / 20.0).min(1.0);
    let score = (0.6 * memory.authority_score + 0.4 * access_term).clamp(0.0, 1.0);
    (score, json!({}), format!("authority={:.2}, access_count={}", memory.authority_score, memory.access_count))
}

fn signal_temporal(memory: &Memory, lambda: f32) -> (f32, Value, String) {
    let days_since_access = memory
        .last_accessed_at
        .map(|ts| (Utc::now() - ts).num_days().max(0))
        .unwrap_or(i64::MAX / 2);
    let score = if days_since_access >= i64::MAX / 4 {
        0.0
    } else {
        (-lambda * days_since_access as f32).exp().clamp(0.0, 1.0)
    };
    (
        score,
        json!({ "days_since_access": days_since_access }),
        format!("decayed over {days_since_access} days"),
    )
}

/// Score a single candidate against a query, returning the composite score
/// and an [`Explanation`] with exactly six signal entries.
///
/// `recent_access_window` is the global last-R-accessed memory id list
/// driving the coactivation signal (most-recent first).
pub fn score_candidate(
    query: &QueryAnalysis,
    candidate: &Candidate,
    recent_access_window: &[MemoryId],
    config: &ScorerConfig,
) -> (f32, Explanation) {
    let memory = &candidate.memory;

    let raw = [
        signal_vector_similarity(candidate.vector_score),
        signal_concept_overlap(&query.concepts, &memory.concepts),
        signal_domain_match(&query.domain, &memory.domain),
        signal_coactivation(memory.id, recent_access_window),
        signal_authority(memory),
        signal_temporal(memory, config.lambda_decay),
    ];

    let weights = config.weights.as_array();
    let mut signals = Vec::with_capacity(6);
    let mut composite = 0.0f32;

    for (i, (score, details, reason)) in raw.into_iter().enumerate() {
        let weight = weights[i];
        let weighted = score * weight;
        composite += weighted;
        signals.push(SignalExplanation {
            name: SIGNAL_NAMES[i].to_string(),
            score,
            weight,
            weighted,
            reason,
            details,
        });
    }

    (composite.clamp(0.0, 1.0), Explanation { composite_score: composite.clamp(0.0, 1.0), signals })
}

/// Rank scored candidates, applying the tie-break order on equal composite:
/// higher authority signal, then higher vector_similarity signal, then lower
/// memory id.
pub fn rank(mut scored: Vec<(Candidate, f32, Explanation)>, limit_k: usize) -> Vec<(Candidate, f32, Explanation)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let auth_a = a.2.signals[4].score;
                let auth_b = b.2.signals[4].score;
                auth_b.partial_cmp(&auth_a).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                let vec_a = a.2.signals[0].score;
                let vec_b = b.2.signals[0].score;
                vec_b.partial_cmp(&vec_a).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.0.memory.id.cmp(&b.0.memory.id))
    });
    scored.truncate(limit_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::query_analysis::Intent;
    use std::collections::HashMap;

    fn query(concepts: Vec<String>, domain: &str) -> QueryAnalysis {
        QueryAnalysis {
            text: "q".to_string(),
            embedding: vec![1.0, 0.0],
            concepts,
            domain: domain.to_string(),
            intent: Intent::Reference,
        }
    }

    fn memory(id: MemoryId, concepts: Vec<String>, domain: &str, authority: f32) -> Memory {
        Memory {
            id,
            content: "c".into(),
            memory_type: crate::types::MemoryType::Note,
            tags: vec![],
            metadata: HashMap::new(),
            importance: 0.5,
            access_count: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_accessed_at: Some(Utc::now()),
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
            surfaces_when: vec![],
            authority_score: authority,
            superseded_by_id: None,
            contradicts: Default::default(),
            potential_conflicts: Default::default(),
        }
    }

    #[test]
    fn signals_and_composite_are_bounded() {
        let q = query(vec!["auth".into()], "project");
        let candidate = Candidate { memory: memory(1, vec!["auth".into()], "project", 0.9), vector_score: 0.95 };
        let (composite, explanation) = score_candidate(&q, &candidate, &[], &ScorerConfig::default());

        assert!((0.0..=1.0).contains(&composite));
        assert_eq!(explanation.signals.len(), 6);
        for signal in &explanation.signals {
            assert!((0.0..=1.0).contains(&signal.score), "{} out of bounds", signal.name);
        }
    }

    #[test]
    fn explanation_has_six_signals_in_fixed_order() {
        let q = query(vec![], "general");
        let candidate = Candidate { memory: memory(1, vec![], "general", 0.5), vector_score: 0.5 };
        let (_, explanation) = score_candidate(&q, &candidate, &[], &ScorerConfig::default());

        let names: Vec<&str> = explanation.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, SIGNAL_NAMES.to_vec());
    }

    #[test]
    fn weighted_sum_matches_composite_within_tolerance() {
        let q = query(vec!["auth".into(), "billing".into()], "project");
        let candidate = Candidate { memory: memory(7, vec!["billing".into()], "project", 0.4), vector_score: 0.6 };
        let (composite, explanation) = score_candidate(&q, &candidate, &[7, 7, 2], &ScorerConfig::default());

        let sum: f32 = explanation.signals.iter().map(|s| s.weighted).sum();
        assert!((sum - composite).abs() <= 1e-3);
    }

    #[test]
    fn concept_overlap_details_matched_nonempty_when_score_positive() {
        let q = query(vec!["auth".into()], "project");
        let candidate = Candidate { memory: memory(1, vec!["auth".into(), "billing".into()], "project", 0.5), vector_score: 0.5 };
        let (_, explanation) = score_candidate(&q, &candidate, &[], &ScorerConfig::default());

        let concept_signal = &explanation.signals[1];
        assert!(concept_signal.score > 0.0);
        let matched = concept_signal.details.get("matched").unwrap().as_array().unwrap();
        assert!(!matched.is_empty());
        assert_eq!(matched[0], Value::String("auth".to_string()));
    }

    #[test]
    fn weights_sum_to_one() {
        let weights = SignalWeights::default();
        let total = weights.vector_similarity
            + weights.concept_overlap
            + weights.domain_match
            + weights.coactivation
            + weights.authority
            + weights.temporal;
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tie_break_on_equal_composite_prefers_lower_id() {
        let q = query(vec![], "general");
        let low_authority = Candidate { memory: memory(2, vec![], "general", 0.1), vector_score: 0.5 };
        let high_authority = Candidate { memory: memory(1, vec![], "general", 0.1), vector_score: 0.5 };

        // Force equal composite by giving both identical inputs except id.
        let (c1, e1) = score_candidate(&q, &low_authority, &[], &ScorerConfig::default());
        let (c2, e2) = score_candidate(&q, &high_authority, &[], &ScorerConfig::default());
        assert!((c1 - c2).abs() < 1e-6);

        let ranked = rank(vec![(low_authority, c1, e1), (high_authority, c2, e2)], 2);
        assert_eq!(ranked[0].0.memory.id, 1);
    }
}
