//! Cross-module property and end-to-end scenario tests for the cognitive
//! retrieval and curation engine: metadata round-trip, canonicalization,
//! scoring, health/conflict determination, proactive surfacing, and entity
//! upsert idempotence.
//!
//! Run with: cargo test --test cognition_properties

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;

use elefante::cognition::assembler::Candidate;
use elefante::cognition::canonical::{canonicalize, canonicalize_unique};
use elefante::cognition::curation::{detect_potential_conflicts, determine_health, CurationConfig, HealthState};
use elefante::cognition::graph_store::{DirGraphStore, GraphStore};
use elefante::cognition::metadata_codec::{decode_cognitive_fields, encode_cognitive_fields, parse_string_list};
use elefante::cognition::proactive::{suggest, ProactiveContext};
use elefante::cognition::query_analysis::{HeuristicIntentClassifier, Intent, QueryAnalysis};
use elefante::cognition::scorer::{score_candidate, ScorerConfig};
use elefante::cognition::vector_index::{InMemoryVectorIndex, VectorIndex};
use elefante::embedding::Embedder;
use elefante::types::{Memory, MemoryId, MemoryType};

fn memory(id: MemoryId, domain: &str, concepts: Vec<String>, surfaces_when: Vec<String>, authority_score: f32) -> Memory {
    Memory {
        id,
        content: "c".into(),
        memory_type: MemoryType::Note,
        tags: vec![],
        metadata: HashMap::new(),
        importance: 0.5,
        access_count: 0,
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
        surfaces_when,
        authority_score,
        superseded_by_id: None,
        contradicts: Default::default(),
        potential_conflicts: Default::default(),
    }
}

struct StubEmbedder;
impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> elefante::error::Result<Vec<f32>> {
        Ok(if text.to_lowercase().contains("deploy") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
    }
    fn dimensions(&self) -> usize {
        2
    }
    fn model_name(&self) -> &str {
        "stub"
    }
}

// ============================================================================
// TESTABLE PROPERTIES (spec.md #8)
// ============================================================================

fn concept_token() -> impl Strategy<Value = String> {
    "[a-z]{2,8}"
}

proptest! {
    /// 1. Metadata round-trip: decode(encode(m)) == m on concepts,
    /// surfaces_when, authority_score, given inputs already in canonical form.
    #[test]
    fn metadata_round_trip(
        raw_concepts in prop::collection::vec(concept_token(), 0..6),
        raw_surfaces in prop::collection::vec(concept_token(), 0..4),
        authority in 0.0f32..=1.0,
    ) {
        let concepts = canonicalize_unique(raw_concepts.iter());
        let surfaces_when = canonicalize_unique(raw_surfaces.iter());
        let m = memory(1, "project", concepts.clone(), surfaces_when.clone(), authority);

        let decoded = decode_cognitive_fields(&encode_cognitive_fields(&m));
        prop_assert_eq!(decoded.concepts, m.concepts);
        prop_assert_eq!(decoded.surfaces_when, m.surfaces_when);
        prop_assert!((decoded.authority_score - m.authority_score).abs() < 1e-6);
    }

    /// 2. Legacy decoding totality: parse_string_list never panics, for any
    /// of the shapes the spec names plus arbitrary strings.
    #[test]
    fn legacy_decoding_never_panics(s in ".*") {
        let _ = parse_string_list(&serde_json::Value::String(s));
    }

    /// 3. Canonicalizer idempotence.
    #[test]
    fn canonicalizer_idempotent(s in ".*") {
        let once = canonicalize(&s);
        let twice = canonicalize(&once);
        prop_assert_eq!(once, twice);
    }

    /// 4. Score bounds: every signal and the composite stay in [0, 1].
    #[test]
    fn score_bounds(
        vector_score in 0.0f32..=1.0,
        authority in 0.0f32..=1.0,
        query_concepts in prop::collection::vec(concept_token(), 0..4),
        memory_concepts in prop::collection::vec(concept_token(), 0..4),
    ) {
        let query = QueryAnalysis {
            text: "q".into(),
            embedding: vec![1.0, 0.0],
            concepts: canonicalize_unique(query_concepts.iter()),
            domain: "project".into(),
            intent: Intent::Reference,
        };
        let candidate = Candidate {
            memory: memory(1, "project", canonicalize_unique(memory_concepts.iter()), vec![], authority),
            vector_score,
        };
        let (composite, explanation) = score_candidate(&query, &candidate, &[], &ScorerConfig::default());

        prop_assert!((0.0..=1.0).contains(&composite));
        for signal in &explanation.signals {
            prop_assert!((0.0..=1.0).contains(&signal.score));
        }
    }

    /// 11. Proactive limit: the result never exceeds the requested limit,
    /// for any number of uniformly-triggering candidates.
    #[test]
    fn proactive_limit_never_exceeded(candidate_count in 0usize..15, limit in 1usize..5) {
        let index = InMemoryVectorIndex::new();
        for id in 0..candidate_count as i64 {
            let m = memory(id, "general", vec![], vec!["on deploy".into()], 0.5);
            index.upsert(id, vec![1.0, 0.0], encode_cognitive_fields(&m)).unwrap();
        }
        let context = ProactiveContext { error_message: Some("on deploy".to_string()), ..Default::default() };
        let result = suggest(&context, limit, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);
        prop_assert!(result.len() <= limit);
    }

    /// 12. Entity upsert idempotence: two calls with an equal
    /// (canon(name), type) key return equal ids.
    #[test]
    fn entity_upsert_idempotent(name in "[A-Za-z ]{1,12}", entity_type in "[a-z]{2,10}") {
        let dir = tempfile::tempdir().unwrap();
        let store = DirGraphStore::open(dir.path().join("g")).unwrap();
        let a = store.upsert_entity(&name, &entity_type, HashMap::new()).unwrap();
        let b = store.upsert_entity(&name, &entity_type, HashMap::new()).unwrap();
        prop_assert_eq!(a.id, b.id);
    }
}

/// 5. Explanation completeness: exactly six signal entries, weighted sum
/// matches composite within tolerance.
#[test]
fn explanation_completeness() {
    let query = QueryAnalysis {
        text: "q".into(),
        embedding: vec![1.0, 0.0],
        concepts: vec!["auth".into()],
        domain: "project".into(),
        intent: Intent::Reference,
    };
    let candidate = Candidate { memory: memory(1, "project", vec!["auth".into()], vec![], 0.7), vector_score: 0.6 };
    let (composite, explanation) = score_candidate(&query, &candidate, &[], &ScorerConfig::default());

    assert_eq!(explanation.signals.len(), 6);
    let sum: f32 = explanation.signals.iter().map(|s| s.weighted).sum();
    assert!((sum - composite).abs() <= 1e-3);
}

/// 6. Explanation accuracy: a positive concept_overlap score implies a
/// non-empty `matched` list whose elements are in both concept sets.
#[test]
fn explanation_accuracy_matched_concepts_are_shared() {
    let query_concepts = vec!["user approval protocol".to_string(), "billing".to_string()];
    let memory_concepts = vec!["user approval protocol".to_string()];
    let query = QueryAnalysis { text: "q".into(), embedding: vec![1.0, 0.0], concepts: query_concepts.clone(), domain: "project".into(), intent: Intent::Reference };
    let candidate = Candidate { memory: memory(1, "project", memory_concepts.clone(), vec![], 0.5), vector_score: 0.5 };
    let (_, explanation) = score_candidate(&query, &candidate, &[], &ScorerConfig::default());

    let concept_signal = &explanation.signals[1];
    assert!(concept_signal.score > 0.0);
    let matched: Vec<String> = concept_signal
        .details
        .get("matched")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(!matched.is_empty());
    for concept in &matched {
        assert!(query_concepts.contains(concept));
        assert!(memory_concepts.contains(concept));
    }
}

/// 7. Health exhaustiveness and determinism: every memory gets exactly one
/// of the four states, and identical inputs yield identical output.
#[test]
fn health_is_exhaustive_and_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
    let now = Utc::now();
    let m = memory(1, "general", vec![], vec![], 0.5);

    let report_a = determine_health(&m, &graph, &CurationConfig::default(), now);
    let report_b = determine_health(&m, &graph, &CurationConfig::default(), now);
    assert_eq!(report_a.state, report_b.state);
    assert!(matches!(report_a.state, HealthState::Healthy | HealthState::Stale | HealthState::AtRisk | HealthState::Orphan));
}

/// 8. Conflict symmetry: detect(A, B) iff detect(B, A).
#[test]
fn conflict_detection_is_symmetric_regardless_of_input_order() {
    let a = memory(1, "work", vec!["a".into(), "b".into(), "c".into(), "d".into()], vec![], 0.5);
    let b = memory(2, "work", vec!["a".into(), "b".into(), "c".into(), "e".into()], vec![], 0.5);

    let forward = detect_potential_conflicts(&[a.clone(), b.clone()], &CurationConfig::default());
    let backward = detect_potential_conflicts(&[b, a], &CurationConfig::default());
    assert_eq!(forward.len(), 1);
    assert_eq!(backward.len(), 1);
}

/// 9. Conflict soft-flag: an emitted pair is a candidate for
/// `potential_conflicts`, never for `contradicts`.
#[test]
fn conflict_reports_never_touch_contradicts() {
    let a = memory(1, "work", vec!["a".into(), "b".into(), "c".into(), "d".into()], vec![], 0.5);
    let b = memory(2, "work", vec!["a".into(), "b".into(), "c".into(), "e".into()], vec![], 0.5);

    let reports = detect_potential_conflicts(&[a.clone(), b.clone()], &CurationConfig::default());
    assert_eq!(reports.len(), 1);
    assert!(a.contradicts.is_empty());
    assert!(b.contradicts.is_empty());
}

/// 10. Proactive relevance: every returned suggestion satisfies at least one
/// trigger gate (here, the surfaces_when gate).
#[test]
fn proactive_relevance_every_result_has_an_active_trigger() {
    let index = InMemoryVectorIndex::new();
    let triggered = memory(1, "general", vec![], vec!["on deploy".into()], 0.5);
    let untriggered = memory(2, "general", vec!["unrelated".into()], vec!["never matches".into()], 0.5);
    index.upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&triggered)).unwrap();
    index.upsert(2, vec![1.0, 0.0], encode_cognitive_fields(&untriggered)).unwrap();

    let context = ProactiveContext { error_message: Some("deploy failed".to_string()), ..Default::default() };
    let result = suggest(&context, 5, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);

    assert!(!result.is_empty());
    for (m, _) in &result {
        assert!(m.surfaces_when.iter().any(|p| canonicalize("deploy failed").contains(p.as_str())));
    }
}

// ============================================================================
// END-TO-END SCENARIOS (spec.md #8, S1-S6)
// ============================================================================

/// S1: concept match beats vector similarity.
#[test]
fn s1_concept_match_beats_vector() {
    let query = QueryAnalysis {
        text: "q".into(),
        embedding: vec![1.0, 0.0],
        concepts: vec!["user approval protocol".to_string()],
        domain: "project".into(),
        intent: Intent::Reference,
    };

    let a = Candidate {
        memory: memory(1, "project", vec!["user approval protocol".into(), "quality".into()], vec![], 0.9),
        vector_score: 0.60,
    };
    let b = Candidate { memory: memory(2, "general", vec![], vec![], 0.2), vector_score: 0.85 };

    let (score_a, explanation_a) = score_candidate(&query, &a, &[], &ScorerConfig::default());
    let (score_b, _) = score_candidate(&query, &b, &[], &ScorerConfig::default());

    assert!(score_a > score_b, "A ({score_a}) should outrank B ({score_b})");
    let concept_signal = &explanation_a.signals[1];
    assert!((concept_signal.score - 0.5).abs() < 1e-6);
    let matched: Vec<String> = concept_signal.details.get("matched").unwrap().as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
    assert_eq!(matched, vec!["user approval protocol".to_string()]);
}

/// S2: a legacy Python-list-literal `concepts` value decodes without raising.
#[test]
fn s2_legacy_decode() {
    let value = serde_json::Value::String("['elefante', 'config', 'paths']".to_string());
    let parsed = parse_string_list(&value);
    assert_eq!(parsed, vec!["elefante", "config", "paths"]);
}

/// S3: a memory unaccessed for 100 days, not superseded, with no conflicts,
/// and graph connections, is stale.
#[test]
fn s3_health_stale() {
    let dir = tempfile::tempdir().unwrap();
    let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
    for i in 0..3 {
        graph
            .upsert_edge(elefante::cognition::graph_store::Edge {
                from: "mem:1".into(),
                to: format!("ent:{i}"),
                edge_type: "SHARES_CONCEPT".into(),
                properties: HashMap::new(),
            })
            .unwrap();
    }

    let mut m = memory(1, "general", vec![], vec![], 0.5);
    m.last_accessed_at = Some(Utc::now() - chrono::Duration::days(100));

    let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
    assert_eq!(report.state, HealthState::Stale);
}

/// S4: supersession wins over staleness.
#[test]
fn s4_health_priority_supersession_over_staleness() {
    let dir = tempfile::tempdir().unwrap();
    let graph = DirGraphStore::open(dir.path().join("g")).unwrap();

    let mut m = memory(1, "general", vec![], vec![], 0.5);
    m.last_accessed_at = Some(Utc::now() - chrono::Duration::days(100));
    m.superseded_by_id = Some(99);

    let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
    assert_eq!(report.state, HealthState::AtRisk);
}

/// S5: two same-domain memories at the overlap threshold emit one
/// ConflictReport, and the write-back path updates `potential_conflicts`
/// symmetrically on both without touching `contradicts`.
#[test]
fn s5_conflict_flag_written_back_symmetrically() {
    let mut m1 = memory(1, "work", vec!["a".into(), "b".into(), "c".into(), "d".into()], vec![], 0.5);
    let mut m2 = memory(2, "work", vec!["a".into(), "b".into(), "c".into(), "e".into()], vec![], 0.5);

    let reports = detect_potential_conflicts(&[m1.clone(), m2.clone()], &CurationConfig::default());
    assert_eq!(reports.len(), 1);
    assert!((reports[0].overlap - 0.6).abs() < 1e-6);

    // Mirror the write-back tool_context_get performs: persist each report
    // onto both memories' potential_conflicts sets.
    for report in &reports {
        m1.potential_conflicts.insert(report.b_id);
        m2.potential_conflicts.insert(report.a_id);
    }

    assert!(m1.potential_conflicts.contains(&2));
    assert!(m2.potential_conflicts.contains(&1));
    assert!(m1.contradicts.is_empty());
    assert!(m2.contradicts.is_empty());
}

/// S6: a surfaces_when trigger fires on a matching error message, and the
/// returned explanation shows a positive composite score.
#[test]
fn s6_proactive_by_surfaces_trigger() {
    let index = InMemoryVectorIndex::new();
    let m = memory(1, "general", vec![], vec!["on connectionreseterror".into()], 0.5);
    index.upsert(1, vec![1.0, 0.0], encode_cognitive_fields(&m)).unwrap();

    let context = ProactiveContext { error_message: Some("ConnectionResetError at ingest".to_string()), ..Default::default() };
    let result = suggest(&context, 3, &index, &StubEmbedder, &HeuristicIntentClassifier, &[], &ScorerConfig::default(), false, 0.3);

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0.id, 1);
    assert!(result[0].1.composite_score > 0.0);
}
