//! Curation Analyzer: batch-assigns a [`HealthState`] to every memory and
//! emits soft-flagged [`ConflictReport`]s for concept-overlapping pairs in
//! the same domain.
//!
//! `determine_health`'s priority cascade is grounded on
//! `intelligence::salience::SalienceCalculator::suggest_lifecycle_state`'s
//! if/else-if priority-ordered shape; `detect_potential_conflicts`'s pairwise
//! overlap scan is grounded on `graph::KnowledgeGraph::detect_communities`'s
//! pairwise computation, adapted from clustering to direct conflict
//! emission.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cognition::canonical::canonicalize;
use crate::cognition::graph_store::GraphStore;
use crate::types::{Memory, MemoryId};

/// Health state assigned to a memory by the curation analyzer. Distinct from
/// `LifecycleState`: this answers a health/review question (is this memory
/// safe to trust right now), not an archival question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Stale,
    AtRisk,
    Orphan,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Stale => "stale",
            HealthState::AtRisk => "at_risk",
            HealthState::Orphan => "orphan",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single health determination with its reason string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub reason: String,
}

/// A system-flagged candidate conflict between two memories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictReport {
    pub a_id: MemoryId,
    pub b_id: MemoryId,
    pub overlap: f32,
    pub shared_concepts: Vec<String>,
    pub reason: String,
}

/// Tunables for health/conflict determination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurationConfig {
    pub stale_threshold_days: i64,
    pub conflict_overlap_threshold: f32,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            stale_threshold_days: 90,
            conflict_overlap_threshold: 0.60,
        }
    }
}

fn days_since_access(memory: &Memory, now: chrono::DateTime<Utc>) -> i64 {
    let reference = memory.last_accessed_at.unwrap_or(memory.created_at);
    (now - reference).num_days()
}

/// Number of graph edges touching this memory's node key, as produced by the
/// same scheme the snapshot generator uses (`mem:<id>`).
fn connection_count(memory_id: MemoryId, graph: &dyn GraphStore) -> usize {
    graph.query(&format!("mem:{memory_id}"), None).map(|edges| edges.len()).unwrap_or(0)
}

/// Determine a single memory's health, in priority order: supersession,
/// unresolved conflicts, staleness, then orphan status. Deterministic: for
/// identical `(superseded_by_id, potential_conflicts, days_since_access,
/// connection_count)` the output is bit-identical across calls.
pub fn determine_health(memory: &Memory, graph: &dyn GraphStore, config: &CurationConfig, now: chrono::DateTime<Utc>) -> HealthReport {
    if memory.superseded_by_id.is_some() {
        return HealthReport {
            state: HealthState::AtRisk,
            reason: "superseded by newer memory".to_string(),
        };
    }

    if !memory.potential_conflicts.is_empty() {
        return HealthReport {
            state: HealthState::AtRisk,
            reason: format!("{} unresolved potential conflicts", memory.potential_conflicts.len()),
        };
    }

    let days = days_since_access(memory, now);
    if days > config.stale_threshold_days {
        return HealthReport {
            state: HealthState::Stale,
            reason: format!("not accessed in {days} days"),
        };
    }

    if connection_count(memory.id, graph) == 0 {
        return HealthReport {
            state: HealthState::Orphan,
            reason: "no graph connections".to_string(),
        };
    }

    HealthReport {
        state: HealthState::Healthy,
        reason: "no risk signals".to_string(),
    }
}

fn jaccard_overlap(a: &[String], b: &[String]) -> (f32, Vec<String>) {
    let set_a: std::collections::HashSet<&String> = a.iter().collect();
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection: Vec<String> = set_a.intersection(&set_b).map(|s| s.to_string()).collect();
    if intersection.is_empty() {
        return (0.0, Vec::new());
    }
    let union = set_a.union(&set_b).count();
    (intersection.len() as f32 / union as f32, intersection)
}

/// Scan every unordered pair of memories for a same-domain, high-overlap
/// conflict candidate. Symmetric by construction (each unordered pair is
/// visited once); soft-flag only — never mutates `contradicts`.
pub fn detect_potential_conflicts(memories: &[Memory], config: &CurationConfig) -> Vec<ConflictReport> {
    let mut reports = Vec::new();

    for i in 0..memories.len() {
        for j in (i + 1)..memories.len() {
            let a = &memories[i];
            let b = &memories[j];

            if canonicalize(&a.domain) != canonicalize(&b.domain) {
                continue;
            }
            if a.concepts.is_empty() || b.concepts.is_empty() {
                continue;
            }

            let (overlap, mut shared) = jaccard_overlap(&a.concepts, &b.concepts);
            if overlap < config.conflict_overlap_threshold {
                continue;
            }

            shared.sort();
            shared.truncate(3);
            reports.push(ConflictReport {
                a_id: a.id,
                b_id: b.id,
                overlap,
                shared_concepts: shared,
                reason: format!("{:.0}% concept overlap in domain {}", overlap * 100.0, canonicalize(&a.domain)),
            });
        }
    }

    reports
}

/// Batch operation: one pass assigns health to every memory, one pass emits
/// conflict candidates. O(n) health, O(n^2) naive pairwise conflict scan.
pub fn analyze_all(
    memories: &[Memory],
    graph: &dyn GraphStore,
    config: &CurationConfig,
) -> (HashMap<MemoryId, HealthReport>, Vec<ConflictReport>) {
    let now = Utc::now();
    let health = memories
        .iter()
        .map(|m| (m.id, determine_health(m, graph, config, now)))
        .collect();
    let conflicts = detect_potential_conflicts(memories, config);
    (health, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::graph_store::{DirGraphStore, Edge};
    use std::collections::HashMap as StdHashMap;

    fn memory(id: MemoryId, domain: &str, concepts: Vec<String>) -> Memory {
        Memory {
            id,
            content: "c".into(),
            memory_type: crate::types::MemoryType::Note,
            tags: vec![],
            metadata: StdHashMap::new(),
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
            surfaces_when: vec![],
            authority_score: 0.5,
            superseded_by_id: None,
            contradicts: Default::default(),
            potential_conflicts: Default::default(),
        }
    }

    #[test]
    fn superseded_memory_is_at_risk_regardless_of_other_signals() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let mut m = memory(1, "general", vec![]);
        m.superseded_by_id = Some(2);
        let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
        assert_eq!(report.state, HealthState::AtRisk);
    }

    #[test]
    fn unresolved_conflicts_outrank_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let mut m = memory(1, "general", vec![]);
        m.potential_conflicts = [2i64].into_iter().collect();
        m.last_accessed_at = Some(Utc::now() - chrono::Duration::days(200));
        let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
        assert_eq!(report.state, HealthState::AtRisk);
    }

    #[test]
    fn stale_beats_orphan_when_both_apply() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let mut m = memory(1, "general", vec![]);
        m.last_accessed_at = Some(Utc::now() - chrono::Duration::days(200));
        let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
        assert_eq!(report.state, HealthState::Stale);
    }

    #[test]
    fn connected_recent_memory_with_no_risk_signals_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        graph
            .upsert_edge(Edge { from: "mem:1".into(), to: "ent:1".into(), edge_type: "SHARES_CONCEPT".into(), properties: StdHashMap::new() })
            .unwrap();
        let m = memory(1, "general", vec![]);
        let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
        assert_eq!(report.state, HealthState::Healthy);
    }

    #[test]
    fn disconnected_recent_memory_is_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let m = memory(1, "general", vec![]);
        let report = determine_health(&m, &graph, &CurationConfig::default(), Utc::now());
        assert_eq!(report.state, HealthState::Orphan);
    }

    #[test]
    fn conflict_detection_is_symmetric() {
        let a = memory(1, "project", vec!["auth".into(), "billing".into()]);
        let b = memory(2, "project", vec!["auth".into(), "billing".into(), "extra".into()]);
        let forward = detect_potential_conflicts(&[a.clone(), b.clone()], &CurationConfig::default());
        let backward = detect_potential_conflicts(&[b, a], &CurationConfig::default());
        assert_eq!(forward.len(), backward.len());
        assert_eq!(forward.len(), 1);
    }

    #[test]
    fn different_domains_never_conflict() {
        let a = memory(1, "project", vec!["auth".into()]);
        let b = memory(2, "billing", vec!["auth".into()]);
        let reports = detect_potential_conflicts(&[a, b], &CurationConfig::default());
        assert!(reports.is_empty());
    }

    #[test]
    fn below_threshold_overlap_is_not_flagged() {
        let a = memory(1, "project", vec!["auth".into(), "billing".into(), "ui".into(), "api".into()]);
        let b = memory(2, "project", vec!["auth".into()]);
        let reports = detect_potential_conflicts(&[a, b], &CurationConfig::default());
        assert!(reports.is_empty());
    }

    #[test]
    fn threshold_monotonicity_lower_threshold_flags_a_superset() {
        let a = memory(1, "project", vec!["auth".into(), "billing".into()]);
        let b = memory(2, "project", vec!["auth".into()]);

        let strict = CurationConfig { conflict_overlap_threshold: 0.9, ..Default::default() };
        let loose = CurationConfig { conflict_overlap_threshold: 0.4, ..Default::default() };

        let strict_flags = detect_potential_conflicts(&[a.clone(), b.clone()], &strict);
        let loose_flags = detect_potential_conflicts(&[a, b], &loose);
        assert!(strict_flags.len() <= loose_flags.len());
    }
}
