//! Cognitive Retrieval and Curation Engine.
//!
//! Six cooperating components rank memories for a query, explain why each
//! surfaced, proactively surface memories from ambient context, and assign
//! health/conflict states batch-wide. Dependency order, leaves first:
//!
//! 1. [`canonical`] — deterministic label normalization, shared by every
//!    other module.
//! 2. [`metadata_codec`] — bridges typed cognitive fields to the
//!    primitive-only metadata shape the vector index and SQLite's metadata
//!    column both accept.
//! 3. [`assembler`] — produces a bounded, hydrated candidate set from the
//!    vector index for a [`query_analysis::QueryAnalysis`].
//! 4. [`scorer`] — rates candidates on six weighted signals and builds an
//!    explanation per result.
//! 5. [`proactive`] — answers "what matters right now" from ambient context
//!    rather than an explicit query, reusing the scorer behind pre-filter
//!    gates.
//! 6. [`curation`] — batch-assigns health states and emits soft-flagged
//!    conflict candidates from memory attributes alone.
//!
//! [`vector_index`] and [`graph_store`] are the external collaborators these
//! components consume; [`snapshot`] is the curation analyzer's disk output,
//! the only read path a dashboard-style consumer is allowed to use.

pub mod assembler;
pub mod canonical;
pub mod curation;
pub mod graph_store;
pub mod metadata_codec;
pub mod proactive;
pub mod query_analysis;
pub mod scorer;
pub mod snapshot;
pub mod vector_index;

pub use assembler::{assemble, Candidate};
pub use curation::{analyze_all, detect_potential_conflicts, determine_health, ConflictReport, CurationConfig, HealthReport, HealthState};
pub use graph_store::{DirGraphStore, Edge, Entity, GraphStore};
pub use proactive::{suggest, ProactiveContext};
pub use query_analysis::{analyze_query, HeuristicIntentClassifier, Intent, IntentClassifier, QueryAnalysis};
pub use scorer::{rank, score_candidate, Explanation, ScorerConfig, SignalExplanation, SignalWeights};
pub use vector_index::{InMemoryVectorIndex, VectorIndex};

/// Top-level configuration for the cognition engine, gathering the tunables
/// scattered across the individual component configs into one value
/// suitable for loading from the server's config layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CognitionConfig {
    pub scorer: ScorerConfig,
    pub curation: CurationConfig,
    /// Jaccard threshold above which a query/memory concept set trigger gate
    /// fires in the proactive surfacer.
    pub proactive_concept_trigger_threshold: f32,
}

impl Default for CognitionConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            curation: CurationConfig::default(),
            proactive_concept_trigger_threshold: 0.3,
        }
    }
}
