//! Bridges the typed cognitive fields on [`crate::types::Memory`] to the
//! primitive-only metadata shape accepted by the vector index (and, for this
//! repo's SQLite backend, the same free-form `metadata` JSON column that
//! already stores arbitrary memory metadata).
//!
//! Every function here is total: a memory with unparseable or legacy
//! cognitive metadata decodes to safe defaults instead of raising. The only
//! effect of a bad encoding is a `tracing::warn!` log line, per the design
//! note that decode failures are "logged but not surfaced as an error."

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::cognition::canonical::{canonicalize, canonicalize_unique};
use crate::types::{CreateMemoryInput, Layer, Memory, MemoryId, UpdateMemoryInput};

pub const KEY_CONCEPTS: &str = "concepts";
pub const KEY_SURFACES_WHEN: &str = "surfaces_when";
pub const KEY_AUTHORITY_SCORE: &str = "authority_score";
pub const KEY_DOMAIN: &str = "domain";
pub const KEY_LAYER: &str = "layer";
pub const KEY_SUBLAYER: &str = "sublayer";
pub const KEY_SUPERSEDED_BY_ID: &str = "superseded_by_id";
pub const KEY_CONTRADICTS: &str = "contradicts";
pub const KEY_POTENTIAL_CONFLICTS: &str = "potential_conflicts";
/// Legacy/overflow container checked only after the top-level key is absent.
/// Top-level typed keys always take precedence and are never shadowed.
pub const KEY_CUSTOM_METADATA: &str = "custom_metadata";

const DEFAULT_AUTHORITY_SCORE: f32 = 0.5;

/// Decoded view of every cognitive field carried by a primitive metadata map.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCognitiveFields {
    pub concepts: Vec<String>,
    pub surfaces_when: Vec<String>,
    pub authority_score: f32,
    pub domain: String,
    pub layer: Layer,
    pub sublayer: String,
    pub superseded_by_id: Option<MemoryId>,
    pub contradicts: HashSet<MemoryId>,
    pub potential_conflicts: HashSet<MemoryId>,
}

impl Default for DecodedCognitiveFields {
    fn default() -> Self {
        Self {
            concepts: Vec::new(),
            surfaces_when: Vec::new(),
            authority_score: DEFAULT_AUTHORITY_SCORE,
            domain: "general".to_string(),
            layer: Layer::default(),
            sublayer: String::new(),
            superseded_by_id: None,
            contradicts: HashSet::new(),
            potential_conflicts: HashSet::new(),
        }
    }
}

/// Back-compatible parser for a concepts/surfaces_when-shaped value.
///
/// 1. Already a list/array of primitives: cast each element to a string.
/// 2. A string starting with `[`: try JSON parse, then a permissive
///    list-literal parse (handles Python-style `['a', 'b']`).
/// 3. A string containing a comma: split on commas.
/// 4. Otherwise: a single-element list.
/// 5. Any parse exception yields `[]` — this function never raises.
pub fn parse_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(value_to_plain_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            if trimmed.starts_with('[') {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
                    return items
                        .iter()
                        .map(value_to_plain_string)
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                return parse_permissive_list_literal(trimmed);
            }
            if trimmed.contains(',') {
                return trimmed
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            vec![trimmed.to_string()]
        }
        Value::Null => Vec::new(),
        other => vec![value_to_plain_string(other)].into_iter().filter(|s| !s.is_empty()).collect(),
    }
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Permissive parse of a Python-style list literal, e.g. `['a', "b", c]`.
/// Never raises: malformed input yields an empty list.
fn parse_permissive_list_literal(s: &str) -> Vec<String> {
    let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|item| {
            item.trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn lookup<'a>(metadata: &'a HashMap<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = metadata.get(key) {
        return Some(v);
    }
    metadata
        .get(KEY_CUSTOM_METADATA)
        .and_then(|custom| custom.get(key))
}

fn decode_list_field(metadata: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match lookup(metadata, key) {
        Some(value) => canonicalize_unique(parse_string_list(value)),
        None => Vec::new(),
    }
}

fn decode_authority_score(metadata: &HashMap<String, Value>) -> f32 {
    let raw = match lookup(metadata, KEY_AUTHORITY_SCORE) {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    raw.map(|v| v.clamp(0.0, 1.0)).unwrap_or(DEFAULT_AUTHORITY_SCORE)
}

fn decode_id_set(metadata: &HashMap<String, Value>, key: &str) -> HashSet<MemoryId> {
    match lookup(metadata, key) {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_i64()).collect(),
        _ => HashSet::new(),
    }
}

/// Decode every cognitive field from a primitive metadata map. Total: never
/// panics, never returns `Result`. Unparseable input degrades to the
/// documented defaults (empty concepts/surfaces, authority 0.5, domain
/// "general").
pub fn decode_cognitive_fields(metadata: &HashMap<String, Value>) -> DecodedCognitiveFields {
    let domain = match lookup(metadata, KEY_DOMAIN) {
        Some(Value::String(s)) => {
            let canon = crate::cognition::canonical::canonicalize(s);
            if canon.is_empty() {
                "general".to_string()
            } else {
                canon
            }
        }
        _ => "general".to_string(),
    };

    let layer = match lookup(metadata, KEY_LAYER).and_then(|v| v.as_str()) {
        Some(s) => s.parse().unwrap_or_default(),
        None => Layer::default(),
    };

    let sublayer = match lookup(metadata, KEY_SUBLAYER).and_then(|v| v.as_str()) {
        Some(s) => crate::cognition::canonical::canonicalize(s),
        None => String::new(),
    };

    let superseded_by_id = lookup(metadata, KEY_SUPERSEDED_BY_ID).and_then(|v| v.as_i64());

    DecodedCognitiveFields {
        concepts: decode_list_field(metadata, KEY_CONCEPTS),
        surfaces_when: decode_list_field(metadata, KEY_SURFACES_WHEN),
        authority_score: decode_authority_score(metadata),
        domain,
        layer,
        sublayer,
        superseded_by_id,
        contradicts: decode_id_set(metadata, KEY_CONTRADICTS),
        potential_conflicts: decode_id_set(metadata, KEY_POTENTIAL_CONFLICTS),
    }
}

/// Encode a memory's typed cognitive fields into the primitive shape the
/// vector index (and the SQLite metadata column) accepts. Top-level typed
/// keys always win; callers must merge this map over — never under — any
/// user-supplied free-form metadata so that `custom_metadata` can never
/// shadow a typed field.
pub fn encode_cognitive_fields(memory: &Memory) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    out.insert(
        KEY_CONCEPTS.to_string(),
        Value::Array(memory.concepts.iter().cloned().map(Value::String).collect()),
    );
    out.insert(
        KEY_SURFACES_WHEN.to_string(),
        Value::Array(
            memory
                .surfaces_when
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    out.insert(
        KEY_AUTHORITY_SCORE.to_string(),
        serde_json::json!(memory.authority_score.clamp(0.0, 1.0)),
    );
    out.insert(KEY_DOMAIN.to_string(), Value::String(memory.domain.clone()));
    out.insert(
        KEY_LAYER.to_string(),
        Value::String(memory.layer.as_str().to_string()),
    );
    out.insert(
        KEY_SUBLAYER.to_string(),
        Value::String(memory.sublayer.clone()),
    );
    if let Some(id) = memory.superseded_by_id {
        out.insert(KEY_SUPERSEDED_BY_ID.to_string(), serde_json::json!(id));
    }
    out.insert(
        KEY_CONTRADICTS.to_string(),
        Value::Array(memory.contradicts.iter().copied().map(|id| serde_json::json!(id)).collect()),
    );
    out.insert(
        KEY_POTENTIAL_CONFLICTS.to_string(),
        Value::Array(
            memory
                .potential_conflicts
                .iter()
                .copied()
                .map(|id| serde_json::json!(id))
                .collect(),
        ),
    );
    out
}

/// Merge typed cognitive fields over a user-supplied metadata map, honoring
/// the "typed fields take precedence" rule: any `custom_metadata` sub-object
/// in `base` keeps its place but can never override a top-level typed key.
pub fn merge_cognitive_fields_onto(
    base: &HashMap<String, Value>,
    memory: &Memory,
) -> HashMap<String, Value> {
    let mut merged = base.clone();
    for (key, value) in encode_cognitive_fields(memory) {
        merged.insert(key, value);
    }
    merged
}

/// Merge a create-input's cognitive fields over `base`, the same
/// typed-fields-win rule `merge_cognitive_fields_onto` applies for a full
/// [`Memory`]. Used at insert time, before a `Memory`/row exists yet.
pub fn merge_create_input_onto(base: &HashMap<String, Value>, input: &CreateMemoryInput) -> HashMap<String, Value> {
    let mut merged = base.clone();

    let domain = input
        .domain
        .as_deref()
        .map(canonicalize)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "general".to_string());
    merged.insert(KEY_DOMAIN.to_string(), Value::String(domain));
    merged.insert(KEY_LAYER.to_string(), Value::String(input.layer.as_str().to_string()));
    merged.insert(KEY_SUBLAYER.to_string(), Value::String(canonicalize(&input.sublayer)));
    merged.insert(
        KEY_CONCEPTS.to_string(),
        Value::Array(canonicalize_unique(input.concepts.iter()).into_iter().map(Value::String).collect()),
    );
    merged.insert(
        KEY_SURFACES_WHEN.to_string(),
        Value::Array(canonicalize_unique(input.surfaces_when.iter()).into_iter().map(Value::String).collect()),
    );
    merged.insert(
        KEY_AUTHORITY_SCORE.to_string(),
        serde_json::json!(input.authority_score.unwrap_or(DEFAULT_AUTHORITY_SCORE).clamp(0.0, 1.0)),
    );

    merged
}

/// Apply an update-input's cognitive field changes over `base` (an existing
/// memory's already-decoded metadata map), leaving fields the update didn't
/// touch untouched.
pub fn merge_update_input_onto(base: &HashMap<String, Value>, input: &UpdateMemoryInput) -> HashMap<String, Value> {
    let mut merged = base.clone();

    if let Some(concepts) = &input.concepts {
        merged.insert(
            KEY_CONCEPTS.to_string(),
            Value::Array(canonicalize_unique(concepts.iter()).into_iter().map(Value::String).collect()),
        );
    }
    if let Some(surfaces_when) = &input.surfaces_when {
        merged.insert(
            KEY_SURFACES_WHEN.to_string(),
            Value::Array(canonicalize_unique(surfaces_when.iter()).into_iter().map(Value::String).collect()),
        );
    }
    if let Some(authority_score) = input.authority_score {
        merged.insert(KEY_AUTHORITY_SCORE.to_string(), serde_json::json!(authority_score.clamp(0.0, 1.0)));
    }
    if let Some(superseded_by_id) = input.superseded_by_id {
        match superseded_by_id {
            Some(id) => {
                merged.insert(KEY_SUPERSEDED_BY_ID.to_string(), serde_json::json!(id));
            }
            None => {
                merged.remove(KEY_SUPERSEDED_BY_ID);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryType;
    use chrono::Utc;

    fn sample_memory() -> Memory {
        Memory {
            id: 1,
            content: "content".into(),
            memory_type: MemoryType::Note,
            tags: vec![],
            metadata: HashMap::new(),
            importance: 0.5,
            access_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_accessed_at: None,
            owner_id: None,
            visibility: Default::default(),
            scope: Default::default(),
            workspace: "default".into(),
            tier: Default::default(),
            version: 1,
            has_embedding: false,
            expires_at: None,
            content_hash: None,
            event_time: None,
            event_duration_seconds: None,
            trigger_pattern: None,
            procedure_success_count: 0,
            procedure_failure_count: 0,
            summary_of_id: None,
            lifecycle_state: Default::default(),
            domain: "project".into(),
            layer: Layer::World,
            sublayer: "infra".into(),
            concepts: vec!["user approval".into(), "quality".into()],
            surfaces_when: vec!["on deploy".into()],
            authority_score: 0.8,
            superseded_by_id: None,
            contradicts: HashSet::new(),
            potential_conflicts: [2i64].into_iter().collect(),
        }
    }

    #[test]
    fn round_trip_preserves_cognitive_fields() {
        let memory = sample_memory();
        let encoded = encode_cognitive_fields(&memory);
        let decoded = decode_cognitive_fields(&encoded);

        assert_eq!(decoded.concepts, memory.concepts);
        assert_eq!(decoded.surfaces_when, memory.surfaces_when);
        assert!((decoded.authority_score - memory.authority_score).abs() < 1e-6);
        assert_eq!(decoded.domain, memory.domain);
        assert_eq!(decoded.layer, memory.layer);
        assert_eq!(decoded.sublayer, memory.sublayer);
        assert_eq!(decoded.superseded_by_id, memory.superseded_by_id);
        assert_eq!(decoded.contradicts, memory.contradicts);
        assert_eq!(decoded.potential_conflicts, memory.potential_conflicts);
    }

    #[test]
    fn parse_string_list_never_raises() {
        let cases = [
            Value::String("[\"a\", \"b\"]".to_string()),
            Value::String("['a', 'b', 'c']".to_string()),
            Value::String("a, b, c".to_string()),
            Value::String("single".to_string()),
            Value::String("[not json or list".to_string()),
            Value::String("".to_string()),
            Value::Null,
            Value::Array(vec![Value::String("x".into()), Value::Number(1.into())]),
        ];
        for case in cases {
            // Must not panic for any input shape.
            let _ = parse_string_list(&case);
        }
    }

    #[test]
    fn legacy_python_list_literal_decodes() {
        let value = Value::String("['elefante', 'config', 'paths']".to_string());
        let parsed = parse_string_list(&value);
        assert_eq!(parsed, vec!["elefante", "config", "paths"]);
    }

    #[test]
    fn comma_separated_string_splits() {
        let value = Value::String("a, b,c".to_string());
        assert_eq!(parse_string_list(&value), vec!["a", "b", "c"]);
    }

    #[test]
    fn malformed_bracketed_string_yields_best_effort_not_panic() {
        let value = Value::String("[a, b".to_string());
        // No panic; permissive literal parse strips the lone leading bracket.
        let parsed = parse_string_list(&value);
        assert_eq!(parsed, vec!["a", "b"]);
    }

    #[test]
    fn missing_authority_score_defaults_to_half() {
        let metadata = HashMap::new();
        let decoded = decode_cognitive_fields(&metadata);
        assert_eq!(decoded.authority_score, 0.5);
    }

    #[test]
    fn out_of_range_authority_score_is_clamped() {
        let mut metadata = HashMap::new();
        metadata.insert(KEY_AUTHORITY_SCORE.to_string(), serde_json::json!(5.0));
        let decoded = decode_cognitive_fields(&metadata);
        assert_eq!(decoded.authority_score, 1.0);
    }

    #[test]
    fn custom_metadata_never_shadows_top_level_typed_key() {
        let mut metadata = HashMap::new();
        metadata.insert(KEY_DOMAIN.to_string(), Value::String("project".to_string()));
        metadata.insert(
            KEY_CUSTOM_METADATA.to_string(),
            serde_json::json!({ "domain": "general" }),
        );
        let decoded = decode_cognitive_fields(&metadata);
        assert_eq!(decoded.domain, "project");
    }

    #[test]
    fn falls_back_to_custom_metadata_when_top_level_absent() {
        let mut metadata = HashMap::new();
        metadata.insert(
            KEY_CUSTOM_METADATA.to_string(),
            serde_json::json!({ "domain": "billing" }),
        );
        let decoded = decode_cognitive_fields(&metadata);
        assert_eq!(decoded.domain, "billing");
    }
}
