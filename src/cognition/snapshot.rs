//! Immutable curation snapshot: the sole read source for dashboard-style
//! consumers. Live graph queries from such consumers are forbidden by
//! design — they read this file instead.
//!
//! Schema and the accompanying static HTML viewer are grounded on
//! `graph::KnowledgeGraph::to_visjs_json`/`to_html`, adapted from a pure
//! in-memory graph view to a generator that writes a JSON document to disk.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};

use crate::cognition::curation::{analyze_all, CurationConfig};
use crate::cognition::graph_store::GraphStore;
use crate::error::{ElefanteError, Result};
use crate::types::Memory;

/// Build the snapshot document for `memories` and the current graph state.
/// Must only be called while holding the graph store's write lock for the
/// duration of the read, per the concurrency model's "generate only when no
/// write is in flight" rule; the lock itself is the caller's responsibility
/// (the `DirGraphStore` handle already serializes writers).
pub fn build_snapshot(memories: &[Memory], graph: &dyn GraphStore, config: &CurationConfig) -> Result<Value> {
    let (health, conflicts) = analyze_all(memories, graph, config);

    let conflicts_by_memory: HashMap<i64, Vec<i64>> = {
        let mut map: HashMap<i64, Vec<i64>> = HashMap::new();
        for c in &conflicts {
            map.entry(c.a_id).or_default().push(c.b_id);
            map.entry(c.b_id).or_default().push(c.a_id);
        }
        map
    };

    let nodes: Vec<Value> = memories
        .iter()
        .map(|m| {
            let report = health.get(&m.id);
            json!({
                "id": format!("mem:{}", m.id),
                "type": "memory",
                "properties": {
                    "title": m.content.chars().take(80).collect::<String>(),
                    "concepts": serde_json::to_string(&m.concepts).unwrap_or_else(|_| "[]".to_string()),
                    "surfaces_when": serde_json::to_string(&m.surfaces_when).unwrap_or_else(|_| "[]".to_string()),
                    "authority_score": m.authority_score,
                    "health": report.map(|r| r.state.as_str()).unwrap_or("healthy"),
                    "potential_conflicts": conflicts_by_memory.get(&m.id).cloned().unwrap_or_default(),
                }
            })
        })
        .collect();

    let conflict_edges: Vec<Value> = conflicts
        .iter()
        .map(|c| {
            json!({
                "src": format!("mem:{}", c.a_id),
                "dst": format!("mem:{}", c.b_id),
                "type": "POTENTIAL_CONFLICT",
                "style": "dashed",
            })
        })
        .collect();

    let total_edges = graph.count_edges().unwrap_or(0);

    Ok(json!({
        "generated_at": Utc::now().to_rfc3339(),
        "stats": {
            "total_memories": memories.len(),
            "total_edges": total_edges,
            "total_conflicts": conflicts.len(),
        },
        "nodes": nodes,
        "edges": conflict_edges,
    }))
}

/// Write the snapshot to `path` as pretty JSON.
pub fn write_snapshot(memories: &[Memory], graph: &dyn GraphStore, config: &CurationConfig, path: impl AsRef<Path>) -> Result<()> {
    let snapshot = build_snapshot(memories, graph, config)?;
    let rendered = serde_json::to_string_pretty(&snapshot).map_err(|e| ElefanteError::Serialization(e.to_string()))?;
    fs::write(path, rendered).map_err(|e| ElefanteError::Io(e.to_string()))?;
    Ok(())
}

/// Render a minimal static HTML viewer over an already-written snapshot file.
/// Reads only from the snapshot, never from a live graph store.
pub fn to_html(snapshot: &Value) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Elefante Memory Snapshot</title>
    <script type="text/javascript" src="https://unpkg.com/vis-network/standalone/umd/vis-network.min.js"></script>
    <style>
        body {{ margin: 0; padding: 0; font-family: system-ui, sans-serif; }}
        #graph {{ width: 100vw; height: 100vh; }}
    </style>
</head>
<body>
    <div id="graph"></div>
    <script type="text/javascript">
        const snapshot = {snapshot};
        const nodes = new vis.DataSet(snapshot.nodes.map(n => ({{
            id: n.id,
            label: n.properties.title,
            group: n.properties.health,
        }})));
        const edges = new vis.DataSet(snapshot.edges.map(e => ({{
            from: e.src, to: e.dst, dashes: e.type === "POTENTIAL_CONFLICT",
        }})));
        new vis.Network(document.getElementById('graph'), {{ nodes, edges }}, {{}});
    </script>
</body>
</html>"#,
        snapshot = snapshot
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::graph_store::DirGraphStore;

    fn memory(id: i64) -> Memory {
        Memory {
            id,
            content: "some content".into(),
            memory_type: crate::types::MemoryType::Note,
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
            domain: "general".into(),
            layer: Default::default(),
            sublayer: String::new(),
            concepts: vec!["auth".into()],
            surfaces_when: vec![],
            authority_score: 0.5,
            superseded_by_id: None,
            contradicts: Default::default(),
            potential_conflicts: Default::default(),
        }
    }

    #[test]
    fn snapshot_has_required_top_level_keys() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let memories = vec![memory(1), memory(2)];
        let snapshot = build_snapshot(&memories, &graph, &CurationConfig::default()).unwrap();

        assert!(snapshot.get("generated_at").is_some());
        assert!(snapshot.get("stats").is_some());
        assert!(snapshot.get("nodes").unwrap().as_array().unwrap().len() == 2);
        assert!(snapshot.get("edges").is_some());
    }

    #[test]
    fn node_properties_carry_health_and_concepts() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let memories = vec![memory(1)];
        let snapshot = build_snapshot(&memories, &graph, &CurationConfig::default()).unwrap();

        let node = &snapshot["nodes"][0];
        assert_eq!(node["type"], "memory");
        assert!(node["properties"]["health"].is_string());
        assert!(node["properties"]["concepts"].as_str().unwrap().contains("auth"));
    }

    #[test]
    fn write_snapshot_produces_a_readable_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DirGraphStore::open(dir.path().join("g")).unwrap();
        let path = dir.path().join("snapshot.json");
        write_snapshot(&[memory(1)], &graph, &CurationConfig::default(), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&contents).unwrap();
        assert!(parsed.get("nodes").is_some());
    }
}
