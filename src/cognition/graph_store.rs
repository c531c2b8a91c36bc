//! The graph store external collaborator (`spec.md` §6 and §9): entities and
//! typed edges connecting memories and concepts, persisted so that both the
//! Candidate Assembler (optional graph restriction) and the Curation
//! Analyzer (conflict/health context) can query it.
//!
//! The reference implementation is directory-based rather than a single
//! file: the backend requires a directory containing a lock file (held for
//! the process lifetime, mirroring `storage::connection::Storage`'s
//! connection guard) and an append-only write-ahead log that is replayed on
//! open to rebuild the in-memory index. The initializer never pre-creates
//! the directory itself and never accepts a path that already exists as a
//! non-directory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cognition::canonical::canonicalize;
use crate::error::{ElefanteError, Result};

/// An entity node: people, projects, concepts, or anything else the graph
/// connects memories through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub name: String,
    pub entity_type: String,
    pub properties: HashMap<String, Value>,
}

/// A directed, typed edge between two nodes (memory or entity ids, addressed
/// by caller-assigned string keys so the graph does not need to know the
/// difference between a `MemoryId` and an `Entity::id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    pub properties: HashMap<String, Value>,
}

/// Graph operations the cognition engine needs, mirroring the
/// `upsert`/`query`/`count` shape of [`crate::cognition::vector_index::VectorIndex`].
pub trait GraphStore: Send + Sync {
    /// Create or fetch an entity. Identity is keyed on
    /// `(canonicalize(name), entity_type)`: calling this twice with names
    /// that canonicalize equal and the same type returns the same id.
    fn upsert_entity(&self, name: &str, entity_type: &str, properties: HashMap<String, Value>) -> Result<Entity>;

    /// Insert an edge. Duplicate `(from, to, edge_type)` triples replace the
    /// prior properties rather than creating a second edge.
    fn upsert_edge(&self, edge: Edge) -> Result<()>;

    /// Return all edges touching `node_key` (as either endpoint), optionally
    /// restricted to `edge_type`.
    fn query(&self, node_key: &str, edge_type: Option<&str>) -> Result<Vec<Edge>>;

    /// Total number of distinct edges stored.
    fn count_edges(&self) -> Result<usize>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum WalRecord {
    Entity(Entity),
    Edge(Edge),
}

struct GraphState {
    entities_by_key: HashMap<(String, String), u64>,
    entities_by_id: HashMap<u64, Entity>,
    edges: HashMap<(String, String, String), Edge>,
    next_id: u64,
}

impl GraphState {
    fn new() -> Self {
        Self {
            entities_by_key: HashMap::new(),
            entities_by_id: HashMap::new(),
            edges: HashMap::new(),
            next_id: 1,
        }
    }

    fn apply(&mut self, record: WalRecord) {
        match record {
            WalRecord::Entity(entity) => {
                let key = (canonicalize(&entity.name), entity.entity_type.clone());
                self.entities_by_key.insert(key, entity.id);
                self.next_id = self.next_id.max(entity.id + 1);
                self.entities_by_id.insert(entity.id, entity);
            }
            WalRecord::Edge(edge) => {
                let key = (edge.from.clone(), edge.to.clone(), edge.edge_type.clone());
                self.edges.insert(key, edge);
            }
        }
    }
}

/// Directory-based reference implementation. Layout:
/// `<base>/elefante.lock` (held exclusively for the process lifetime) and
/// `<base>/wal.jsonl` (newline-delimited JSON, append-only, replayed on open).
pub struct DirGraphStore {
    base: PathBuf,
    wal: Mutex<File>,
    state: Mutex<GraphState>,
    _lock: File,
}

impl DirGraphStore {
    /// Open (creating if absent) a graph store rooted at `base`. `base` must
    /// either not exist yet (it is created as a directory) or already be a
    /// directory; a pre-existing non-directory path is a `DataIntegrity`
    /// error.
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref().to_path_buf();

        if base.exists() && !base.is_dir() {
            return Err(ElefanteError::DataIntegrity(format!(
                "graph store path {} exists and is not a directory",
                base.display()
            )));
        }
        fs::create_dir_all(&base).map_err(|e| ElefanteError::Io(e.to_string()))?;

        let lock_path = base.join("elefante.lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| ElefanteError::Io(e.to_string()))?;
        lock.try_lock_exclusive()
            .map_err(|_| ElefanteError::BackendUnavailable("graph store directory is locked by another process".to_string()))?;

        let wal_path = base.join("wal.jsonl");
        let mut state = GraphState::new();
        if wal_path.exists() {
            let reader = BufReader::new(File::open(&wal_path).map_err(|e| ElefanteError::Io(e.to_string()))?);
            for line in reader.lines() {
                let line = line.map_err(|e| ElefanteError::Io(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: WalRecord = serde_json::from_str(&line)
                    .map_err(|e| ElefanteError::DataIntegrity(format!("corrupt graph WAL entry: {e}")))?;
                state.apply(record);
            }
        }

        let wal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| ElefanteError::Io(e.to_string()))?;

        Ok(Self {
            base,
            wal: Mutex::new(wal),
            state: Mutex::new(state),
            _lock: lock,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn append(&self, record: &WalRecord) -> Result<()> {
        let line = serde_json::to_string(record).map_err(|e| ElefanteError::Serialization(e.to_string()))?;
        let mut wal = self.wal.lock();
        writeln!(wal, "{line}").map_err(|e| ElefanteError::Io(e.to_string()))?;
        wal.flush().map_err(|e| ElefanteError::Io(e.to_string()))?;
        Ok(())
    }
}

impl GraphStore for DirGraphStore {
    fn upsert_entity(&self, name: &str, entity_type: &str, properties: HashMap<String, Value>) -> Result<Entity> {
        let key = (canonicalize(name), entity_type.to_string());
        let mut state = self.state.lock();

        if let Some(existing_id) = state.entities_by_key.get(&key).copied() {
            let mut entity = state.entities_by_id.get(&existing_id).cloned().expect("indexed entity must exist");
            if properties.is_empty() {
                return Ok(entity);
            }
            entity.properties.extend(properties);
            state.entities_by_id.insert(existing_id, entity.clone());
            drop(state);

            self.append(&WalRecord::Entity(entity.clone()))?;
            return Ok(entity);
        }

        let id = state.next_id;
        let entity = Entity {
            id,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            properties,
        };
        state.next_id += 1;
        state.entities_by_key.insert(key, id);
        state.entities_by_id.insert(id, entity.clone());
        drop(state);

        self.append(&WalRecord::Entity(entity.clone()))?;
        Ok(entity)
    }

    fn upsert_edge(&self, edge: Edge) -> Result<()> {
        let mut state = self.state.lock();
        let key = (edge.from.clone(), edge.to.clone(), edge.edge_type.clone());
        state.edges.insert(key, edge.clone());
        drop(state);

        self.append(&WalRecord::Edge(edge))
    }

    fn query(&self, node_key: &str, edge_type: Option<&str>) -> Result<Vec<Edge>> {
        let state = self.state.lock();
        Ok(state
            .edges
            .values()
            .filter(|e| e.from == node_key || e.to == node_key)
            .filter(|e| edge_type.map(|t| e.edge_type == t).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn count_edges(&self) -> Result<usize> {
        Ok(self.state.lock().edges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: &str, to: &str, edge_type: &str) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
            edge_type: edge_type.to_string(),
            properties: HashMap::new(),
        }
    }

    #[test]
    fn entity_upsert_is_idempotent_on_canonical_name_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirGraphStore::open(dir.path().join("graph")).unwrap();

        let a = store.upsert_entity("User Approval", "concept", HashMap::new()).unwrap();
        let b = store.upsert_entity("user  approval", "concept", HashMap::new()).unwrap();
        assert_eq!(a.id, b.id);

        let c = store.upsert_entity("user approval", "project", HashMap::new()).unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn repeat_upsert_merges_properties_instead_of_discarding_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirGraphStore::open(dir.path().join("graph")).unwrap();

        let mut first_props = HashMap::new();
        first_props.insert("source".to_string(), serde_json::json!("memory:1"));
        let a = store.upsert_entity("user approval", "concept", first_props).unwrap();

        let mut second_props = HashMap::new();
        second_props.insert("last_seen".to_string(), serde_json::json!("memory:2"));
        let b = store.upsert_entity("user approval", "concept", second_props).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.properties.get("source").unwrap(), &serde_json::json!("memory:1"));
        assert_eq!(b.properties.get("last_seen").unwrap(), &serde_json::json!("memory:2"));
    }

    #[test]
    fn rejects_a_preexisting_non_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir");
        File::create(&file_path).unwrap();

        let result = DirGraphStore::open(&file_path);
        assert!(result.is_err());
    }

    #[test]
    fn wal_replay_reconstructs_state_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph");

        {
            let store = DirGraphStore::open(&path).unwrap();
            store.upsert_entity("billing", "domain", HashMap::new()).unwrap();
            store.upsert_edge(edge("mem:1", "ent:1", "SHARES_CONCEPT")).unwrap();
        }

        let reopened = DirGraphStore::open(&path).unwrap();
        assert_eq!(reopened.count_edges().unwrap(), 1);
        let fetched = reopened.upsert_entity("billing", "domain", HashMap::new()).unwrap();
        assert_eq!(fetched.id, 1);
    }

    #[test]
    fn query_filters_by_edge_type_and_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirGraphStore::open(dir.path().join("graph")).unwrap();
        store.upsert_edge(edge("mem:1", "mem:2", "SUPPORTS")).unwrap();
        store.upsert_edge(edge("mem:1", "mem:3", "CONTRADICTS")).unwrap();

        let all = store.query("mem:1", None).unwrap();
        assert_eq!(all.len(), 2);

        let supports_only = store.query("mem:1", Some("SUPPORTS")).unwrap();
        assert_eq!(supports_only.len(), 1);
        assert_eq!(supports_only[0].to, "mem:2");
    }
}
