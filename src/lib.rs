//! Elefante - persistent memory infrastructure for AI agents
//!
//! Local, single-user memory storage with semantic search and a cognitive
//! retrieval and curation engine that ranks, explains, proactively surfaces,
//! and health-checks what it stores.

pub mod cognition;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod intelligence;
pub mod mcp;
pub mod search;
pub mod storage;
pub mod types;

pub use error::{ElefanteError, Result};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
