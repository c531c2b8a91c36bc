//! Intelligence module for AI-powered features (Phase 4)
//!
//! Provides:
//! - Smart memory suggestions (RML-890)
//! - Automatic memory consolidation (RML-891)
//! - Memory quality scoring (RML-892)
//! - Natural language commands (RML-893)
//! - Auto-capture mode for proactive memory (RML-903)
//! - Project context discovery (AI instruction files)
//! - Entity extraction / NER (RML-925)

pub mod auto_capture;
pub mod auto_tagging;
pub mod compression;
pub mod consolidation;
pub mod content_utils;
pub mod context_quality;
pub mod document_ingest;
pub mod entities;
pub mod entity_extraction;
pub mod natural_language;
pub mod project_context;
pub mod quality;
pub mod salience;
pub mod session_context;
pub mod session_indexing;
pub mod suggestions;

pub use auto_capture::*;
pub use auto_tagging::*;
pub use consolidation::*;
pub use content_utils::*;
pub use context_quality::*;
pub use document_ingest::*;
pub use entities::{
    Entity, EntityExtractionConfig, EntityExtractor, EntityRelation, EntityType, ExtractedEntity,
    ExtractionResult, MemoryEntity,
};
pub use natural_language::*;
pub use project_context::*;
pub use quality::*;
pub use salience::*;
pub use session_context::*;
pub use suggestions::*;
