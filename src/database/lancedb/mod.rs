// LanceDB vector database module
// Handles vector storage and similarity search for document chunks

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Persisted form of a document chunk inside the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Unique identifier for this entry
    pub id: String,
    /// The embedding vector
    pub vector: Vec<f32>,
    /// Chunk content and metadata stored alongside the vector
    pub metadata: EntryMetadata,
}

/// Chunk content plus metadata stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The chunk text
    pub content: String,
    /// Origin path or filename
    pub source: String,
    /// Stored filename, when known
    pub filename: Option<String>,
    /// Owning document record id; legacy entries may lack it
    pub document_id: Option<i64>,
    /// 1-based page number for paginated sources
    pub page: Option<u32>,
    /// Sheet name for spreadsheet sources
    pub sheet: Option<String>,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Caller-supplied source category
    pub source_type: Option<String>,
    /// Caller-supplied extension metadata, serialized as JSON
    pub extra: Option<String>,
    /// Timestamp when this entry was created
    pub created_at: String,
}
