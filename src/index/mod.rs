// Search index module
// Owns embedding computation and the persistent vector store; exposes the
// add / similarity search / metadata-filtered delete operations


use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::database::lancedb::{EntryMetadata, IndexEntry, SearchResult, VectorStore};
use crate::embeddings::EmbeddingsClient;
use crate::loader::{ChunkMetadata, DocumentChunk};
use crate::{DocQaError, Result};

/// A retrieved chunk paired with its similarity score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

pub struct SearchIndex {
    store: VectorStore,
    embeddings: EmbeddingsClient,
    default_top_k: usize,
}

impl SearchIndex {
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let store = VectorStore::new(config).await?;
        let embeddings = EmbeddingsClient::new(config)
            .map_err(|e| DocQaError::Config(format!("{:#}", e)))?;

        Ok(Self {
            store,
            embeddings,
            default_top_k: config.retrieval.top_k,
        })
    }

    #[inline]
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Embed and append chunks to the index; returns the number of entries
    /// written. Empty input is a no-op. Re-adding identical content creates
    /// duplicate entries; deletion is keyed by document, not content.
    #[inline]
    pub async fn add_chunks(&mut self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            debug!("No chunks to index");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embeddings
            .embed_batch(&texts)
            .map_err(|e| DocQaError::Embedding(format!("{:#}", e)))?;

        let created_at = Utc::now().to_rfc3339();
        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: entry_metadata(chunk, &created_at),
            })
            .collect();

        let count = entries.len();
        self.store.add_entries(entries).await?;

        info!("Indexed {} chunks", count);
        Ok(count)
    }

    /// Return the k nearest chunks to the query, ordered by descending
    /// similarity; fewer than k when the index holds fewer entries
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.search_filtered(query, k, None).await
    }

    /// Search restricted to entries matching an optional SQL predicate
    #[inline]
    pub async fn search_filtered(
        &self,
        query: &str,
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = self
            .embeddings
            .embed(query)
            .map_err(|e| DocQaError::Embedding(format!("{:#}", e)))?;

        let results = self.store.search(&query_vector, k, filter).await?;
        Ok(results.into_iter().map(scored_chunk).collect())
    }

    /// Remove every entry owned by the given document; 0 is success
    #[inline]
    pub async fn delete_by_document_id(&mut self, document_id: i64) -> Result<u64> {
        self.store
            .delete_where(&format!("document_id = {}", document_id))
            .await
    }

    /// Fallback removal keyed by filename metadata, for entries indexed
    /// before document tagging existed; 0 is success
    #[inline]
    pub async fn delete_by_filename(&mut self, filename: &str) -> Result<u64> {
        self.store
            .delete_where(&format!("filename = '{}'", escape_literal(filename)))
            .await
    }

    /// Total number of entries in the index
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        self.store.count().await
    }
}

/// Escape a string for use inside a single-quoted SQL literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn entry_metadata(chunk: &DocumentChunk, created_at: &str) -> EntryMetadata {
    let meta = &chunk.metadata;
    let extra = if meta.extra.is_empty() {
        None
    } else {
        serde_json::to_string(&meta.extra).ok()
    };

    EntryMetadata {
        content: chunk.content.clone(),
        source: meta.source.clone(),
        filename: meta.filename.clone(),
        document_id: meta.document_id,
        page: meta.page,
        sheet: meta.sheet.clone(),
        chunk_index: meta.chunk_index,
        source_type: meta.source_type.clone(),
        extra,
        created_at: created_at.to_string(),
    }
}

fn scored_chunk(result: SearchResult) -> ScoredChunk {
    let meta = result.metadata;
    let extra: BTreeMap<String, String> = meta
        .extra
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    ScoredChunk {
        chunk: DocumentChunk {
            content: meta.content,
            metadata: ChunkMetadata {
                source: meta.source,
                filename: meta.filename,
                document_id: meta.document_id,
                page: meta.page,
                sheet: meta.sheet,
                chunk_index: meta.chunk_index,
                source_type: meta.source_type,
                extra,
            },
        },
        similarity: result.similarity_score,
    }
}
