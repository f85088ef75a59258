// Document loading module
// Converts uploaded files into text chunks ready for embedding


pub mod office;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::{DocQaError, Result};

/// Typed metadata attached to every loaded chunk
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkMetadata {
    /// Origin path or filename of the chunk
    pub source: String,
    /// Stored filename, set by the lifecycle coordinator at ingest time
    pub filename: Option<String>,
    /// Owning document record id, set by the lifecycle coordinator
    pub document_id: Option<i64>,
    /// 1-based page number (PDF extraction)
    pub page: Option<u32>,
    /// Sheet name (spreadsheet extraction)
    pub sheet: Option<String>,
    /// Position of this chunk within its source document
    pub chunk_index: u32,
    /// Caller-supplied source category, e.g. "text"
    pub source_type: Option<String>,
    /// Open extension map for caller-supplied metadata
    pub extra: BTreeMap<String, String>,
}

/// A normalized unit of document text with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    #[inline]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                ..ChunkMetadata::default()
            },
        }
    }
}

/// Load a file into document chunks, dispatching on the file extension.
///
/// Supported: `.pdf` (one chunk per page), `.docx` (single chunk),
/// `.txt`/`.md` (single chunk), `.xlsx` (one chunk per sheet). Every
/// chunk's content is sanitized to valid UTF-8 with malformed sequences
/// dropped; blank chunks are discarded.
#[inline]
pub fn load(path: &Path) -> Result<Vec<DocumentChunk>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    debug!("Loading document {} (.{})", path.display(), extension);

    let chunks = match extension.as_str() {
        "pdf" => load_pdf(path)?,
        "docx" => office::load_docx(path)?,
        "xlsx" => office::load_xlsx(path)?,
        "txt" | "md" => load_text(path)?,
        _ => {
            return Err(DocQaError::UnsupportedFormat(if extension.is_empty() {
                "(no extension)".to_string()
            } else {
                format!(".{}", extension)
            }));
        }
    };

    // Sanitize after extraction so downstream consumers never see decode
    // errors, then drop chunks that came out blank.
    let mut cleaned: Vec<DocumentChunk> = chunks
        .into_iter()
        .map(|mut chunk| {
            chunk.content = sanitize_utf8(&chunk.content);
            chunk
        })
        .filter(|chunk| !chunk.content.trim().is_empty())
        .collect();

    for (index, chunk) in cleaned.iter_mut().enumerate() {
        chunk.metadata.chunk_index = index as u32;
    }

    debug!(
        "Loaded {} chunks from {}",
        cleaned.len(),
        path.display()
    );
    Ok(cleaned)
}

/// Drop invalid-sequence replacement characters so chunk content is clean
/// UTF-8 text regardless of what the extractor produced.
#[inline]
pub fn sanitize_utf8(content: &str) -> String {
    if content.contains('\u{FFFD}') {
        content.chars().filter(|&c| c != '\u{FFFD}').collect()
    } else {
        content.to_string()
    }
}

fn load_pdf(path: &Path) -> Result<Vec<DocumentChunk>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| DocQaError::Load(format!("PDF extraction failed: {}", e)))?;

    let source = path.to_string_lossy().into_owned();
    let chunks = pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let mut chunk = DocumentChunk::new(text, source.clone());
            chunk.metadata.page = Some(index as u32 + 1);
            chunk
        })
        .collect();

    Ok(chunks)
}

fn load_text(path: &Path) -> Result<Vec<DocumentChunk>> {
    let bytes = std::fs::read(path)
        .map_err(|e| DocQaError::Load(format!("Failed to read {}: {}", path.display(), e)))?;

    let content = String::from_utf8_lossy(&bytes).into_owned();
    let source = path.to_string_lossy().into_owned();

    Ok(vec![DocumentChunk::new(content, source)])
}
