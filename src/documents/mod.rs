// Document lifecycle module
// Keeps the record store, the on-disk file, and the vector index mutually
// consistent across ingest and delete


pub mod storage;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::sqlite::models::{DocumentRecord, DocumentStatus, DocumentUpdate, NewDocument};
use crate::database::sqlite::Database;
use crate::index::SearchIndex;
use crate::loader;
use crate::{DocQaError, Result};

pub use storage::FileStorage;

/// Result of a best-effort document deletion across the three stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub document_id: i64,
    pub vectors_deleted: u64,
    pub file_removed: bool,
}

pub struct DocumentManager {
    database: Database,
    index: SearchIndex,
    storage: FileStorage,
}

impl DocumentManager {
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let database = Database::new(config.database_path())
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))?;
        let index = SearchIndex::new(config).await?;
        let storage = FileStorage::new(config.documents_dir())?;

        Ok(Self {
            database,
            index,
            storage,
        })
    }

    /// Explicit wiring of already-constructed components
    #[inline]
    pub fn from_parts(database: Database, index: SearchIndex, storage: FileStorage) -> Self {
        Self {
            database,
            index,
            storage,
        }
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Copy a file into managed storage and ingest it: record created in
    /// `processing`, chunks tagged with the record's identity, indexed, then
    /// the record is completed. A load or index failure leaves the record in
    /// `failed` with the error message and re-raises.
    #[inline]
    pub async fn ingest_file(&mut self, path: &Path) -> Result<DocumentRecord> {
        let original_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DocQaError::Load(format!("Not a file path: {}", path.display())))?;

        let bytes = std::fs::read(path)?;
        let (stored_path, stored_name) = self.storage.save_bytes(&original_filename, &bytes)?;

        let extension = stored_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let record = self
            .database
            .create_document(NewDocument {
                filename: stored_name,
                original_filename,
                file_path: stored_path.to_string_lossy().into_owned(),
                file_type: file_type_for(&extension).to_string(),
                file_size: bytes.len() as i64,
            })
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))?;

        info!(
            "Created document record {} for {}",
            record.id, record.filename
        );

        self.index_document(&stored_path, record, None, None).await
    }

    /// Ingest raw text as a markdown document. Filename collisions are
    /// resolved with `_1`, `_2`, ... suffixes before the extension; the
    /// caller's extra metadata is merged into every chunk.
    #[inline]
    pub async fn ingest_text(
        &mut self,
        content: &str,
        filename: &str,
        source_type: &str,
        extra: Option<BTreeMap<String, String>>,
    ) -> Result<DocumentRecord> {
        let mut target = filename.to_string();
        if !target.ends_with(".md") {
            target.push_str(".md");
        }

        let (stored_path, stored_name) = self.storage.save_text(&target, content)?;

        let record = self
            .database
            .create_document(NewDocument {
                filename: stored_name,
                original_filename: filename.to_string(),
                file_path: stored_path.to_string_lossy().into_owned(),
                file_type: "text/markdown".to_string(),
                file_size: content.len() as i64,
            })
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))?;

        info!(
            "Created document record {} for text upload {}",
            record.id, record.filename
        );

        self.index_document(&stored_path, record, Some(source_type), extra)
            .await
    }

    async fn index_document(
        &mut self,
        path: &Path,
        record: DocumentRecord,
        source_type: Option<&str>,
        extra: Option<BTreeMap<String, String>>,
    ) -> Result<DocumentRecord> {
        match self
            .load_and_index(path, &record, source_type, extra.as_ref())
            .await
        {
            Ok(chunk_count) => {
                let updated = self
                    .database
                    .update_document(
                        record.id,
                        DocumentUpdate {
                            status: Some(DocumentStatus::Completed),
                            chunk_count: Some(chunk_count as i64),
                            error_message: None,
                        },
                    )
                    .await
                    .map_err(|e| DocQaError::Database(format!("{:#}", e)))?
                    .unwrap_or(record);

                info!(
                    "Document {} completed with {} chunks",
                    updated.id, updated.chunk_count
                );
                Ok(updated)
            }
            Err(e) => {
                // The failed record stays visible so operators can see which
                // uploads failed and why
                if let Err(update_err) = self
                    .database
                    .update_document(
                        record.id,
                        DocumentUpdate {
                            status: Some(DocumentStatus::Failed),
                            chunk_count: None,
                            error_message: Some(e.to_string()),
                        },
                    )
                    .await
                {
                    warn!(
                        "Could not mark document {} as failed: {:#}",
                        record.id, update_err
                    );
                }

                Err(DocQaError::Load(format!(
                    "Processing failed for document {}: {}",
                    record.id, e
                )))
            }
        }
    }

    async fn load_and_index(
        &mut self,
        path: &Path,
        record: &DocumentRecord,
        source_type: Option<&str>,
        extra: Option<&BTreeMap<String, String>>,
    ) -> Result<usize> {
        let mut chunks = loader::load(path)?;

        for chunk in &mut chunks {
            chunk.metadata.document_id = Some(record.id);
            chunk.metadata.filename = Some(record.filename.clone());
            if let Some(source_type) = source_type {
                chunk.metadata.source_type = Some(source_type.to_string());
            }
            if let Some(extra) = extra {
                chunk
                    .metadata
                    .extra
                    .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        self.index.add_chunks(&chunks).await
    }

    /// Delete a document from all three stores. Vector deletion tries the
    /// document id first and falls back to the filename; file and vector
    /// sub-failures are logged but never block the remaining steps. Overall
    /// success is the record deletion's success.
    #[inline]
    pub async fn delete(&mut self, document_id: i64) -> Result<DeletionOutcome> {
        let record = self
            .database
            .get_document(document_id)
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))?
            .ok_or_else(|| {
                DocQaError::Database(format!("Document {} not found", document_id))
            })?;

        let mut vectors_deleted = 0u64;
        match self.index.delete_by_document_id(document_id).await {
            Ok(count) => vectors_deleted = count,
            Err(e) => warn!(
                "Could not delete vectors for document {}: {}",
                document_id, e
            ),
        }
        if vectors_deleted == 0 {
            match self.index.delete_by_filename(&record.filename).await {
                Ok(count) => vectors_deleted = count,
                Err(e) => warn!(
                    "Could not delete vectors for filename {}: {}",
                    record.filename, e
                ),
            }
        }
        if vectors_deleted == 0 {
            warn!(
                "No vectors matched document {} by id or filename '{}'",
                document_id, record.filename
            );
        }

        let file_removed = match self.storage.delete(Path::new(&record.file_path)) {
            Ok(removed) => {
                if !removed {
                    debug!("File {} already absent", record.file_path);
                }
                removed
            }
            Err(e) => {
                warn!("Could not delete file {}: {}", record.file_path, e);
                false
            }
        };

        self.database
            .delete_document(document_id)
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))?;

        info!(
            "Deleted document {} ({} vectors, file removed: {})",
            document_id, vectors_deleted, file_removed
        );

        Ok(DeletionOutcome {
            document_id,
            vectors_deleted,
            file_removed,
        })
    }

    #[inline]
    pub async fn list(&self) -> Result<Vec<DocumentRecord>> {
        self.database
            .list_documents()
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))
    }

    #[inline]
    pub async fn get(&self, document_id: i64) -> Result<Option<DocumentRecord>> {
        self.database
            .get_document(document_id)
            .await
            .map_err(|e| DocQaError::Database(format!("{:#}", e)))
    }
}

fn file_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        _ => "unknown",
    }
}
