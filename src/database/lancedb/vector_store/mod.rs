#[cfg(test)]
mod tests;

use super::{EntryMetadata, IndexEntry};
use crate::{DocQaError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: EntryMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the vector store under the configured directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, DocQaError> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DocQaError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            table_name: "chunks".to_string(),
            vector_dimension: None,
        };

        store
            .initialize_table(config.embeddings.embedding_dimension as usize)
            .await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    /// Initialize the chunks table, detecting the vector dimension from an
    /// existing table when present
    async fn initialize_table(&mut self, default_dimension: usize) -> Result<(), DocQaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            match self.detect_existing_vector_dimension().await {
                Ok(dimension) => {
                    debug!("Detected existing vector dimension: {}", dimension);
                    self.vector_dimension = Some(dimension);
                }
                Err(e) => {
                    debug!("Could not detect vector dimension, using default: {}", e);
                    self.vector_dimension = Some(default_dimension);
                }
            }
            return Ok(());
        }

        let schema = self.create_schema(default_dimension);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(default_dimension);
        info!(
            "Chunks table created with {} dimensions",
            default_dimension
        );
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, DocQaError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open existing table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(DocQaError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self, vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("filename", DataType::Utf8, true),
            Field::new("document_id", DataType::Int64, true),
            Field::new("page", DataType::UInt32, true),
            Field::new("sheet", DataType::Utf8, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("source_type", DataType::Utf8, true),
            Field::new("extra", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Append entries to the index; no-op on empty input
    #[inline]
    pub async fn add_entries(&mut self, entries: Vec<IndexEntry>) -> Result<(), DocQaError> {
        if entries.is_empty() {
            debug!("No entries to store");
            return Ok(());
        }

        debug!("Storing batch of {} entries", entries.len());

        // Recreate the table when the incoming vectors disagree with the
        // stored dimension (e.g. the embedding model changed)
        let vector_dim = entries[0].vector.len();
        if self.vector_dimension != Some(vector_dim) {
            info!(
                "Vector dimension changed from {:?} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim).await?;
            self.vector_dimension = Some(vector_dim);
        }

        let record_batch = self.create_record_batch(&entries)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to insert entries: {}", e)))?;

        info!("Successfully stored {} entries", entries.len());
        Ok(())
    }

    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<(), DocQaError> {
        self.drop_table_if_exists().await?;

        let schema = self.create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                DocQaError::Database(format!("Failed to create table with new dimensions: {}", e))
            })?;

        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<(), DocQaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to list tables for drop: {}", e)))?;

        if table_names.contains(&self.table_name) {
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| DocQaError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    fn create_record_batch(&self, entries: &[IndexEntry]) -> Result<RecordBatch, DocQaError> {
        let len = entries.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| DocQaError::Database("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut filenames = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut sheets = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut source_types = Vec::with_capacity(len);
        let mut extras = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for entry in entries {
            ids.push(entry.id.as_str());
            contents.push(entry.metadata.content.as_str());
            sources.push(entry.metadata.source.as_str());
            filenames.push(entry.metadata.filename.as_deref());
            document_ids.push(entry.metadata.document_id);
            pages.push(entry.metadata.page);
            sheets.push(entry.metadata.sheet.as_deref());
            chunk_indices.push(entry.metadata.chunk_index);
            source_types.push(entry.metadata.source_type.as_deref());
            extras.push(entry.metadata.extra.as_deref());
            created_ats.push(entry.metadata.created_at.as_str());
        }

        let schema = self.create_schema(vector_dim);

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for entry in entries {
            flat_values.extend_from_slice(&entry.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    DocQaError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(filenames)),
            Arc::new(Int64Array::from(document_ids)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(StringArray::from(sheets)),
            Arc::new(UInt32Array::from(
                chunk_indices.iter().map(|&v| Some(v)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(source_types)),
            Arc::new(StringArray::from(extras)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| DocQaError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the nearest entries to a query vector, optionally
    /// restricted by a SQL filter predicate
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<SearchResult>, DocQaError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open table: {}", e)))?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| DocQaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        if let Some(predicate) = filter {
            query = query.only_if(predicate.to_string());
        }

        let results = query
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to execute search: {}", e)))?;

        self.parse_search_results_stream(results).await
    }

    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, DocQaError> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(self.parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(&self, batch: &RecordBatch) -> Result<Vec<SearchResult>, DocQaError> {
        fn string_column<'a>(
            batch: &'a RecordBatch,
            name: &str,
        ) -> Result<&'a StringArray, DocQaError> {
            batch
                .column_by_name(name)
                .ok_or_else(|| DocQaError::Database(format!("Missing {} column", name)))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| DocQaError::Database(format!("Invalid {} column type", name)))
        }

        let contents = string_column(batch, "content")?;
        let sources = string_column(batch, "source")?;
        let filenames = string_column(batch, "filename")?;
        let sheets = string_column(batch, "sheet")?;
        let source_types = string_column(batch, "source_type")?;
        let extras = string_column(batch, "extra")?;
        let created_ats = string_column(batch, "created_at")?;

        let document_ids = batch
            .column_by_name("document_id")
            .ok_or_else(|| DocQaError::Database("Missing document_id column".to_string()))?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| DocQaError::Database("Invalid document_id column type".to_string()))?;

        let pages = batch
            .column_by_name("page")
            .ok_or_else(|| DocQaError::Database("Missing page column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| DocQaError::Database("Invalid page column type".to_string()))?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| DocQaError::Database("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| DocQaError::Database("Invalid chunk_index column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let optional_string = |array: &StringArray, row: usize| -> Option<String> {
            if array.is_null(row) {
                None
            } else {
                Some(array.value(row).to_string())
            }
        };

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let metadata = EntryMetadata {
                content: contents.value(row).to_string(),
                source: sources.value(row).to_string(),
                filename: optional_string(filenames, row),
                document_id: if document_ids.is_null(row) {
                    None
                } else {
                    Some(document_ids.value(row))
                },
                page: if pages.is_null(row) {
                    None
                } else {
                    Some(pages.value(row))
                },
                sheet: optional_string(sheets, row),
                chunk_index: chunk_indices.value(row),
                source_type: optional_string(source_types, row),
                extra: optional_string(extras, row),
                created_at: created_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                metadata,
                similarity_score: 1.0 - distance,
                distance,
            });
        }

        Ok(search_results)
    }

    /// Delete every entry matching the predicate; returns the number of
    /// rows removed (0 when nothing matched, which is not an error)
    #[inline]
    pub async fn delete_where(&mut self, predicate: &str) -> Result<u64, DocQaError> {
        debug!("Deleting entries where: {}", predicate);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open table: {}", e)))?;

        // LanceDB's delete does not report a row count, so count first
        let matched = table
            .count_rows(Some(predicate.to_string()))
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to count matching rows: {}", e)))?;

        if matched == 0 {
            return Ok(0);
        }

        table
            .delete(predicate)
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to delete entries: {}", e)))?;

        info!("Deleted {} entries where {}", matched, predicate);
        Ok(matched as u64)
    }

    /// Total number of entries stored
    #[inline]
    pub async fn count(&self) -> Result<u64, DocQaError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
