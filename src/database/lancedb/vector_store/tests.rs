use super::*;
use crate::config::{ChatConfig, Config, EmbeddingsConfig, RetrievalConfig};
use tempfile::TempDir;

fn create_test_config(dimension: u32) -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        embeddings: EmbeddingsConfig {
            embedding_dimension: dimension,
            ..EmbeddingsConfig::default()
        },
        chat: ChatConfig::default(),
        retrieval: RetrievalConfig::default(),
        base_dir: temp_dir.path().to_path_buf(),
    };
    (config, temp_dir)
}

fn test_entry(id: &str, document_id: Option<i64>, filename: Option<&str>) -> IndexEntry {
    // Vary the vector slightly per id so distances differ between entries
    let seed: f32 = id.bytes().map(|b| b as f32).sum::<f32>() * 0.001;
    let vector = vec![0.1 + seed, 0.2, 0.3, 0.4];

    IndexEntry {
        id: id.to_string(),
        vector,
        metadata: EntryMetadata {
            content: format!("Test content for entry {}", id),
            source: format!("/data/documents/{}.txt", id),
            filename: filename.map(str::to_string),
            document_id,
            page: None,
            sheet: None,
            chunk_index: 0,
            source_type: Some("text".to_string()),
            extra: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn vector_store_initialization() {
    let (config, _temp_dir) = create_test_config(4);

    let result = VectorStore::new(&config).await;
    assert!(
        result.is_ok(),
        "Failed to initialize VectorStore: {:?}",
        result.err()
    );

    let store = result.expect("should get store");
    assert_eq!(store.table_name, "chunks");
    assert_eq!(store.vector_dimension, Some(4));
}

#[tokio::test]
async fn empty_add_is_a_no_op() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    store
        .add_entries(Vec::new())
        .await
        .expect("empty add should succeed");

    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn add_and_count_entries() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    let entries = vec![
        test_entry("1", Some(1), Some("a.txt")),
        test_entry("2", Some(1), Some("a.txt")),
        test_entry("3", Some(2), Some("b.txt")),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    assert_eq!(store.count().await.expect("should count"), 3);
}

#[tokio::test]
async fn search_returns_descending_similarity() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    let entries = vec![
        test_entry("1", Some(1), Some("a.txt")),
        test_entry("2", Some(1), Some("a.txt")),
        test_entry("3", Some(2), Some("b.txt")),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    let results = store
        .search(&[0.1, 0.2, 0.3, 0.4], 10, None)
        .await
        .expect("should search");

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(
            pair[0].similarity_score >= pair[1].similarity_score,
            "results must be ordered by non-increasing similarity"
        );
    }
}

#[tokio::test]
async fn search_respects_limit() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    let entries = vec![
        test_entry("1", Some(1), None),
        test_entry("2", Some(1), None),
        test_entry("3", Some(1), None),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    let results = store
        .search(&[0.1, 0.2, 0.3, 0.4], 2, None)
        .await
        .expect("should search");

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn search_with_filter_predicate() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    let entries = vec![
        test_entry("1", Some(1), Some("a.txt")),
        test_entry("2", Some(2), Some("b.txt")),
        test_entry("3", Some(2), Some("b.txt")),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    let results = store
        .search(&[0.1, 0.2, 0.3, 0.4], 10, Some("document_id = 2"))
        .await
        .expect("should search with filter");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.metadata.document_id == Some(2)));
}

#[tokio::test]
async fn delete_where_returns_exact_count() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    let entries = vec![
        test_entry("1", Some(1), Some("a.txt")),
        test_entry("2", Some(1), Some("a.txt")),
        test_entry("3", Some(2), Some("b.txt")),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    let deleted = store
        .delete_where("document_id = 1")
        .await
        .expect("should delete");
    assert_eq!(deleted, 2);
    assert_eq!(store.count().await.expect("should count"), 1);

    // Entries of other documents are untouched
    let remaining = store
        .search(&[0.1, 0.2, 0.3, 0.4], 10, None)
        .await
        .expect("should search");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].metadata.document_id, Some(2));
}

#[tokio::test]
async fn repeated_delete_returns_zero() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    store
        .add_entries(vec![test_entry("1", Some(1), None)])
        .await
        .expect("should store entries");

    assert_eq!(
        store
            .delete_where("document_id = 1")
            .await
            .expect("should delete"),
        1
    );
    assert_eq!(
        store
            .delete_where("document_id = 1")
            .await
            .expect("second delete should succeed"),
        0
    );
}

#[tokio::test]
async fn delete_by_filename_predicate() {
    let (config, _temp_dir) = create_test_config(4);
    let mut store = VectorStore::new(&config).await.expect("should create store");

    // Legacy-shaped entries: filename metadata but no document id
    let entries = vec![
        test_entry("1", None, Some("legacy.txt")),
        test_entry("2", None, Some("legacy.txt")),
        test_entry("3", None, Some("other.txt")),
    ];
    store
        .add_entries(entries)
        .await
        .expect("should store entries");

    let deleted = store
        .delete_where("filename = 'legacy.txt'")
        .await
        .expect("should delete by filename");
    assert_eq!(deleted, 2);
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn dimension_change_recreates_table() {
    let (config, _temp_dir) = create_test_config(8);
    let mut store = VectorStore::new(&config).await.expect("should create store");
    assert_eq!(store.vector_dimension, Some(8));

    // Entries carry 4-dimensional vectors; the table is rebuilt to match
    store
        .add_entries(vec![test_entry("1", Some(1), None)])
        .await
        .expect("should store entries after recreation");

    assert_eq!(store.vector_dimension, Some(4));
    assert_eq!(store.count().await.expect("should count"), 1);
}

#[tokio::test]
async fn reopen_detects_existing_dimension() {
    let (config, _temp_dir) = create_test_config(4);

    {
        let mut store = VectorStore::new(&config).await.expect("should create store");
        store
            .add_entries(vec![test_entry("1", Some(1), None)])
            .await
            .expect("should store entries");
    }

    // A fresh handle over the same directory sees the stored entries
    let store = VectorStore::new(&config).await.expect("should reopen store");
    assert_eq!(store.vector_dimension, Some(4));
    assert_eq!(store.count().await.expect("should count"), 1);
}
