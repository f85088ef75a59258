use super::*;
use crate::database::sqlite::models::{DocumentStatus, DocumentUpdate, NewDocument};
use tempfile::TempDir;

async fn test_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::new(temp_dir.path().join("metadata.db"))
        .await
        .expect("should initialize database");
    (database, temp_dir)
}

#[tokio::test]
async fn initializes_and_migrates() {
    let (db, _temp_dir) = test_database().await;

    // Migrations ran; the documents table is queryable
    let count = db.count_documents().await.expect("should count documents");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn creates_parent_directories() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let nested = temp_dir.path().join("a").join("b").join("metadata.db");

    let db = Database::new(&nested).await.expect("should create database");
    assert_eq!(db.count_documents().await.expect("should count"), 0);
    assert!(nested.exists());
}

#[tokio::test]
async fn wrapper_crud_roundtrip() {
    let (db, _temp_dir) = test_database().await;

    let record = db
        .create_document(NewDocument {
            filename: "guide.pdf".to_string(),
            original_filename: "guide.pdf".to_string(),
            file_path: "/data/documents/guide.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 1024,
        })
        .await
        .expect("should create document");

    let updated = db
        .update_document(
            record.id,
            DocumentUpdate {
                status: Some(DocumentStatus::Completed),
                chunk_count: Some(7),
                error_message: None,
            },
        )
        .await
        .expect("should update document")
        .expect("document should exist");
    assert_eq!(updated.status, DocumentStatus::Completed);

    let listed = db.list_documents().await.expect("should list documents");
    assert_eq!(listed.len(), 1);

    assert!(
        db.delete_document(record.id)
            .await
            .expect("should delete document")
    );
    assert_eq!(db.count_documents().await.expect("should count"), 0);
}
