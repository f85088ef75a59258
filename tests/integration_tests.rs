#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for the ingest → retrieve → answer → delete pipeline.
// Model services are mocked: the embeddings endpoint returns keyword-based
// vectors so similarity ordering is deterministic, and the chat endpoint
// streams a fixed SSE body.

use std::path::PathBuf;

use futures::StreamExt;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use docqa::chain::{AnswerChain, ConversationTurn, Retriever};
use docqa::config::{ChatConfig, Config, EmbeddingsConfig, RetrievalConfig};
use docqa::database::sqlite::Database;
use docqa::database::sqlite::models::{DocumentStatus, NewDocument};
use docqa::documents::{DocumentManager, FileStorage};
use docqa::generation::{ChatClient, ChatRole, TokenStream};
use docqa::index::SearchIndex;
use docqa::loader::DocumentChunk;

const KEYWORDS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// One dimension per keyword plus a constant bias so no vector is zero
fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = KEYWORDS
        .iter()
        .map(|keyword| if lower.contains(keyword) { 1.0 } else { 0.0 })
        .collect();
    vector.push(1.0);
    vector
}

/// Embeddings endpoint stub deriving vectors from request content
struct KeywordEmbedder;

impl Respond for KeywordEmbedder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body should be JSON");
        let inputs = body["input"]
            .as_array()
            .expect("input should be an array");

        let data: Vec<serde_json::Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let vector = keyword_vector(text.as_str().unwrap_or_default());
                serde_json::json!({
                    "object": "embedding",
                    "index": index,
                    "embedding": vector,
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "model": "keyword-test",
            "data": data,
        }))
    }
}

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"The answer \"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"is in the documents.\"}}]}\n\n\
data: [DONE]\n\n";

async fn mock_model_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(KeywordEmbedder)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SSE_BODY.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    server
}

fn test_config(server: &MockServer, base_dir: &TempDir) -> Config {
    Config {
        embeddings: EmbeddingsConfig {
            base_url: server.uri(),
            model: "keyword-test".to_string(),
            api_key: "sk-test".to_string(),
            batch_size: 16,
            embedding_dimension: 5,
        },
        chat: ChatConfig {
            base_url: server.uri(),
            model: "chat-test".to_string(),
            api_key: "sk-test".to_string(),
            temperature: 0.1,
            request_timeout_secs: 30,
        },
        retrieval: RetrievalConfig { top_k: 4 },
        base_dir: base_dir.path().to_path_buf(),
    }
}

async fn collect(mut stream: TokenStream) -> String {
    let mut out = String::new();
    while let Some(item) = stream.next().await {
        out.push_str(&item.expect("stream item should be Ok"));
    }
    out
}

fn page_chunk(content: &str, source: &str, filename: &str, document_id: i64, page: u32) -> DocumentChunk {
    let mut chunk = DocumentChunk::new(content, source);
    chunk.metadata.filename = Some(filename.to_string());
    chunk.metadata.document_id = Some(document_id);
    chunk.metadata.page = Some(page);
    chunk.metadata.chunk_index = page - 1;
    chunk
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ingest_search_and_delete_lifecycle() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    let mut manager = DocumentManager::new(&config)
        .await
        .expect("should build manager");

    let alpha_path = base_dir.path().join("alpha.txt");
    std::fs::write(&alpha_path, "This file is all about alpha topics.")
        .expect("should write file");
    let gamma_path = base_dir.path().join("gamma.txt");
    std::fs::write(&gamma_path, "This file is all about gamma topics.")
        .expect("should write file");

    let alpha_record = manager
        .ingest_file(&alpha_path)
        .await
        .expect("should ingest alpha");
    let gamma_record = manager
        .ingest_file(&gamma_path)
        .await
        .expect("should ingest gamma");

    assert_eq!(alpha_record.status, DocumentStatus::Completed);
    assert_eq!(alpha_record.chunk_count, 1);
    assert_eq!(manager.index().count().await.expect("should count"), 2);

    // The alpha question retrieves the alpha chunk first
    let results = manager
        .index()
        .search("tell me about alpha", 2)
        .await
        .expect("should search");
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].chunk.metadata.document_id,
        Some(alpha_record.id)
    );
    assert!(results[0].similarity >= results[1].similarity);

    // Delete the alpha document: vectors, file, and record all go
    let outcome = manager
        .delete(alpha_record.id)
        .await
        .expect("should delete");
    assert_eq!(outcome.vectors_deleted, 1);
    assert!(outcome.file_removed);
    assert_eq!(manager.index().count().await.expect("should count"), 1);
    assert!(
        manager
            .get(alpha_record.id)
            .await
            .expect("should query")
            .is_none()
    );
    assert!(!PathBuf::from(&alpha_record.file_path).exists());

    // Searches never surface the deleted document again
    let results = manager
        .index()
        .search("tell me about alpha", 4)
        .await
        .expect("should search");
    assert!(
        results
            .iter()
            .all(|r| r.chunk.metadata.document_id == Some(gamma_record.id))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleting_a_five_chunk_document_removes_exactly_five_vectors() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    let database = Database::new(config.database_path())
        .await
        .expect("should build database");
    let mut index = SearchIndex::new(&config).await.expect("should build index");
    let storage = FileStorage::new(config.documents_dir()).expect("should build storage");

    let (stored_path, stored_name) = storage
        .save_text("big.txt", "alpha beta gamma delta and more")
        .expect("should save file");
    let record = database
        .create_document(NewDocument {
            filename: stored_name.clone(),
            original_filename: "big.txt".to_string(),
            file_path: stored_path.to_string_lossy().into_owned(),
            file_type: "text/plain".to_string(),
            file_size: 31,
        })
        .await
        .expect("should create record");

    // Five chunks tagged with the record, as a page-granular loader would
    let chunks: Vec<DocumentChunk> = (1..=5)
        .map(|page| {
            page_chunk(
                &format!("chunk {} about alpha", page),
                &stored_path.to_string_lossy(),
                &stored_name,
                record.id,
                page,
            )
        })
        .collect();
    index.add_chunks(&chunks).await.expect("should index chunks");
    assert_eq!(index.count().await.expect("should count"), 5);

    let mut manager = DocumentManager::from_parts(database, index, storage);
    let outcome = manager.delete(record.id).await.expect("should delete");

    assert_eq!(outcome.vectors_deleted, 5);
    assert!(outcome.file_removed);
    assert_eq!(manager.index().count().await.expect("should count"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn page_two_sources_are_attributed_end_to_end() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    let mut index = SearchIndex::new(&config).await.expect("should build index");

    // A simulated three-page document; only page 2 covers beta
    let source = "/data/documents/manual.txt";
    let chunks = vec![
        page_chunk("Page one is about alpha.", source, "manual.txt", 1, 1),
        page_chunk("Page two is about beta.", source, "manual.txt", 1, 2),
        page_chunk("Page three is about gamma.", source, "manual.txt", 1, 3),
    ];
    index.add_chunks(&chunks).await.expect("should index chunks");

    let retriever = Retriever::new(index).with_top_k(1);
    let chat = ChatClient::new(&config).expect("should build chat client");
    let chain = AnswerChain::new(retriever, chat);

    let sources = chain
        .sources("where is beta described?")
        .await
        .expect("should fetch sources");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].document, "manual.txt");
    assert_eq!(sources[0].page, Some(2));
    assert!(sources[0].excerpt.contains("beta"));

    let stream = chain
        .stream_answer("where is beta described?")
        .await
        .expect("should stream answer");
    let output = collect(stream).await;

    assert!(output.starts_with("The answer is in the documents."));
    assert!(output.contains("Sources:"));
    assert!(output.contains("manual.txt"));
    assert!(output.contains("(p.2)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_retrieval_streams_answer_without_trailer() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    // Nothing has been indexed
    let index = SearchIndex::new(&config).await.expect("should build index");
    let retriever = Retriever::new(index);
    let chat = ChatClient::new(&config).expect("should build chat client");
    let chain = AnswerChain::new(retriever, chat);

    let history = vec![ConversationTurn {
        role: ChatRole::User,
        content: "earlier question".to_string(),
    }];
    let stream = chain
        .stream_answer_with_history("anything indexed?", &history)
        .await
        .expect("should stream answer");
    let output = collect(stream).await;

    assert_eq!(output, "The answer is in the documents.");
    assert!(!output.contains("Sources:"));

    let sources = chain
        .sources("anything indexed?")
        .await
        .expect("should fetch sources");
    assert!(sources.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn history_expansion_steers_retrieval() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    let mut index = SearchIndex::new(&config).await.expect("should build index");
    let source = "/data/documents/features.txt";
    let chunks = vec![
        page_chunk("All about the alpha feature.", source, "features.txt", 1, 1),
        page_chunk("All about the beta feature.", source, "features.txt", 1, 2),
    ];
    index.add_chunks(&chunks).await.expect("should index chunks");

    let retriever = Retriever::new(index).with_top_k(1);
    let chat = ChatClient::new(&config).expect("should build chat client");
    let chain = AnswerChain::new(retriever, chat);

    // The question alone names no keyword; the history mentions beta, and
    // query expansion folds it into retrieval
    let history = vec![
        ConversationTurn {
            role: ChatRole::User,
            content: "tell me about the beta feature".to_string(),
        },
        ConversationTurn {
            role: ChatRole::Assistant,
            content: "it is documented on page two".to_string(),
        },
    ];
    let stream = chain
        .stream_answer_with_history("how do I enable it?", &history)
        .await
        .expect("should stream answer");
    let output = collect(stream).await;

    assert!(output.contains("Sources:"));
    assert!(output.contains("(p.2)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn colliding_text_uploads_create_two_documents() {
    let server = mock_model_server().await;
    let base_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&server, &base_dir);

    let mut manager = DocumentManager::new(&config)
        .await
        .expect("should build manager");

    let first = manager
        .ingest_text("notes about alpha", "notes.md", "text", None)
        .await
        .expect("first upload should succeed");
    let second = manager
        .ingest_text("notes about beta", "notes.md", "text", None)
        .await
        .expect("second upload should succeed");

    assert_eq!(first.filename, "notes.md");
    assert_eq!(second.filename, "notes_1.md");
    assert_eq!(first.status, DocumentStatus::Completed);
    assert_eq!(second.status, DocumentStatus::Completed);
    assert_eq!(first.chunk_count, 1);
    assert_eq!(second.chunk_count, 1);

    // Both files exist side by side, no overwrite
    assert!(config.documents_dir().join("notes.md").exists());
    assert!(config.documents_dir().join("notes_1.md").exists());
    assert_eq!(manager.index().count().await.expect("should count"), 2);
}
