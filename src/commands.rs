use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::chain::{AnswerChain, ConversationTurn, Retriever};
use crate::config::Config;
use crate::documents::DocumentManager;
use crate::generation::ChatClient;
use crate::index::SearchIndex;

fn resolve_base_dir(base_dir: Option<PathBuf>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) => Ok(dir),
        None => crate::config::get_config_dir().context("Failed to resolve config directory"),
    }
}

async fn build_chain(config: &Config) -> Result<AnswerChain> {
    let index = SearchIndex::new(config).await?;
    let retriever = Retriever::new(index);
    let chat = ChatClient::new(config)?;
    Ok(AnswerChain::new(retriever, chat))
}

/// Print the active configuration as TOML
#[inline]
pub fn show_config(base_dir: Option<PathBuf>) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;

    println!("# Configuration directory: {}", base_dir.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Write a default config file when none exists yet
#[inline]
pub fn init_config(base_dir: Option<PathBuf>) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config_path = base_dir.join("config.toml");

    if config_path.exists() {
        println!("Configuration already exists: {}", config_path.display());
        return Ok(());
    }

    let config = Config::load(&base_dir)?;
    config.save()?;
    println!("Wrote default configuration to {}", config_path.display());
    println!("Edit this file to set API endpoints, models, and keys.");
    Ok(())
}

/// Ingest a document file into the corpus
#[inline]
pub async fn ingest_file(base_dir: Option<PathBuf>, path: &Path) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let mut manager = DocumentManager::new(&config).await?;

    info!("Ingesting {}", path.display());
    let record = manager.ingest_file(path).await?;

    println!(
        "Ingested {} (ID: {}, {} chunks)",
        record.filename, record.id, record.chunk_count
    );
    Ok(())
}

/// Ingest text read from stdin as a markdown document
#[inline]
pub async fn ingest_text(
    base_dir: Option<PathBuf>,
    filename: &str,
    source_type: &str,
) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let mut manager = DocumentManager::new(&config).await?;

    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read text from stdin")?;

    let record = manager
        .ingest_text(&content, filename, source_type, None)
        .await?;

    println!(
        "Ingested {} (ID: {}, {} chunks)",
        record.filename, record.id, record.chunk_count
    );
    Ok(())
}

/// Ask a question and stream the answer to stdout. An optional history file
/// (JSON array of {role, content} turns) switches to the conversation-aware
/// pipeline.
#[inline]
pub async fn ask(
    base_dir: Option<PathBuf>,
    question: &str,
    history_path: Option<PathBuf>,
) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let chain = build_chain(&config).await?;

    let mut stream = match history_path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?;
            let history: Vec<ConversationTurn> =
                serde_json::from_str(&raw).context("Failed to parse history file")?;
            chain.stream_answer_with_history(question, &history).await?
        }
        None => chain.stream_answer(question).await?,
    };

    let mut stdout = std::io::stdout();
    while let Some(token) = stream.next().await {
        let token = token?;
        print!("{}", token);
        stdout.flush()?;
    }
    println!();

    Ok(())
}

/// Print the citation records for a question without generating an answer
#[inline]
pub async fn sources(base_dir: Option<PathBuf>, question: &str) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let chain = build_chain(&config).await?;

    let records = chain.sources(question).await?;
    if records.is_empty() {
        println!("No relevant documents found.");
        return Ok(());
    }

    for record in records {
        let mut line = record.document.clone();
        if let Some(page) = record.page {
            line.push_str(&format!(" (p.{})", page));
        }
        println!("{}", line);
        println!("  path: {}", record.file_path);
        println!("  excerpt: {}", record.excerpt);
    }
    Ok(())
}

/// List all documents with their status
#[inline]
pub async fn list_documents(base_dir: Option<PathBuf>) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let manager = DocumentManager::new(&config).await?;

    let documents = manager.list().await?;
    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'docqa ingest <path>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();
    for doc in &documents {
        println!("{} (ID: {})", doc.filename, doc.id);
        println!("   Status: {}", doc.status);
        println!("   Chunks: {}", doc.chunk_count);
        println!("   Size: {} bytes", doc.file_size);
        if let Some(error) = &doc.error_message {
            println!("   Error: {}", error);
        }
    }
    Ok(())
}

/// Delete a document: vectors, stored file, and record
#[inline]
pub async fn delete_document(base_dir: Option<PathBuf>, document_id: i64) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let mut manager = DocumentManager::new(&config).await?;

    let outcome = manager.delete(document_id).await?;
    println!(
        "Deleted document {} ({} vectors removed)",
        outcome.document_id, outcome.vectors_deleted
    );
    Ok(())
}

/// Show corpus-level counts
#[inline]
pub async fn show_status(base_dir: Option<PathBuf>) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let config = Config::load(&base_dir)?;
    let manager = DocumentManager::new(&config).await?;

    let documents = manager.database().count_documents().await?;
    let vectors = manager.index().count().await?;

    println!("Documents: {}", documents);
    println!("Indexed chunks: {}", vectors);
    Ok(())
}
