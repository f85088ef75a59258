use clap::{Parser, Subcommand};
use docqa::Result;
use docqa::commands::{
    ask, delete_document, ingest_file, ingest_text, init_config, list_documents, show_config,
    show_status, sources,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Question answering over uploaded documents with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Override the base directory holding config, databases, and documents
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a document file (pdf, docx, xlsx, txt, md)
    Ingest {
        /// Path of the file to ingest
        path: PathBuf,
    },
    /// Ingest text from stdin as a markdown document
    IngestText {
        /// Filename to store the text under
        filename: String,
        /// Source category recorded in chunk metadata
        #[arg(long, default_value = "text")]
        source_type: String,
    },
    /// Ask a question and stream the answer
    Ask {
        question: String,
        /// JSON file holding prior conversation turns ([{"role", "content"}])
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Show which documents a question would draw on
    Sources { question: String },
    /// List all ingested documents
    List,
    /// Delete a document and its index entries
    Delete {
        /// Document ID to delete
        id: i64,
    },
    /// Show corpus-level counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(cli.base_dir)?;
            } else {
                init_config(cli.base_dir)?;
            }
        }
        Commands::Ingest { path } => {
            ingest_file(cli.base_dir, &path).await?;
        }
        Commands::IngestText {
            filename,
            source_type,
        } => {
            ingest_text(cli.base_dir, &filename, &source_type).await?;
        }
        Commands::Ask { question, history } => {
            ask(cli.base_dir, &question, history).await?;
        }
        Commands::Sources { question } => {
            sources(cli.base_dir, &question).await?;
        }
        Commands::List => {
            list_documents(cli.base_dir).await?;
        }
        Commands::Delete { id } => {
            delete_document(cli.base_dir, id).await?;
        }
        Commands::Status => {
            show_status(cli.base_dir).await?;
        }
    }

    Ok(())
}
