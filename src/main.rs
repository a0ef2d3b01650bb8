use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use semdex::config::{self, Config};
use semdex::orchestrator::DocumentOrchestrator;
use semdex::server;

#[derive(Parser)]
#[command(name = "semdex", version, about = "Semantic document index and retrieval service")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply if the file does
    /// not exist.
    #[arg(short, long, global = true, default_value = "./semdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve,
    /// Process a file and index it, waiting for completion.
    Ingest {
        /// Path to a pdf, docx, txt, xlsx, or xls file.
        path: PathBuf,
    },
    /// Query the index.
    Search {
        query: String,
        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Minimum similarity score.
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// List registered documents.
    List,
    /// Delete one document and its vectors.
    Delete { id: String },
    /// Delete every document and vector.
    Clear,
    /// Show document and chunk counts.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "semdex=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::info!(path = %cli.config.display(), "no config file, using defaults");
        Config::default()
    };

    match cli.command {
        Command::Serve => server::run_server(config).await,
        Command::Ingest { path } => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", path.display()))?
                .to_string();
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;

            let orchestrator = DocumentOrchestrator::from_config(config)?;
            let document = orchestrator.ingest(&file_name, bytes).await?;
            println!(
                "{} {} ({} words, {} chunks)",
                document.id,
                document.metadata.processing_status,
                document.metadata.word_count,
                document.metadata.chunk_count
            );
            Ok(())
        }
        Command::Search {
            query,
            limit,
            threshold,
        } => {
            let orchestrator = DocumentOrchestrator::from_config(config)?;
            let result = orchestrator.search(&query, limit, threshold).await?;
            if result.chunks.is_empty() {
                println!("no results");
                return Ok(());
            }
            for (chunk, score) in result.chunks.iter().zip(&result.scores) {
                println!("[{:.4}] {} ({})", score, chunk.id, chunk.document_id);
                println!("  {}", chunk.content);
            }
            Ok(())
        }
        Command::List => {
            let orchestrator = DocumentOrchestrator::from_config(config)?;
            for document in orchestrator.list().await {
                println!(
                    "{}  {}  {}  {} chunks",
                    document.id,
                    document.metadata.processing_status,
                    document.file_name,
                    document.metadata.chunk_count
                );
            }
            Ok(())
        }
        Command::Delete { id } => {
            let orchestrator = DocumentOrchestrator::from_config(config)?;
            let deleted = orchestrator.delete(&id).await?;
            println!("{}", if deleted { "deleted" } else { "not found" });
            Ok(())
        }
        Command::Clear => {
            let orchestrator = DocumentOrchestrator::from_config(config)?;
            orchestrator.clear_all().await?;
            println!("cleared");
            Ok(())
        }
        Command::Status => {
            let orchestrator = DocumentOrchestrator::from_config(config)?;
            let status = orchestrator.status().await;
            println!(
                "documents: {}\nchunks: {}\nmodel: {}",
                status.documents_count, status.chunks_count, status.embedding_model
            );
            Ok(())
        }
    }
}
