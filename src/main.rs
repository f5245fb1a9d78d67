//! # SpaceX RAG CLI (`spacex-rag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `spacex-rag serve` | Start the HTTP server |
//! | `spacex-rag index build` | Rebuild the index from the corpus and persist it |
//! | `spacex-rag ask "<question>"` | Answer one question on stdout |
//! | `spacex-rag launches [--limit N]` | Print launch data as JSON |
//!
//! ## Examples
//!
//! ```bash
//! export XAI_API_KEY=...
//! spacex-rag --config ./config/rag.toml index build
//! spacex-rag ask "What caused the IFT-5 anomaly?"
//! spacex-rag serve
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use spacex_rag::config::{load_config, Config};
use spacex_rag::embedding::create_embedder;
use spacex_rag::index;
use spacex_rag::launches::LaunchClient;
use spacex_rag::logging;
use spacex_rag::server::{self, AppState};

/// Retrieval-augmented question answering over SpaceX launch notes.
#[derive(Parser)]
#[command(name = "spacex-rag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Manage the persisted index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Answer a single question and print the sources used.
    Ask {
        question: String,
    },

    /// Print launch data from the SpaceX API.
    Launches {
        /// Print the N most recent raw launch records instead of the latest summary.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild from the corpus and overwrite `index.persist_dir`.
    Build,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => server::run_server(&config).await?,
        Commands::Index {
            action: IndexAction::Build,
        } => run_index_build(&config).await?,
        Commands::Ask { question } => run_ask(&config, &question).await?,
        Commands::Launches { limit } => run_launches(&config, limit).await?,
    }

    Ok(())
}

async fn run_index_build(config: &Config) -> Result<()> {
    let dir = config
        .index
        .persist_dir
        .as_ref()
        .context("index build requires [index].persist_dir")?;
    let embedder = create_embedder(&config.embedding)?;
    let built = index::rebuild(config, embedder.as_ref()).await?;
    println!(
        "indexed {} documents, {} chunks -> {}",
        built.manifest.document_count,
        built.manifest.chunk_count,
        dir.display()
    );
    Ok(())
}

async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let state = AppState::from_config(config)?;
    let result = state.engine.answer(question).await?;
    let previews = state.engine.source_previews(&result);

    println!("{}", result.answer_text);
    if !previews.is_empty() {
        println!();
        println!("Sources:");
        for (chunk, preview) in result.supporting_chunks.iter().zip(previews) {
            println!("  [{:.3}] {}: {}", chunk.score, chunk.source_path, preview);
        }
    }
    Ok(())
}

async fn run_launches(config: &Config, limit: Option<usize>) -> Result<()> {
    let client = LaunchClient::new(&config.launches)?;
    let value = match limit {
        None => serde_json::to_value(client.latest().await?)?,
        Some(0) => bail!("--limit must be >= 1"),
        Some(n) => serde_json::Value::Array(client.recent(n).await?),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
