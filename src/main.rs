// src/main.rs
mod analysis;
mod config;
mod extractors;
mod index;
mod llm;
mod pipeline;
mod server;
mod storage;
mod utils;

use clap::{Parser, Subcommand};
use config::AppConfig;
use llm::{ChatClient, EmbeddingClient};
use pipeline::Orchestrator;
use server::handlers::AppState;
use std::sync::Arc;
use storage::RequestLogStore;
use utils::error::StorageError;
use utils::AppError;

/// Quarterly forecast agent: report metrics, transcript summary, outlook
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Rebuild the transcript index from scratch
    BuildIndex,
    /// Print one logged forecast request as JSON
    ShowRequest {
        /// Request log id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments and load config
    let args = Args::parse();
    tracing::debug!("Starting with args: {:?}", args);
    let config = AppConfig::from_env()?;
    tracing::info!(
        "Data root: {}, index: {}, model: {} at {}",
        config.data_root.display(),
        config.index_dir.display(),
        config.model.chat_model,
        config.model.base_url
    );

    // 3. Model clients
    let model = Arc::new(ChatClient::new(&config.model)?);
    let embedder = Arc::new(EmbeddingClient::new(&config.model)?);

    match args.command {
        Command::BuildIndex => {
            let orchestrator = Orchestrator::new(config, model, embedder);
            let index = orchestrator.build_index().await?;
            tracing::info!("Index rebuilt with {} chunks", index.len());
        }
        Command::ShowRequest { id } => {
            let logs = RequestLogStore::open(config.database_url.as_deref(), &config.fallback_db_path)?;
            let row = logs.get(id)?.ok_or(StorageError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
        Command::Serve { bind } => {
            // 4. Request log storage
            let logs = RequestLogStore::open(config.database_url.as_deref(), &config.fallback_db_path)?;
            tracing::info!("Request log database: {:?}", logs.target());
            let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            let state = Arc::new(AppState { orchestrator: Orchestrator::new(config, model, embedder), logs });

            // 5. Serve
            server::serve(state, &bind_addr).await?;
        }
    }

    tracing::info!("Done.");
    Ok(())
}
