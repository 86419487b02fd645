use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use research_companion::api;
use research_companion::app::build_state;
use research_companion::config::AppConfig;
use research_companion::document::DocumentKind;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "AI research companion backend", long_about = None)]
struct Args {
    /// Address to bind (overrides SERVER_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to bind (overrides PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Extract a local file and store it for retrieval
    Ingest {
        path: PathBuf,
        /// Document id, defaults to the file name
        #[arg(long)]
        id: Option<String>,
    },
    /// Answer a question from the stored documents
    Ask { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("research_companion=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host.clone() {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_api_server(config).await,
        Command::Ingest { path, id } => ingest(config, path, id).await,
        Command::Ask { question } => ask(config, &question).await,
    }
}

async fn run_api_server(config: AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let state = build_state(&config).await?;
    let app = api::create_api(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "AI Research Companion running");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn ingest(config: AppConfig, path: PathBuf, id: Option<String>) -> Result<()> {
    let state = build_state(&config).await?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let text = state.extractor.extract(bytes, DocumentKind::from_filename(&filename)).await;
    let id = id.unwrap_or(filename);
    if text.is_empty() {
        println!("No text could be extracted from {}, nothing stored.", path.display());
        return Ok(());
    }

    state.retrieval.store(&text, &id).await?;
    println!("Stored {} ({} characters)", id, text.chars().count());
    Ok(())
}

async fn ask(config: AppConfig, question: &str) -> Result<()> {
    let state = build_state(&config).await?;

    let context = state.retrieval.query(question).await?;
    let context_text = context.as_ref().map(|c| c.text.as_str()).unwrap_or("");
    let answer = state.answering.answer(context_text, question).await?;

    println!("{}", answer.text);
    if let Some(context) = context {
        match answer.confidence {
            Some(confidence) => println!("(source: {}, similarity {:.3}, confidence {:.3})", context.id, context.score, confidence),
            None => println!("(source: {}, similarity {:.3})", context.id, context.score),
        }
    }
    Ok(())
}
