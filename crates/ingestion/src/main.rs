//! MedRAG Ingestion
//!
//! One-shot batch job that builds the vector index:
//! 1. Asks the LLM for reputable medical article URLs
//! 2. Scrapes each page to a plain-text document
//! 3. Chunks, embeds and stores every document

mod chunker;
mod documents;
mod errors;
mod processor;
mod scraper;
mod urls;

use anyhow::Context;
use chunker::ChunkingConfig;
use clap::{Parser, Subcommand};
use medrag_common::{
    config::AppConfig,
    db::{DbPool, PgVectorIndex},
    embeddings::create_embedder,
    llm::ChatCompletionsGenerator,
    telemetry, VERSION,
};
use processor::{IngestionProcessor, IngestionReport};
use crate::scraper::{Scraper, ScraperConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about = "Build the MedRAG vector index from scraped medical pages")]
struct Cli {
    /// Directory of plain-text documents (overrides ingestion.docs_dir)
    #[arg(long, global = true, env = "MEDRAG_DOCS_DIR")]
    docs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the LLM for article URLs and print them, one per line
    Discover {
        /// Write the URLs to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Scrape the URLs listed in a file into the documents directory
    Scrape {
        /// File with one URL per line
        #[arg(long)]
        urls: PathBuf,
    },
    /// Chunk, embed and store every document in the documents directory
    Ingest,
    /// Discover, scrape and ingest in one go
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = cli.docs_dir {
        config.ingestion.docs_dir = dir;
    }
    telemetry::init(&config.observability)?;
    config.validate()?;

    info!("Starting MedRAG ingestion v{}", VERSION);

    match cli.command {
        Command::Discover { output } => {
            let urls = discover(&config).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, urls.join("\n")).await?;
                    info!(path = %path.display(), count = urls.len(), "URLs written");
                }
                None => {
                    for url in &urls {
                        println!("{}", url);
                    }
                }
            }
        }
        Command::Scrape { urls } => {
            let contents = tokio::fs::read_to_string(&urls)
                .await
                .with_context(|| format!("failed to read URL list {}", urls.display()))?;
            let lines: Vec<&str> = contents.lines().collect();
            let urls = urls::extract_valid_urls(&lines, config.ingestion.url_limit);
            scrape(&config, &urls).await?;
        }
        Command::Ingest => {
            let report = ingest(&config).await?;
            println!("{}", report);
        }
        Command::Run => {
            // both credentials are needed; fail before any network work
            config.require_llm_api_key()?;
            config.require_database_url()?;

            println!("Generating medical URLs...");
            let urls = discover(&config).await?;
            println!("Got {} URLs", urls.len());

            println!("Scraping URLs...");
            scrape(&config, &urls).await?;

            println!("Processing docs...");
            let report = ingest(&config).await?;
            println!("{}", report);
            println!("Pipeline finished!");
        }
    }

    Ok(())
}

async fn discover(config: &AppConfig) -> anyhow::Result<Vec<String>> {
    let generator = ChatCompletionsGenerator::from_config(config)?;
    let urls = urls::discover_urls(&generator, config.ingestion.url_limit).await?;
    Ok(urls)
}

async fn scrape(config: &AppConfig, urls: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let scraper = Scraper::new(ScraperConfig::from(&config.ingestion))?;
    Ok(scraper.scrape_all(urls, &config.ingestion.docs_dir).await)
}

async fn ingest(config: &AppConfig) -> anyhow::Result<IngestionReport> {
    let database_url = config.require_database_url()?;
    let docs_dir: &Path = &config.ingestion.docs_dir;

    info!("Connecting to database...");
    let pool = DbPool::connect(database_url, &config.database).await?;
    let index = PgVectorIndex::from_config(pool.clone(), &config.database, config.embedding.dimension)?;

    info!(model = %config.embedding.model, "Loading embedding model...");
    let embedder = create_embedder(&config.embedding).await?;

    let processor = IngestionProcessor::new(
        embedder,
        Arc::new(index),
        ChunkingConfig::new(config.ingestion.chunk_size),
    );
    let report = processor.process_dir(docs_dir).await;

    pool.close().await?;
    Ok(report?)
}
