use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vidseek_core::config::{expand_path, Config, Settings};
use vidseek_core::traits::{VectorStore, VideoCatalog};
use vidseek_core::types::{Candidate, DocumentType, Meta, StoredDocument};
use vidseek_embed::get_default_embedder;
use vidseek_llm::providers::{build_local_model, build_registry};
use vidseek_llm::{CompletionChain, LocalParams, Router};
use vidseek_query::VideoSearchEngine;
use vidseek_store::{LanceVectorStore, SqliteCatalog};

const INGEST_BATCH: usize = 256;

#[derive(Parser)]
#[command(name = "vidseek")]
#[command(about = "Natural-language search over an analysed video library", long_about = None)]
struct Cli {
    /// Read settings from this file instead of the config.toml layers
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the library
    Query {
        #[arg(value_name = "QUERY")]
        query: String,
        /// Parse the query with the local model only
        #[arg(long)]
        local: bool,
        /// Rerank with the local model only
        #[arg(long)]
        local_rerank: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add description and transcript documents from a JSON Lines file
    Ingest {
        #[arg(value_name = "RECORDS")]
        path: PathBuf,
        /// Re-ingest videos already marked as processed
        #[arg(long)]
        force: bool,
    },
    /// Set a video's star rating
    Rate {
        video_path: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
        rating: u8,
    },
}

/// One line of an ingest file.
#[derive(Debug, Deserialize)]
struct IngestRecord {
    video_path: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    metadata: Meta,
    #[serde(default)]
    star_rating: Option<u8>,
}

impl IngestRecord {
    fn documents(&self) -> Vec<StoredDocument> {
        let mut docs = Vec::with_capacity(2);
        if let Some(d) = self.description.as_deref().filter(|t| !t.trim().is_empty()) {
            docs.push(StoredDocument::new(&self.video_path, DocumentType::Description, d, self.metadata.clone()));
        }
        if let Some(t) = self.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
            docs.push(StoredDocument::new(&self.video_path, DocumentType::Transcript, t, self.metadata.clone()));
        }
        docs
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match path {
        Some(p) => Config::from_file(p),
        None => Config::load()?,
    };
    config.settings()
}

async fn open_store(settings: &Settings) -> anyhow::Result<LanceVectorStore> {
    let model_dir = settings.store.model_dir.as_deref().map(expand_path);
    let embedder = get_default_embedder(model_dir.as_deref())?;
    let path = settings.store.lancedb_path();
    fs::create_dir_all(&path).with_context(|| format!("creating {}", path.display()))?;
    LanceVectorStore::open(&path, &settings.store.table, Arc::from(embedder)).await
}

fn open_catalog(settings: &Settings) -> anyhow::Result<Option<Arc<dyn VideoCatalog>>> {
    match settings.store.catalog_file() {
        Some(path) => {
            let catalog = SqliteCatalog::open(&path).with_context(|| format!("opening catalog {}", path.display()))?;
            Ok(Some(Arc::new(catalog)))
        }
        None => Ok(None),
    }
}

fn build_chain(settings: &Settings) -> CompletionChain {
    let registry = build_registry(settings);
    let router = if registry.is_empty() {
        warn!("no remote providers configured");
        None
    } else {
        Some(Arc::new(Router::new(Arc::new(registry), settings.router.cooldown())))
    };
    let params = LocalParams { max_tokens: settings.local_model.max_tokens, temperature: settings.local_model.temperature };
    CompletionChain::new(router, build_local_model(&settings.local_model), params)
}

fn print_results(query: &str, results: &[Candidate]) {
    println!("{} result(s) for \"{}\"", results.len(), query);
    for (i, c) in results.iter().enumerate() {
        println!();
        println!("{:>2}. {}  (score {:.3})", i + 1, c.video_path, c.rank_score());
        let scores: Vec<String> = [("description", c.description_score), ("transcript", c.transcript_score)]
            .iter()
            .filter_map(|(name, s)| s.map(|v| format!("{name} {v:.3}")))
            .collect();
        if !scores.is_empty() {
            println!("    {}", scores.join(", "));
        }
        if let Some(d) = &c.description {
            println!("    description: {d}");
        }
        if let Some(t) = &c.transcript {
            println!("    transcript: {t}");
        }
        for key in ["time_of_day", "color", "orientation", "scene", "location", "star_rating"] {
            if let Some(v) = c.metadata.get(key).filter(|v| !v.is_empty()) {
                println!("    {key}: {v}");
            }
        }
    }
}

async fn run_query(settings: &Settings, query: &str, local: bool, local_rerank: bool, json: bool) -> anyhow::Result<()> {
    let store: Arc<dyn VectorStore> = Arc::new(open_store(settings).await?);
    let catalog = open_catalog(settings)?;
    let engine = VideoSearchEngine::from_settings(settings, store, catalog, build_chain(settings));
    let results = engine.search(query, !local, !local_rerank).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(query, &results);
    }
    Ok(())
}

fn read_records(path: &Path) -> anyhow::Result<Vec<IngestRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: IngestRecord =
            serde_json::from_str(line).with_context(|| format!("{}:{}: invalid record", path.display(), n + 1))?;
        records.push(record);
    }
    Ok(records)
}

async fn run_ingest(settings: &Settings, path: &Path, force: bool) -> anyhow::Result<()> {
    let records = read_records(path)?;
    let store = open_store(settings).await?;
    let catalog = open_catalog(settings)?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );

    let mut skipped = 0usize;
    let mut added = 0usize;
    for batch in records.chunks(INGEST_BATCH) {
        let mut docs = Vec::new();
        let mut fresh = Vec::new();
        for record in batch {
            let done = match &catalog {
                Some(c) => c.is_processed(&record.video_path)?,
                None => false,
            };
            if done && !force {
                skipped += 1;
            } else {
                docs.extend(record.documents());
                fresh.push(record);
            }
        }
        added += store.add(&docs).await?;
        if let Some(c) = &catalog {
            for record in fresh {
                c.mark_processed(&record.video_path)?;
                if let Some(rating) = record.star_rating {
                    c.set_star_rating(&record.video_path, rating)?;
                }
            }
        }
        pb.inc(batch.len() as u64);
        pb.set_message(format!("{added} documents"));
    }
    pb.finish_with_message(format!("{added} documents"));
    info!(records = records.len(), documents = added, skipped, "ingest complete");
    Ok(())
}

fn run_rate(settings: &Settings, video_path: &str, rating: u8) -> anyhow::Result<()> {
    let Some(catalog) = open_catalog(settings)? else {
        bail!("no catalog configured (store.catalog_path)");
    };
    catalog.set_star_rating(video_path, rating)?;
    println!("{video_path}: {rating} star(s)");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Query { query, local, local_rerank, json } => run_query(&settings, &query, local, local_rerank, json).await,
        Commands::Ingest { path, force } => run_ingest(&settings, &path, force).await,
        Commands::Rate { video_path, rating } => run_rate(&settings, &video_path, rating),
    }
}
