use anyhow::Result;
use clap::{Parser, Subcommand};
use hadith_core::{EngineConfig, SearchEngine, SearchFilters};
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hadith-indexer")]
#[command(about = "Build, inspect and query the hadith search index", long_about = None)]
struct Cli {
    /// Data directory holding collections.json and search-index.json
    #[arg(long, global = true, default_value = "./data")]
    data: String,
    /// Optional JSON engine configuration file
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the corpus, build the index and print its statistics
    Stats,
    /// Run a search and print the ranked results as JSON
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        /// Edit distance tolerance
        #[arg(long)]
        fuzzy: Option<u8>,
        /// Include highlight spans
        #[arg(long, default_value_t = false)]
        highlights: bool,
    },
    /// Print one hadith by collection, book number and book reference
    Lookup { collection: String, book: String, reference: String },
}

#[derive(Serialize)]
struct BuildReport<'a> {
    built_at: String,
    build_ms: u128,
    #[serde(flatten)]
    stats: &'a hadith_core::EngineStats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = SearchEngine::from_data_dir(&cli.data, config);

    match cli.command {
        Commands::Stats => {
            let start = Instant::now();
            engine.warm()?;
            let build_ms = start.elapsed().as_millis();
            let stats = engine.stats();
            let report = BuildReport {
                built_at: time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default(),
                build_ms,
                stats: &stats,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Search { query, limit, collection, grade, fuzzy, highlights } => {
            let filters = SearchFilters { collection, grade, fuzzy };
            let start = Instant::now();
            let json = if highlights {
                serde_json::to_string_pretty(&engine.search_advanced(&query, limit, &filters)?)?
            } else {
                serde_json::to_string_pretty(&engine.search(&query, limit, &filters)?)?
            };
            tracing::info!(took_ms = start.elapsed().as_millis() as u64, "search complete");
            println!("{json}");
        }
        Commands::Lookup { collection, book, reference } => {
            let doc = engine.lookup(&collection, &book, &reference)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
