use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use hadith_core::{EngineConfig, SearchEngine};
use hadith_server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Data directory holding collections.json and search-index.json
    #[arg(long, default_value = "./data")]
    data: String,
    /// Optional JSON engine configuration file
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Build the index before accepting requests instead of on the first query
    #[arg(long, default_value_t = false)]
    eager: bool,
    /// Override the result cache capacity
    #[arg(long)]
    cache_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(capacity) = args.cache_capacity {
        config.cache_capacity = capacity;
    }
    config.validate()?;

    let engine = Arc::new(SearchEngine::from_data_dir(&args.data, config));
    if args.eager {
        let warm = engine.clone();
        tokio::task::spawn_blocking(move || warm.warm())
            .await?
            .with_context(|| format!("building index from {}", args.data))?;
    }
    let app: Router = build_app(engine);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, data = %args.data, eager = args.eager, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
