//! HTTP Server Binary for the Biograph API
//!
//! Serves search and statistics endpoints over either a remote SPARQL endpoint
//! or a local RDF dump loaded into an in-process store.
//!
//! Usage:
//!   cargo run --bin http_server -- --endpoint https://triplestore.example.org/sparql
//!   cargo run --bin http_server -- --data-file data/sample.ttl --port 8080

use biograph::{
    api::{BiographApi, StatisticsConfig},
    cache::{self, CacheConfig},
    http::start_server,
    parsing::schema_config::SchemaRegistry,
    querying::{EndpointConfig, HttpSparqlExecutor, OxigraphExecutor, QueryExecutor},
    registry::TemplateRegistry,
    stats::BoundaryMode,
};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "Biograph HTTP Server")]
#[command(about = "HTTP API server for the Biograph knowledge-graph backend", long_about = None)]
struct Args {
    #[arg(short = 'H', long, env = "BIOGRAPH_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, env = "BIOGRAPH_PORT", default_value = "8080")]
    port: u16,

    /// Remote SPARQL endpoint URL
    #[arg(long, env = "BIOGRAPH_ENDPOINT", conflicts_with = "data_file")]
    endpoint: Option<String>,

    /// RDF file to load into an in-process store instead of using an endpoint
    #[arg(long, env = "BIOGRAPH_DATA_FILE")]
    data_file: Option<String>,

    #[arg(long, env = "BIOGRAPH_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "BIOGRAPH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Endpoint request timeout in seconds
    #[arg(long, env = "BIOGRAPH_TIMEOUT_SECS", default_value = "60")]
    timeout_secs: u64,

    #[arg(long, env = "BIOGRAPH_SCHEMA_FILE", default_value = "config/schemas.json")]
    schema_file: String,

    #[arg(long, env = "BIOGRAPH_TEMPLATE_DIR", default_value = "queries")]
    template_dir: String,

    /// Maximum number of cached responses (0 disables the cache)
    #[arg(long, env = "BIOGRAPH_CACHE_SIZE", default_value = "1000")]
    cache_size: u64,

    #[arg(long, env = "BIOGRAPH_CACHE_TTL_SECS", default_value = "300")]
    cache_ttl_secs: u64,

    /// Histogram boundary handling: inclusive or half-open
    #[arg(long, env = "BIOGRAPH_BOUNDARY_MODE", default_value = "inclusive")]
    boundary_mode: BoundaryMode,

    #[arg(long, env = "BIOGRAPH_MAX_TAXONOMY_DEPTH", default_value = "16")]
    max_taxonomy_depth: usize,
}

fn build_executor(args: &Args) -> biograph::Result<Arc<dyn QueryExecutor>> {
    if let Some(path) = &args.data_file {
        let executor = OxigraphExecutor::new()?;
        executor.load_file(path)?;
        return Ok(Arc::new(executor));
    }

    let Some(url) = &args.endpoint else {
        return Err(biograph::Error::Config(
            "either --endpoint or --data-file is required".to_string(),
        ));
    };
    let mut config = EndpointConfig::new(url.clone());
    config.username = args.username.clone();
    config.password = args.password.clone();
    config.timeout_secs = args.timeout_secs;
    tracing::info!(endpoint = %config.url, "using remote SPARQL endpoint");
    Ok(Arc::new(HttpSparqlExecutor::new(config)?))
}

fn build_api(args: &Args) -> biograph::Result<BiographApi> {
    let schemas = SchemaRegistry::from_file(&args.schema_file)?;
    tracing::info!(file = %args.schema_file, schemas = schemas.len(), "schemas validated");

    let templates = TemplateRegistry::from_dir(&args.template_dir)?;
    let executor = build_executor(args)?;

    let cache_config = CacheConfig {
        enabled: args.cache_size > 0,
        max_entries: args.cache_size,
        ttl_secs: args.cache_ttl_secs,
    };
    let statistics = StatisticsConfig {
        boundary_mode: args.boundary_mode,
        max_taxonomy_depth: args.max_taxonomy_depth,
    };

    Ok(BiographApi::new(executor, Arc::new(templates), Arc::new(schemas))
        .with_cache(Arc::from(cache::from_config(&cache_config)))
        .with_statistics(statistics))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // The blocking HTTP client must be built outside the async runtime.
    let api = Arc::new(build_api(&args)?);
    let addr = format!("{}:{}", args.host, args.port);

    let runtime = tokio::runtime::Runtime::new()?;
    let server_api = Arc::clone(&api);
    runtime.block_on(async move {
        // Set up graceful shutdown
        let shutdown_signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received, stopping server");
        };

        tokio::select! {
            result = start_server(&addr, server_api) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "server error");
                }
            }
            () = shutdown_signal => {
                tracing::info!("server shut down gracefully");
            }
        }
    });

    // Drop the runtime before the API so the blocking client is released
    // outside of any async context.
    drop(runtime);
    drop(api);
    Ok(())
}
