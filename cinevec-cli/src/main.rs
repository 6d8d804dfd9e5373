//! cinevec — semantic movie recommendations over a persistent vector store
//!
//! # Subcommands
//! - `demo`                                  — seed the sample dataset and run the two example queries
//! - `seed`                                  — populate the collection only
//! - `search <query> [-n <limit>] [--genre <g>] [--year <y>]` — ad-hoc semantic search

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cinevec_core::embeddings::{BackendConfig, EmbeddingBackend, HttpEmbeddingConfig, OnnxConfig};
use cinevec_core::models::{sample_movies, MetadataFilter, QueryMatch};
use cinevec_core::store::Collection;
use cinevec_core::workflow::{recommend, seed_movies};
use cinevec_core::{onnx_embedder, CinevecConfig, VectorStore};

const DEFAULT_LIMIT: usize = 3;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "cinevec",
    version,
    about = "Semantic movie recommendations — embed, store, query"
)]
struct Cli {
    /// Config file path (TOML; optional, defaults apply when missing)
    #[arg(short, long, env = "CINEVEC_CONFIG", default_value = "cinevec.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Seed the sample movies and run the two example queries
    Demo,

    /// Embed the sample movies and store them, without querying
    Seed,

    /// Search the collection semantically
    Search {
        /// Query text to search for
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Only return movies with this genre
        #[arg(long)]
        genre: Option<String>,

        /// Only return movies from this year
        #[arg(long)]
        year: Option<i64>,
    },
}

// ============================================================================
// Backend / store construction
// ============================================================================

/// Create an embedding backend from the application config.
///
/// Reads `[embedding] backend` to select the local ONNX model or a remote
/// OpenAI-compatible API.
fn create_backend_from_config(
    config: &CinevecConfig,
) -> Result<Box<dyn EmbeddingBackend>, cinevec_core::EmbeddingError> {
    let backend_cfg = match config.embedding.backend.as_str() {
        "http" => {
            // An empty configured key falls back to CINEVEC_API_KEY.
            let api_key =
                Some(config.embedding.http_api_key.clone()).filter(|k| !k.is_empty());
            let mut http = HttpEmbeddingConfig::new(
                config.embedding.http_base_url.clone(),
                api_key,
                config.embedding.http_model.clone(),
                config.embedding.http_dimensions as usize,
            );
            http.max_retries = config.embedding.max_retries as usize;
            http.retry_delay_ms = config.embedding.retry_delay_ms;
            BackendConfig::Http(http)
        }
        _ => {
            // Default: "onnx"
            let (model_path, tokenizer_path) =
                onnx_embedder::resolve_onnx_paths(&config.embedding.onnx_model_path);
            BackendConfig::Onnx(OnnxConfig {
                model_path,
                tokenizer_path,
                dimensions: config.embedding.onnx_dimensions as usize,
            })
        }
    };

    cinevec_core::create_backend(backend_cfg)
}

/// Seed the sample dataset unless the collection is already populated.
async fn seed_if_empty(
    collection: &Collection,
    backend: &dyn EmbeddingBackend,
) -> anyhow::Result<usize> {
    if !collection.is_empty()? {
        tracing::info!(
            collection = collection.name(),
            count = collection.len()?,
            "Collection already seeded, skipping"
        );
        return Ok(0);
    }

    let inserted = seed_movies(collection, backend, &sample_movies()).await?;
    Ok(inserted)
}

// ============================================================================
// Output formatting
// ============================================================================

/// Format a single recommendation line: "Recommended Movie: Title (Year)".
fn format_match(m: &QueryMatch) -> String {
    let title = m
        .metadata
        .get("title")
        .map(ToString::to_string)
        .unwrap_or_else(|| m.id.clone());

    match m.metadata.get("year") {
        Some(year) => format!("Recommended Movie: {title} ({year})"),
        None => format!("Recommended Movie: {title}"),
    }
}

fn print_results(query: &str, results: &[QueryMatch]) {
    println!("For query: {query}");
    if results.is_empty() {
        println!("No recommendations found.");
        return;
    }
    for m in results {
        println!("{}", format_match(m));
    }
}

// ============================================================================
// Subcommand drivers
// ============================================================================

async fn run_demo(
    collection: &Collection,
    backend: &dyn EmbeddingBackend,
) -> anyhow::Result<()> {
    seed_if_empty(collection, backend).await?;

    // Example 1: plain similarity query
    let query = "A mind-bending thriller about dreams.";
    let results = recommend(collection, backend, query, DEFAULT_LIMIT, None).await?;
    print_results(query, &results);

    println!();

    // Example 2: same flow, restricted to Drama by metadata filter
    let query = "A story of friendship and ambition.";
    let filter = MetadataFilter::new().with("genre", "Drama");
    let results = recommend(collection, backend, query, DEFAULT_LIMIT, Some(&filter)).await?;
    print_results(query, &results);

    Ok(())
}

async fn run_search(
    collection: &Collection,
    backend: &dyn EmbeddingBackend,
    query: &str,
    limit: usize,
    genre: Option<String>,
    year: Option<i64>,
) -> anyhow::Result<()> {
    let mut filter = MetadataFilter::new();
    if let Some(genre) = genre {
        filter = filter.with("genre", genre);
    }
    if let Some(year) = year {
        filter = filter.with("year", year);
    }
    let filter = if filter.is_empty() { None } else { Some(&filter) };

    let results = recommend(collection, backend, query, limit, filter).await?;
    print_results(query, &results);

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (dev convenience for CINEVEC_API_KEY)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match CinevecConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cinevec: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };

    let backend = match create_backend_from_config(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("cinevec: failed to initialize embedding backend: {e}");
            std::process::exit(1);
        }
    };

    let store = match VectorStore::open(&config.store.path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cinevec: failed to open store: {e}");
            std::process::exit(1);
        }
    };

    let collection = store.get_or_create_collection(&config.store.collection)?;

    match cli.command {
        Commands::Demo => run_demo(&collection, backend.as_ref()).await?,
        Commands::Seed => {
            let inserted = seed_if_empty(&collection, backend.as_ref()).await?;
            println!(
                "Seeded {} movies into collection {:?}.",
                inserted,
                collection.name()
            );
        }
        Commands::Search {
            query,
            limit,
            genre,
            year,
        } => run_search(&collection, backend.as_ref(), &query, limit, genre, year).await?,
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
