//! Lemmex main entry point
//!
//! This is the command-line interface for the Lemmex search engine.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lemmex::config::{load_config, Config};
use lemmex::morphology::{DictionaryMorphology, Lemmatizer};
use lemmex::search::SearchEngine;
use lemmex::service::{IndexingService, RunState};
use lemmex::stats::load_statistics;
use lemmex::storage::{open_storage, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Lemmex: a self-hosted site search engine
///
/// Lemmex crawls a configured set of websites, builds a lemmatized
/// inverted index in SQLite, and answers ranked search queries over it.
#[derive(Parser, Debug)]
#[command(name = "lemmex")]
#[command(version = "1.0.0")]
#[command(about = "A self-hosted site search engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "lemmex.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl and index every configured site
    Index,

    /// Refetch and reindex a single page of a configured site
    Page {
        /// Absolute URL of the page
        url: String,
    },

    /// Run a search query against the index
    Search {
        /// Free-text query
        query: String,

        /// Restrict the search to one configured site root URL
        #[arg(long)]
        site: Option<String>,

        /// Number of leading results to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Maximum number of results to return
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Print corpus statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Index => handle_index(config).await?,
        Command::Page { url } => handle_page(config, &url).await?,
        Command::Search {
            query,
            site,
            offset,
            limit,
        } => handle_search(config, &query, site.as_deref(), offset, limit)?,
        Command::Stats => handle_stats(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lemmex=info,warn"),
            1 => EnvFilter::new("lemmex=debug,info"),
            2 => EnvFilter::new("lemmex=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens storage and builds the lemmatizer shared by indexing and search
fn build_runtime(config: &Config) -> anyhow::Result<(Arc<Mutex<SqliteStorage>>, Arc<Lemmatizer>)> {
    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let storage = Arc::new(Mutex::new(storage));

    let dictionary_path = config
        .index
        .dictionary_path
        .as_deref()
        .context("index.dictionary-path must be set in the configuration")?;
    let morphology = DictionaryMorphology::from_path(Path::new(dictionary_path))
        .with_context(|| format!("Failed to load dictionary {}", dictionary_path))?;
    let lemmatizer = Arc::new(Lemmatizer::new(Arc::new(morphology)));

    Ok((storage, lemmatizer))
}

/// Handles the `index` subcommand: full crawl and index of all sites
async fn handle_index(config: Config) -> anyhow::Result<()> {
    let (storage, lemmatizer) = build_runtime(&config)?;
    let service = IndexingService::new(Arc::new(config), storage, lemmatizer)?;

    service.start_full_indexing()?;
    service.wait().await;

    match service.run_state() {
        RunState::Completed => {
            tracing::info!("Full indexing completed");
            Ok(())
        }
        state => {
            tracing::error!("Full indexing ended in state {:?}", state);
            bail!("indexing ended in state {:?}", state);
        }
    }
}

/// Handles the `page` subcommand: reindex one page
async fn handle_page(config: Config, url: &str) -> anyhow::Result<()> {
    let (storage, lemmatizer) = build_runtime(&config)?;
    let service = IndexingService::new(Arc::new(config), storage, lemmatizer)?;

    service.reindex_page(url)?;
    service.wait().await;

    match service.run_state() {
        RunState::Completed => {
            tracing::info!("Page reindexed: {}", url);
            Ok(())
        }
        state => {
            tracing::error!("Page reindex ended in state {:?}", state);
            bail!("page reindex ended in state {:?}", state);
        }
    }
}

/// Handles the `search` subcommand: query the index and print JSON results
fn handle_search(
    config: Config,
    query: &str,
    site: Option<&str>,
    offset: i64,
    limit: i64,
) -> anyhow::Result<()> {
    let (storage, lemmatizer) = build_runtime(&config)?;
    let engine = SearchEngine::new(storage, lemmatizer, config.search.clone());

    let outcome = engine.search(query, site, offset, limit)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Handles the `stats` subcommand: print corpus statistics as JSON
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let report = load_statistics(&storage)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
