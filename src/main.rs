//! Pulscen-Harvest main entry point
//!
//! This is the command-line interface for the Pulscen-Harvest catalogue
//! scraper.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pulscen_harvest::config::{load_config_or_default, validate, Config};
use pulscen_harvest::crawler::{
    enumerate_links, extract_product, run_collection, walk_categories, Fetcher,
};
use pulscen_harvest::output::{
    export_collection, load_statistics, print_statistics, print_summary,
};
use pulscen_harvest::storage::open_store;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Pulscen-Harvest: a catalogue scraper
///
/// Walks a category page, enumerates the paginated product listings of its
/// subcategories and extracts every product page into a structured record,
/// stored in a SQLite document store and a JSON-lines file.
#[derive(Parser, Debug)]
#[command(name = "pulscen-harvest")]
#[command(version)]
#[command(about = "A catalogue scraper for pulscen-style product sites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply without one)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the subcategories of a category page as JSON
    Categories {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Print every product link of a paginated listing as JSON
    Links {
        #[arg(value_name = "URL")]
        url: String,

        /// Maximum listing pages to fetch
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,
    },

    /// Extract one product page and print the record as JSON
    Product {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Collect every product of one or more categories
    Collect(CollectArgs),

    /// Show the stored product count and a recorded run
    Stats {
        /// Run to show instead of the most recent one
        #[arg(long, value_name = "ID")]
        run: Option<i64>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Write every stored product as a pretty-printed JSON array
    Export {
        /// Destination file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// Category page URLs
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// JSON-lines output file
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Append to the output file instead of truncating it
    #[arg(long)]
    append: bool,

    #[command(flatten)]
    store: StoreArgs,

    /// Subcategories processed concurrently
    #[arg(long, value_name = "N")]
    link_concurrency: Option<u32>,

    /// Product pages fetched concurrently per subcategory
    #[arg(long, value_name = "N")]
    product_concurrency: Option<u32>,

    /// Maximum listing pages per subcategory
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// SQLite document store
    #[arg(short, long, value_name = "PATH")]
    database: Option<String>,

    /// Collection inside the document store
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,
}

impl StoreArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(database) = &self.database {
            config.output.database_path = database.clone();
        }
        if let Some(collection) = &self.collection {
            config.output.collection = collection.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config =
        load_config_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Invalid default configuration".to_string(),
        })?;

    match cli.command {
        Command::Categories { url } => {
            let fetcher = Fetcher::new(&config.fetcher)?;
            let categories = walk_categories(&fetcher, &parse_url(&url)?).await?;
            println!("{}", serde_json::to_string_pretty(&categories)?);
        }

        Command::Links { url, max_pages } => {
            let fetcher = Fetcher::new(&config.fetcher)?;
            let max_pages = max_pages.unwrap_or(config.crawl.max_pages);
            let links = enumerate_links(&fetcher, &parse_url(&url)?, max_pages).await?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }

        Command::Product { url } => {
            let fetcher = Fetcher::new(&config.fetcher)?;
            let record = extract_product(&fetcher, &parse_url(&url)?).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Collect(args) => {
            apply_collect_args(&args, &mut config);
            validate(&config).context("Invalid command-line overrides")?;
            handle_collect(config, &args).await?;
        }

        Command::Stats { run, store } => {
            store.apply(&mut config);
            handle_stats(&config, run)?;
        }

        Command::Export { path, store } => {
            store.apply(&mut config);
            handle_export(&config, &path)?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("pulscen_harvest=error,error")
    } else {
        match verbose {
            0 => EnvFilter::new("pulscen_harvest=warn,warn"),
            1 => EnvFilter::new("pulscen_harvest=info,warn"),
            2 => EnvFilter::new("pulscen_harvest=debug,info"),
            _ => EnvFilter::new("pulscen_harvest=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("Unsupported URL scheme: {}", url.scheme());
    }
    Ok(url)
}

fn apply_collect_args(args: &CollectArgs, config: &mut Config) {
    args.store.apply(config);
    if let Some(output) = &args.output {
        config.output.jsonl_path = output.clone();
    }
    if let Some(n) = args.link_concurrency {
        config.crawl.link_concurrency = n;
    }
    if let Some(n) = args.product_concurrency {
        config.crawl.product_concurrency = n;
    }
    if let Some(n) = args.max_pages {
        config.crawl.max_pages = n;
    }
}

/// Handles the main collection operation
async fn handle_collect(config: Config, args: &CollectArgs) -> Result<()> {
    let categories = args
        .urls
        .iter()
        .map(|raw| parse_url(raw))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        categories = categories.len(),
        database = %config.output.database_path,
        collection = %config.output.collection,
        output = %config.output.jsonl_path,
        "starting collection"
    );

    let summary = run_collection(config, &categories, args.append)
        .await
        .context("Collection aborted")?;

    print_summary(&summary);
    Ok(())
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config, run_id: Option<i64>) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let stats = load_statistics(&store, &config.output.collection, run_id)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the export command: dumps the collection as a JSON array
fn handle_export(config: &Config, path: &Path) -> Result<()> {
    let store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let count = export_collection(&store, &config.output.collection, path)
        .with_context(|| format!("Failed to export to {}", path.display()))?;

    println!("✓ Exported {} products to {}", count, path.display());
    Ok(())
}
