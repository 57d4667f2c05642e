//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod scrape;
mod sites;
mod upload;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config::Config;

use scrape::ScrapeArgs;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Design agency portfolio scraper")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape listing pages (load more until exhausted) and save new projects
    Scrape(ScrapeArgs),

    /// Run the extractor on saved HTML, for checking selectors offline
    Extract {
        /// Saved listing page
        html_file: PathBuf,
        /// URL the page was saved from (used to resolve relative links)
        #[arg(long)]
        base_url: String,
        /// Site profile (default: detected from the base URL)
        #[arg(short, long)]
        site: Option<String>,
        /// Merge the records into this JSON file instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert saved JSON files (or directories of them) into the document store
    Upload {
        /// JSON files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Document store URL (sqlite path)
        #[arg(long, env = "FOLIO_STORE_URL")]
        store_url: Option<String>,
        /// Document store database name
        #[arg(long)]
        store_database: Option<String>,
        /// Document store collection name
        #[arg(long)]
        store_collection: Option<String>,
    },

    /// List known site profiles
    Sites {
        /// Show one profile in detail
        name: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Config::settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Scrape(args) => scrape::cmd_scrape(settings, args).await,
        Commands::Extract {
            html_file,
            base_url,
            site,
            output,
        } => extract::cmd_extract(&settings, &html_file, &base_url, site.as_deref(), output).await,
        Commands::Upload {
            paths,
            store_url,
            store_database,
            store_collection,
        } => upload::cmd_upload(&settings, &paths, store_url, store_database, store_collection),
        Commands::Sites { name } => sites::cmd_sites(&settings, name.as_deref()),
    }
}
