//! Upload command: push saved JSON files into the document store.

use std::path::PathBuf;
use std::process::ExitCode;

use console::style;

use crate::config::Settings;
use crate::sink::{self, StoreConfig};

/// Store named on the command line, else the configured one.
fn store_config(
    settings: &Settings,
    url: Option<String>,
    database: Option<String>,
    collection: Option<String>,
) -> Option<StoreConfig> {
    let mut store = match url {
        Some(url) => StoreConfig::new(url),
        None => settings.store.clone()?,
    };
    if let Some(database) = database {
        store.database = database;
    }
    if let Some(collection) = collection {
        store.collection = collection;
    }
    Some(store)
}

pub fn cmd_upload(
    settings: &Settings,
    paths: &[PathBuf],
    store_url: Option<String>,
    store_database: Option<String>,
    store_collection: Option<String>,
) -> anyhow::Result<ExitCode> {
    let Some(store) = store_config(settings, store_url, store_database, store_collection) else {
        anyhow::bail!("No document store configured: pass --store-url or set `store` in the config");
    };

    let summary = sink::upload(paths, &store)?;

    if summary.files == 0 {
        println!("{} No JSON files found", style("!").yellow());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} {} file(s), {} entries: {} inserted, {} already stored",
        style("✓").green(),
        summary.files,
        summary.entries,
        style(summary.inserted).green(),
        summary.entries - summary.skipped - summary.inserted,
    );
    if summary.skipped > 0 {
        println!(
            "{} {} entr(ies) had no usable project URL",
            style("!").yellow(),
            summary.skipped
        );
    }
    println!(
        "  {} → {}.{}",
        style("Store").dim(),
        store.db_path().display(),
        store.collection
    );

    Ok(ExitCode::SUCCESS)
}
