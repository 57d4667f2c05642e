//! Extract command: run the record extractor on saved markup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use console::style;
use url::Url;

use crate::cli::helpers::{print_sink_summary, print_skipped};
use crate::config::Settings;
use crate::scrapers::Extractor;
use crate::sink::{JsonFile, Sink};

pub async fn cmd_extract(
    settings: &Settings,
    html_file: &Path,
    base_url: &str,
    site: Option<&str>,
    output: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let markup = tokio::fs::read_to_string(html_file)
        .await
        .with_context(|| format!("Failed to read {}", html_file.display()))?;
    let page_url =
        Url::parse(base_url).with_context(|| format!("Invalid --base-url '{}'", base_url))?;

    let (name, profile) = settings.resolve_profile(site, Some(&page_url))?;
    let extractor = Extractor::new(&profile)?;
    let extraction = extractor.extract(&markup, &page_url, Utc::now());

    // Keep stdout clean for the JSON when no output file is given.
    let Some(output) = output else {
        println!("{}", serde_json::to_string_pretty(&extraction.records)?);
        return Ok(ExitCode::SUCCESS);
    };

    match &extraction.container_selector {
        Some(selector) => println!(
            "{} Profile '{}': {} container(s) matched '{}', {} record(s)",
            style("✓").green(),
            name,
            extraction.containers,
            selector,
            extraction.records.len()
        ),
        None => println!(
            "{} Profile '{}': no container selector matched",
            style("✗").red(),
            name
        ),
    }
    if !extraction.skipped.is_empty() {
        println!(
            "{} {} container(s) skipped",
            style("!").yellow(),
            extraction.skipped.len()
        );
        print_skipped(&extraction.skipped);
    }

    let sink = Sink::new(Some(JsonFile::new(output)), None);
    let summary = sink.persist(extraction.records);
    print_sink_summary(&summary);

    Ok(ExitCode::SUCCESS)
}
