//! Scrape command: load listing pages, reveal, extract and save.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use console::style;
use url::Url;

use crate::cli::helpers::{print_run, print_sink_summary};
use crate::config::{ConfigError, Settings};
use crate::models::source_domain_of;
use crate::pipeline::{Pipeline, Target};
use crate::scrapers::{make_driver, EngineKind, GrowthMeasure, SiteProfile};
use crate::sink::{JsonFile, Sink, StoreConfig};

#[derive(Args)]
pub struct ScrapeArgs {
    /// Listing page URLs
    urls: Vec<String>,

    /// Site profile (default: detected from the first URL's domain)
    #[arg(short, long)]
    site: Option<String>,

    /// Scrape a named category listing of the site (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Scrape every category listing the site profile knows
    #[arg(long)]
    all_categories: bool,

    /// JSON output file (default: <data_dir>/<domain>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the JSON file sink
    #[arg(long)]
    no_file: bool,

    /// Maximum load-more clicks per page
    #[arg(long)]
    max_clicks: Option<usize>,

    /// Wait after each click, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Page load timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// How listing growth is measured between clicks
    #[arg(long, value_enum)]
    measure: Option<GrowthMeasure>,

    /// Page engine
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Run the browser with a visible window
    #[arg(long)]
    show_browser: bool,

    /// Connect to an already running browser instead of launching one
    #[arg(long, env = "BROWSER_URL")]
    remote_url: Option<String>,

    /// Document store URL (sqlite path)
    #[arg(long, env = "FOLIO_STORE_URL")]
    store_url: Option<String>,

    /// Document store database name
    #[arg(long)]
    store_database: Option<String>,

    /// Document store collection name
    #[arg(long)]
    store_collection: Option<String>,
}

impl ScrapeArgs {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(max_clicks) = self.max_clicks {
            settings.reveal.max_clicks = max_clicks;
        }
        if let Some(settle_ms) = self.settle_ms {
            settings.reveal.settle_ms = settle_ms;
        }
        if let Some(timeout) = self.timeout {
            settings.reveal.initial_timeout_secs = timeout;
            settings.browser.timeout = timeout;
        }
        if let Some(measure) = self.measure {
            settings.reveal.measure = measure;
        }
        if let Some(engine) = self.engine {
            settings.browser.engine = engine;
        }
        if self.show_browser {
            settings.browser.headless = false;
        }
        if let Some(remote_url) = &self.remote_url {
            settings.browser.remote_url = Some(remote_url.clone());
        }
        if let Some(output) = &self.output {
            settings.output_file = Some(output.clone());
        }
    }

    fn store(&self, settings: &Settings) -> Option<StoreConfig> {
        let mut store = match &self.store_url {
            Some(url) => StoreConfig::new(url.clone()),
            None => settings.store.clone()?,
        };
        if let Some(database) = &self.store_database {
            store.database = database.clone();
        }
        if let Some(collection) = &self.store_collection {
            store.collection = collection.clone();
        }
        Some(store)
    }

    fn sink(&self, settings: &Settings, domain: Option<&str>) -> Sink {
        let file = (!self.no_file).then(|| JsonFile::new(settings.output_path(domain)));
        Sink::new(file, self.store(settings))
    }
}

/// Build the target list from explicit URLs plus requested category listings.
fn targets(
    args: &ScrapeArgs,
    site: &str,
    profile: &SiteProfile,
) -> Result<Vec<Target>, ConfigError> {
    let mut targets: Vec<Target> = args.urls.iter().map(Target::new).collect();

    if args.all_categories {
        targets.extend(
            profile
                .categories
                .iter()
                .map(|(name, url)| Target::with_category(url, name)),
        );
    } else {
        for name in &args.categories {
            let url = profile
                .categories
                .get(name)
                .ok_or_else(|| ConfigError::UnknownCategory {
                    site: site.to_string(),
                    category: name.clone(),
                })?;
            targets.push(Target::with_category(url, name));
        }
    }

    Ok(targets)
}

/// Scrape listing pages and persist new projects.
pub async fn cmd_scrape(mut settings: Settings, args: ScrapeArgs) -> anyhow::Result<ExitCode> {
    args.apply_overrides(&mut settings);

    let first_url = args.urls.first().and_then(|u| Url::parse(u).ok());
    let (site, profile) = settings.resolve_profile(args.site.as_deref(), first_url.as_ref())?;

    let targets = targets(&args, &site, &profile)?;
    if targets.is_empty() {
        anyhow::bail!(
            "Nothing to scrape: pass listing URLs, --category or --all-categories (site '{}')",
            site
        );
    }

    let domain = targets
        .first()
        .and_then(|target| Url::parse(&target.url).ok())
        .map(|url| source_domain_of(&url));
    let sink = args.sink(&settings, domain.as_deref());
    if sink.file.is_none() && sink.store.is_none() {
        anyhow::bail!("--no-file given and no document store configured; nothing would be saved");
    }

    println!(
        "{} Scraping {} page(s) with profile '{}' ({} engine)",
        style("→").cyan(),
        targets.len(),
        site,
        settings.browser.engine.as_str()
    );

    let pipeline = Pipeline::new(&profile, &settings.reveal)?;
    let browser = settings.browser.clone();
    let report = pipeline.run(&targets, || make_driver(&browser)).await;

    print_run(&report, super::is_verbose());

    if report.nothing_loaded() {
        println!(
            "{} None of the {} page(s) could be loaded",
            style("✗").red(),
            report.failed()
        );
        return Ok(ExitCode::from(2));
    }

    let summary = sink.persist(report.records);
    print_sink_summary(&summary);

    if let Some(file) = &sink.file {
        if summary.total_persisted.is_some() {
            println!("{} Saved to {}", style("✓").green(), file.path().display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ScrapeArgs,
    }

    fn parse(argv: &[&str]) -> ScrapeArgs {
        Harness::parse_from(std::iter::once("folio").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_category_targets() {
        let profile = SiteProfile::pentagram();
        let args = parse(&["--category", "Retail"]);
        let targets = targets(&args, "pentagram", &profile).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].category.as_deref(), Some("Retail"));
        assert_eq!(targets[0].url, profile.categories["Retail"]);
    }

    #[test]
    fn test_unknown_category() {
        let args = parse(&["--category", "Underwater Basketry"]);
        let err = targets(&args, "pentagram", &SiteProfile::pentagram()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory { .. }));
    }

    #[test]
    fn test_all_categories_plus_urls() {
        let profile = SiteProfile::pentagram();
        let args = parse(&["https://www.pentagram.com/work", "--all-categories"]);
        let targets = targets(&args, "pentagram", &profile).unwrap();
        assert_eq!(targets.len(), profile.categories.len() + 1);
        assert_eq!(targets[0].category, None);
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/tmp/folio"));
        let args = parse(&[
            "--max-clicks",
            "5",
            "--settle-ms",
            "100",
            "--measure",
            "markup",
            "--engine",
            "static",
            "--show-browser",
            "-o",
            "/tmp/out.json",
        ]);
        args.apply_overrides(&mut settings);

        assert_eq!(settings.reveal.max_clicks, 5);
        assert_eq!(settings.reveal.settle_ms, 100);
        assert_eq!(settings.reveal.measure, GrowthMeasure::Markup);
        assert_eq!(settings.browser.engine, EngineKind::Static);
        assert!(!settings.browser.headless);
        assert_eq!(settings.output_path(Some("pentagram.com")), PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn test_sink_selection() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/tmp/folio"));
        settings.store = None;

        let args = parse(&["--no-file", "--store-url", "sqlite:///tmp/x", "--store-collection", "work"]);
        let sink = args.sink(&settings, Some("pentagram.com"));
        assert!(sink.file.is_none());
        let store = sink.store.unwrap();
        assert_eq!(store.url, "sqlite:///tmp/x");
        assert_eq!(store.collection, "work");
        assert_eq!(store.database, "agency_projects");

        let sink = parse(&[]).sink(&settings, Some("koto.studio"));
        assert_eq!(
            sink.file.unwrap().path(),
            PathBuf::from("/tmp/folio/koto.studio.json")
        );
    }
}
