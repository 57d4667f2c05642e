//! Load, reveal and extract a batch of listing pages.
//!
//! Targets are processed one at a time, each in its own page session. The
//! session is always quit before moving on, whether the target succeeded or
//! not, and a target that fails to load does not stop the batch.

use chrono::Utc;
use tracing::{error, info, warn};
use url::Url;

use crate::models::ProjectRecord;
use crate::scrapers::{
    Extraction, Extractor, PageDriver, RevealConfig, RevealReport, Revealer, ScrapeError,
    SelectorError, SiteProfile, SkippedContainer,
};

/// One listing page to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    /// Category name appended to every record from this page.
    pub category: Option<String>,
}

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: None,
        }
    }

    pub fn with_category(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: Some(category.into()),
        }
    }
}

/// What happened on one successfully loaded page.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub reveal: RevealReport,
    pub container_selector: Option<String>,
    pub containers: usize,
    pub records: usize,
    pub skipped: Vec<SkippedContainer>,
}

#[derive(Debug)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: Result<PageSummary, ScrapeError>,
}

/// Result of a whole batch.
#[derive(Debug, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
    pub records: Vec<ProjectRecord>,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.targets.len() - self.loaded()
    }

    /// True when there were targets and none of them could be loaded.
    pub fn nothing_loaded(&self) -> bool {
        !self.targets.is_empty() && self.loaded() == 0
    }
}

/// Scrapes pages for one site profile.
pub struct Pipeline<'a> {
    reveal: &'a RevealConfig,
    item_locator: String,
    load_more: Option<String>,
    extractor: Extractor,
}

impl<'a> Pipeline<'a> {
    pub fn new(profile: &SiteProfile, reveal: &'a RevealConfig) -> Result<Self, SelectorError> {
        let item_locator = profile
            .item_locator()
            .ok_or_else(|| SelectorError {
                selector: String::new(),
                reason: "profile defines no container selectors".to_string(),
            })?
            .to_string();

        Ok(Self {
            reveal,
            item_locator,
            load_more: profile.load_more_selector.clone(),
            extractor: Extractor::new(profile)?,
        })
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Open, reveal and extract one page on an existing session.
    pub async fn scrape_page<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        target: &Target,
    ) -> Result<(PageSummary, Vec<ProjectRecord>), ScrapeError> {
        let page_url = Url::parse(&target.url).map_err(|e| ScrapeError::load(&target.url, e))?;

        driver.open(&target.url).await?;

        let revealer = Revealer::new(self.reveal, &self.item_locator, self.load_more.as_deref());
        let reveal = revealer.reveal(driver, &target.url).await?;
        let markup = driver.current_markup().await?;

        let Extraction {
            container_selector,
            containers,
            mut records,
            skipped,
        } = self.extractor.extract(&markup, &page_url, Utc::now());

        if let Some(category) = &target.category {
            for record in &mut records {
                record.push_category(category);
            }
        }

        info!(
            "{}: {} record(s) from {} container(s), {} skipped",
            target.url,
            records.len(),
            containers,
            skipped.len()
        );

        let summary = PageSummary {
            reveal,
            container_selector,
            containers,
            records: records.len(),
            skipped,
        };
        Ok((summary, records))
    }

    /// Scrape every target with a fresh session from `make_driver`.
    pub async fn run<F>(&self, targets: &[Target], mut make_driver: F) -> RunReport
    where
        F: FnMut() -> Result<Box<dyn PageDriver>, ScrapeError>,
    {
        let mut report = RunReport::default();

        for (i, target) in targets.iter().enumerate() {
            info!("[{}/{}] Scraping {}", i + 1, targets.len(), target.url);

            let outcome = match make_driver() {
                Ok(mut driver) => {
                    let result = self.scrape_page(driver.as_mut(), target).await;
                    driver.quit().await;
                    result
                }
                Err(e) => Err(e),
            };

            let outcome = match outcome {
                Ok((summary, records)) => {
                    if records.is_empty() {
                        warn!("No records extracted from {}", target.url);
                    }
                    report.records.extend(records);
                    Ok(summary)
                }
                Err(e) => {
                    error!("{}", e);
                    Err(e)
                }
            };

            report.targets.push(TargetReport {
                target: target.clone(),
                outcome,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::driver::testing::ScriptedDriver;
    use crate::scrapers::RevealOutcome;

    const LISTING: &str = r#"<html><body>
        <div data-behavior="projectCard">
            <a aria-label="view work" href="/work/one"></a>
            <a class="block pt-8 bg-primary" href="/work/one"><h3>One</h3></a>
        </div>
        <div data-behavior="projectCard">
            <a aria-label="view work" href="/work/two"></a>
            <a class="block pt-8 bg-primary" href="/work/two"><h3>Two</h3></a>
        </div>
    </body></html>"#;

    fn reveal_config() -> RevealConfig {
        RevealConfig {
            settle_ms: 0,
            ..Default::default()
        }
    }

    fn driver() -> ScriptedDriver {
        let mut driver = ScriptedDriver::new(vec![2, 2]);
        driver.markup = LISTING.to_string();
        driver
    }

    #[tokio::test]
    async fn test_scrape_page_appends_category() {
        let reveal = reveal_config();
        let pipeline = Pipeline::new(&SiteProfile::pentagram(), &reveal).unwrap();
        let mut driver = driver();
        let target = Target::with_category("https://www.pentagram.com/work/sector/retail", "Retail");

        let (summary, records) = pipeline.scrape_page(&mut driver, &target).await.unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.reveal.outcome, RevealOutcome::Stagnated);
        assert_eq!(records[0].categories, vec!["Retail"]);
        assert_eq!(
            records[1].canonical_url.as_deref(),
            Some("https://www.pentagram.com/work/two")
        );
    }

    #[tokio::test]
    async fn test_failed_target_does_not_stop_batch() {
        let reveal = reveal_config();
        let pipeline = Pipeline::new(&SiteProfile::pentagram(), &reveal).unwrap();
        let targets = vec![
            Target::new("https://www.pentagram.com/a"),
            Target::new("https://www.pentagram.com/b"),
        ];

        let mut calls = 0;
        let report = pipeline
            .run(&targets, || {
                calls += 1;
                let mut driver = driver();
                driver.fail_open = calls == 1;
                Ok(Box::new(driver) as Box<dyn PageDriver>)
            })
            .await;

        assert_eq!(report.targets.len(), 2);
        assert_eq!(report.loaded(), 1);
        assert!(report.targets[0].outcome.is_err());
        assert_eq!(report.records.len(), 2);
        assert!(!report.nothing_loaded());
    }

    #[tokio::test]
    async fn test_no_content_counts_as_failed_load() {
        let reveal = reveal_config();
        let pipeline = Pipeline::new(&SiteProfile::pentagram(), &reveal).unwrap();
        let mut driver = driver();
        driver.has_items = false;

        let err = pipeline
            .scrape_page(&mut driver, &Target::new("https://www.pentagram.com/work"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::NoContent { .. }));
    }

    #[tokio::test]
    async fn test_invalid_target_url_is_load_error() {
        let reveal = reveal_config();
        let pipeline = Pipeline::new(&SiteProfile::pentagram(), &reveal).unwrap();
        let report = pipeline
            .run(&[Target::new("not a url")], || {
                Ok(Box::new(driver()) as Box<dyn PageDriver>)
            })
            .await;
        assert!(report.nothing_loaded());
    }

    #[test]
    fn test_profile_without_containers_is_rejected() {
        let reveal = reveal_config();
        assert!(Pipeline::new(&SiteProfile::default(), &reveal).is_err());
    }
}
