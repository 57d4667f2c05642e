//! Plain HTTP page driver.
//!
//! Fetches the server-rendered markup once with reqwest. There is no script
//! execution, so nothing is ever clickable and the reveal loop ends after
//! the initial page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use super::browser::BrowserEngineConfig;
use super::driver::{ElementRef, PageDriver};
use super::error::ScrapeError;

pub struct StaticDriver {
    client: Client,
    url: String,
    markup: Option<String>,
}

impl StaticDriver {
    pub fn new(config: &BrowserEngineConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ScrapeError::Driver(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: String::new(),
            markup: None,
        })
    }

    #[cfg(test)]
    pub fn from_markup(url: &str, markup: String) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            markup: Some(markup),
        }
    }

    fn markup(&self) -> Result<&str, ScrapeError> {
        self.markup
            .as_deref()
            .ok_or_else(|| ScrapeError::Driver("no page open".to_string()))
    }

    fn parse_selector(&self, selector: &str) -> Result<Selector, ScrapeError> {
        Selector::parse(selector)
            .map_err(|e| ScrapeError::load(&self.url, format!("invalid selector '{}': {}", selector, e)))
    }
}

#[async_trait]
impl PageDriver for StaticDriver {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn open(&mut self, url: &str) -> Result<(), ScrapeError> {
        info!("Fetching {}", url);
        self.url = url.to_string();
        self.markup = None;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::load(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::load(url, format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| ScrapeError::load(url, e))?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        self.markup = Some(body);
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, ScrapeError> {
        // Static markup never changes, so one look is enough.
        Ok(self.count(selector).await? > 0)
    }

    async fn count(&mut self, selector: &str) -> Result<usize, ScrapeError> {
        let selector = self.parse_selector(selector)?;
        let document = Html::parse_document(self.markup()?);
        let n = document.select(&selector).count();
        Ok(n)
    }

    async fn current_markup(&mut self) -> Result<String, ScrapeError> {
        self.markup().map(str::to_string)
    }

    async fn find_clickable(&mut self, _locator: &str) -> Result<Option<ElementRef>, ScrapeError> {
        Ok(None)
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), ScrapeError> {
        Err(ScrapeError::load(
            &self.url,
            format!("static pages cannot click '{}'", element.locator),
        ))
    }

    async fn quit(&mut self) {
        self.markup = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><body>
        <div class="card"><a href="/a">A</a></div>
        <div class="card"><a href="/b">B</a></div>
        <a class="more" href="#">Load more</a>
    </body></html>"##;

    #[tokio::test]
    async fn test_counts_matching_elements() {
        let mut driver = StaticDriver::from_markup("https://example.com", PAGE.to_string());
        assert_eq!(driver.count(".card").await.unwrap(), 2);
        assert!(driver
            .wait_for_selector(".card", Duration::from_secs(1))
            .await
            .unwrap());
        assert!(!driver
            .wait_for_selector(".missing", Duration::from_secs(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_nothing_is_clickable() {
        let mut driver = StaticDriver::from_markup("https://example.com", PAGE.to_string());
        assert_eq!(driver.find_clickable("a.more").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_error() {
        let mut driver = StaticDriver::from_markup("https://example.com", PAGE.to_string());
        assert!(driver.count("div[[").await.is_err());
    }

    #[tokio::test]
    async fn test_markup_cleared_on_quit() {
        let mut driver = StaticDriver::from_markup("https://example.com", PAGE.to_string());
        assert!(driver.current_markup().await.unwrap().contains("Load more"));
        driver.quit().await;
        assert!(driver.current_markup().await.is_err());
    }
}
