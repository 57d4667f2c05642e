//! Headless Chrome page driver.
//!
//! Uses chromiumoxide (CDP) to render listing pages, count item cards and
//! click "load more" controls. One [`ChromeDriver`] owns one browser and one
//! page; [`PageDriver::quit`] tears both down.

mod config;

pub use config::{BrowserEngineConfig, EngineKind};

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

use super::driver::{ElementRef, PageDriver};
use super::error::ScrapeError;

/// Interval between selector polls while waiting for the first item.
#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Page driver backed by a real Chrome instance.
#[cfg(feature = "browser")]
pub struct ChromeDriver {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    url: String,
}

#[cfg(feature = "browser")]
impl ChromeDriver {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler: None,
            url: String::new(),
        }
    }

    fn find_chrome() -> Result<std::path::PathBuf, ScrapeError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(ScrapeError::Driver(
            "Chrome/Chromium not found. Install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    /// Launch or connect to the browser if not already running.
    async fn ensure_browser(&mut self) -> Result<(), ScrapeError> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = Self::find_chrome()?;
        let (width, height) = self.config.window_size;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .request_timeout(Duration::from_secs(self.config.timeout));

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| ScrapeError::Driver(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Driver(format!("Failed to launch browser: {}", e)))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);

        Ok(())
    }

    /// Connect to a remote Chrome instance via its `/json/version` endpoint.
    async fn connect_remote(&mut self, url: &str) -> Result<(), ScrapeError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let unavailable = |e: &dyn std::fmt::Display| {
            ScrapeError::Driver(format!("Failed to connect to remote browser: {}", e))
        };

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| unavailable(&e))?
            .json()
            .await
            .map_err(|e| unavailable(&e))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| unavailable(&"no webSocketDebuggerUrl in response"))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| unavailable(&e))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
        self.browser = Some(browser);

        Ok(())
    }

    fn page(&self) -> Result<&Page, ScrapeError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Driver("no page open".to_string()))
    }

    /// Evaluate a script in the page and deserialize its result.
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, ScrapeError> {
        let page = self.page()?;
        page.evaluate(script)
            .await
            .map_err(|e| ScrapeError::load(&self.url, e))?
            .into_value()
            .map_err(|e| ScrapeError::load(&self.url, e))
    }
}

/// JSON-quote a selector for embedding in a script.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn count_script(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        js_string(selector)
    )
}

/// Index of the first visible, enabled match or -1.
fn clickable_script(locator: &str) -> String {
    format!(
        r#"(() => {{
            const els = Array.from(document.querySelectorAll({}));
            return els.findIndex((el) => {{
                if (el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 || rect.height > 0;
            }});
        }})()"#,
        js_string(locator)
    )
}

fn click_script(element: &ElementRef) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelectorAll({})[{}];
            if (!el) return false;
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        js_string(&element.locator),
        element.index
    )
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeDriver {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn open(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.ensure_browser().await?;
        self.url = url.to_string();

        if self.page.is_none() {
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| ScrapeError::Driver("browser not running".to_string()))?;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| ScrapeError::load(url, e))?;
            page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
                .await
                .map_err(|e| ScrapeError::load(url, e))?;
            self.page = Some(page);
        }

        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScrapeError::load(url, format!("invalid URL: {}", e)))?;

        let page = self.page()?;
        let timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(timeout, page.execute(nav_params)).await {
            Ok(Ok(resp)) => {
                if let Some(error_text) = resp.result.error_text.as_ref() {
                    return Err(ScrapeError::load(url, error_text));
                }
            }
            Ok(Err(e)) => return Err(ScrapeError::load(url, e)),
            Err(_) => {
                return Err(ScrapeError::load(
                    url,
                    format!("navigation timed out after {}s", self.config.timeout),
                ))
            }
        }

        if let Err(e) = page.wait_for_navigation().await {
            warn!("Waiting for navigation on {} failed: {}", url, e);
        }

        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScrapeError> {
        let script = count_script(selector);
        let poll = async {
            loop {
                let n: usize = self.eval(script.clone()).await?;
                if n > 0 {
                    return Ok::<bool, ScrapeError>(true);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }

    async fn count(&mut self, selector: &str) -> Result<usize, ScrapeError> {
        self.eval(count_script(selector)).await
    }

    async fn current_markup(&mut self) -> Result<String, ScrapeError> {
        self.page()?
            .content()
            .await
            .map_err(|e| ScrapeError::load(&self.url, e))
    }

    async fn find_clickable(&mut self, locator: &str) -> Result<Option<ElementRef>, ScrapeError> {
        let index: i64 = self.eval(clickable_script(locator)).await?;
        Ok(usize::try_from(index)
            .ok()
            .map(|index| ElementRef::new(locator, index)))
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), ScrapeError> {
        let clicked: bool = self.eval(click_script(element)).await?;
        if !clicked {
            return Err(ScrapeError::load(
                &self.url,
                format!("element '{}' disappeared before click", element.locator),
            ));
        }
        Ok(())
    }

    async fn quit(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Closing page failed: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            // A remote browser belongs to someone else; only drop the connection.
            if self.config.remote_url.is_none() {
                if let Err(e) = browser.close().await {
                    warn!("Closing browser failed: {}", e);
                }
                let _ = browser.wait().await;
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeDriver {
    _config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromeDriver {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { _config: config }
    }

    fn unavailable() -> ScrapeError {
        ScrapeError::Driver(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        )
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for ChromeDriver {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn open(&mut self, _url: &str) -> Result<(), ScrapeError> {
        Err(Self::unavailable())
    }

    async fn wait_for_selector(
        &mut self,
        _selector: &str,
        _timeout: std::time::Duration,
    ) -> Result<bool, ScrapeError> {
        Err(Self::unavailable())
    }

    async fn count(&mut self, _selector: &str) -> Result<usize, ScrapeError> {
        Err(Self::unavailable())
    }

    async fn current_markup(&mut self) -> Result<String, ScrapeError> {
        Err(Self::unavailable())
    }

    async fn find_clickable(&mut self, _locator: &str) -> Result<Option<ElementRef>, ScrapeError> {
        Ok(None)
    }

    async fn click(&mut self, _element: &ElementRef) -> Result<(), ScrapeError> {
        Err(Self::unavailable())
    }

    async fn quit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_quoted_for_scripts() {
        let script = count_script("a[data-behavior='homeLoadMore']");
        assert_eq!(
            script,
            r#"document.querySelectorAll("a[data-behavior='homeLoadMore']").length"#
        );

        let script = count_script(r#"a[title="x"]"#);
        assert!(script.contains(r#""a[title=\"x\"]""#));
    }

    #[test]
    fn test_click_script_targets_index() {
        let script = click_script(&ElementRef::new("button.more", 2));
        assert!(script.contains(r#"document.querySelectorAll("button.more")[2]"#));
        assert!(script.contains("scrollIntoView"));
    }

    #[test]
    fn test_clickable_script_checks_visibility() {
        let script = clickable_script(".load-more");
        assert!(script.contains("findIndex"));
        assert!(script.contains("getComputedStyle"));
    }
}
