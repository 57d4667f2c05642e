//! Browser session configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Which page driver renders listing pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Headless Chrome over CDP. Required for load-more controls.
    #[default]
    Browser,
    /// Plain HTTP fetch. Sees only the initial server-rendered markup.
    Static,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Browser => "browser",
            EngineKind::Static => "static",
        }
    }
}

/// Browser session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    #[serde(default)]
    pub engine: EngineKind,

    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Navigation and CDP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent sent by both engines.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_window")]
    pub window_size: (u32, u32),
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_window() -> (u32, u32) {
    (1920, 1080)
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            headless: default_headless(),
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: default_user_agent(),
            window_size: default_window(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment overrides.
    ///
    /// `BROWSER_URL` points at a remote DevTools endpoint; `FOLIO_HEADLESS=0`
    /// shows the browser window.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("BROWSER_URL") {
            if !url.trim().is_empty() {
                self.remote_url = Some(url.trim().to_string());
            }
        }
        if let Ok(val) = env::var("FOLIO_HEADLESS") {
            self.headless = !(val == "0" || val.eq_ignore_ascii_case("false"));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: BrowserEngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, BrowserEngineConfig::default());
        assert!(config.headless);
        assert_eq!(config.engine, EngineKind::Browser);
    }

    #[test]
    fn test_static_engine_parses() {
        let config: BrowserEngineConfig = toml::from_str("engine = \"static\"\ntimeout = 5").unwrap();
        assert_eq!(config.engine, EngineKind::Static);
        assert_eq!(config.timeout, 5);
    }
}
