//! Configuration management for folioscrape using the prefer crate.
//!
//! A config file is optional. When present it is discovered by prefer (or
//! passed with `--config`) and parsed by extension as TOML, YAML or JSON.
//! Command-line flags are applied on top by the CLI layer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scrapers::{builtin_profiles, BrowserEngineConfig, RevealConfig, SiteProfile};
use crate::sink::StoreConfig;

/// Output filename inside the data directory when no site domain is known.
pub const DEFAULT_OUTPUT_FILENAME: &str = "agency_projects.json";

/// Profile used when neither `--site` nor the URL's domain selects one.
pub const FALLBACK_PROFILE: &str = "generic";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
    #[error("Unknown site profile '{0}' (see `folio sites`)")]
    UnknownSite(String),
    #[error("Site '{site}' has no category '{category}'")]
    UnknownCategory { site: String, category: String },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Explicit JSON output file. When unset, each site gets
    /// `<data_dir>/<domain>.json`.
    pub output_file: Option<PathBuf>,
    pub reveal: RevealConfig,
    pub browser: BrowserEngineConfig,
    /// Document store, when configured.
    pub store: Option<StoreConfig>,
    /// Built-in profiles merged with those from the config file.
    pub profiles: BTreeMap<String, SiteProfile>,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio");

        Self {
            data_dir,
            output_file: None,
            reveal: RevealConfig::default(),
            browser: BrowserEngineConfig::default().with_env_overrides(),
            store: None,
            profiles: builtin_profiles(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// JSON file for a run: the explicit output, else one file per site domain.
    pub fn output_path(&self, domain: Option<&str>) -> PathBuf {
        if let Some(path) = &self.output_file {
            return path.clone();
        }
        match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => self.data_dir.join(format!("{}.json", domain)),
            None => self.data_dir.join(DEFAULT_OUTPUT_FILENAME),
        }
    }

    /// Pick a profile by explicit name, else by the URL's domain, else the generic one.
    pub fn resolve_profile(
        &self,
        name: Option<&str>,
        url: Option<&url::Url>,
    ) -> Result<(String, SiteProfile), ConfigError> {
        if let Some(name) = name {
            return self
                .profiles
                .get(name)
                .map(|p| (name.to_string(), p.clone()))
                .ok_or_else(|| ConfigError::UnknownSite(name.to_string()));
        }

        if let Some(host) = url.and_then(|u| u.host_str()) {
            if let Some((name, profile)) = self
                .profiles
                .iter()
                .find(|(_, profile)| profile.matches_domain(host))
            {
                debug!("Using site profile '{}' for {}", name, host);
                return Ok((name.clone(), profile.clone()));
            }
        }

        self.profiles
            .get(FALLBACK_PROFILE)
            .map(|p| (FALLBACK_PROFILE.to_string(), p.clone()))
            .ok_or_else(|| ConfigError::UnknownSite(FALLBACK_PROFILE.to_string()))
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// JSON output file; relative paths resolve against the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal: Option<RevealConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,
    /// Extra or overriding site profiles by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, SiteProfile>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no file is found or it does not parse.
    pub async fn load() -> Self {
        match prefer::load("folioscrape").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("{}; using defaults", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse file contents, choosing the format from the extension (JSON by default).
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_err("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_err("JSON", e.to_string())),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative or start with `~`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = match path_str.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(path_str)),
            None => PathBuf::from(path_str),
        };

        if expanded.is_absolute() {
            expanded
        } else {
            base_dir.join(expanded)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref output) = self.output {
            settings.output_file = Some(self.resolve_path(output, &settings.data_dir));
        }
        if let Some(ref reveal) = self.reveal {
            settings.reveal = reveal.clone();
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone().with_env_overrides();
        }
        if let Some(ref store) = self.store {
            settings.store = Some(store.clone());
        }
        for (name, profile) in &self.sites {
            settings.profiles.insert(name.clone(), profile.clone());
        }
    }

    /// Load the given file (or discover one) and build settings from it.
    pub async fn settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => Self::load().await,
        };

        let base_dir = config
            .base_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &base_dir);
        Ok(settings)
    }
}
