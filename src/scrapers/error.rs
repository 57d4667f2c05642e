//! Scrape error types.

use std::time::Duration;

use thiserror::Error;

/// Failure that prevents a listing page from being scraped at all.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Navigation or element lookup failed.
    #[error("Failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    /// No item container appeared before the initial timeout.
    #[error("No items matching '{selector}' appeared on {url} within {}s", .timeout.as_secs())]
    NoContent {
        url: String,
        selector: String,
        timeout: Duration,
    },
    /// The page driver is not usable (browser missing, feature disabled, ...).
    #[error("Page driver unavailable: {0}")]
    Driver(String),
}

impl ScrapeError {
    pub fn load(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failure while extracting one item container. Never crosses the container boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// A link was present but could not be resolved to an absolute http(s) URL.
    #[error("unresolvable link '{href}': {reason}")]
    InvalidUrl { href: String, reason: String },
    /// The container lacks the fields required for a record.
    #[error("missing required field(s): {0}")]
    MissingRequired(&'static str),
}

/// A profile selector that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}
