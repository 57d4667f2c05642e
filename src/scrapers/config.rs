//! Site profile and reveal loop configuration.
//!
//! A site profile is the selector set for one portfolio site: where the
//! item cards are, which control loads more of them, and which fallbacks
//! find the link, text, media and categories inside a card. Profiles can be
//! declared in the config file; three are built in.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which fields a card must yield before it counts as a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RequiredFields {
    /// A resolvable canonical URL (the dedup key).
    #[default]
    Url,
    /// A non-blank title.
    Title,
    /// Both title and URL.
    Both,
    /// Title or URL.
    Either,
}

impl RequiredFields {
    /// Check the rule against trimmed field presence.
    pub fn satisfied(&self, has_title: bool, has_url: bool) -> bool {
        match self {
            Self::Url => has_url,
            Self::Title => has_title,
            Self::Both => has_title && has_url,
            Self::Either => has_title || has_url,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Title => "title",
            Self::Both => "title and url",
            Self::Either => "title or url",
        }
    }
}

/// How listing growth is measured between clicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GrowthMeasure {
    /// Number of elements matching the item locator.
    #[default]
    Items,
    /// Length of the serialized DOM (coarser).
    Markup,
}

/// Tunables for the load-more loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Upper bound on load-more clicks per page.
    #[serde(default = "default_max_clicks")]
    pub max_clicks: usize,
    /// Pause after each click, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// How long to wait for the first item, in seconds.
    #[serde(default = "default_initial_timeout")]
    pub initial_timeout_secs: u64,
    #[serde(default)]
    pub measure: GrowthMeasure,
}

fn default_max_clicks() -> usize {
    20
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_initial_timeout() -> u64 {
    30
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            max_clicks: default_max_clicks(),
            settle_ms: default_settle_ms(),
            initial_timeout_secs: default_initial_timeout(),
            measure: GrowthMeasure::default(),
        }
    }
}

impl RevealConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn initial_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_timeout_secs)
    }
}

/// Selector set for one portfolio site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Hosts this profile applies to (without `www.`).
    #[serde(default)]
    pub domains: Vec<String>,
    /// Candidate card selectors, most specific first. The first that matches wins.
    #[serde(default)]
    pub container_selectors: Vec<String>,
    /// Locator used to wait for and count items (defaults to the first container selector).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    /// Locator of the "load more" control. No control means no reveal loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_more_selector: Option<String>,
    /// Primary link selectors inside a card, tried before structural fallbacks.
    #[serde(default)]
    pub link_selectors: Vec<String>,
    /// Selectors for the card's text block (title + description).
    #[serde(default)]
    pub text_container_selectors: Vec<String>,
    /// Title selectors, tried inside the text block and then the whole card.
    #[serde(default)]
    pub title_selectors: Vec<String>,
    /// Description selectors, tried the same way.
    #[serde(default)]
    pub description_selectors: Vec<String>,
    /// Attributes on any card element that carry a video URL or id.
    #[serde(default)]
    pub video_attributes: Vec<String>,
    /// Selectors for the card's tag/category block.
    #[serde(default)]
    pub category_container_selectors: Vec<String>,
    /// Label selector inside the category block.
    #[serde(default = "default_category_label")]
    pub category_label_selector: String,
    #[serde(default)]
    pub required: RequiredFields,
    /// Category name to listing URL, for multi-category runs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, String>,
}

fn default_category_label() -> String {
    "span".to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SiteProfile {
    /// Locator used for the initial wait and item counting.
    pub fn item_locator(&self) -> Option<&str> {
        self.item_selector
            .as_deref()
            .or_else(|| self.container_selectors.first().map(String::as_str))
    }

    /// Whether this profile claims the given host.
    pub fn matches_domain(&self, domain: &str) -> bool {
        let domain = domain.strip_prefix("www.").unwrap_or(domain);
        self.domains
            .iter()
            .any(|d| domain == d || domain.ends_with(&format!(".{}", d)))
    }

    /// Pentagram listing pages (`div[data-behavior='projectCard']` cards with a load-more link).
    pub fn pentagram() -> Self {
        let sectors = [
            ("Arts & Culture", "arts-culture"),
            ("Banking & Finance", "banking-finance"),
            ("Civic & Public", "civic-public"),
            ("Design & Architecture", "design-architecture"),
            ("Education", "education"),
            ("Entertainment", "entertainment"),
            ("Fashion & Beauty", "fashion-beauty"),
            ("Food & Drink", "food-drink"),
            ("Healthcare", "healthcare"),
            ("Hospitality & Leisure", "hospitality-leisure"),
            ("Manufacturing & Industrials", "manufacturing-industrials"),
            ("Not for Profit", "not-for-profit"),
            ("Professional Services", "professional-services"),
            ("Publishing", "publishing"),
            ("Real Estate", "real-estate"),
            ("Retail", "retail"),
            ("Technology", "technology"),
            ("Transport", "transport"),
        ];

        Self {
            domains: strings(&["pentagram.com"]),
            container_selectors: strings(&[
                "div[data-behavior='projectCard']",
                "article.workItem",
            ]),
            item_selector: None,
            load_more_selector: Some("a[data-behavior='homeLoadMore']".to_string()),
            link_selectors: strings(&[
                "a[aria-label='view work']",
                "a.workItem__link",
                "a.block.pt-8.bg-primary",
            ]),
            text_container_selectors: strings(&["a.block.pt-8.bg-primary", "div.pt-8.bg-primary"]),
            title_selectors: strings(&["h3", ".workItem__title span", ".workItem__title"]),
            description_selectors: strings(&["p"]),
            video_attributes: Vec::new(),
            category_container_selectors: strings(&["div[data-projectcard-tags]"]),
            category_label_selector: "a span".to_string(),
            required: RequiredFields::Url,
            categories: sectors
                .iter()
                .map(|(name, slug)| {
                    (
                        name.to_string(),
                        format!("https://www.pentagram.com/work/sector/{}", slug),
                    )
                })
                .collect(),
        }
    }

    /// Koto Studio work index (cards carry a Vimeo preview in a data attribute).
    pub fn koto() -> Self {
        Self {
            domains: strings(&["koto.studio"]),
            container_selectors: strings(&[".project-item", "a.work-row-thumb.tile"]),
            item_selector: None,
            load_more_selector: None,
            link_selectors: strings(&["a[href]"]),
            text_container_selectors: strings(&[".work-meta"]),
            title_selectors: strings(&["h2", "h3"]),
            description_selectors: strings(&["p"]),
            video_attributes: strings(&["data-work-page-thumbnail-video"]),
            category_container_selectors: strings(&[".work-tags", ".tags"]),
            category_label_selector: "span".to_string(),
            required: RequiredFields::Url,
            categories: BTreeMap::new(),
        }
    }

    /// Best-effort profile for unknown agency sites.
    pub fn generic() -> Self {
        Self {
            domains: Vec::new(),
            container_selectors: strings(&[
                ".project-item",
                ".work-card",
                ".portfolio-item",
                "article.project",
                "li.project",
                "div.work-item",
                ".card",
                "article[class*='post']",
                "li[class*='item']",
            ]),
            item_selector: None,
            load_more_selector: None,
            link_selectors: strings(&[
                ".project-link a",
                ".card-link a",
                "h2 a",
                "h3 a",
                ".title a",
            ]),
            text_container_selectors: Vec::new(),
            title_selectors: strings(&[
                ".project-title",
                ".card-title",
                "h2",
                "h3",
                "h4",
                ".title",
                ".heading",
            ]),
            description_selectors: strings(&["p"]),
            video_attributes: strings(&[
                "data-video-src",
                "data-vimeo-url",
                "data-vimeo-id",
                "data-youtube-id",
                "data-video-id",
                "data-video",
            ]),
            category_container_selectors: strings(&[".tags", ".categories"]),
            category_label_selector: "span, a".to_string(),
            required: RequiredFields::Both,
            categories: BTreeMap::new(),
        }
    }
}

/// Built-in profiles by name.
pub fn builtin_profiles() -> BTreeMap<String, SiteProfile> {
    let mut profiles = BTreeMap::new();
    profiles.insert("pentagram".to_string(), SiteProfile::pentagram());
    profiles.insert("koto".to_string(), SiteProfile::koto());
    profiles.insert("generic".to_string(), SiteProfile::generic());
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_rules() {
        assert!(RequiredFields::Url.satisfied(false, true));
        assert!(!RequiredFields::Url.satisfied(true, false));
        assert!(RequiredFields::Title.satisfied(true, false));
        assert!(!RequiredFields::Both.satisfied(true, false));
        assert!(RequiredFields::Both.satisfied(true, true));
        assert!(RequiredFields::Either.satisfied(false, true));
        assert!(!RequiredFields::Either.satisfied(false, false));
    }

    #[test]
    fn test_reveal_config_defaults() {
        let config: RevealConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_clicks, 20);
        assert_eq!(config.settle(), Duration::from_secs(3));
        assert_eq!(config.initial_timeout(), Duration::from_secs(30));
        assert_eq!(config.measure, GrowthMeasure::Items);
    }

    #[test]
    fn test_item_locator_falls_back_to_first_container() {
        let profile = SiteProfile::pentagram();
        assert_eq!(
            profile.item_locator(),
            Some("div[data-behavior='projectCard']")
        );

        let profile = SiteProfile {
            item_selector: Some(".tile".to_string()),
            ..SiteProfile::koto()
        };
        assert_eq!(profile.item_locator(), Some(".tile"));

        assert_eq!(SiteProfile::default().item_locator(), None);
    }

    #[test]
    fn test_matches_domain() {
        let profile = SiteProfile::pentagram();
        assert!(profile.matches_domain("pentagram.com"));
        assert!(profile.matches_domain("www.pentagram.com"));
        assert!(!profile.matches_domain("notpentagram.com"));
        assert!(!SiteProfile::generic().matches_domain("pentagram.com"));
    }

    #[test]
    fn test_pentagram_categories() {
        let profile = SiteProfile::pentagram();
        assert_eq!(profile.categories.len(), 18);
        assert_eq!(
            profile.categories.get("Technology").map(String::as_str),
            Some("https://www.pentagram.com/work/sector/technology")
        );
    }

    #[test]
    fn test_profile_toml_deserialization() {
        let toml_str = r#"
            domains = ["studio.example"]
            container_selectors = [".tile"]
            load_more_selector = "button.more"
            required = "either"

            [categories]
            Branding = "https://studio.example/work/branding"
        "#;

        let profile: SiteProfile = toml::from_str(toml_str).unwrap();
        assert_eq!(profile.container_selectors, vec![".tile"]);
        assert_eq!(profile.load_more_selector.as_deref(), Some("button.more"));
        assert_eq!(profile.required, RequiredFields::Either);
        assert_eq!(profile.category_label_selector, "span");
        assert_eq!(profile.categories.len(), 1);
    }
}
