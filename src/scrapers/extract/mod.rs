//! Record extraction from revealed listing markup.
//!
//! Locates item containers with the profile's container selectors (the first
//! selector that matches anything wins), then runs the field chains over each
//! container independently. A container that fails never affects its
//! siblings; it is recorded as a skip instead.

mod fields;
mod url;

pub use self::url::{normalize_video, resolve};

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use self::fields::{Card, FieldSelectors};
use crate::models::{source_domain_of, ProjectRecord};
use crate::scrapers::config::{RequiredFields, SiteProfile};
use crate::scrapers::error::{ContainerError, SelectorError};

/// Longest markup excerpt kept for a skipped container.
const SNIPPET_CHARS: usize = 200;

/// A container that did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContainer {
    /// Zero-based position among the matched containers.
    pub index: usize,
    pub reason: ContainerError,
    pub snippet: String,
}

/// Result of extracting one page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Container selector that matched, if any did.
    pub container_selector: Option<String>,
    pub containers: usize,
    pub records: Vec<ProjectRecord>,
    pub skipped: Vec<SkippedContainer>,
}

/// Compiled extractor for one site profile.
pub struct Extractor {
    containers: Vec<(String, Selector)>,
    fields: FieldSelectors,
    required: RequiredFields,
}

impl Extractor {
    pub fn new(profile: &SiteProfile) -> Result<Self, SelectorError> {
        let containers = profile
            .container_selectors
            .iter()
            .map(|s| Ok((s.clone(), fields::parse_selector(s)?)))
            .collect::<Result<Vec<_>, SelectorError>>()?;

        Ok(Self {
            containers,
            fields: FieldSelectors::compile(profile)?,
            required: profile.required,
        })
    }

    /// Extract every record from `markup`, resolving links against `page_url`.
    pub fn extract(
        &self,
        markup: &str,
        page_url: &::url::Url,
        scraped_at: DateTime<Utc>,
    ) -> Extraction {
        let document = Html::parse_document(markup);
        let domain = source_domain_of(page_url);

        let Some((selector_text, cards)) = self.containers.iter().find_map(|(text, sel)| {
            let cards: Vec<_> = document.select(sel).collect();
            (!cards.is_empty()).then_some((text, cards))
        }) else {
            warn!("No item containers found on {}", page_url);
            if looks_like_challenge(markup) {
                warn!("The page looks like an anti-bot challenge (Cloudflare or similar); try --engine browser or --show-browser");
            }
            return Extraction::default();
        };

        info!(
            "Found {} containers on {} using '{}'",
            cards.len(),
            page_url,
            selector_text
        );

        let mut extraction = Extraction {
            container_selector: Some(selector_text.clone()),
            containers: cards.len(),
            ..Default::default()
        };

        for (index, element) in cards.into_iter().enumerate() {
            let card = Card {
                element,
                base: page_url,
                selectors: &self.fields,
            };
            match self.extract_card(&card, &domain, scraped_at) {
                Ok(record) => {
                    debug!("Container {}: {}", index, record.display_name());
                    extraction.records.push(record);
                }
                Err(reason) => {
                    let snippet = snippet(&element.html());
                    warn!("Skipping container {}: {} ({})", index, reason, snippet);
                    extraction.skipped.push(SkippedContainer {
                        index,
                        reason,
                        snippet,
                    });
                }
            }
        }

        extraction
    }

    fn extract_card(
        &self,
        card: &Card<'_>,
        domain: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<ProjectRecord, ContainerError> {
        let link = fields::link(card);
        let canonical_url = link
            .map(|l| self::url::resolve(card.base, l.href))
            .transpose()?;
        let title = fields::title(card, link);

        if !self
            .required
            .satisfied(title.is_some(), canonical_url.is_some())
        {
            return Err(ContainerError::MissingRequired(self.required.describe()));
        }

        let description = fields::description(card, title.as_deref());
        let mut record = ProjectRecord::new(domain, scraped_at);
        record.title = title;
        record.canonical_url = canonical_url;
        record.description = description;
        record.media = fields::media(card);
        for category in fields::categories(card) {
            record.push_category(&category);
        }

        Ok(record)
    }
}

/// Heuristic for bot-check interstitials served instead of the listing.
pub fn looks_like_challenge(markup: &str) -> bool {
    let lower = markup.to_lowercase();
    ["cloudflare", "checking your browser", "cf-challenge", "captcha"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Whitespace-collapsed markup, cut to [`SNIPPET_CHARS`] on a char boundary.
fn snippet(html: &str) -> String {
    let collapsed = html.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
