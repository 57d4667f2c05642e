//! Project records extracted from portfolio listings.
//!
//! A record is built once by the extractor and never mutated afterwards;
//! the sink consumes it and the record is dropped at the end of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media attached to a project card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

/// Preview media for a project. Video is preferred over image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub url: String,
}

impl Media {
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            url: url.into(),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
        }
    }
}

/// One project card from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Display title of the project.
    #[serde(default)]
    pub title: Option<String>,
    /// Absolute URL of the project's detail page. Dedup key.
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub description: Option<String>,
    /// Category labels in document order.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Host the record was scraped from, without a leading `www.`.
    pub source_domain: String,
    pub scraped_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Create an empty record for a domain; fields are filled by the extractor.
    pub fn new(source_domain: impl Into<String>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            title: None,
            canonical_url: None,
            media: None,
            description: None,
            categories: Vec::new(),
            source_domain: source_domain.into(),
            scraped_at,
        }
    }

    /// The dedup key, if the record has a non-blank URL.
    pub fn dedup_key(&self) -> Option<&str> {
        self.canonical_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Append a category label unless it is blank or already present.
    pub fn push_category(&mut self, label: &str) {
        let label = label.trim();
        if label.is_empty() || self.categories.iter().any(|c| c == label) {
            return;
        }
        self.categories.push(label.to_string());
    }

    /// Short human-readable label for log lines and summaries.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.canonical_url.as_deref())
            .unwrap_or("[untitled]")
    }
}

/// Host of a URL with any leading `www.` removed.
pub fn source_domain_of(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_media_serializes_as_tagged_kind() {
        let mut record = ProjectRecord::new("pentagram.com", fixed_time());
        record.media = Some(Media::video("https://cdn.example.com/clip.mp4"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["media"]["kind"], "video");
        assert_eq!(json["media"]["url"], "https://cdn.example.com/clip.mp4");
        assert_eq!(json["scraped_at"], "2026-10-18T09:00:00Z");
    }

    #[test]
    fn test_dedup_key_ignores_blank_urls() {
        let mut record = ProjectRecord::new("koto.studio", fixed_time());
        assert_eq!(record.dedup_key(), None);

        record.canonical_url = Some("   ".to_string());
        assert_eq!(record.dedup_key(), None);

        record.canonical_url = Some("https://koto.studio/work/a".to_string());
        assert_eq!(record.dedup_key(), Some("https://koto.studio/work/a"));
    }

    #[test]
    fn test_push_category_skips_blank_and_duplicates() {
        let mut record = ProjectRecord::new("pentagram.com", fixed_time());
        record.push_category("Identity");
        record.push_category("  ");
        record.push_category("Identity");
        record.push_category(" Arts & Culture ");
        assert_eq!(record.categories, vec!["Identity", "Arts & Culture"]);
    }

    #[test]
    fn test_source_domain_strips_www() {
        let url = url::Url::parse("https://www.pentagram.com/work").unwrap();
        assert_eq!(source_domain_of(&url), "pentagram.com");

        let url = url::Url::parse("https://koto.studio/work").unwrap();
        assert_eq!(source_domain_of(&url), "koto.studio");
    }

    #[test]
    fn test_record_deserializes_with_missing_optionals() {
        let json = r#"{"source_domain": "koto.studio", "scraped_at": "2026-10-18T09:00:00Z"}"#;
        let record: ProjectRecord = serde_json::from_str(json).unwrap();
        assert!(record.title.is_none());
        assert!(record.categories.is_empty());
    }
}
