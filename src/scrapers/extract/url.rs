//! Link resolution and video URL normalization.

use std::sync::LazyLock;

use regex::Regex;
use url::{ParseError, Url};

use crate::scrapers::error::ContainerError;

/// Whether an href is worth resolving at all.
///
/// Fragment-only links and script/mail/phone pseudo-links never point at a
/// project page.
pub fn is_navigable(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let lower = href.to_ascii_lowercase();
    !["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Resolve `href` against the listing page URL.
///
/// Absolute http(s) hrefs are returned exactly as written and
/// protocol-relative ones only gain the page's scheme. Listing URLs without a
/// file extension in their last segment are treated as directories, so `foo`
/// on `/work` resolves to `/work/foo`. The result must be an absolute http(s)
/// URL with a host.
pub fn resolve(base: &Url, href: &str) -> Result<String, ContainerError> {
    let href = href.trim();
    let invalid = |reason: String| ContainerError::InvalidUrl {
        href: href.to_string(),
        reason,
    };

    let (resolved, verbatim) = if href.starts_with("//") {
        let absolute = format!("{}:{}", base.scheme(), href);
        let parsed = Url::parse(&absolute).map_err(|e| invalid(e.to_string()))?;
        (parsed, Some(absolute))
    } else {
        match Url::parse(href) {
            Ok(parsed) => (parsed, Some(href.to_string())),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let joined = directory_base(base)
                    .join(href)
                    .map_err(|e| invalid(e.to_string()))?;
                (joined, None)
            }
            Err(e) => return Err(invalid(e.to_string())),
        }
    };

    match resolved.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if resolved.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(verbatim.unwrap_or_else(|| resolved.to_string()))
}

fn directory_base(base: &Url) -> Url {
    let path = base.path();
    if path.ends_with('/') {
        return base.clone();
    }
    let last = path.rsplit('/').next().unwrap_or("");
    if last.contains('.') {
        return base.clone();
    }
    let mut dir = base.clone();
    dir.set_path(&format!("{}/", path));
    dir
}

/// Resolve a media source; unlike links, failures just drop the candidate.
pub fn resolve_media(base: &Url, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    resolve(base, src).ok()
}

static VIMEO_PLAYER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"player\.vimeo\.com/video/(\d+)").unwrap());

static VIMEO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"vimeo\.com/(\d+)").unwrap());

static YOUTUBE_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"youtube(?:-nocookie)?\.com/embed/([A-Za-z0-9_-]+)").unwrap()
});

/// Rewrite embed player URLs to their canonical watch pages.
pub fn normalize_video(url: &str) -> String {
    if let Some(caps) = VIMEO_PLAYER.captures(url) {
        return format!("https://vimeo.com/{}", &caps[1]);
    }
    if let Some(caps) = YOUTUBE_EMBED.captures(url) {
        return format!("https://www.youtube.com/watch?v={}", &caps[1]);
    }
    url.to_string()
}

/// Extract a Vimeo id from any vimeo.com URL.
pub fn vimeo_id(url: &str) -> Option<&str> {
    VIMEO_PLAYER
        .captures(url)
        .or_else(|| VIMEO.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Turn a video data-attribute value into a URL.
///
/// Bare numbers are Vimeo ids; `youtube` attributes carry YouTube ids.
pub fn video_from_attribute(base: &Url, attribute: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("https://vimeo.com/{}", value));
    }
    if attribute.contains("youtube") && !value.contains('/') {
        return Some(format!("https://www.youtube.com/watch?v={}", value));
    }
    resolve_media(base, value).map(|u| normalize_video(&u))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_root_relative_is_absolutized() {
        assert_eq!(
            resolve(&base("https://example.com"), "/work/foo").unwrap(),
            "https://example.com/work/foo"
        );
    }

    #[test]
    fn test_absolute_passes_through() {
        assert_eq!(
            resolve(&base("https://example.com/work"), "https://other.org/p/1").unwrap(),
            "https://other.org/p/1"
        );
        assert_eq!(
            resolve(&base("https://example.com/work"), "https://other.org").unwrap(),
            "https://other.org"
        );
        assert_eq!(
            resolve(&base("https://example.com/work"), " https://Other.org/Case ").unwrap(),
            "https://Other.org/Case"
        );
    }

    #[test]
    fn test_protocol_relative_takes_page_scheme() {
        assert_eq!(
            resolve(&base("https://example.com/work"), "//cdn.example.com/p").unwrap(),
            "https://cdn.example.com/p"
        );
    }

    #[test]
    fn test_relative_against_directory_listing() {
        assert_eq!(
            resolve(&base("https://example.com/work"), "foo").unwrap(),
            "https://example.com/work/foo"
        );
        assert_eq!(
            resolve(&base("https://example.com/work/index.html"), "foo").unwrap(),
            "https://example.com/work/foo"
        );
    }

    #[test]
    fn test_unresolvable_link_is_invalid() {
        let err = resolve(&base("https://example.com"), "http://[not-an-ip]/work").unwrap_err();
        assert!(matches!(err, ContainerError::InvalidUrl { .. }));

        let err = resolve(&base("https://example.com"), "ftp://example.com/file").unwrap_err();
        assert!(matches!(err, ContainerError::InvalidUrl { .. }));
    }

    #[test]
    fn test_placeholder_links_are_not_navigable() {
        for href in ["", "  ", "#", "#top", "javascript:void(0)", "mailto:a@b.c", "tel:123"] {
            assert!(!is_navigable(href), "{href:?} should be rejected");
        }
        assert!(is_navigable("/work/foo"));
    }

    #[test]
    fn test_data_uri_media_rejected() {
        assert_eq!(
            resolve_media(&base("https://example.com"), "data:image/gif;base64,R0lG"),
            None
        );
    }

    #[test]
    fn test_video_normalization() {
        assert_eq!(
            normalize_video("https://player.vimeo.com/video/123456?h=abc"),
            "https://vimeo.com/123456"
        );
        assert_eq!(
            normalize_video("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_video("https://cdn.example.com/a.mp4"),
            "https://cdn.example.com/a.mp4"
        );
    }

    #[test]
    fn test_video_attribute_values() {
        let base = base("https://koto.studio/work");
        assert_eq!(
            video_from_attribute(&base, "data-video", "987654").as_deref(),
            Some("https://vimeo.com/987654")
        );
        assert_eq!(
            video_from_attribute(&base, "data-youtube-id", "abcDEF_12").as_deref(),
            Some("https://www.youtube.com/watch?v=abcDEF_12")
        );
        assert_eq!(
            video_from_attribute(&base, "data-video-src", "/media/clip.mp4").as_deref(),
            Some("https://koto.studio/media/clip.mp4")
        );
        assert_eq!(vimeo_id("https://vimeo.com/42"), Some("42"));
    }
}
