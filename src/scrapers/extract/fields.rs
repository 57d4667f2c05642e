//! Per-field fallback chains.
//!
//! Each chain is an ordered list of plain functions from a card to an
//! optional value. The first step that yields something wins; a chain that
//! yields nothing leaves the field absent.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use super::url::{is_navigable, normalize_video, resolve_media, video_from_attribute, vimeo_id};
use crate::models::Media;
use crate::scrapers::config::SiteProfile;
use crate::scrapers::error::SelectorError;

/// Anchor text that labels a link rather than naming a project.
const BOILERPLATE_PREFIXES: &[&str] = &["view", "see", "learn", "read", "more"];

/// Class-name fragments that mark a card's text block.
const TEXT_BLOCK_HINTS: &[&str] = &["content", "info", "text", "meta", "details", "caption"];

pub(super) fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn parse_all(selectors: &[String]) -> Result<Vec<Selector>, SelectorError> {
    selectors.iter().map(|s| parse_selector(s)).collect()
}

/// Compiled selectors for every field chain.
pub(super) struct FieldSelectors {
    links: Vec<Selector>,
    text_blocks: Vec<Selector>,
    titles: Vec<Selector>,
    descriptions: Vec<Selector>,
    video_attributes: Vec<(String, Selector)>,
    category_blocks: Vec<Selector>,
    category_label: Selector,
    anchor: Selector,
    heading: Selector,
    paragraph: Selector,
    classed: Selector,
    video_source: Selector,
    video: Selector,
    iframe: Selector,
    styled: Selector,
    img: Selector,
    srcset: Selector,
    lazy: Selector,
}

impl FieldSelectors {
    pub(super) fn compile(profile: &SiteProfile) -> Result<Self, SelectorError> {
        let video_attributes = profile
            .video_attributes
            .iter()
            .map(|attr| Ok((attr.clone(), parse_selector(&format!("[{}]", attr))?)))
            .collect::<Result<Vec<_>, SelectorError>>()?;

        Ok(Self {
            links: parse_all(&profile.link_selectors)?,
            text_blocks: parse_all(&profile.text_container_selectors)?,
            titles: parse_all(&profile.title_selectors)?,
            descriptions: parse_all(&profile.description_selectors)?,
            video_attributes,
            category_blocks: parse_all(&profile.category_container_selectors)?,
            category_label: parse_selector(&profile.category_label_selector)?,
            anchor: parse_selector("a[href]")?,
            heading: parse_selector("h1, h2, h3, h4, h5, h6")?,
            paragraph: parse_selector("p")?,
            classed: parse_selector("[class]")?,
            video_source: parse_selector("video source[src]")?,
            video: parse_selector("video[src]")?,
            iframe: parse_selector("iframe[src]")?,
            styled: parse_selector("[style]")?,
            img: parse_selector("img[src]")?,
            srcset: parse_selector("img[srcset], picture source[srcset]")?,
            lazy: parse_selector("img[data-src], [data-bg-src]")?,
        })
    }
}

/// One card plus everything the chains need to look at it.
pub(super) struct Card<'a> {
    pub element: ElementRef<'a>,
    pub base: &'a Url,
    pub selectors: &'a FieldSelectors,
}

type Step<'a, T> = fn(&Card<'a>) -> Option<T>;

fn first_of<'a, T>(card: &Card<'a>, steps: &[Step<'a, T>]) -> Option<T> {
    steps.iter().find_map(|step| step(card))
}

/// Collapse runs of whitespace; `None` for blank text.
pub(super) fn clean_text(element: ElementRef) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// --- Link ---------------------------------------------------------------

/// The anchor chosen for a card, kept so its text can stand in for a title.
#[derive(Clone, Copy)]
pub(super) struct Link<'a> {
    pub element: ElementRef<'a>,
    pub href: &'a str,
}

fn navigable(element: ElementRef<'_>) -> Option<Link<'_>> {
    let href = element.value().attr("href")?;
    is_navigable(href).then_some(Link { element, href })
}

fn link_from_profile<'a>(card: &Card<'a>) -> Option<Link<'a>> {
    card.selectors
        .links
        .iter()
        .find_map(|sel| card.element.select(sel).find_map(navigable))
}

fn link_from_card_itself<'a>(card: &Card<'a>) -> Option<Link<'a>> {
    if card.element.value().name() == "a" {
        navigable(card.element)
    } else {
        None
    }
}

fn link_from_child_anchors<'a>(card: &Card<'a>) -> Option<Link<'a>> {
    card.element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "a")
        .take(2)
        .find_map(navigable)
}

fn link_from_any_anchor<'a>(card: &Card<'a>) -> Option<Link<'a>> {
    card.element
        .select(&card.selectors.anchor)
        .find_map(navigable)
}

pub(super) fn link<'a>(card: &Card<'a>) -> Option<Link<'a>> {
    let steps: [Step<'a, Link<'a>>; 4] = [
        link_from_profile as Step<'a, Link<'a>>,
        link_from_card_itself as Step<'a, Link<'a>>,
        link_from_child_anchors as Step<'a, Link<'a>>,
        link_from_any_anchor as Step<'a, Link<'a>>,
    ];
    first_of(card, &steps)
}

// --- Title / description -------------------------------------------------

fn text_block<'a>(card: &Card<'a>) -> Option<ElementRef<'a>> {
    if let Some(block) = card
        .selectors
        .text_blocks
        .iter()
        .find_map(|sel| card.element.select(sel).next())
    {
        return Some(block);
    }

    card.element.select(&card.selectors.classed).find(|el| {
        el.value().classes().any(|class| {
            let class = class.to_ascii_lowercase();
            TEXT_BLOCK_HINTS.iter().any(|hint| class.contains(hint))
        })
    })
}

fn first_text<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|sel| scope.select(sel))
        .find_map(clean_text)
}

pub(super) fn title(card: &Card<'_>, link: Option<Link<'_>>) -> Option<String> {
    let headings = std::slice::from_ref(&card.selectors.heading);

    if let Some(block) = text_block(card) {
        if let Some(title) = first_text(block, &card.selectors.titles)
            .or_else(|| first_text(block, headings))
        {
            return Some(title);
        }
    }

    first_text(card.element, &card.selectors.titles)
        .or_else(|| first_text(card.element, headings))
        .or_else(|| link.and_then(|l| link_text_title(l.element)))
}

fn link_text_title(anchor: ElementRef<'_>) -> Option<String> {
    let text = clean_text(anchor)?;
    let lower = text.to_lowercase();
    if text.chars().count() <= 3 || BOILERPLATE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }
    Some(text)
}

pub(super) fn description(card: &Card<'_>, title: Option<&str>) -> Option<String> {
    let paragraphs = std::slice::from_ref(&card.selectors.paragraph);
    let not_title = |text: &String| Some(text.as_str()) != title;

    let in_block = text_block(card).and_then(|block| {
        first_text(block, &card.selectors.descriptions)
            .or_else(|| first_text(block, paragraphs))
    });

    in_block
        .filter(not_title)
        .or_else(|| first_text(card.element, &card.selectors.descriptions).filter(not_title))
        .or_else(|| first_text(card.element, paragraphs).filter(not_title))
}

// --- Media ---------------------------------------------------------------

fn attr_media(card: &Card<'_>, selector: &Selector, attr: &str) -> Option<String> {
    card.element
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(|src| resolve_media(card.base, src))
}

fn video_from_source(card: &Card<'_>) -> Option<Media> {
    attr_media(card, &card.selectors.video_source, "src").map(Media::video)
}

fn video_from_tag(card: &Card<'_>) -> Option<Media> {
    attr_media(card, &card.selectors.video, "src").map(Media::video)
}

fn video_from_attributes(card: &Card<'_>) -> Option<Media> {
    card.selectors.video_attributes.iter().find_map(|(attr, sel)| {
        std::iter::once(card.element)
            .chain(card.element.select(sel))
            .filter_map(|el| el.value().attr(attr))
            .find_map(|value| video_from_attribute(card.base, attr, value))
            .map(Media::video)
    })
}

fn video_from_iframe(card: &Card<'_>) -> Option<Media> {
    card.element
        .select(&card.selectors.iframe)
        .filter_map(|el| el.value().attr("src"))
        .filter(|src| src.contains("vimeo") || src.contains("youtube"))
        .find_map(|src| resolve_media(card.base, src))
        .map(|url| Media::video(normalize_video(&url)))
}

fn video_from_link(card: &Card<'_>) -> Option<Media> {
    let link = link(card)?;
    vimeo_id(link.href).map(|id| Media::video(format!("https://vimeo.com/{}", id)))
}

static BACKGROUND_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:[^;]*url\(\s*['"]?([^'")]*)['"]?\s*\)"#).unwrap()
});

/// First `url(...)` in an inline `background-image` declaration.
pub(super) fn background_image_url(style: &str) -> Option<&str> {
    let url = BACKGROUND_IMAGE.captures(style)?.get(1)?.as_str().trim();
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

fn image_from_background(card: &Card<'_>) -> Option<Media> {
    std::iter::once(card.element)
        .chain(card.element.select(&card.selectors.styled))
        .filter_map(|el| el.value().attr("style"))
        .filter_map(background_image_url)
        .find_map(|src| resolve_media(card.base, src))
        .map(Media::image)
}

fn image_from_src(card: &Card<'_>) -> Option<Media> {
    attr_media(card, &card.selectors.img, "src").map(Media::image)
}

/// Candidate with the largest width (`w`) or density (`x`) descriptor.
pub(super) fn best_srcset_entry(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let weight = parts
                .next()
                .and_then(|d| {
                    d.strip_suffix('w')
                        .or_else(|| d.strip_suffix('x'))
                        .and_then(|n| n.parse::<f64>().ok())
                })
                .unwrap_or(1.0);
            Some((url, weight))
        })
        .fold(None, |best: Option<(&str, f64)>, (url, weight)| match best {
            Some((_, w)) if w >= weight => best,
            _ => Some((url, weight)),
        })
        .map(|(url, _)| url)
}

fn image_from_srcset(card: &Card<'_>) -> Option<Media> {
    card.element
        .select(&card.selectors.srcset)
        .filter_map(|el| el.value().attr("srcset"))
        .filter_map(best_srcset_entry)
        .find_map(|src| resolve_media(card.base, src))
        .map(Media::image)
}

fn image_from_lazy(card: &Card<'_>) -> Option<Media> {
    card.element
        .select(&card.selectors.lazy)
        .filter_map(|el| el.value().attr("data-src").or(el.value().attr("data-bg-src")))
        .find_map(|src| resolve_media(card.base, src))
        .map(Media::image)
}

/// Video sources beat image sources.
pub(super) fn media<'a>(card: &Card<'a>) -> Option<Media> {
    let steps: [Step<'a, Media>; 9] = [
        video_from_source as Step<'a, Media>,
        video_from_tag as Step<'a, Media>,
        video_from_attributes as Step<'a, Media>,
        video_from_iframe as Step<'a, Media>,
        video_from_link as Step<'a, Media>,
        image_from_background as Step<'a, Media>,
        image_from_src as Step<'a, Media>,
        image_from_srcset as Step<'a, Media>,
        image_from_lazy as Step<'a, Media>,
    ];
    first_of(card, &steps)
}

// --- Categories ----------------------------------------------------------

/// Trimmed label texts of the first matching category block, in document order.
pub(super) fn categories(card: &Card<'_>) -> Vec<String> {
    card.selectors
        .category_blocks
        .iter()
        .map(|sel| card.element.select(sel).collect::<Vec<_>>())
        .find(|blocks| !blocks.is_empty())
        .map(|blocks| {
            blocks
                .into_iter()
                .flat_map(|block| block.select(&card.selectors.category_label))
                .filter_map(clean_text)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_image_url() {
        assert_eq!(
            background_image_url("background-image: url('https://a.com/x.jpg');"),
            Some("https://a.com/x.jpg")
        );
        assert_eq!(
            background_image_url("color: red; background-image:url(\"/img/y.png\")"),
            Some("/img/y.png")
        );
        assert_eq!(
            background_image_url("background-image: url( /img/z.png )"),
            Some("/img/z.png")
        );
        assert_eq!(background_image_url("background: red"), None);
        assert_eq!(background_image_url("background-image: url('')"), None);
    }

    #[test]
    fn test_best_srcset_entry() {
        assert_eq!(
            best_srcset_entry("a-320.jpg 320w, a-1280.jpg 1280w, a-640.jpg 640w"),
            Some("a-1280.jpg")
        );
        assert_eq!(best_srcset_entry("a.jpg, a@2x.jpg 2x"), Some("a@2x.jpg"));
        assert_eq!(best_srcset_entry("only.jpg"), Some("only.jpg"));
        assert_eq!(best_srcset_entry(""), None);
    }
}
