//! HTML parsing for extracting titles, links, and metadata
//!
//! Both fetch paths feed their HTML through this module: the static
//! fetcher hands over the raw response body, the dynamic fetcher the
//! rendered document. Extraction never fetches anything.

use scraper::{Html, Selector};
use url::Url;

use crate::crawler::types::PageMetadata;

/// Everything the parser pulls out of one HTML document
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title>)
    pub title: Option<String>,

    /// Raw href values from <a> tags, in document order, unresolved
    pub raw_links: Vec<String>,

    /// Head metadata (description, keywords, og tags, favicon, language)
    pub metadata: PageMetadata,

    /// h1/h2 heading texts in document order
    pub headings: Vec<String>,

    /// Number of <script> tags in the document
    pub script_count: usize,

    /// Length of the visible text (scripts and styles excluded)
    pub text_length: usize,
}

/// Parses an HTML document and extracts everything the engine needs
///
/// # Arguments
///
/// * `html` - The HTML content
/// * `base_url` - The URL the document was fetched from (favicon and
///   og:image hrefs are resolved against it)
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        raw_links: extract_raw_links(&document),
        metadata: extract_metadata(&document, base_url),
        headings: extract_headings(&document),
        script_count: count_scripts(&document),
        text_length: visible_text(&document).chars().count(),
    }
}

/// Returns the document's visible text with scripts and styles excluded
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            collect_text(body, &mut text);
        }
    }
    text
}

fn collect_text(element: scraper::ElementRef, output: &mut String) {
    if matches!(
        element.value().name(),
        "script" | "style" | "noscript" | "template"
    ) {
        return;
    }

    for child in element.children() {
        match child.value() {
            scraper::node::Node::Text(text) => {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    output.push_str(trimmed);
                    output.push(' ');
                }
            }
            scraper::node::Node::Element(_) => {
                if let Some(child_el) = scraper::ElementRef::wrap(child) {
                    collect_text(child_el, output);
                }
            }
            _ => {}
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_raw_links(document: &Html) -> Vec<String> {
    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                links.push(href.to_string());
            }
        }
    }
    links
}

fn extract_headings(document: &Html) -> Vec<String> {
    let mut headings = Vec::new();
    if let Ok(selector) = Selector::parse("h1, h2") {
        for element in document.select(&selector) {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                headings.push(text);
            }
        }
    }
    headings
}

fn count_scripts(document: &Html) -> usize {
    Selector::parse("script")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0)
}

/// Extracts head metadata from a parsed document
fn extract_metadata(document: &Html, base_url: &Url) -> PageMetadata {
    let description = meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"));

    let keywords = meta_content(document, "meta[name='keywords']")
        .map(|raw| {
            raw.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let author = meta_content(document, "meta[name='author']");
    let og_title = meta_content(document, "meta[property='og:title']");
    let og_image =
        meta_content(document, "meta[property='og:image']").map(|href| absolutize(base_url, &href));
    let twitter_card = meta_content(document, "meta[name='twitter:card']");

    let favicon = Selector::parse(
        "link[rel='icon'], link[rel='shortcut icon'], link[rel='apple-touch-icon']",
    )
    .ok()
    .and_then(|selector| {
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| absolutize(base_url, href))
    });

    let language = Selector::parse("html").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    });

    PageMetadata {
        description,
        keywords,
        author,
        og_title,
        og_image,
        twitter_card,
        favicon,
        language,
        content_type: None, // filled in from the HTTP response
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn absolutize(base_url: &Url, href: &str) -> String {
    base_url
        .join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
