//! Transformers turn a fetched response into stored result data
//!
//! The HTML transformer extracts the page title and the links to follow;
//! the raw transformer stores the body untouched.

use crate::entity::{ResponseData, ResultData};
use crate::url::normalize_url;
use scraper::{Html, Selector};
use url::Url;

/// Converts a response into result data plus child links
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Transforms `response`, or returns `None` when it has no usable data
    fn transform(&self, response: &ResponseData) -> Option<ResultData>;
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
/// - `<frame src>` and `<iframe src>`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// A `<base href>` element replaces the page URL as the resolution base.
/// Links are normalized and de-duplicated in document order.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```
/// use sumi_trawl::transformer::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base),
    }
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |href: &str| {
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if !links.contains(&absolute_url) {
                links.push(absolute_url);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(frame_selector) = Selector::parse("frame[src], iframe[src]") {
        for element in document.select(&frame_selector) {
            if let Some(src) = element.value().attr("src") {
                push(src);
            }
        }
    }

    links
}

/// Resolves a link href to a normalized absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    normalize_url(absolute_url.as_str())
        .ok()
        .map(|url| url.to_string())
}

/// Extracts title and links from HTML responses
///
/// Non-HTML responses still produce result data, with no links.
#[derive(Debug, Default)]
pub struct HtmlTransformer;

impl HtmlTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for HtmlTransformer {
    fn name(&self) -> &str {
        "htmlTransformer"
    }

    fn transform(&self, response: &ResponseData) -> Option<ResultData> {
        let encoding = response
            .charset
            .clone()
            .unwrap_or_else(|| "UTF-8".to_string());

        let parsed = match Url::parse(&response.url) {
            Ok(base_url) if response.is_mime_type("text/html") => {
                Some(parse_html(&response.content_as_str(), &base_url))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Cannot resolve links of {}: {}", response.url, e);
                None
            }
        };

        let (title, child_urls) = match parsed {
            Some(page) => (page.title, page.links),
            None => (None, Vec::new()),
        };

        Some(ResultData {
            data: response.content.clone(),
            encoding,
            transformer_name: self.name().to_string(),
            title,
            child_urls,
        })
    }
}

/// Stores the response body unchanged
#[derive(Debug, Default)]
pub struct RawTransformer;

impl RawTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for RawTransformer {
    fn name(&self) -> &str {
        "rawTransformer"
    }

    fn transform(&self, response: &ResponseData) -> Option<ResultData> {
        Some(ResultData {
            data: response.content.clone(),
            encoding: response
                .charset
                .clone()
                .unwrap_or_else(|| "UTF-8".to_string()),
            transformer_name: self.name().to_string(),
            title: None,
            child_urls: Vec::new(),
        })
    }
}
