use super::{ProcessOutcome, ResponseProcessor};
use crate::context::CrawlScope;
use crate::entity::ResponseData;
use crate::{Result, TrawlError};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SitemapEntry {
    loc: String,
}

/// Either a `<urlset>` or a `<sitemapindex>`; the root name is not checked
#[derive(Debug, Default, Deserialize)]
struct SitemapDocument {
    #[serde(default)]
    url: Vec<SitemapEntry>,
    #[serde(default)]
    sitemap: Vec<SitemapEntry>,
}

/// Extracts the URLs listed by a sitemap
///
/// XML sitemaps and sitemap indexes yield their `<loc>` values; any other
/// body is read as a plain-text sitemap with one URL per line.
///
/// # Errors
///
/// Returns the deserializer error for malformed XML.
pub fn parse_sitemap(content: &str) -> std::result::Result<Vec<String>, quick_xml::de::DeError> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with('<') {
        return Ok(trimmed
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
            .map(str::to_string)
            .collect());
    }

    let document: SitemapDocument = quick_xml::de::from_str(trimmed)?;
    Ok(document
        .url
        .into_iter()
        .chain(document.sitemap)
        .map(|entry| entry.loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect())
}

/// Turns sitemap documents into child URLs without storing them
#[derive(Debug, Default)]
pub struct SitemapsResponseProcessor;

impl SitemapsResponseProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseProcessor for SitemapsResponseProcessor {
    async fn process(
        &self,
        _scope: &CrawlScope<'_>,
        response: &ResponseData,
    ) -> Result<ProcessOutcome> {
        if response.http_status_code != 200 {
            tracing::debug!(
                "Ignoring sitemap response ({}): {}",
                response.http_status_code,
                response.url
            );
            return Ok(ProcessOutcome::empty());
        }

        let urls = parse_sitemap(&response.content_as_str()).map_err(|e| TrawlError::Sitemap {
            url: response.url.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!("Sitemap {} lists {} URLs", response.url, urls.len());
        Ok(ProcessOutcome::with_children(urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CrawlerContext, WorkerId};
    use crate::entity::UrlQueueEntry;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://example.com/about </loc></url>
</urlset>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            vec!["https://example.com/", "https://example.com/about"]
        );
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-2.xml</loc></sitemap>
</sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml).unwrap(),
            vec![
                "https://example.com/sitemap-1.xml",
                "https://example.com/sitemap-2.xml"
            ]
        );
    }

    #[test]
    fn test_parse_text_sitemap() {
        let text = "https://example.com/a\n\n  https://example.com/b  \nnot-a-url\n";
        assert_eq!(
            parse_sitemap(text).unwrap(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_parse_empty_urlset() {
        assert!(parse_sitemap("<urlset></urlset>").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processor_returns_children() {
        let context = CrawlerContext::new();
        let entry = UrlQueueEntry::seed("s1", "https://example.com/sitemap.xml");
        let scope = CrawlScope {
            context: &context,
            worker: WorkerId(0),
            entry: &entry,
        };
        let mut response = ResponseData::new("https://example.com/sitemap.xml", 200);
        response.content =
            b"<urlset><url><loc>https://example.com/x</loc></url></urlset>".to_vec();

        let outcome = SitemapsResponseProcessor::new()
            .process(&scope, &response)
            .await
            .unwrap();
        assert_eq!(outcome.child_urls, vec!["https://example.com/x".to_string()]);
    }
}
