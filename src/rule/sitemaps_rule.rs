use super::Rule;
use crate::entity::ResponseData;
use crate::processor::ResponseProcessor;
use std::sync::Arc;

/// Matches sitemap and sitemap index documents
///
/// A response is treated as a sitemap when its URL path ends in `.xml`,
/// `.xml.gz` or `.txt` under a name containing "sitemap", or when the
/// server labels it with an XML MIME type and its body opens a `urlset` or
/// `sitemapindex` element.
pub struct SitemapsRule {
    rule_id: String,
    processor: Option<Arc<dyn ResponseProcessor>>,
}

impl SitemapsRule {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            processor: None,
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn ResponseProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }
}

fn sitemap_like_path(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => return false,
    };
    let file_name = path.rsplit('/').next().unwrap_or("");
    file_name.contains("sitemap")
        && (file_name.ends_with(".xml")
            || file_name.ends_with(".xml.gz")
            || file_name.ends_with(".txt"))
}

fn sitemap_like_body(response: &ResponseData) -> bool {
    if !(response.is_mime_type("application/xml") || response.is_mime_type("text/xml")) {
        return false;
    }
    let head_len = response.content.len().min(1024);
    let head = String::from_utf8_lossy(&response.content[..head_len]);
    head.contains("<urlset") || head.contains("<sitemapindex")
}

impl Rule for SitemapsRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn matches(&self, response: &ResponseData) -> bool {
        sitemap_like_path(&response.url) || sitemap_like_body(response)
    }

    fn processor(&self) -> Option<Arc<dyn ResponseProcessor>> {
        self.processor.clone()
    }
}
