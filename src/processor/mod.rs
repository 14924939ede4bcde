//! Response processors handle responses routed to them by rules
//!
//! A processor persists whatever it wants to keep and reports the child
//! URLs it discovered; the worker filters and enqueues those children.

mod default;
mod sitemaps;

pub use default::DefaultResponseProcessor;
pub use sitemaps::{parse_sitemap, SitemapsResponseProcessor};

use crate::context::CrawlScope;
use crate::entity::ResponseData;
use crate::Result;
use async_trait::async_trait;

/// What a processor hands back to the worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Links to enqueue at the entry's depth + 1
    pub child_urls: Vec<String>,
}

impl ProcessOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_children(child_urls: Vec<String>) -> Self {
        Self { child_urls }
    }
}

#[async_trait]
pub trait ResponseProcessor: Send + Sync {
    async fn process(&self, scope: &CrawlScope<'_>, response: &ResponseData)
        -> Result<ProcessOutcome>;
}
