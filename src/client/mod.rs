//! Crawler clients fetch a URL and turn it into a [`ResponseData`]
//!
//! Clients are chosen per URL through a [`CrawlerClientFactory`], which maps
//! URL patterns to client instances. The HTTP client also handles robots.txt
//! for the session; the filesystem client lists directories as children.

mod filesystem;
mod http;

pub use filesystem::FileSystemClient;
pub use http::{build_http_client, HttpClient};

use crate::context::CrawlScope;
use crate::entity::{RequestData, ResponseData};
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, PoisonError, RwLock};

/// What a client produced for one request
#[derive(Debug, Clone, PartialEq)]
pub enum ClientResponse {
    /// A fetched resource
    Fetched(ResponseData),
    /// A container (such as a directory) whose members should be enqueued
    Children(Vec<String>),
}

#[async_trait]
pub trait CrawlerClient: Send + Sync {
    async fn execute(&self, scope: &CrawlScope<'_>, request: &RequestData) -> Result<ClientResponse>;
}

/// Maps URL patterns to clients; the first registered match wins
#[derive(Default)]
pub struct CrawlerClientFactory {
    clients: RwLock<Vec<(Regex, Arc<dyn CrawlerClient>)>>,
}

impl CrawlerClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the HTTP client for `http(s)://` and the filesystem
    /// client for `file:` URLs
    pub fn with_defaults(http: Arc<HttpClient>) -> Self {
        let factory = Self::new();
        factory.push(Regex::new("^https?://").ok(), http);
        factory.push(
            Regex::new("^file:").ok(),
            Arc::new(FileSystemClient::new()),
        );
        factory
    }

    /// Registers `client` for URLs matching `pattern`
    ///
    /// The pattern is matched against the start of the URL.
    pub fn add_client(
        &self,
        pattern: &str,
        client: Arc<dyn CrawlerClient>,
    ) -> std::result::Result<(), regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        self.push(Some(regex), client);
        Ok(())
    }

    fn push(&self, regex: Option<Regex>, client: Arc<dyn CrawlerClient>) {
        if let Some(regex) = regex {
            self.clients
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push((regex, client));
        }
    }

    /// Returns the client registered for `url`, if any
    pub fn get_client(&self, url: &str) -> Option<Arc<dyn CrawlerClient>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(regex, _)| regex.is_match(url))
            .map(|(_, client)| Arc::clone(client))
    }

    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
