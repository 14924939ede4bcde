//! HTTP client implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the reqwest client with the crawler's user agent string
//! - Fetching robots.txt once per origin and feeding its rules to the session
//! - Mapping responses (status, content type, Last-Modified, redirects)
//!   into [`ResponseData`]

use super::{ClientResponse, CrawlerClient};
use crate::config::UserAgentConfig;
use crate::context::CrawlScope;
use crate::entity::{RequestData, RequestMethod, ResponseData};
use crate::robots::{disallow_to_pattern, origin_of, robots_txt_url, ParsedRobots};
use crate::{Result, TrawlError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use url::Url;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed; a 3xx response carries its target in
/// [`ResponseData::redirect_location`] and the worker enqueues it.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_trawl::client::build_http_client;
/// use sumi_trawl::config::UserAgentConfig;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiTrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`CrawlerClient`] for `http://` and `https://` URLs
pub struct HttpClient {
    client: Client,
    /// Agent token matched against robots.txt groups
    robots_agent: String,
    robots_txt_enabled: bool,
}

impl HttpClient {
    pub fn new(config: &UserAgentConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: &UserAgentConfig, timeout: Duration) -> Result<Self> {
        let client = build_http_client(config, timeout).map_err(|e| TrawlError::Http {
            url: String::new(),
            source: e,
        })?;
        Ok(Self {
            client,
            robots_agent: config.crawler_name.clone(),
            robots_txt_enabled: true,
        })
    }

    pub fn with_robots_txt(mut self, enabled: bool) -> Self {
        self.robots_txt_enabled = enabled;
        self
    }

    /// Fetches the origin's robots.txt the first time the session sees it
    ///
    /// Disallow rules become exclude patterns on the session's URL filter and
    /// declared sitemaps are buffered for the calling worker. Afterwards the
    /// URL itself is rejected if the filter no longer accepts it.
    async fn process_robots_txt(&self, scope: &CrawlScope<'_>, url: &str) -> Result<()> {
        let parsed = Url::parse(url)?;
        let Some(robots_url) = robots_txt_url(&parsed) else {
            return Ok(());
        };

        let robots_set = scope.context.robots_txt_url_set();
        if robots_set.insert(robots_url.clone()) {
            let robots = self.fetch_robots(&robots_url).await;
            let origin = origin_of(&parsed);

            if let Some(filter) = scope.context.url_filter() {
                for path in robots.disallowed_paths(&self.robots_agent) {
                    filter.add_exclude(&disallow_to_pattern(&origin, &path));
                }
            } else if !robots.is_allowed(url, &self.robots_agent) {
                return Err(TrawlError::RobotsDenied {
                    url: url.to_string(),
                });
            }

            let sitemaps = robots.sitemaps();
            if !sitemaps.is_empty() {
                tracing::debug!("{} declares {} sitemaps", robots_url, sitemaps.len());
                scope.context.add_sitemaps(scope.worker, sitemaps);
            }
        }

        if !scope.context.matches_url(url) {
            return Err(TrawlError::RobotsDenied {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Fetches and parses robots.txt, allowing everything when it is
    /// missing or unreachable
    async fn fetch_robots(&self, robots_url: &str) -> ParsedRobots {
        tracing::debug!("Fetching robots.txt: {}", robots_url);

        let response = match self.client.get(robots_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", robots_url, e);
                return ParsedRobots::allow_all();
            }
        };

        if !response.status().is_success() {
            return ParsedRobots::allow_all();
        }

        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                tracing::debug!("Failed to read {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }

    fn map_error(url: &str, error: reqwest::Error) -> TrawlError {
        if error.is_timeout() {
            TrawlError::Timeout {
                url: url.to_string(),
            }
        } else {
            TrawlError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Splits a Content-Type value into MIME type and charset
fn parse_content_type(value: &str) -> (Option<String>, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let charset = parts
        .filter_map(|p| p.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string());
    (mime, charset)
}

fn header_str<'a>(headers: &'a HeaderMap, name: reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    header_str(headers, LAST_MODIFIED).and_then(|lm| {
        DateTime::parse_from_rfc2822(lm)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Resolves a Location header against the request URL
fn resolve_location(base: &str, location: &str) -> Option<String> {
    Url::parse(base)
        .and_then(|base| base.join(location))
        .map(|u| u.to_string())
        .ok()
}

#[async_trait]
impl CrawlerClient for HttpClient {
    async fn execute(&self, scope: &CrawlScope<'_>, request: &RequestData) -> Result<ClientResponse> {
        let url = request.url.as_str();

        if self.robots_txt_enabled {
            self.process_robots_txt(scope, url).await?;
        }

        let started = Instant::now();
        let builder = match request.method {
            RequestMethod::Get => self.client.get(url),
            RequestMethod::Head => self.client.head(url),
        };
        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();

        let mut data = ResponseData::new(url, status.as_u16());
        data.method = request.method;
        data.session_id = scope.context.session_id();
        data.parent_url = scope.entry.parent_url.clone();
        data.last_modified = parse_last_modified(&headers);

        if let Some(content_type) = header_str(&headers, CONTENT_TYPE) {
            let (mime, charset) = parse_content_type(content_type);
            data.mime_type = mime;
            data.charset = charset;
        }

        if status.is_redirection() {
            data.redirect_location =
                header_str(&headers, LOCATION).and_then(|location| resolve_location(url, location));
        }

        if request.method == RequestMethod::Get {
            let body = response
                .bytes()
                .await
                .map_err(|e| Self::map_error(url, e))?;
            data.content = body.to_vec();
            data.content_length = data.content.len() as u64;
        } else {
            data.content_length = header_str(&headers, CONTENT_LENGTH)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
        }

        data.execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "{} {} -> {} ({} ms)",
            request.method,
            url,
            data.http_status_code,
            data.execution_time_ms
        );

        Ok(ClientResponse::Fetched(data))
    }
}
