//! Value types exchanged between the queue, clients, rules and processors

use chrono::{DateTime, Utc};
use std::fmt;

/// HTTP status code reported for responses that were not modified
pub const NOT_MODIFIED_STATUS_CODE: u16 = 304;

/// Transformer name recorded for not-modified results
pub const NO_TRANSFORMER: &str = "NoTransformer";

/// Request method of a queued URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Head,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of crawl work held in the URL queue
#[derive(Debug, Clone, PartialEq)]
pub struct UrlQueueEntry {
    pub session_id: String,
    pub url: String,
    pub method: RequestMethod,
    pub parent_url: Option<String>,
    /// Link distance from the seed; seeds are 0
    pub depth: u32,
    /// Last known modification time, set when re-crawling
    pub last_modified: Option<DateTime<Utc>>,
    pub meta_data: Option<String>,
    pub create_time: DateTime<Utc>,
}

impl UrlQueueEntry {
    /// Creates a seed entry at depth 0
    pub fn seed(session_id: &str, url: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            url: url.to_string(),
            method: RequestMethod::Get,
            parent_url: None,
            depth: 0,
            last_modified: None,
            meta_data: None,
            create_time: Utc::now(),
        }
    }

    /// Creates an entry discovered from `parent_url`
    pub fn child(session_id: &str, url: &str, parent_url: &str, depth: u32) -> Self {
        Self {
            parent_url: Some(parent_url.to_string()),
            depth,
            ..Self::seed(session_id, url)
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    pub fn with_meta_data(mut self, meta_data: impl Into<String>) -> Self {
        self.meta_data = Some(meta_data.into());
        self
    }

    /// Depth assigned to URLs discovered from this entry
    pub fn child_depth(&self) -> u32 {
        self.depth.saturating_add(1)
    }
}

/// A request handed to a crawler client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestData {
    pub method: RequestMethod,
    pub url: String,
}

impl RequestData {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Get,
            url: url.into(),
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Head,
            url: url.into(),
        }
    }
}

/// Outcome classification of a fetched response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseStatus {
    #[default]
    Ok,
    NotModified,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotModified => "not_modified",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "not_modified" => Some(Self::NotModified),
            _ => None,
        }
    }
}

/// A fetched resource as produced by a crawler client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseData {
    pub url: String,
    pub method: RequestMethod,
    pub http_status_code: u16,
    pub status: ResponseStatus,
    pub content: Vec<u8>,
    pub charset: Option<String>,
    pub mime_type: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub parent_url: Option<String>,
    pub session_id: String,
    /// Id of the rule that handled this response, set during dispatch
    pub rule_id: Option<String>,
    pub execution_time_ms: u64,
    /// Target of a redirect; such responses are not dispatched to rules
    pub redirect_location: Option<String>,
}

impl ResponseData {
    pub fn new(url: impl Into<String>, http_status_code: u16) -> Self {
        Self {
            url: url.into(),
            http_status_code,
            ..Default::default()
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences
    pub fn content_as_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Returns true if the MIME type starts with `prefix`
    pub fn is_mime_type(&self, prefix: &str) -> bool {
        self.mime_type
            .as_deref()
            .map(|mime| mime.starts_with(prefix))
            .unwrap_or(false)
    }
}

/// Output of a transformer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultData {
    pub data: Vec<u8>,
    pub encoding: String,
    pub transformer_name: String,
    pub title: Option<String>,
    pub child_urls: Vec<String>,
}

/// A persisted crawl result
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResult {
    pub session_id: String,
    pub url: String,
    pub parent_url: Option<String>,
    pub rule_id: Option<String>,
    pub method: RequestMethod,
    pub http_status_code: u16,
    pub status: ResponseStatus,
    pub mime_type: Option<String>,
    pub content_length: u64,
    pub execution_time_ms: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
    pub title: Option<String>,
    pub encoding: String,
    pub transformer_name: String,
    pub data: Vec<u8>,
}

impl AccessResult {
    /// Builds a result from a response and its transformed data
    pub fn new(response: &ResponseData, result: ResultData) -> Self {
        Self {
            session_id: response.session_id.clone(),
            url: response.url.clone(),
            parent_url: response.parent_url.clone(),
            rule_id: response.rule_id.clone(),
            method: response.method,
            http_status_code: response.http_status_code,
            status: response.status,
            mime_type: response.mime_type.clone(),
            content_length: response.content_length,
            execution_time_ms: response.execution_time_ms,
            last_modified: response.last_modified,
            create_time: Utc::now(),
            title: result.title,
            encoding: result.encoding,
            transformer_name: result.transformer_name,
            data: result.data,
        }
    }
}
