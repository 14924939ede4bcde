//! Sumi-Trawl: a concurrent crawl engine
//!
//! This crate implements the crawling engine behind a web/filesystem crawler
//! that feeds a search index. Seed URLs are polled from a session-partitioned
//! URL queue by a pool of workers, fetched through pluggable clients, routed
//! to response processors through rules, and their child links are filtered
//! and re-enqueued while depth limits, access budgets and politeness
//! intervals are respected.

pub mod client;
pub mod config;
pub mod container;
pub mod context;
pub mod crawler;
pub mod entity;
pub mod filter;
pub mod interval;
pub mod output;
pub mod processor;
pub mod robots;
pub mod rule;
pub mod service;
pub mod transformer;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Storage error: {0}")]
    Storage(#[from] service::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("No client registered for {url}")]
    UnsupportedUrl { url: String },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDenied { url: String },

    #[error("Processing failed for {url}: {message}")]
    Processing { url: String, message: String },

    #[error("Session {session_id} is already running")]
    AlreadyRunning { session_id: String },

    #[error("Sitemap parse error for {url}: {message}")]
    Sitemap { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern in config: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use context::{CrawlScope, CrawlerContext, CrawlerStatus, WorkerId};
pub use crawler::Crawler;
pub use entity::{ResponseData, UrlQueueEntry};
