//! Crawl engine
//!
//! This module contains the concurrent crawling logic:
//! - The per-worker crawl loop ([`CrawlerThread`])
//! - Session orchestration over a worker pool ([`Crawler`])
//! - Wiring a crawler from a configuration file
//! - Typed crawl events rendered through `tracing`

mod builder;
mod log;
mod orchestrator;
mod worker;

pub use builder::{build_rule_manager, DEFAULT_HTML_RULE_ID, DEFAULT_SITEMAPS_RULE_ID};
pub use log::{log_event, LogEvent};
pub use orchestrator::{generate_session_id, Crawler};
pub use worker::CrawlerThread;
