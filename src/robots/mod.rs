//! Robots.txt handling module
//!
//! This module provides the session-wide set of already fetched robots.txt
//! URLs, the robots.txt parser, and the helpers that turn Disallow rules into
//! URL filter exclude patterns.

mod cache;
mod parser;

pub use cache::{RobotsTxtUrlSet, ROBOTS_TXT_URL_CAPACITY};
pub use parser::ParsedRobots;

use url::Url;

/// Returns the robots.txt URL for the origin of `url`
///
/// Only http and https URLs have a robots.txt; anything else yields `None`.
pub fn robots_txt_url(url: &Url) -> Option<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots.to_string())
}

/// Converts a robots.txt Disallow path into a URL filter exclude regex
///
/// `*` in the path matches any run of characters and a trailing `$` anchors
/// the end; any other path matches as a prefix.
pub fn disallow_to_pattern(origin: &str, path: &str) -> String {
    let (path, anchored) = match path.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (path, false),
    };

    let escaped = path
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    let mut pattern = format!("{}{}", regex::escape(origin), escaped);
    if !anchored {
        pattern.push_str(".*");
    }
    pattern
}

/// Returns `scheme://host[:port]` for an http(s) URL
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
