//! URL handling module for Sumi-Trawl
//!
//! This module provides the canonical form used for discovered links, so
//! that the queue's per-session duplicate check sees one spelling per page.

mod normalize;

pub use normalize::normalize_url;

/// Returns true for the schemes the HTTP client fetches
pub fn is_http_scheme(url: &::url::Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
