//! Bounded set of robots.txt URLs already fetched in a session
//!
//! Workers consult this set before fetching robots.txt for an origin. The set
//! is capped; once full, the least recently inserted URL is evicted, so a very
//! long crawl may fetch an evicted origin's robots.txt again.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Maximum number of robots.txt URLs remembered per session
pub const ROBOTS_TXT_URL_CAPACITY: usize = 10_000;

/// LRU-bounded, thread-safe set of robots.txt URLs
pub struct RobotsTxtUrlSet {
    urls: Mutex<LruCache<String, ()>>,
}

impl RobotsTxtUrlSet {
    /// Creates a set with the default capacity of 10,000 entries
    pub fn new() -> Self {
        Self::with_capacity(ROBOTS_TXT_URL_CAPACITY)
    }

    /// Creates a set holding at most `capacity` entries (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            urls: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Inserts a URL, evicting the oldest entry when full
    ///
    /// Returns true if the URL was not present before. Two workers racing on
    /// the same origin may both see `true` from `contains` checks, but only
    /// one of them sees `true` here.
    pub fn insert(&self, url: impl Into<String>) -> bool {
        let mut urls = self.urls.lock().unwrap_or_else(PoisonError::into_inner);
        urls.put(url.into(), ()).is_none()
    }

    /// Checks membership without refreshing the entry's position
    pub fn contains(&self, url: &str) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cap()
            .get()
    }

    pub fn clear(&self) {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for RobotsTxtUrlSet {
    fn default() -> Self {
        Self::new()
    }
}
