//! URL filtering
//!
//! A [`UrlFilter`] decides whether a URL is in scope for a session. Workers
//! consult it before fetching a queued URL and before enqueueing a child URL.

use regex::Regex;
use std::sync::{PoisonError, RwLock};

/// Session-scoped include/exclude URL filter
pub trait UrlFilter: Send + Sync {
    /// Prepares the filter for a session
    fn init(&self, session_id: &str);

    /// Adds an include pattern; once any include exists, URLs must match one
    fn add_include(&self, pattern: &str);

    /// Adds an exclude pattern; URLs matching any exclude are rejected
    fn add_exclude(&self, pattern: &str);

    /// Returns true if `url` is in scope
    fn matches(&self, url: &str) -> bool;

    /// Observes a seed URL as it is registered
    fn process_url(&self, url: &str);

    /// Drops all patterns
    fn clear(&self);
}

#[derive(Default)]
struct Patterns {
    session_id: Option<String>,
    includes: Vec<Regex>,
    /// Derived from seeds; only consulted while `includes` is empty
    seed_includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl Patterns {
    fn effective_includes(&self) -> &[Regex] {
        if self.includes.is_empty() {
            &self.seed_includes
        } else {
            &self.includes
        }
    }
}

/// Regex-based [`UrlFilter`]
///
/// Patterns must match the whole URL. Invalid patterns are logged and
/// ignored. When seed scoping is enabled, every seed contributes an include
/// for its own directory prefix; those seed includes apply only while no
/// include was added explicitly.
#[derive(Default)]
pub struct RegexUrlFilter {
    patterns: RwLock<Patterns>,
    scope_to_seeds: bool,
}

impl RegexUrlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter that derives include patterns from seed URLs
    pub fn scoped_to_seeds() -> Self {
        Self {
            patterns: RwLock::new(Patterns::default()),
            scope_to_seeds: true,
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.read().session_id.clone()
    }

    pub fn includes(&self) -> Vec<String> {
        self.read()
            .includes
            .iter()
            .map(|re| unanchor(re.as_str()))
            .collect()
    }

    pub fn excludes(&self) -> Vec<String> {
        self.read()
            .excludes
            .iter()
            .map(|re| unanchor(re.as_str()))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Patterns> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Patterns> {
        self.patterns.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compiles a pattern so that it must match the whole URL
fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Ignoring invalid URL pattern {}: {}", pattern, e);
            None
        }
    }
}

fn unanchor(anchored: &str) -> String {
    anchored
        .strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(anchored)
        .to_string()
}

/// Builds an include pattern covering the directory of a seed URL
fn seed_scope_pattern(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path();
    let dir = match path.rfind('/') {
        Some(pos) => &path[..=pos],
        None => "/",
    };
    let prefix = match parsed.scheme() {
        "file" => format!("file://{}", dir),
        _ => format!("{}{}", parsed.origin().ascii_serialization(), dir),
    };
    Some(format!("{}.*", regex::escape(&prefix)))
}

impl UrlFilter for RegexUrlFilter {
    fn init(&self, session_id: &str) {
        self.write().session_id = Some(session_id.to_string());
    }

    fn add_include(&self, pattern: &str) {
        if let Some(re) = compile(pattern) {
            self.write().includes.push(re);
        }
    }

    fn add_exclude(&self, pattern: &str) {
        if let Some(re) = compile(pattern) {
            let mut patterns = self.write();
            if !patterns.excludes.iter().any(|e| e.as_str() == re.as_str()) {
                patterns.excludes.push(re);
            }
        }
    }

    fn matches(&self, url: &str) -> bool {
        let patterns = self.read();
        let includes = patterns.effective_includes();
        if !includes.is_empty() && !includes.iter().any(|re| re.is_match(url)) {
            return false;
        }
        !patterns.excludes.iter().any(|re| re.is_match(url))
    }

    fn process_url(&self, url: &str) {
        if !self.scope_to_seeds {
            return;
        }
        if let Some(re) = seed_scope_pattern(url).and_then(|pattern| compile(&pattern)) {
            tracing::debug!("Scoping crawl to {}", unanchor(re.as_str()));
            self.write().seed_includes.push(re);
        }
    }

    fn clear(&self) {
        let mut patterns = self.write();
        patterns.includes.clear();
        patterns.seed_includes.clear();
        patterns.excludes.clear();
    }
}
