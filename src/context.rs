//! Shared crawl session state
//!
//! One [`CrawlerContext`] exists per crawl session. Every worker of the
//! session holds an `Arc` to it and mutates its counters concurrently, so all
//! mutable fields are atomics or lock-guarded.

use crate::entity::UrlQueueEntry;
use crate::filter::UrlFilter;
use crate::interval::IntervalController;
use crate::robots::RobotsTxtUrlSet;
use crate::rule::RuleManager;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Default worker pool size
pub const DEFAULT_NUM_OF_THREAD: i32 = 10;

/// Default number of consecutive empty polls a worker tolerates
pub const DEFAULT_MAX_THREAD_CHECK_COUNT: i32 = 20;

/// Lifecycle status of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CrawlerStatus {
    Initializing = 0,
    Running = 1,
    Done = 2,
}

impl CrawlerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Done,
            _ => Self::Initializing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one worker slot within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// State shared by all workers of one crawl session
pub struct CrawlerContext {
    session_id: RwLock<String>,
    status: AtomicU8,
    active_thread_count: AtomicI32,
    access_count: AtomicI64,
    num_of_thread: AtomicI32,
    max_thread_check_count: AtomicI32,
    max_depth: AtomicI32,
    max_access_count: AtomicI64,
    url_filter: RwLock<Option<Arc<dyn UrlFilter>>>,
    rule_manager: RwLock<Option<Arc<dyn RuleManager>>>,
    interval_controller: RwLock<Option<Arc<dyn IntervalController>>>,
    robots_txt_url_set: RobotsTxtUrlSet,
    sitemaps: Mutex<HashMap<WorkerId, Vec<String>>>,
}

impl CrawlerContext {
    /// Creates a context with default limits and no collaborators installed
    pub fn new() -> Self {
        Self {
            session_id: RwLock::new(String::new()),
            status: AtomicU8::new(CrawlerStatus::Initializing as u8),
            active_thread_count: AtomicI32::new(0),
            access_count: AtomicI64::new(0),
            num_of_thread: AtomicI32::new(DEFAULT_NUM_OF_THREAD),
            max_thread_check_count: AtomicI32::new(DEFAULT_MAX_THREAD_CHECK_COUNT),
            max_depth: AtomicI32::new(-1),
            max_access_count: AtomicI64::new(0),
            url_filter: RwLock::new(None),
            rule_manager: RwLock::new(None),
            interval_controller: RwLock::new(None),
            robots_txt_url_set: RobotsTxtUrlSet::new(),
            sitemaps: Mutex::new(HashMap::new()),
        }
    }

    // ===== Session =====

    pub fn session_id(&self) -> String {
        self.session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self
            .session_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session_id.into();
    }

    pub fn status(&self) -> CrawlerStatus {
        CrawlerStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: CrawlerStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    // ===== Counters =====

    pub fn active_thread_count(&self) -> i32 {
        self.active_thread_count.load(Ordering::SeqCst)
    }

    pub fn increment_and_get_active_thread_count(&self) -> i32 {
        self.active_thread_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn decrement_and_get_active_thread_count(&self) -> i32 {
        self.active_thread_count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn access_count(&self) -> i64 {
        self.access_count.load(Ordering::SeqCst)
    }

    pub fn increment_and_get_access_count(&self) -> i64 {
        self.access_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn decrement_and_get_access_count(&self) -> i64 {
        self.access_count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Claims one slot of the session's access budget
    ///
    /// With an unlimited budget this always succeeds and counts the access.
    /// With a budget, the counter is only advanced while it is below
    /// `max_access_count`, so N workers racing for the last slot produce
    /// exactly one winner.
    pub fn try_acquire_access(&self) -> bool {
        let max = self.max_access_count();
        if max <= 0 {
            self.access_count.fetch_add(1, Ordering::SeqCst);
            return true;
        }

        self.access_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < max).then_some(count + 1)
            })
            .is_ok()
    }

    /// Returns true once a bounded access budget has been used up
    pub fn is_access_budget_exhausted(&self) -> bool {
        let max = self.max_access_count();
        max > 0 && self.access_count() >= max
    }

    // ===== Limits =====

    pub fn num_of_thread(&self) -> i32 {
        self.num_of_thread.load(Ordering::SeqCst)
    }

    pub fn set_num_of_thread(&self, value: i32) {
        self.num_of_thread.store(value, Ordering::SeqCst);
    }

    pub fn max_thread_check_count(&self) -> i32 {
        self.max_thread_check_count.load(Ordering::SeqCst)
    }

    pub fn set_max_thread_check_count(&self, value: i32) {
        self.max_thread_check_count.store(value, Ordering::SeqCst);
    }

    /// Maximum link depth from the seeds; negative means unlimited
    pub fn max_depth(&self) -> i32 {
        self.max_depth.load(Ordering::SeqCst)
    }

    pub fn set_max_depth(&self, value: i32) {
        self.max_depth.store(value, Ordering::SeqCst);
    }

    /// Returns true if `depth` exceeds a bounded `max_depth`
    pub fn is_over_depth(&self, depth: u32) -> bool {
        let max = self.max_depth();
        max >= 0 && i64::from(depth) > i64::from(max)
    }

    /// Maximum number of accesses for the session; zero or less is unlimited
    pub fn max_access_count(&self) -> i64 {
        self.max_access_count.load(Ordering::SeqCst)
    }

    pub fn set_max_access_count(&self, value: i64) {
        self.max_access_count.store(value, Ordering::SeqCst);
    }

    // ===== Collaborators =====

    pub fn url_filter(&self) -> Option<Arc<dyn UrlFilter>> {
        self.url_filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_url_filter(&self, filter: Option<Arc<dyn UrlFilter>>) {
        *self
            .url_filter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = filter;
    }

    /// Applies the installed URL filter; URLs pass when no filter is installed
    pub fn matches_url(&self, url: &str) -> bool {
        self.url_filter()
            .map(|filter| filter.matches(url))
            .unwrap_or(true)
    }

    pub fn rule_manager(&self) -> Option<Arc<dyn RuleManager>> {
        self.rule_manager
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_rule_manager(&self, manager: Option<Arc<dyn RuleManager>>) {
        *self
            .rule_manager
            .write()
            .unwrap_or_else(PoisonError::into_inner) = manager;
    }

    pub fn interval_controller(&self) -> Option<Arc<dyn IntervalController>> {
        self.interval_controller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_interval_controller(&self, controller: Option<Arc<dyn IntervalController>>) {
        *self
            .interval_controller
            .write()
            .unwrap_or_else(PoisonError::into_inner) = controller;
    }

    // ===== Robots.txt and sitemaps =====

    /// Origins whose robots.txt has already been fetched in this session
    pub fn robots_txt_url_set(&self) -> &RobotsTxtUrlSet {
        &self.robots_txt_url_set
    }

    /// Replaces the sitemap buffer of `worker`
    pub fn add_sitemaps(&self, worker: WorkerId, sitemaps: Vec<String>) {
        self.sitemaps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(worker, sitemaps);
    }

    /// Takes the sitemap buffer of `worker`, leaving it unset
    ///
    /// Returns `None` if nothing was stored, and `Some` of an empty vector if
    /// an empty list was stored explicitly.
    pub fn remove_sitemaps(&self, worker: WorkerId) -> Option<Vec<String>> {
        self.sitemaps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&worker)
    }
}

impl Default for CrawlerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CrawlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerContext")
            .field("session_id", &self.session_id())
            .field("status", &self.status())
            .field("active_thread_count", &self.active_thread_count())
            .field("access_count", &self.access_count())
            .field("num_of_thread", &self.num_of_thread())
            .field("max_thread_check_count", &self.max_thread_check_count())
            .field("max_depth", &self.max_depth())
            .field("max_access_count", &self.max_access_count())
            .finish()
    }
}

/// The session, worker and queue entry a fetch or process call runs for
///
/// Clients and processors receive this instead of reaching for ambient
/// per-thread state.
#[derive(Debug, Clone, Copy)]
pub struct CrawlScope<'a> {
    pub context: &'a CrawlerContext,
    pub worker: WorkerId,
    pub entry: &'a UrlQueueEntry,
}
