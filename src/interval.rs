//! Politeness intervals
//!
//! Workers call [`IntervalController::delay`] at fixed points of their loop.
//! The controller decides how long to wait for each reason; the default
//! implementation uses one fixed delay per reason.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Why a worker is asking to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalReason {
    /// Before fetching a URL
    BeforeProcessing,
    /// After a fetch cycle completed
    AfterProcessing,
    /// The queue poll returned nothing
    NoUrlInQueue,
    /// At the end of every loop iteration, before polling again
    WaitingNewUrl,
}

/// Strategy that blocks a worker for a reason-dependent delay
#[async_trait]
pub trait IntervalController: Send + Sync {
    async fn delay(&self, reason: IntervalReason);
}

/// Delay settings for [`DefaultIntervalController`], in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IntervalConfig {
    pub delay_millis_before_processing: u64,
    pub delay_millis_after_processing: u64,
    pub delay_millis_at_no_url_in_queue: u64,
    pub delay_millis_for_waiting_new_url: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            delay_millis_before_processing: 0,
            delay_millis_after_processing: 0,
            delay_millis_at_no_url_in_queue: 500,
            delay_millis_for_waiting_new_url: 1000,
        }
    }
}

impl IntervalConfig {
    /// All four delays set to zero
    pub fn no_wait() -> Self {
        Self {
            delay_millis_before_processing: 0,
            delay_millis_after_processing: 0,
            delay_millis_at_no_url_in_queue: 0,
            delay_millis_for_waiting_new_url: 0,
        }
    }
}

/// Fixed-delay [`IntervalController`]
///
/// Delays can be adjusted while a session runs.
#[derive(Debug)]
pub struct DefaultIntervalController {
    before_processing: AtomicU64,
    after_processing: AtomicU64,
    no_url_in_queue: AtomicU64,
    waiting_new_url: AtomicU64,
}

impl DefaultIntervalController {
    pub fn new() -> Self {
        Self::from_config(&IntervalConfig::default())
    }

    pub fn from_config(config: &IntervalConfig) -> Self {
        Self {
            before_processing: AtomicU64::new(config.delay_millis_before_processing),
            after_processing: AtomicU64::new(config.delay_millis_after_processing),
            no_url_in_queue: AtomicU64::new(config.delay_millis_at_no_url_in_queue),
            waiting_new_url: AtomicU64::new(config.delay_millis_for_waiting_new_url),
        }
    }

    fn slot(&self, reason: IntervalReason) -> &AtomicU64 {
        match reason {
            IntervalReason::BeforeProcessing => &self.before_processing,
            IntervalReason::AfterProcessing => &self.after_processing,
            IntervalReason::NoUrlInQueue => &self.no_url_in_queue,
            IntervalReason::WaitingNewUrl => &self.waiting_new_url,
        }
    }

    /// Returns the configured delay for `reason`
    pub fn delay_millis(&self, reason: IntervalReason) -> u64 {
        self.slot(reason).load(Ordering::Relaxed)
    }

    pub fn set_delay_millis(&self, reason: IntervalReason, millis: u64) {
        self.slot(reason).store(millis, Ordering::Relaxed);
    }
}

impl Default for DefaultIntervalController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntervalController for DefaultIntervalController {
    async fn delay(&self, reason: IntervalReason) {
        let millis = self.delay_millis(reason);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}
