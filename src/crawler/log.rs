//! Typed crawl events rendered through `tracing`
//!
//! Workers report what happens to each URL through [`log_event`] so that the
//! message wording and level of every event lives in one place.

use crate::context::WorkerId;
use crate::TrawlError;

/// Something a worker observed while crawling
#[derive(Debug)]
pub enum LogEvent<'a> {
    StartThread {
        worker: WorkerId,
        session_id: &'a str,
    },
    FinishedThread {
        worker: WorkerId,
        session_id: &'a str,
    },
    StartCrawling {
        worker: WorkerId,
        url: &'a str,
        depth: u32,
    },
    FinishedCrawling {
        worker: WorkerId,
        url: &'a str,
    },
    NoUrlInQueue {
        worker: WorkerId,
        empty_polls: i32,
    },
    UnsupportedUrl {
        url: &'a str,
    },
    CheckLastModified {
        url: &'a str,
    },
    NotModified {
        url: &'a str,
    },
    RedirectLocation {
        url: &'a str,
        location: &'a str,
    },
    ChildUrls {
        url: &'a str,
        offered: usize,
        queued: usize,
    },
    NoRule {
        url: &'a str,
    },
    NoResponseProcessor {
        url: &'a str,
        rule_id: &'a str,
    },
    AccessBudgetExhausted {
        worker: WorkerId,
        url: &'a str,
    },
    CrawlingAccessFailed {
        url: &'a str,
        error: &'a TrawlError,
    },
    CrawlingFailed {
        url: &'a str,
        error: &'a TrawlError,
    },
    CrawlingPanicked {
        url: &'a str,
        message: &'a str,
    },
    QueueFailed {
        worker: WorkerId,
        error: &'a TrawlError,
    },
}

/// Emits `event` at the level appropriate for it
pub fn log_event(event: LogEvent<'_>) {
    match event {
        LogEvent::StartThread { worker, session_id } => {
            tracing::debug!("{} started for session {}", worker, session_id)
        }
        LogEvent::FinishedThread { worker, session_id } => {
            tracing::debug!("{} finished for session {}", worker, session_id)
        }
        LogEvent::StartCrawling { worker, url, depth } => {
            tracing::info!("Crawling {} (depth {}, {})", url, depth, worker)
        }
        LogEvent::FinishedCrawling { worker, url } => {
            tracing::debug!("Finished {} ({})", url, worker)
        }
        LogEvent::NoUrlInQueue {
            worker,
            empty_polls,
        } => tracing::debug!("No URL in queue ({}, empty polls: {})", worker, empty_polls),
        LogEvent::UnsupportedUrl { url } => {
            tracing::warn!("No client is registered for {}", url)
        }
        LogEvent::CheckLastModified { url } => {
            tracing::debug!("Checking Last-Modified of {}", url)
        }
        LogEvent::NotModified { url } => tracing::info!("Not modified: {}", url),
        LogEvent::RedirectLocation { url, location } => {
            tracing::debug!("{} redirects to {}", url, location)
        }
        LogEvent::ChildUrls {
            url,
            offered,
            queued,
        } => tracing::debug!("{}: queued {} of {} child URLs", url, queued, offered),
        LogEvent::NoRule { url } => tracing::debug!("No rule matched {}", url),
        LogEvent::NoResponseProcessor { url, rule_id } => {
            tracing::warn!("Rule {} has no processor for {}", rule_id, url)
        }
        LogEvent::AccessBudgetExhausted { worker, url } => tracing::info!(
            "Access budget exhausted, returning {} to the queue ({})",
            url,
            worker
        ),
        LogEvent::CrawlingAccessFailed { url, error } => {
            tracing::warn!("Failed to access {}: {}", url, error)
        }
        LogEvent::CrawlingFailed { url, error } => {
            tracing::error!("Crawling failed for {}: {}", url, error)
        }
        LogEvent::CrawlingPanicked { url, message } => {
            tracing::error!("Crawling panicked for {}: {}", url, message)
        }
        LogEvent::QueueFailed { worker, error } => {
            tracing::error!("URL queue error in {}: {}", worker, error)
        }
    }
}

/// Picks the event for a failed cycle
///
/// Transport and robots.txt refusals are access failures; anything else is
/// an unexpected crawling failure.
pub(crate) fn failure_event<'a>(url: &'a str, error: &'a TrawlError) -> LogEvent<'a> {
    match error {
        TrawlError::Http { .. } | TrawlError::Timeout { .. } | TrawlError::RobotsDenied { .. } => {
            LogEvent::CrawlingAccessFailed { url, error }
        }
        _ => LogEvent::CrawlingFailed { url, error },
    }
}
