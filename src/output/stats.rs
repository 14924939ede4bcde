//! Statistics generation from crawl storage
//!
//! This module provides functionality for extracting and displaying
//! per-session crawl statistics from the queue and result stores.

use crate::service::{DataService, UrlQueueService};
use crate::Result;
use std::collections::HashMap;
use url::Url;

/// Crawl statistics summary for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    pub session_id: String,

    /// Number of stored access results
    pub stored_results: u64,

    /// URLs still waiting in the queue
    pub pending_urls: usize,

    /// Stored results per host (`file` for local files)
    pub results_by_host: HashMap<String, u64>,
}

impl CrawlStatistics {
    pub fn unique_hosts(&self) -> usize {
        self.results_by_host.len()
    }
}

fn host_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => parsed.scheme().to_string(),
        },
        Err(_) => "invalid".to_string(),
    }
}

/// Loads statistics for `session_id`
///
/// # Arguments
///
/// * `session_id` - The session to summarize
/// * `url_queue` - The queue holding the session's pending URLs
/// * `data_service` - The store holding the session's results
pub async fn load_statistics(
    session_id: &str,
    url_queue: &dyn UrlQueueService,
    data_service: &dyn DataService,
) -> Result<CrawlStatistics> {
    let stored_results = data_service.count(session_id).await?;
    let pending_urls = url_queue.len(session_id).await?;

    let mut results_by_host = HashMap::new();
    for url in data_service.urls(session_id).await? {
        *results_by_host.entry(host_key(&url)).or_insert(0) += 1;
    }

    Ok(CrawlStatistics {
        session_id: session_id.to_string(),
        stored_results,
        pending_urls,
        results_by_host,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Session {} ===\n", stats.session_id);

    println!("Overview:");
    println!("  Stored results: {}", stats.stored_results);
    println!("  Pending URLs: {}", stats.pending_urls);
    println!("  Unique hosts: {}", stats.unique_hosts());
    println!();

    if !stats.results_by_host.is_empty() {
        println!("Results by Host:");
        // Sort hosts by count (descending)
        let mut host_counts: Vec<_> = stats.results_by_host.iter().collect();
        host_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (host, count) in host_counts {
            let percentage = if stats.stored_results > 0 {
                (*count as f64 / stats.stored_results as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", host, count, percentage);
        }
        println!();
    }
}
