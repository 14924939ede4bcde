//! Availability signal of the process hosting the crawler
//!
//! Workers poll [`CrawlerContainer::available`] on every loop iteration and
//! exit cleanly once it reports false.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait CrawlerContainer: Send + Sync {
    fn available(&self) -> bool;
}

/// A [`CrawlerContainer`] that stays available until [`shutdown`] is called
///
/// [`shutdown`]: ContainerSignal::shutdown
#[derive(Debug)]
pub struct ContainerSignal {
    available: AtomicBool,
}

impl ContainerSignal {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    pub fn shutdown(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            tracing::info!("Container shutting down");
        }
    }
}

impl Default for ContainerSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerContainer for ContainerSignal {
    fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
