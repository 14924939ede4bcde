//! Output module for reporting on stored crawl sessions
//!
//! This module handles:
//! - Summarizing what a session stored and what is still queued
//! - Printing those summaries for the command line

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
