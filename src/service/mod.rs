//! Persistence contracts for the URL queue and crawl results
//!
//! This module defines the two services the crawl engine talks to:
//! - [`UrlQueueService`]: the session-partitioned queue of pending URLs
//! - [`DataService`]: the session-partitioned store of access results
//!
//! Two backends are provided: in-memory maps for tests and embedding, and a
//! SQLite database that implements both services on one connection.

mod memory;
mod schema;
mod sqlite;

pub use memory::{MemoryDataService, MemoryUrlQueueService};
pub use sqlite::SqliteStorage;

use crate::entity::{AccessResult, UrlQueueEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Access result already stored for {url} in session {session_id}")]
    Duplicate { session_id: String, url: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Session-partitioned queue of URLs waiting to be crawled
///
/// Implementations must hand each entry to at most one concurrent `poll`
/// caller and make an `offer_all` batch visible all at once. A URL that is
/// already queued, or was already handed out by `poll`, is not queued again
/// for the same session.
#[async_trait]
pub trait UrlQueueService: Send + Sync {
    /// Queues a seed URL at depth 0
    async fn add(&self, session_id: &str, url: &str) -> StorageResult<()>;

    /// Removes and returns the oldest pending entry
    async fn poll(&self, session_id: &str) -> StorageResult<Option<UrlQueueEntry>>;

    /// Queues a batch of entries, skipping known URLs
    ///
    /// # Returns
    ///
    /// The number of entries actually queued
    async fn offer_all(&self, session_id: &str, entries: Vec<UrlQueueEntry>)
        -> StorageResult<usize>;

    /// Puts a polled entry back at the head of its session queue
    async fn requeue(&self, entry: UrlQueueEntry) -> StorageResult<()>;

    /// Returns true if the entry's URL has already been handed out by `poll`
    async fn visited(&self, entry: &UrlQueueEntry) -> StorageResult<bool>;

    /// Moves all entries of `old_session_id` to `new_session_id`
    async fn update_session_id(&self, old_session_id: &str, new_session_id: &str)
        -> StorageResult<()>;

    /// Drops the whole queue partition of a session
    async fn delete(&self, session_id: &str) -> StorageResult<()>;

    /// Number of pending entries of a session
    async fn len(&self, session_id: &str) -> StorageResult<usize>;
}

/// Session-partitioned store of access results
#[async_trait]
pub trait DataService: Send + Sync {
    /// Stores a result
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if the session already has a
    /// result for the URL.
    async fn store(&self, result: AccessResult) -> StorageResult<()>;

    async fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>>;

    async fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool>;

    async fn count(&self, session_id: &str) -> StorageResult<u64>;

    /// All stored URLs of a session in storage order
    async fn urls(&self, session_id: &str) -> StorageResult<Vec<String>>;

    /// Drops all results of a session
    async fn delete(&self, session_id: &str) -> StorageResult<()>;
}
