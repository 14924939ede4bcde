//! In-memory queue and result store

use super::{DataService, StorageError, StorageResult, UrlQueueService};
use crate::entity::{AccessResult, UrlQueueEntry};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct SessionQueue {
    pending: VecDeque<UrlQueueEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl SessionQueue {
    fn offer(&mut self, entry: UrlQueueEntry) -> bool {
        if self.queued.contains(&entry.url) || self.visited.contains(&entry.url) {
            return false;
        }
        self.queued.insert(entry.url.clone());
        self.pending.push_back(entry);
        true
    }
}

/// [`UrlQueueService`] backed by per-session FIFO queues
#[derive(Default)]
pub struct MemoryUrlQueueService {
    sessions: Mutex<HashMap<String, SessionQueue>>,
}

impl MemoryUrlQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionQueue>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UrlQueueService for MemoryUrlQueueService {
    async fn add(&self, session_id: &str, url: &str) -> StorageResult<()> {
        self.sessions()
            .entry(session_id.to_string())
            .or_default()
            .offer(UrlQueueEntry::seed(session_id, url));
        Ok(())
    }

    async fn poll(&self, session_id: &str) -> StorageResult<Option<UrlQueueEntry>> {
        let mut sessions = self.sessions();
        let Some(queue) = sessions.get_mut(session_id) else {
            return Ok(None);
        };
        let entry = queue.pending.pop_front();
        if let Some(entry) = &entry {
            queue.queued.remove(&entry.url);
            queue.visited.insert(entry.url.clone());
        }
        Ok(entry)
    }

    async fn offer_all(
        &self,
        session_id: &str,
        entries: Vec<UrlQueueEntry>,
    ) -> StorageResult<usize> {
        let mut sessions = self.sessions();
        let queue = sessions.entry(session_id.to_string()).or_default();
        Ok(entries
            .into_iter()
            .map(|mut entry| {
                entry.session_id = session_id.to_string();
                queue.offer(entry)
            })
            .filter(|queued| *queued)
            .count())
    }

    async fn requeue(&self, entry: UrlQueueEntry) -> StorageResult<()> {
        let mut sessions = self.sessions();
        let queue = sessions.entry(entry.session_id.clone()).or_default();
        queue.visited.remove(&entry.url);
        if queue.queued.insert(entry.url.clone()) {
            queue.pending.push_front(entry);
        }
        Ok(())
    }

    async fn visited(&self, entry: &UrlQueueEntry) -> StorageResult<bool> {
        Ok(self
            .sessions()
            .get(&entry.session_id)
            .map(|queue| queue.visited.contains(&entry.url))
            .unwrap_or(false))
    }

    async fn update_session_id(
        &self,
        old_session_id: &str,
        new_session_id: &str,
    ) -> StorageResult<()> {
        let mut sessions = self.sessions();
        if let Some(mut queue) = sessions.remove(old_session_id) {
            for entry in queue.pending.iter_mut() {
                entry.session_id = new_session_id.to_string();
            }
            sessions.insert(new_session_id.to_string(), queue);
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        self.sessions().remove(session_id);
        Ok(())
    }

    async fn len(&self, session_id: &str) -> StorageResult<usize> {
        Ok(self
            .sessions()
            .get(session_id)
            .map(|queue| queue.pending.len())
            .unwrap_or(0))
    }
}

/// [`DataService`] backed by per-session ordered maps
#[derive(Default)]
pub struct MemoryDataService {
    results: Mutex<HashMap<String, Vec<AccessResult>>>,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    fn results(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<AccessResult>>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn store(&self, result: AccessResult) -> StorageResult<()> {
        let mut results = self.results();
        let session = results.entry(result.session_id.clone()).or_default();
        if session.iter().any(|stored| stored.url == result.url) {
            return Err(StorageError::Duplicate {
                session_id: result.session_id,
                url: result.url,
            });
        }
        session.push(result);
        Ok(())
    }

    async fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>> {
        Ok(self
            .results()
            .get(session_id)
            .and_then(|session| session.iter().find(|stored| stored.url == url).cloned()))
    }

    async fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool> {
        Ok(self
            .results()
            .get(session_id)
            .map(|session| session.iter().any(|stored| stored.url == url))
            .unwrap_or(false))
    }

    async fn count(&self, session_id: &str) -> StorageResult<u64> {
        Ok(self
            .results()
            .get(session_id)
            .map(|session| session.len() as u64)
            .unwrap_or(0))
    }

    async fn urls(&self, session_id: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .results()
            .get(session_id)
            .map(|session| session.iter().map(|stored| stored.url.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        self.results().remove(session_id);
        Ok(())
    }
}
