//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of both the URL queue
//! and the result store. All statements run on one connection behind a
//! mutex, which also makes `poll` and `offer_all` atomic per call.

use super::schema::initialize_schema;
use super::{DataService, StorageError, StorageResult, UrlQueueService};
use crate::entity::{AccessResult, RequestMethod, ResponseStatus, UrlQueueEntry};
use crate::TrawlError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(TrawlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TrawlError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TrawlError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

fn parse_time(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp {}: {}", value, e)))
}

fn parse_optional_time(value: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn parse_method(value: &str) -> StorageResult<RequestMethod> {
    RequestMethod::from_db_string(value)
        .ok_or_else(|| StorageError::Corrupt(format!("bad method {}", value)))
}

/// Raw url_queue row before timestamps are parsed
struct QueueRow {
    session_id: String,
    url: String,
    method: String,
    parent_url: Option<String>,
    depth: u32,
    last_modified: Option<String>,
    meta_data: Option<String>,
    create_time: String,
}

const QUEUE_COLUMNS: &str =
    "session_id, url, method, parent_url, depth, last_modified, meta_data, create_time";

impl QueueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            url: row.get(1)?,
            method: row.get(2)?,
            parent_url: row.get(3)?,
            depth: row.get(4)?,
            last_modified: row.get(5)?,
            meta_data: row.get(6)?,
            create_time: row.get(7)?,
        })
    }

    fn into_entry(self) -> StorageResult<UrlQueueEntry> {
        Ok(UrlQueueEntry {
            session_id: self.session_id,
            url: self.url,
            method: parse_method(&self.method)?,
            parent_url: self.parent_url,
            depth: self.depth,
            last_modified: parse_optional_time(self.last_modified)?,
            meta_data: self.meta_data,
            create_time: parse_time(&self.create_time)?,
        })
    }
}

fn insert_entry(conn: &Connection, session_id: &str, entry: &UrlQueueEntry) -> StorageResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO url_queue
         (session_id, url, method, parent_url, depth, last_modified, meta_data, create_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session_id,
            entry.url,
            entry.method.as_str(),
            entry.parent_url,
            entry.depth,
            entry.last_modified.as_ref().map(format_time),
            entry.meta_data,
            format_time(&entry.create_time),
        ],
    )?;
    Ok(inserted > 0)
}

#[async_trait]
impl UrlQueueService for SqliteStorage {
    async fn add(&self, session_id: &str, url: &str) -> StorageResult<()> {
        let conn = self.conn();
        insert_entry(&conn, session_id, &UrlQueueEntry::seed(session_id, url))?;
        Ok(())
    }

    async fn poll(&self, session_id: &str) -> StorageResult<Option<UrlQueueEntry>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                &format!(
                    "SELECT {}, id FROM url_queue
                     WHERE session_id = ?1 AND polled = 0
                     ORDER BY priority DESC, id ASC LIMIT 1",
                    QUEUE_COLUMNS
                ),
                params![session_id],
                |row| Ok((row.get::<_, i64>(8)?, QueueRow::from_row(row)?)),
            )
            .optional()?;

        let Some((id, row)) = row else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE url_queue SET polled = 1, priority = 0 WHERE id = ?1",
            params![id],
        )?;
        tx.commit()?;

        row.into_entry().map(Some)
    }

    async fn offer_all(
        &self,
        session_id: &str,
        entries: Vec<UrlQueueEntry>,
    ) -> StorageResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut queued = 0;
        for entry in &entries {
            if insert_entry(&tx, session_id, entry)? {
                queued += 1;
            }
        }
        tx.commit()?;
        Ok(queued)
    }

    async fn requeue(&self, entry: UrlQueueEntry) -> StorageResult<()> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE url_queue SET polled = 0, priority = 1 WHERE session_id = ?1 AND url = ?2",
            params![entry.session_id, entry.url],
        )?;
        if updated == 0 {
            insert_entry(&conn, &entry.session_id, &entry)?;
            conn.execute(
                "UPDATE url_queue SET priority = 1 WHERE session_id = ?1 AND url = ?2",
                params![entry.session_id, entry.url],
            )?;
        }
        Ok(())
    }

    async fn visited(&self, entry: &UrlQueueEntry) -> StorageResult<bool> {
        let polled: Option<i64> = self
            .conn()
            .query_row(
                "SELECT polled FROM url_queue WHERE session_id = ?1 AND url = ?2",
                params![entry.session_id, entry.url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(polled == Some(1))
    }

    async fn update_session_id(
        &self,
        old_session_id: &str,
        new_session_id: &str,
    ) -> StorageResult<()> {
        self.conn().execute(
            "UPDATE OR IGNORE url_queue SET session_id = ?1 WHERE session_id = ?2",
            params![new_session_id, old_session_id],
        )?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        self.conn().execute(
            "DELETE FROM url_queue WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    async fn len(&self, session_id: &str) -> StorageResult<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM url_queue WHERE session_id = ?1 AND polled = 0",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

const RESULT_COLUMNS: &str = "session_id, url, parent_url, rule_id, method, http_status_code,
     status, mime_type, content_length, execution_time, last_modified, create_time, title,
     encoding, transformer_name, data";

/// Raw access_results row before enums and timestamps are parsed
struct ResultRow {
    session_id: String,
    url: String,
    parent_url: Option<String>,
    rule_id: Option<String>,
    method: String,
    http_status_code: u16,
    status: String,
    mime_type: Option<String>,
    content_length: i64,
    execution_time: i64,
    last_modified: Option<String>,
    create_time: String,
    title: Option<String>,
    encoding: String,
    transformer_name: String,
    data: Vec<u8>,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            url: row.get(1)?,
            parent_url: row.get(2)?,
            rule_id: row.get(3)?,
            method: row.get(4)?,
            http_status_code: row.get(5)?,
            status: row.get(6)?,
            mime_type: row.get(7)?,
            content_length: row.get(8)?,
            execution_time: row.get(9)?,
            last_modified: row.get(10)?,
            create_time: row.get(11)?,
            title: row.get(12)?,
            encoding: row.get(13)?,
            transformer_name: row.get(14)?,
            data: row.get(15)?,
        })
    }

    fn into_result(self) -> StorageResult<AccessResult> {
        let status = ResponseStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::Corrupt(format!("bad status {}", self.status)))?;
        Ok(AccessResult {
            session_id: self.session_id,
            url: self.url,
            parent_url: self.parent_url,
            rule_id: self.rule_id,
            method: parse_method(&self.method)?,
            http_status_code: self.http_status_code,
            status,
            mime_type: self.mime_type,
            content_length: self.content_length.max(0) as u64,
            execution_time_ms: self.execution_time.max(0) as u64,
            last_modified: parse_optional_time(self.last_modified)?,
            create_time: parse_time(&self.create_time)?,
            title: self.title,
            encoding: self.encoding,
            transformer_name: self.transformer_name,
            data: self.data,
        })
    }
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl DataService for SqliteStorage {
    async fn store(&self, result: AccessResult) -> StorageResult<()> {
        let outcome = self.conn().execute(
            &format!(
                "INSERT INTO access_results ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                RESULT_COLUMNS
            ),
            params![
                result.session_id,
                result.url,
                result.parent_url,
                result.rule_id,
                result.method.as_str(),
                result.http_status_code,
                result.status.as_str(),
                result.mime_type,
                result.content_length as i64,
                result.execution_time_ms as i64,
                result.last_modified.as_ref().map(format_time),
                format_time(&result.create_time),
                result.title,
                result.encoding,
                result.transformer_name,
                result.data,
            ],
        );

        match outcome {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::Duplicate {
                session_id: result.session_id,
                url: result.url,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM access_results WHERE session_id = ?1 AND url = ?2",
                    RESULT_COLUMNS
                ),
                params![session_id, url],
                ResultRow::from_row,
            )
            .optional()?;
        row.map(ResultRow::into_result).transpose()
    }

    async fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM access_results WHERE session_id = ?1 AND url = ?2",
                params![session_id, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn count(&self, session_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM access_results WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn urls(&self, session_id: &str) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT url FROM access_results WHERE session_id = ?1 ORDER BY id")?;
        let urls = stmt
            .query_map(params![session_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    async fn delete(&self, session_id: &str) -> StorageResult<()> {
        self.conn().execute(
            "DELETE FROM access_results WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}

impl SqliteStorage {
    /// Returns all pending queue entries of a session in poll order
    pub fn pending_entries(&self, session_id: &str) -> StorageResult<Vec<UrlQueueEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM url_queue WHERE session_id = ?1 AND polled = 0
             ORDER BY priority DESC, id ASC",
            QUEUE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![session_id], QueueRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(QueueRow::into_entry).collect()
    }

    /// Lists the session ids that have stored results
    pub fn sessions(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT DISTINCT session_id FROM access_results ORDER BY session_id")?;
        let sessions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(sessions)
    }
}
