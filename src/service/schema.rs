//! Database schema definitions
//!
//! This module contains the SQL schema for the Sumi-Trawl queue and result
//! store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Pending and handed-out URLs, partitioned by session
CREATE TABLE IF NOT EXISTS url_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    parent_url TEXT,
    depth INTEGER NOT NULL,
    last_modified TEXT,
    meta_data TEXT,
    create_time TEXT NOT NULL,
    -- 0 = pending, 1 = handed out by poll
    polled INTEGER NOT NULL DEFAULT 0,
    -- Requeued entries sort before everything else
    priority INTEGER NOT NULL DEFAULT 0,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_url_queue_poll ON url_queue(session_id, polled, priority, id);

-- Stored access results, one per session and URL
CREATE TABLE IF NOT EXISTS access_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    parent_url TEXT,
    rule_id TEXT,
    method TEXT NOT NULL,
    http_status_code INTEGER NOT NULL,
    status TEXT NOT NULL,
    mime_type TEXT,
    content_length INTEGER NOT NULL,
    execution_time INTEGER NOT NULL,
    last_modified TEXT,
    create_time TEXT NOT NULL,
    title TEXT,
    encoding TEXT NOT NULL,
    transformer_name TEXT NOT NULL,
    data BLOB NOT NULL,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_access_results_session ON access_results(session_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
