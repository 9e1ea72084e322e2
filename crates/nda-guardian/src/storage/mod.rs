//! Audit log for loaded documents and answered queries.
//!
//! Backed by `SQLite`. Documents are recorded by content hash and clause keys
//! only; the agreement text itself is never written to disk.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::routing::RouteSource;

/// One answered query, as stored in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    /// Row ID, set once stored.
    pub id: Option<i64>,
    /// When the query finished.
    pub timestamp: DateTime<Utc>,
    /// Hash of the document the query ran against.
    pub document_hash: Option<String>,
    /// The question as asked.
    pub query: String,
    /// Tool that answered, or `none`.
    pub tool: String,
    /// Routing decision.
    pub source: RouteSource,
    /// Reported confidence.
    pub confidence: Option<f64>,
    /// End-to-end latency.
    pub latency_ms: f64,
    /// Words of anonymized text sent to the cloud.
    pub words_sent: u64,
}

impl QueryRecord {
    /// A record stamped with the current time.
    #[must_use]
    pub fn new(query: impl Into<String>, tool: impl Into<String>, source: RouteSource) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            document_hash: None,
            query: query.into(),
            tool: tool.into(),
            source,
            confidence: None,
            latency_ms: 0.0,
            words_sent: 0,
        }
    }
}

/// Audit storage engine.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create an audit database at the given path.
    ///
    /// Creates parent directories as needed and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening audit database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Audit database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a loaded document.
    ///
    /// Returns the new row ID, or `None` if a document with the same content
    /// hash was already recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_document(&self, document: &Document) -> Result<Option<i64>> {
        let hash = document.content_hash();
        if self.document_exists(hash)? {
            debug!(
                hash = &hash[..hash.len().min(16)],
                "Document already recorded"
            );
            return Ok(None);
        }

        let clause_keys = document
            .keys()
            .iter()
            .map(|k| k.as_str().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let word_count = i64::try_from(document.word_count()).unwrap_or(i64::MAX);

        self.conn.execute(
            r"
            INSERT INTO documents (content_hash, clause_keys, word_count, loaded_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![hash, clause_keys, word_count, Utc::now().to_rfc3339()],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded document with id {}", id);
        Ok(Some(id))
    }

    fn document_exists(&self, hash: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE content_hash = ?1",
            [hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Append a query to the log. Returns the row ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_query(&self, record: &QueryRecord) -> Result<i64> {
        let words_sent = i64::try_from(record.words_sent).unwrap_or(i64::MAX);
        self.conn.execute(
            r"
            INSERT INTO queries
                (timestamp, document_hash, query, tool, source, confidence, latency_ms, words_sent)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                record.timestamp.to_rfc3339(),
                record.document_hash,
                record.query,
                record.tool,
                record.source.as_str(),
                record.confidence,
                record.latency_ms,
                words_sent,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The most recent queries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_queries(&self, limit: usize) -> Result<Vec<QueryRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, timestamp, document_hash, query, tool, source, confidence,
                   latency_ms, words_sent
            FROM queries ORDER BY timestamp DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map([limit_i64], Self::row_to_query)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count logged queries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete queries and documents older than `max_age`.
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_older_than(&self, max_age: Duration) -> Result<usize> {
        let cutoff = (Utc::now() - max_age).to_rfc3339();

        let queries = self
            .conn
            .execute("DELETE FROM queries WHERE timestamp < ?1", [&cutoff])?;
        let documents = self
            .conn
            .execute("DELETE FROM documents WHERE loaded_at < ?1", [&cutoff])?;

        let affected = queries + documents;
        if affected > 0 {
            info!(queries, documents, "Pruned old audit entries");
        }
        Ok(affected)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_documents: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let total_queries = self.count()?;

        let local_labels = RouteSource::ALL
            .iter()
            .filter(|s| s.is_local())
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let (cloud_queries, total_words_sent): (i64, i64) = self.conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(source NOT IN ({local_labels}) OR words_sent > 0), 0), \
                 COALESCE(SUM(words_sent), 0) FROM queries"
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM queries ORDER BY timestamp ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT timestamp FROM queries ORDER BY timestamp DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_documents,
            total_queries,
            cloud_queries,
            total_words_sent,
            oldest_query: oldest.as_deref().and_then(parse_timestamp),
            newest_query: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    fn row_to_query(row: &rusqlite::Row) -> rusqlite::Result<QueryRecord> {
        let timestamp_str: String = row.get(1)?;
        let source_str: String = row.get(5)?;
        let words_sent: i64 = row.get(8)?;

        let source = RouteSource::parse(&source_str).unwrap_or_else(|| {
            warn!("Unknown route source: {}, defaulting to on-device", source_str);
            RouteSource::OnDevice
        });

        Ok(QueryRecord {
            id: Some(row.get(0)?),
            timestamp: parse_timestamp(&timestamp_str).unwrap_or_else(Utc::now),
            document_hash: row.get(2)?,
            query: row.get(3)?,
            tool: row.get(4)?,
            source,
            confidence: row.get(6)?,
            latency_ms: row.get(7)?,
            words_sent: u64::try_from(words_sent).unwrap_or(0),
        })
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Distinct documents recorded.
    pub total_documents: i64,
    /// Queries logged.
    pub total_queries: i64,
    /// Queries routed to the cloud or that sent it a summary.
    pub cloud_queries: i64,
    /// Words sent to the cloud across all queries.
    pub total_words_sent: i64,
    /// Timestamp of the oldest query.
    pub oldest_query: Option<DateTime<Utc>>,
    /// Timestamp of the newest query.
    pub newest_query: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseKey;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn query(text: &str, source: RouteSource, words_sent: u64) -> QueryRecord {
        QueryRecord {
            document_hash: Some("abc123".to_string()),
            confidence: Some(0.87),
            latency_ms: 12.5,
            words_sent,
            ..QueryRecord::new(text, "get_clause_info", source)
        }
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path(), Path::new(":memory:"));
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_record_document_deduplicates() {
        let storage = create_test_storage();
        let doc = Document::sample();

        let first = storage.record_document(&doc).unwrap();
        let second = storage.record_document(&doc).unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(storage.stats().unwrap().total_documents, 1);
    }

    #[test]
    fn test_record_document_stores_keys_not_text() {
        let storage = create_test_storage();
        let doc = Document::from_clauses([
            (ClauseKey::Term, "Two years from signing."),
            (ClauseKey::NonCompete, "No competing for one year."),
        ]);
        storage.record_document(&doc).unwrap();

        let (keys, words): (String, i64) = storage
            .conn
            .query_row(
                "SELECT clause_keys, word_count FROM documents",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(keys, "term,non_compete");
        assert_eq!(words, 9);
    }

    #[test]
    fn test_record_and_list_queries() {
        let storage = create_test_storage();
        let mut older = query("first", RouteSource::OnDevice, 0);
        older.timestamp = Utc::now() - Duration::minutes(5);
        storage.record_query(&older).unwrap();
        storage
            .record_query(&query("second", RouteSource::CloudLegalKnowledge, 40))
            .unwrap();

        let recent = storage.recent_queries(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "second");
        assert_eq!(recent[0].source, RouteSource::CloudLegalKnowledge);
        assert_eq!(recent[0].words_sent, 40);
        assert_eq!(recent[1].query, "first");
        assert_eq!(recent[1].confidence, Some(0.87));
        assert!(recent[1].id.is_some());
    }

    #[test]
    fn test_recent_queries_limit() {
        let storage = create_test_storage();
        for i in 0..5 {
            storage
                .record_query(&query(&format!("q{i}"), RouteSource::OnDevice, 0))
                .unwrap();
        }
        assert_eq!(storage.recent_queries(3).unwrap().len(), 3);
        assert_eq!(storage.count().unwrap(), 5);
    }

    #[test]
    fn test_stats_counts_cloud_queries() {
        let storage = create_test_storage();
        storage
            .record_query(&query("a", RouteSource::OnDevice, 0))
            .unwrap();
        storage
            .record_query(&query("b", RouteSource::CloudUnavailable, 0))
            .unwrap();
        storage
            .record_query(&query("c", RouteSource::CloudLegalKnowledge, 42))
            .unwrap();
        storage
            .record_query(&query("d", RouteSource::CloudLowConfidence, 8))
            .unwrap();
        // Elaboration after a failed cloud tool selection.
        storage
            .record_query(&query("e", RouteSource::CloudUnavailable, 5))
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_queries, 5);
        assert_eq!(stats.cloud_queries, 3);
        assert_eq!(stats.total_words_sent, 55);
        assert!(stats.oldest_query.is_some());
        assert!(stats.newest_query.is_some());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_empty() {
        let stats = create_test_storage().stats().unwrap();
        assert_eq!(stats.total_queries, 0);
        assert_eq!(stats.total_words_sent, 0);
        assert!(stats.oldest_query.is_none());
    }

    #[test]
    fn test_prune_older_than() {
        let storage = create_test_storage();
        let mut old = query("old", RouteSource::OnDevice, 0);
        old.timestamp = Utc::now() - Duration::days(45);
        storage.record_query(&old).unwrap();
        storage
            .record_query(&query("new", RouteSource::OnDevice, 0))
            .unwrap();

        let deleted = storage.prune_older_than(Duration::days(30)).unwrap();
        assert_eq!(deleted, 1);

        let remaining = storage.recent_queries(10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].query, "new");
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.db");

        let storage = Storage::open(&path).unwrap();
        storage
            .record_query(&query("persisted", RouteSource::OnDevice, 0))
            .unwrap();
        drop(storage);

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert!(reopened.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_unknown_source_defaults() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO queries (timestamp, query, tool, source, latency_ms) \
                 VALUES (?1, 'q', 'none', 'elsewhere', 1.0)",
                [Utc::now().to_rfc3339()],
            )
            .unwrap();
        let recent = storage.recent_queries(1).unwrap();
        assert_eq!(recent[0].source, RouteSource::OnDevice);
        assert!(recent[0].document_hash.is_none());
    }
}
