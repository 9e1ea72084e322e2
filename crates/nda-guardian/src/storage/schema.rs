//! `SQLite` schema for the audit log.
//!
//! Only metadata is stored: document hashes and clause keys, never the
//! document text, and the questions asked with how they were routed.

/// Documents that have been loaded, one row per distinct content hash.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    clause_keys TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    loaded_at TEXT NOT NULL
)
";

/// One row per answered query.
pub const CREATE_QUERIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    document_hash TEXT,
    query TEXT NOT NULL,
    tool TEXT NOT NULL,
    source TEXT NOT NULL,
    confidence REAL,
    latency_ms REAL NOT NULL,
    words_sent INTEGER NOT NULL DEFAULT 0
)
";

/// Newest-first listing and pruning.
pub const CREATE_QUERY_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_queries_timestamp ON queries(timestamp DESC)
";

/// Per-document history.
pub const CREATE_QUERY_DOCUMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_queries_document ON queries(document_hash)
";

/// Local/cloud breakdowns.
pub const CREATE_QUERY_SOURCE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_queries_source ON queries(source)
";

/// Key-value pairs, including the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DOCUMENTS_TABLE,
    CREATE_QUERIES_TABLE,
    CREATE_QUERY_TIMESTAMP_INDEX,
    CREATE_QUERY_DOCUMENT_INDEX,
    CREATE_QUERY_SOURCE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_documents_table_never_stores_text() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("content_hash TEXT NOT NULL UNIQUE"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("clause_keys TEXT NOT NULL"));
        assert!(!CREATE_DOCUMENTS_TABLE.contains("content TEXT"));
    }

    #[test]
    fn test_queries_table_columns() {
        for column in [
            "timestamp TEXT NOT NULL",
            "document_hash TEXT",
            "tool TEXT NOT NULL",
            "source TEXT NOT NULL",
            "confidence REAL",
            "words_sent INTEGER",
        ] {
            assert!(CREATE_QUERIES_TABLE.contains(column), "missing {column}");
        }
    }
}
