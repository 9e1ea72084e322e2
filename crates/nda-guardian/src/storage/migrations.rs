//! Schema versioning for the audit database.
//!
//! The tables are created idempotently from `SCHEMA_STATEMENTS`. The version
//! stamped in `metadata` only guards against opening a log written by a newer
//! build, whose rows this one might misread.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The schema version this build reads and writes.
pub const CURRENT_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

/// Create missing tables and indexes and stamp the schema version.
///
/// # Errors
///
/// Returns an error if a statement fails, the stored version is unreadable,
/// or the database was written by a newer schema.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    match stored_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
                (VERSION_KEY, CURRENT_VERSION.to_string()),
            )?;
            Ok(())
        }
        Some(version) if version > CURRENT_VERSION => Err(Error::DatabaseMigration {
            message: format!(
                "audit database uses schema v{version}, this build supports up to v{CURRENT_VERSION}"
            ),
        }),
        Some(_) => Ok(()),
    }
}

fn stored_version(conn: &Connection) -> Result<Option<i32>> {
    let value = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    value
        .map(|v| {
            v.parse().map_err(|_| Error::DatabaseMigration {
                message: format!("invalid schema version: {v}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to create in-memory database");
        initialize_schema(&conn).expect("failed to initialize schema");
        conn
    }

    fn set_version(conn: &Connection, value: &str) {
        conn.execute(
            "UPDATE metadata SET value = ?2 WHERE key = ?1",
            [VERSION_KEY, value],
        )
        .unwrap();
    }

    #[test]
    fn test_initialize_creates_tables_and_indexes() {
        let conn = initialized();

        for table in ["documents", "queries", "metadata"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='queries'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();
        for column in ["timestamp", "document", "source"] {
            assert!(indexes.iter().any(|n| n.contains(column)), "{indexes:?}");
        }
    }

    #[test]
    fn test_initialize_stamps_version_once() {
        let conn = initialized();
        initialize_schema(&conn).expect("second init failed");

        assert_eq!(stored_version(&conn).unwrap(), Some(CURRENT_VERSION));
        let rows: i32 = conn
            .query_row("SELECT COUNT(*) FROM metadata", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = initialized();
        set_version(&conn, "7");

        let err = initialize_schema(&conn).unwrap_err();
        assert!(matches!(err, Error::DatabaseMigration { .. }));
        assert!(err.to_string().contains("schema v7"));
    }

    #[test]
    fn test_invalid_stored_version() {
        let conn = initialized();
        set_version(&conn, "abc");

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version: abc"));
    }
}
