//! SQLite schema for the co-occurrence store.

use rusqlite::{Connection, OptionalExtension};

use crate::errors::{MatchError, MatchResult};

/// Layout version written into `store_meta`. A store written with any other
/// version is refused rather than read with the wrong layout.
pub const SCHEMA_VERSION: i32 = 1;

/// DDL statements, safe to replay on an initialised database.
///
/// Pairs are stored once with `low < high`; neighbor lookups query both
/// columns, so each matrix carries an index per direction.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS repo_matrix (
        low INTEGER NOT NULL,
        high INTEGER NOT NULL,
        val INTEGER NOT NULL,
        PRIMARY KEY(low, high)
    );",
    "CREATE TABLE IF NOT EXISTS user_matrix (
        low INTEGER NOT NULL,
        high INTEGER NOT NULL,
        val INTEGER NOT NULL,
        PRIMARY KEY(low, high)
    );",
    "CREATE INDEX IF NOT EXISTS idx_repo_matrix_low ON repo_matrix(low, val DESC);",
    "CREATE INDEX IF NOT EXISTS idx_repo_matrix_high ON repo_matrix(high, val DESC);",
    "CREATE INDEX IF NOT EXISTS idx_user_matrix_low ON user_matrix(low, val DESC);",
    "CREATE INDEX IF NOT EXISTS idx_user_matrix_high ON user_matrix(high, val DESC);",
];

/// Create missing tables, then stamp a fresh store with [`SCHEMA_VERSION`]
/// or verify the version of an existing one.
pub fn init_schema(conn: &Connection) -> MatchResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    match get_schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO store_meta(key, value) VALUES('schema_version', ?1);",
                [SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
        Some(SCHEMA_VERSION) => Ok(()),
        Some(other) => Err(MatchError::Store(format!(
            "store has schema version {other}, expected {SCHEMA_VERSION}"
        ))),
    }
}

/// The stamped version, or `None` for a store that was never initialised.
pub fn get_schema_version(conn: &Connection) -> MatchResult<Option<i32>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<i32>()
            .map_err(|_| MatchError::Store(format!("unreadable schema version {v:?}")))
    })
    .transpose()
}
