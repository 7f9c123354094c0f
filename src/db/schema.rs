//! SQL DDL for the metadata table and for memory collections.
//!
//! A collection named `c` is two tables: `c` (record fields) and `c_vec` (a sqlite-vec `vec0`
//! virtual table holding the 768-dim embeddings keyed by the same id). All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{params, Connection};

use crate::embedding::EMBEDDING_DIM;

/// Schema metadata, created when the database is opened.
const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the metadata table. Idempotent (uses IF NOT EXISTS).
pub fn init_meta(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(META_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

/// Collection names become table names, so only `[a-z0-9_]` is accepted.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name != "schema_meta"
}

/// Name of the vec0 table paired with a collection.
pub fn vec_table(name: &str) -> String {
    format!("{name}_vec")
}

/// Create both tables of a collection. Idempotent. `name` must pass
/// [`is_valid_collection_name`].
pub fn create_collection(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    let vec_table = vec_table(name);
    conn.execute_batch(&format!(
        r#"
CREATE TABLE IF NOT EXISTS {name} (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL CHECK(length(trim(project_id)) > 0),
    text TEXT NOT NULL CHECK(length(trim(text)) > 0),
    captured_at TEXT NOT NULL,
    category TEXT,
    sprint_number TEXT
);

CREATE INDEX IF NOT EXISTS idx_{name}_project ON {name}(project_id, captured_at);
CREATE INDEX IF NOT EXISTS idx_{name}_project_category ON {name}(project_id, category);

CREATE VIRTUAL TABLE IF NOT EXISTS {vec_table} USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[{EMBEDDING_DIM}]
);
"#
    ))
}

/// Whether both tables of a collection exist.
pub fn collection_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
        params![name, vec_table(name)],
        |row| row.get(0),
    )?;
    Ok(count == 2)
}
