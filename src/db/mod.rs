pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the projmem database at the given path, with sqlite-vec loaded and the
/// metadata schema migrated. Collections are created lazily by
/// [`SqliteCollection`](crate::memory::sqlite::SqliteCollection).
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    init(&mut conn)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a private in-memory database, initialized the same way as [`open_database`].
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&mut conn)?;
    Ok(conn)
}

fn init(conn: &mut Connection) -> Result<()> {
    schema::init_meta(conn).context("failed to initialize schema")?;
    migrations::run_migrations(conn).context("failed to run migrations")?;
    Ok(())
}

/// Compare the configured embedding model against the one recorded in the database.
///
/// Records `model` when nothing is stored yet. A mismatch is logged, not rejected: vectors
/// from different models are not comparable, so recall quality silently degrades.
pub fn check_embedding_model(conn: &Connection, model: &str) -> Result<()> {
    match migrations::get_embedding_model(conn)? {
        None => {
            migrations::set_embedding_model(conn, model)?;
            tracing::debug!(model, "recorded embedding model");
        }
        Some(stored) if stored != model => {
            tracing::warn!(
                stored = %stored,
                configured = model,
                "embedding model differs from the one stored vectors were built with"
            );
        }
        Some(_) => {}
    }
    Ok(())
}

/// Result of [`check_database_health`].
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<usize>,
    pub collection_present: bool,
    pub record_count: u64,
    pub project_count: u64,
}

impl HealthReport {
    /// Healthy when the integrity check passes and the schema is current.
    pub fn is_healthy(&self) -> bool {
        self.integrity_ok && self.schema_version == migrations::CURRENT_SCHEMA_VERSION
    }
}

/// Run `PRAGMA integrity_check` and gather schema and collection facts.
pub fn check_database_health(conn: &Connection, collection: &str) -> Result<HealthReport> {
    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let lines: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<_>>()?;
    let integrity_ok = lines.len() == 1 && lines[0] == "ok";
    let integrity_details = lines.join("; ");

    let schema_version = migrations::get_schema_version(conn)?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let embedding_model = migrations::get_embedding_model(conn)?;
    let embedding_dim = migrations::get_embedding_dim(conn)?;

    let collection_present = schema::is_valid_collection_name(collection)
        && schema::collection_exists(conn, collection)?;
    let (record_count, project_count) = if collection_present {
        conn.query_row(
            &format!("SELECT COUNT(*), COUNT(DISTINCT project_id) FROM {collection}"),
            [],
            |r| Ok((r.get::<_, i64>(0)? as u64, r.get::<_, i64>(1)? as u64)),
        )?
    } else {
        (0, 0)
    };

    Ok(HealthReport {
        integrity_ok,
        integrity_details,
        schema_version,
        sqlite_vec_version,
        embedding_model,
        embedding_dim,
        collection_present,
        record_count,
        project_count,
    })
}
