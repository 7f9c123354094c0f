//! Durable collection backed by SQLite and sqlite-vec.
//!
//! Record fields live in a plain table, embeddings in the paired `vec0` table. Similarity is
//! computed with `vec_distance_cosine` over the rows the filter admits, so the project and
//! category predicates are applied before ranking rather than after a global KNN.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::collection::Collection;
use super::embedding_to_bytes;
use super::types::{MemoryFilter, MemoryRecord, ScoredRecord};
use crate::db::schema;
use crate::error::StorageError;

pub struct SqliteCollection {
    db: Arc<Mutex<Connection>>,
    name: String,
    vec_table: String,
    created: AtomicBool,
}

/// Raw column values, converted after the statement finishes.
struct RawRow {
    id: String,
    project_id: String,
    text: String,
    captured_at: String,
    category: Option<String>,
    sprint_number: Option<String>,
    embedding: Vec<u8>,
    score: f64,
}

impl SqliteCollection {
    /// Wrap an open connection. Fails if `name` cannot be used as a table name.
    pub fn new(db: Arc<Mutex<Connection>>, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if !schema::is_valid_collection_name(&name) {
            return Err(StorageError::Corrupt(format!(
                "invalid collection name '{name}': use lowercase letters, digits and '_'"
            )));
        }
        Ok(Self {
            vec_table: schema::vec_table(&name),
            db,
            name,
            created: AtomicBool::new(false),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&db)?;
            f(&mut conn)
        })
        .await?
    }

    fn select_columns(&self) -> String {
        format!(
            "SELECT m.id, m.project_id, m.text, m.captured_at, m.category, m.sprint_number, v.embedding \
             FROM {} m JOIN {} v ON v.id = m.id",
            self.name, self.vec_table
        )
    }
}

fn lock(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    db.lock().map_err(|_| StorageError::LockPoisoned)
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_exists(&self) -> Result<(), StorageError> {
        if self.created.load(Ordering::Acquire) {
            return Ok(());
        }
        let name = self.name.clone();
        let created_now = self
            .with_conn(move |conn| {
                let existed = schema::collection_exists(conn, &name)?;
                if !existed {
                    schema::create_collection(conn, &name)?;
                }
                Ok(!existed)
            })
            .await?;
        if created_now {
            tracing::info!(collection = %self.name, "collection created");
        }
        self.created.store(true, Ordering::Release);
        Ok(())
    }

    async fn upsert(&self, record: MemoryRecord) -> Result<(), StorageError> {
        record.validate()?;
        let name = self.name.clone();
        let vec_table = self.vec_table.clone();
        self.with_conn(move |conn| {
            if !schema::collection_exists(conn, &name)? {
                return Err(StorageError::MissingCollection(name));
            }
            let id = record.id.to_string();
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {name} (id, project_id, text, captured_at, category, sprint_number) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(id) DO UPDATE SET \
                        project_id = excluded.project_id, \
                        text = excluded.text, \
                        captured_at = excluded.captured_at, \
                        category = excluded.category, \
                        sprint_number = excluded.sprint_number"
                ),
                params![
                    id,
                    record.project_id,
                    record.text,
                    format_timestamp(&record.timestamp),
                    record.category,
                    record.sprint_number,
                ],
            )?;
            // vec0 has no upsert
            tx.execute(&format!("DELETE FROM {vec_table} WHERE id = ?1"), params![id])?;
            tx.execute(
                &format!("INSERT INTO {vec_table} (id, embedding) VALUES (?1, ?2)"),
                params![id, embedding_to_bytes(&record.embedding)],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, StorageError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let name = self.name.clone();
        let sql = format!(
            "{}, 1.0 - vec_distance_cosine(v.embedding, ?1) AS score \
             WHERE m.project_id = ?2 AND (?3 IS NULL OR m.category = ?3) \
             ORDER BY score DESC, m.id DESC LIMIT ?4",
            self.select_columns()
        );
        let query = embedding_to_bytes(vector).to_vec();
        let project_id = filter.project_id().to_string();
        let category = filter.category().map(String::from);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = self
            .with_conn(move |conn| {
                if !schema::collection_exists(conn, &name)? {
                    return Ok(vec![]);
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![query, project_id, category, limit], |row| {
                        read_row(row, true)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|raw| {
                let score = raw.score;
                Ok(ScoredRecord {
                    record: raw.into_record()?,
                    score,
                })
            })
            .collect()
    }

    async fn scan(
        &self,
        filter: &MemoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let name = self.name.clone();
        // captured_at is fixed-width UTC, so text order is time order
        let sql = format!(
            "{} WHERE m.project_id = ?1 AND (?2 IS NULL OR m.category = ?2) \
             ORDER BY m.captured_at DESC, m.id DESC LIMIT ?3",
            self.select_columns()
        );
        let project_id = filter.project_id().to_string();
        let category = filter.category().map(String::from);
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = self
            .with_conn(move |conn| {
                if !schema::collection_exists(conn, &name)? {
                    return Ok(vec![]);
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![project_id, category, limit], |row| read_row(row, false))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(RawRow::into_record).collect()
    }
}

fn read_row(row: &Row<'_>, scored: bool) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        text: row.get(2)?,
        captured_at: row.get(3)?,
        category: row.get(4)?,
        sprint_number: row.get(5)?,
        embedding: row.get(6)?,
        score: if scored { row.get(7)? } else { 0.0 },
    })
}

impl RawRow {
    fn into_record(self) -> Result<MemoryRecord, StorageError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StorageError::Corrupt(format!("id '{}': {e}", self.id)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.captured_at)
            .map_err(|e| StorageError::Corrupt(format!("timestamp of {id}: {e}")))?
            .with_timezone(&Utc);
        Ok(MemoryRecord {
            id,
            project_id: self.project_id,
            text: self.text,
            embedding: bytes_to_embedding(&self.embedding),
            timestamp,
            category: self.category,
            sprint_number: self.sprint_number,
        })
    }
}

/// Fixed-width UTC so stored timestamps also sort lexically.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
