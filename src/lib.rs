//! Project memory for AI assistants: save facts about a project, recall them by meaning, and
//! read them back in chronological order.
//!
//! Every record belongs to exactly one project and carries a 768-dimensional embedding of its
//! text. Three operations make up the retrieval layer, all on [`memory::MemoryEngine`]:
//!
//! | Operation | Input | Output |
//! |-----------|-------|--------|
//! | `save` | project, text, optional category and sprint | new record id |
//! | `recall_by_similarity` | project, query, limit, minimum score | records, most similar first |
//! | `get_history` | project, optional category, count | records, newest first |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec) for cosine
//!   scoring, or an in-memory collection
//! - **Embeddings**: Local ONNX Runtime with all-mpnet-base-v2, the Gemini embedding API, or a
//!   deterministic hashing provider
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: The [`embedding::EmbeddingProvider`] trait and its implementations
//! - [`error`]: Validation, provider and storage error types
//! - [`memory`]: Records, filters, collections and the engine

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use config::ProjmemConfig;
use embedding::EmbeddingProvider;
use memory::{Collection, InMemoryCollection, MemoryEngine, SqliteCollection};

/// Build an engine from configuration: the embedding provider plus the configured backend.
///
/// For the SQLite backend this opens (and migrates) the database and records or checks the
/// embedding model. The collection itself is created on first save.
pub fn open_engine(config: &ProjmemConfig) -> Result<MemoryEngine> {
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    tracing::info!(model = provider.model_id(), "embedding provider ready");

    let collection: Arc<dyn Collection> = match config.storage.backend.as_str() {
        "sqlite" => {
            let db_path = config.resolved_db_path();
            let conn = db::open_database(&db_path)?;
            db::check_embedding_model(&conn, provider.model_id())?;
            tracing::info!(db = %db_path.display(), "database ready");
            Arc::new(SqliteCollection::new(
                Arc::new(Mutex::new(conn)),
                config.storage.collection.as_str(),
            )?)
        }
        "memory" => {
            tracing::warn!("using in-memory backend; memories are lost on exit");
            Arc::new(InMemoryCollection::new(config.storage.collection.as_str()))
        }
        other => bail!("unknown storage backend: {other}. Supported: sqlite, memory"),
    };

    Ok(MemoryEngine::new(provider, collection))
}
