#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use projmem::db;
use projmem::embedding::hashed::HashedEmbeddingProvider;
use projmem::embedding::EMBEDDING_DIM;
use projmem::memory::{InMemoryCollection, MemoryEngine, SqliteCollection};
use tempfile::TempDir;

pub const COLLECTION: &str = "project_memories";

/// A 768-dim vector built from `(index, weight)` pairs.
pub fn vector(components: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    for &(i, w) in components {
        v[i % EMBEDDING_DIM] = w;
    }
    v
}

/// Unit vector along axis `i`.
pub fn axis(i: usize) -> Vec<f32> {
    vector(&[(i, 1.0)])
}

/// Hashed provider with the pair from the tech-stack scenario pinned ~0.9 apart.
pub fn scenario_embedder() -> HashedEmbeddingProvider {
    HashedEmbeddingProvider::new()
        .with_pinned("Tech stack: .NET, PostgreSQL", vector(&[(7, 0.9), (8, 0.436)]))
        .with_pinned("what database are we using?", axis(7))
}

/// Engine over a fresh in-memory collection.
pub fn memory_engine(embedder: HashedEmbeddingProvider) -> MemoryEngine {
    MemoryEngine::new(
        Arc::new(embedder),
        Arc::new(InMemoryCollection::new(COLLECTION)),
    )
}

/// Engine over a SQLite file at `path`.
pub fn sqlite_engine_at(path: &Path, embedder: HashedEmbeddingProvider) -> MemoryEngine {
    let conn = db::open_database(path).unwrap();
    let collection = SqliteCollection::new(Arc::new(Mutex::new(conn)), COLLECTION).unwrap();
    MemoryEngine::new(Arc::new(embedder), Arc::new(collection))
}

/// Engine over a SQLite file in a fresh temp dir. Keep the `TempDir` alive for the test.
pub fn sqlite_engine(embedder: HashedEmbeddingProvider) -> (MemoryEngine, TempDir) {
    let tmp = TempDir::new().unwrap();
    let engine = sqlite_engine_at(&tmp.path().join("memory.db"), embedder);
    (engine, tmp)
}
