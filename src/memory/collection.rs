//! The backing-collection capability consumed by the engine.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::memory::types::{MemoryFilter, MemoryRecord, ScoredRecord};

/// A persisted set of memory records with vector search.
///
/// Implementations evaluate [`MemoryFilter`] exactly, validate records on write, and never
/// retry. Reads on a collection that does not exist yet return empty results.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name, for logs and errors.
    fn name(&self) -> &str;

    /// Create the collection if absent. Idempotent.
    async fn ensure_exists(&self) -> Result<(), StorageError>;

    /// Insert or fully replace the record with the same id.
    async fn upsert(&self, record: MemoryRecord) -> Result<(), StorageError>;

    /// Up to `limit` records matching `filter`, most similar to `vector` first.
    /// Equal scores are ordered by id descending.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, StorageError>;

    /// Records matching `filter`. Never consults embeddings.
    ///
    /// With `limit`, at most that many of the most recent records (timestamp descending, then
    /// id descending). Without it, every match in no particular order.
    async fn scan(
        &self,
        filter: &MemoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StorageError>;
}
