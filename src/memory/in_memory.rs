//! In-memory collection: linear scan with cosine similarity.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::collection::Collection;
use super::types::{MemoryFilter, MemoryRecord, ScoredRecord};
use super::{order_by_recency, order_by_score};
use crate::embedding::cosine_similarity;
use crate::error::StorageError;

/// Holds records for the lifetime of the process. `None` until [`Collection::ensure_exists`].
pub struct InMemoryCollection {
    name: String,
    records: RwLock<Option<HashMap<Uuid, MemoryRecord>>>,
}

impl InMemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(None),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.as_ref().map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_exists(&self) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.is_none() {
            *records = Some(HashMap::new());
            tracing::info!(collection = %self.name, "in-memory collection created");
        }
        Ok(())
    }

    async fn upsert(&self, record: MemoryRecord) -> Result<(), StorageError> {
        record.validate()?;
        let mut records = self.records.write().await;
        let map = records
            .as_mut()
            .ok_or_else(|| StorageError::MissingCollection(self.name.clone()))?;
        map.insert(record.id, record);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<ScoredRecord>, StorageError> {
        let records = self.records.read().await;
        let Some(map) = records.as_ref() else {
            return Ok(vec![]);
        };

        let mut results: Vec<ScoredRecord> = map
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| ScoredRecord {
                score: f64::from(cosine_similarity(vector, &r.embedding)),
                record: r.clone(),
            })
            .collect();

        order_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn scan(
        &self,
        filter: &MemoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StorageError> {
        let records = self.records.read().await;
        let mut matched: Vec<MemoryRecord> = records
            .as_ref()
            .map(|map| map.values().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(limit) = limit {
            order_by_recency(&mut matched);
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
