//! The retrieval layer: save, recall by similarity and chronological history.
//!
//! [`MemoryEngine`] owns no state of its own beyond its two capabilities, so it can be shared
//! across concurrent requests. Every read is scoped by project; recall never falls back to
//! another project's records and history never consults embeddings.

use std::sync::Arc;

use uuid::Uuid;

use super::collection::Collection;
use super::types::{require_non_empty, validate_embedding, MemoryFilter, MemoryRecord, ScoredRecord};
use super::{order_by_recency, order_by_score};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Operation, ProviderError, Result, ValidationError};

const PREVIEW_CHARS: usize = 60;

#[derive(Clone)]
pub struct MemoryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    collection: Arc<dyn Collection>,
}

impl MemoryEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, collection: Arc<dyn Collection>) -> Self {
        Self {
            embedder,
            collection,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    /// Embed `text` and persist it as a new record for `project_id`.
    ///
    /// Returns the id of the new record. Saving identical text twice creates two records.
    /// Empty category or sprint values are stored as absent.
    pub async fn save(
        &self,
        project_id: &str,
        text: &str,
        category: Option<&str>,
        sprint_number: Option<&str>,
    ) -> Result<Uuid> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("text", text)?;

        let embedding = self
            .embedder
            .embed_one(text)
            .await
            .map_err(|e| MemoryError::provider(Operation::Save, project_id, e))?;
        validate_embedding(&embedding)?;

        let record = MemoryRecord::new(
            project_id,
            text,
            embedding,
            non_blank(category),
            non_blank(sprint_number),
        );
        let id = record.id;
        let category = record.category.clone();

        self.collection
            .ensure_exists()
            .await
            .map_err(|e| MemoryError::storage(Operation::Save, project_id, e))?;
        self.collection
            .upsert(record)
            .await
            .map_err(|e| MemoryError::storage(Operation::Save, project_id, e))?;

        tracing::info!(
            project_id,
            %id,
            category = category.as_deref().unwrap_or("general"),
            text_len = text.len(),
            "memory saved"
        );
        Ok(id)
    }

    /// Like [`recall_by_similarity`](Self::recall_by_similarity) but keeps the scores.
    pub async fn recall_scored(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
        min_relevance_score: f64,
    ) -> Result<Vec<ScoredRecord>> {
        require_non_empty("project_id", project_id)?;
        require_non_empty("query", query)?;
        if limit == 0 {
            return Err(ValidationError::NonPositive("limit").into());
        }
        if !min_relevance_score.is_finite() {
            return Err(ValidationError::NonFinite("min_relevance_score").into());
        }

        let vector = self
            .embedder
            .embed_one(query)
            .await
            .map_err(|e| MemoryError::provider(Operation::Recall, project_id, e))?;
        if let Err(e) = validate_embedding(&vector) {
            return Err(MemoryError::provider(
                Operation::Recall,
                project_id,
                ProviderError::Malformed(format!("query embedding: {e}")),
            ));
        }

        let filter = MemoryFilter::project(project_id);
        let candidates = self
            .collection
            .search(&vector, limit, &filter)
            .await
            .map_err(|e| MemoryError::storage(Operation::Recall, project_id, e))?;

        tracing::info!(project_id, candidates = candidates.len(), "recall search complete");
        for c in &candidates {
            tracing::debug!(
                score = c.score,
                category = c.record.category.as_deref().unwrap_or("general"),
                text = %c.record.preview(PREVIEW_CHARS),
                "recall candidate"
            );
        }

        let mut kept: Vec<ScoredRecord> = candidates
            .into_iter()
            .filter(|c| c.score >= min_relevance_score)
            .collect();
        order_by_score(&mut kept);
        kept.truncate(limit);
        Ok(kept)
    }

    /// Records of `project_id` most similar to `query`, best first.
    ///
    /// At most `limit` records, each scoring at least `min_relevance_score`. An empty result
    /// is not an error.
    pub async fn recall_by_similarity(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
        min_relevance_score: f64,
    ) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .recall_scored(project_id, query, limit, min_relevance_score)
            .await?
            .into_iter()
            .map(|c| c.record)
            .collect())
    }

    /// The `count` most recent records of `project_id`, newest first, optionally restricted
    /// to an exact category. No embedding is computed.
    pub async fn get_history(
        &self,
        project_id: &str,
        category: Option<&str>,
        count: usize,
    ) -> Result<Vec<MemoryRecord>> {
        require_non_empty("project_id", project_id)?;
        if count == 0 {
            return Err(ValidationError::NonPositive("count").into());
        }

        let filter = MemoryFilter::for_project(project_id, non_blank(category).as_deref());
        let mut records = self
            .collection
            .scan(&filter, Some(count))
            .await
            .map_err(|e| MemoryError::storage(Operation::History, project_id, e))?;

        order_by_recency(&mut records);
        records.truncate(count);
        tracing::info!(
            project_id,
            category = filter.category().unwrap_or("*"),
            returned = records.len(),
            "history read"
        );
        Ok(records)
    }
}

/// Whitespace-only values count as absent. Anything else is kept byte-for-byte.
fn non_blank(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashed::HashedEmbeddingProvider;
    use crate::embedding::EMBEDDING_DIM;
    use crate::error::StorageError;
    use crate::memory::in_memory::InMemoryCollection;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls so tests can assert when the provider is (not) consulted.
    struct CountingEmbedder {
        inner: HashedEmbeddingProvider,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: HashedEmbeddingProvider::new(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Api {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            self.inner.embed(texts).await
        }

        fn model_id(&self) -> &str {
            "counting"
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        async fn embed(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|_| vec![1.0; 384]).collect())
        }

        fn model_id(&self) -> &str {
            "short"
        }
    }

    /// A collection whose every call fails.
    struct BrokenCollection;

    #[async_trait]
    impl Collection for BrokenCollection {
        fn name(&self) -> &str {
            "broken"
        }
        async fn ensure_exists(&self) -> std::result::Result<(), StorageError> {
            Err(StorageError::LockPoisoned)
        }
        async fn upsert(&self, _: MemoryRecord) -> std::result::Result<(), StorageError> {
            Err(StorageError::LockPoisoned)
        }
        async fn search(
            &self,
            _: &[f32],
            _: usize,
            _: &MemoryFilter,
        ) -> std::result::Result<Vec<ScoredRecord>, StorageError> {
            Err(StorageError::LockPoisoned)
        }
        async fn scan(
            &self,
            _: &MemoryFilter,
            _: Option<usize>,
        ) -> std::result::Result<Vec<MemoryRecord>, StorageError> {
            Err(StorageError::LockPoisoned)
        }
    }

    fn engine_with(embedder: Arc<dyn EmbeddingProvider>) -> (MemoryEngine, Arc<InMemoryCollection>) {
        let collection = Arc::new(InMemoryCollection::new("project_memories"));
        let engine = MemoryEngine::new(embedder, collection.clone());
        (engine, collection)
    }

    fn engine() -> (MemoryEngine, Arc<InMemoryCollection>) {
        engine_with(Arc::new(HashedEmbeddingProvider::new()))
    }

    #[tokio::test]
    async fn save_then_history_round_trip() {
        let (engine, _) = engine();
        let id = engine
            .save("p1", "Tech stack: Rust, SQLite", Some("tech_stack"), Some("Sprint 2"))
            .await
            .unwrap();

        let history = engine.get_history("p1", None, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        let r = &history[0];
        assert_eq!(r.id, id);
        assert_eq!(r.text, "Tech stack: Rust, SQLite");
        assert_eq!(r.category.as_deref(), Some("tech_stack"));
        assert_eq!(r.sprint_number.as_deref(), Some("Sprint 2"));
        assert_eq!(r.embedding.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn save_creates_collection_on_first_write() {
        let (engine, collection) = engine();
        assert!(collection.is_empty().await);
        engine.save("p1", "first", None, None).await.unwrap();
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_saves_are_distinct_records() {
        let (engine, _) = engine();
        let a = engine.save("p1", "same", None, None).await.unwrap();
        let b = engine.save("p1", "same", None, None).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(engine.get_history("p1", None, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_category_stored_as_absent() {
        let (engine, _) = engine();
        engine.save("p1", "x", Some("  "), Some("")).await.unwrap();
        let r = &engine.get_history("p1", None, 1).await.unwrap()[0];
        assert!(r.category.is_none());
        assert!(r.sprint_number.is_none());
    }

    #[tokio::test]
    async fn validation_happens_before_embedding() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (engine, _) = engine_with(embedder.clone());

        assert!(engine.save("", "text", None, None).await.unwrap_err().is_validation());
        assert!(engine.save("p1", "  ", None, None).await.unwrap_err().is_validation());
        assert!(engine
            .recall_by_similarity("p1", "", 5, 0.0)
            .await
            .unwrap_err()
            .is_validation());
        assert!(engine
            .recall_by_similarity("p1", "q", 0, 0.0)
            .await
            .unwrap_err()
            .is_validation());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn history_never_embeds() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (engine, _) = engine_with(embedder.clone());
        engine.save("p1", "one", None, None).await.unwrap();
        let before = embedder.calls.load(Ordering::SeqCst);
        engine.get_history("p1", None, 5).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn history_rejects_zero_count() {
        let (engine, _) = engine();
        let err = engine.get_history("p1", None, 0).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Validation(ValidationError::NonPositive("count"))
        ));
    }

    #[tokio::test]
    async fn provider_failure_writes_nothing() {
        let (engine, collection) = engine_with(Arc::new(CountingEmbedder::failing()));
        let err = engine.save("p1", "text", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Provider {
                operation: Operation::Save,
                ..
            }
        ));
        assert!(collection.is_empty().await);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_on_save() {
        let (engine, collection) = engine_with(Arc::new(ShortEmbedder));
        let err = engine.save("p1", "text", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Validation(ValidationError::DimensionMismatch { actual: 384, .. })
        ));
        assert!(collection.is_empty().await);
    }

    #[tokio::test]
    async fn wrong_dimension_query_is_a_provider_error() {
        let (engine, _) = engine_with(Arc::new(ShortEmbedder));
        let err = engine
            .recall_by_similarity("p1", "query", 5, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Provider { .. }));
    }

    #[tokio::test]
    async fn storage_failure_names_operation_and_project() {
        let engine = MemoryEngine::new(
            Arc::new(HashedEmbeddingProvider::new()),
            Arc::new(BrokenCollection),
        );
        let err = engine.get_history("inventory", None, 5).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Storage {
                operation: Operation::History,
                ..
            }
        ));
        assert!(err.to_string().contains("inventory"));

        let err = engine.save("inventory", "x", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Storage {
                operation: Operation::Save,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn recall_provider_failure_names_recall() {
        let embedder = Arc::new(CountingEmbedder::failing());
        let (engine, _) = engine_with(embedder.clone());
        let err = engine
            .recall_by_similarity("inventory", "which database?", 5, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Provider {
                operation: Operation::Recall,
                ref project_id,
                ..
            } if project_id == "inventory"
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recall_search_failure_names_recall() {
        let engine = MemoryEngine::new(
            Arc::new(HashedEmbeddingProvider::new()),
            Arc::new(BrokenCollection),
        );
        let err = engine
            .recall_by_similarity("inventory", "which database?", 5, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Storage {
                operation: Operation::Recall,
                source: StorageError::LockPoisoned,
                ..
            }
        ));
        assert!(err.to_string().contains("inventory"));
    }

    #[tokio::test]
    async fn non_finite_threshold_is_rejected_before_embedding() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (engine, _) = engine_with(embedder.clone());
        for threshold in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = engine
                .recall_by_similarity("p1", "query", 5, threshold)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                MemoryError::Validation(ValidationError::NonFinite("min_relevance_score"))
            ));
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn padded_metadata_kept_verbatim() {
        let (engine, _) = engine();
        engine
            .save("p1", "notes", Some(" tech_stack "), Some("Sprint 1 "))
            .await
            .unwrap();
        let r = &engine.get_history("p1", None, 1).await.unwrap()[0];
        assert_eq!(r.category.as_deref(), Some(" tech_stack "));
        assert_eq!(r.sprint_number.as_deref(), Some("Sprint 1 "));
    }

    #[tokio::test]
    async fn recall_on_unknown_project_is_empty() {
        let (engine, _) = engine();
        engine.save("p1", "Tech stack: Rust", None, None).await.unwrap();
        let hits = engine
            .recall_by_similarity("p2", "Tech stack", 5, 0.0)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn recall_identical_text_scores_highest() {
        let (engine, _) = engine();
        engine.save("p1", "Database is PostgreSQL 16", None, None).await.unwrap();
        engine.save("p1", "Frontend uses React", None, None).await.unwrap();
        let hits = engine
            .recall_scored("p1", "Database is PostgreSQL 16", 5, 0.0)
            .await
            .unwrap();
        assert_eq!(hits[0].record.text, "Database is PostgreSQL 16");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn history_orders_by_timestamp_not_insertion() {
        let (engine, collection) = engine();
        collection.ensure_exists().await.unwrap();
        let now = Utc::now();
        let embedding = HashedEmbeddingProvider::new()
            .embed_one("x")
            .await
            .unwrap();
        // Inserted oldest-last so insertion order disagrees with capture time.
        for (text, age) in [("newest", 0), ("middle", 1), ("oldest", 2)] {
            let mut r = MemoryRecord::new("p1", text, embedding.clone(), None, None);
            r.timestamp = now - Duration::hours(age);
            collection.upsert(r).await.unwrap();
        }

        let texts: Vec<String> = engine
            .get_history("p1", None, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["newest", "middle"]);
    }
}
