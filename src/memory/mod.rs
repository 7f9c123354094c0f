pub mod collection;
pub mod engine;
pub mod in_memory;
pub mod sqlite;
pub mod types;

use std::cmp::Ordering;

pub use collection::Collection;
pub use engine::MemoryEngine;
pub use in_memory::InMemoryCollection;
pub use sqlite::SqliteCollection;
pub use types::{MemoryFilter, MemoryRecord, ScoredRecord};

/// Recall returns at most this many records when the caller does not say.
pub const DEFAULT_RECALL_LIMIT: usize = 5;
/// Recall keeps every candidate when the caller does not say.
pub const DEFAULT_MIN_RELEVANCE_SCORE: f64 = 0.0;
/// History returns at most this many records when the caller does not say.
pub const DEFAULT_HISTORY_COUNT: usize = 10;

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Sort by score descending, then id descending. With v7 ids the newer record wins a tie.
pub(crate) fn order_by_score(results: &mut [ScoredRecord]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.record.id.cmp(&a.record.id))
    });
}

/// Sort by capture time descending, then id descending.
pub(crate) fn order_by_recency(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn rec(text: &str) -> MemoryRecord {
        let mut v = vec![0.0f32; crate::embedding::EMBEDDING_DIM];
        v[0] = 1.0;
        MemoryRecord::new("p", text, v, None, None)
    }

    #[test]
    fn embedding_bytes_are_little_endian_f32() {
        let v = [1.0f32, -2.5];
        let bytes = embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn equal_scores_break_ties_by_id_descending() {
        let older = rec("older");
        let newer = rec("newer");
        assert!(newer.id > older.id);
        let mut results = vec![
            ScoredRecord { record: older.clone(), score: 0.5 },
            ScoredRecord { record: newer.clone(), score: 0.5 },
            ScoredRecord { record: rec("best"), score: 0.9 },
        ];
        order_by_score(&mut results);
        assert_eq!(results[0].record.text, "best");
        assert_eq!(results[1].record.id, newer.id);
        assert_eq!(results[2].record.id, older.id);
    }

    #[test]
    fn recency_orders_newest_first() {
        let mut a = rec("a");
        let mut b = rec("b");
        let now = Utc::now();
        a.timestamp = now;
        b.timestamp = now - Duration::seconds(5);
        let mut records = vec![b.clone(), a.clone()];
        order_by_recency(&mut records);
        assert_eq!(records[0].text, "a");
        assert_eq!(records[1].text, "b");
    }
}
