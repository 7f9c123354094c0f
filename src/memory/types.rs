//! Core memory type definitions.
//!
//! Defines [`MemoryRecord`] (one stored fact about one project), [`ScoredRecord`] (a record
//! paired with its relevance score) and [`MemoryFilter`] (the predicate every collection
//! backend evaluates the same way).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::EMBEDDING_DIM;
use crate::error::ValidationError;

/// A stored project memory. Serializes to the record wire shape:
/// `{id, projectId, text, embedding, timestamp, category, sprintNumber}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable), assigned at creation and never reused.
    pub id: Uuid,
    /// Tenant key. Every query is scoped by it.
    pub project_id: String,
    /// The raw information content; this is what gets embedded.
    pub text: String,
    /// Exactly [`EMBEDDING_DIM`] components, derived from `text` at save time.
    pub embedding: Vec<f32>,
    /// Capture time. Used only for chronological ordering, never for relevance.
    pub timestamp: DateTime<Utc>,
    /// Free-form label such as `tech_stack` or `sprint_planning`. Exact-match filter only.
    pub category: Option<String>,
    /// Carried as metadata; no operation filters on it.
    pub sprint_number: Option<String>,
}

impl MemoryRecord {
    /// Build a new record with a fresh id, stamped with the current time.
    pub fn new(
        project_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        category: Option<String>,
        sprint_number: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            project_id: project_id.into(),
            text: text.into(),
            embedding,
            timestamp: Utc::now(),
            category,
            sprint_number,
        }
    }

    /// Check the write-time invariants. Collections call this before every upsert.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("project_id", &self.project_id)?;
        require_non_empty("text", &self.text)?;
        validate_embedding(&self.embedding)
    }

    /// Text preview for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_preview(&self.text, max_chars)
    }
}

/// A record returned by similarity search, with its relevance score (higher = more similar).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f64,
}

/// Record predicate shared by all backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryFilter {
    /// `projectId == X`
    Project { project_id: String },
    /// `projectId == X AND category == Y`
    ProjectCategory {
        project_id: String,
        category: String,
    },
}

impl MemoryFilter {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self::Project {
            project_id: project_id.into(),
        }
    }

    /// Scope to a project, narrowing to an exact category when one is given.
    pub fn for_project(project_id: impl Into<String>, category: Option<&str>) -> Self {
        match category {
            Some(category) => Self::ProjectCategory {
                project_id: project_id.into(),
                category: category.to_string(),
            },
            None => Self::project(project_id),
        }
    }

    pub fn project_id(&self) -> &str {
        match self {
            Self::Project { project_id } | Self::ProjectCategory { project_id, .. } => project_id,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Project { .. } => None,
            Self::ProjectCategory { category, .. } => Some(category),
        }
    }

    /// Exact, case-sensitive match. No substring or fuzzy matching.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if record.project_id != self.project_id() {
            return false;
        }
        match self.category() {
            Some(category) => record.category.as_deref() == Some(category),
            None => true,
        }
    }
}

/// Reject empty or whitespace-only required fields.
pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn validate_embedding(embedding: &[f32]) -> Result<(), ValidationError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(ValidationError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|x| !x.is_finite()) || embedding.iter().all(|x| *x == 0.0) {
        return Err(ValidationError::DegenerateEmbedding);
    }
    Ok(())
}

/// Truncate content to max_chars, appending "..." if truncated.
fn truncate_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_embedding() -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[0] = 1.0;
        v
    }

    fn record(project: &str, category: Option<&str>) -> MemoryRecord {
        MemoryRecord::new(
            project,
            "Tech stack: Rust, PostgreSQL",
            unit_embedding(),
            category.map(String::from),
            None,
        )
    }

    #[test]
    fn valid_record_passes() {
        assert!(record("p1", None).validate().is_ok());
    }

    #[test]
    fn empty_project_rejected() {
        let err = record("  ", None).validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("project_id"));
    }

    #[test]
    fn wrong_dimension_rejected() {
        let mut r = record("p1", None);
        r.embedding = vec![1.0; 384];
        assert_eq!(
            r.validate().unwrap_err(),
            ValidationError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: 384
            }
        );
    }

    #[test]
    fn zero_embedding_rejected() {
        let mut r = record("p1", None);
        r.embedding = vec![0.0; EMBEDDING_DIM];
        assert_eq!(r.validate().unwrap_err(), ValidationError::DegenerateEmbedding);
    }

    #[test]
    fn nan_embedding_rejected() {
        let mut r = record("p1", None);
        r.embedding[3] = f32::NAN;
        assert_eq!(r.validate().unwrap_err(), ValidationError::DegenerateEmbedding);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(record("p1", None).id, record("p1", None).id);
    }

    #[test]
    fn filter_matches_project_only() {
        let filter = MemoryFilter::project("p1");
        assert!(filter.matches(&record("p1", Some("tech_stack"))));
        assert!(filter.matches(&record("p1", None)));
        assert!(!filter.matches(&record("p2", None)));
    }

    #[test]
    fn category_filter_is_exact() {
        let filter = MemoryFilter::for_project("p1", Some("tech_stack"));
        assert!(filter.matches(&record("p1", Some("tech_stack"))));
        assert!(!filter.matches(&record("p1", Some("tech_stack_v2"))));
        assert!(!filter.matches(&record("p1", Some("Tech_Stack"))));
        assert!(!filter.matches(&record("p1", None)));
        assert!(!filter.matches(&record("p2", Some("tech_stack"))));
    }

    #[test]
    fn wire_shape_uses_camel_case_and_nulls() {
        let r = record("p1", None);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["projectId"], "p1");
        assert!(json["category"].is_null());
        assert!(json["sprintNumber"].is_null());
        assert_eq!(json["embedding"].as_array().unwrap().len(), EMBEDDING_DIM);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 60), "short");
        assert_eq!(
            truncate_preview("a".repeat(100).as_str(), 60),
            format!("{}...", "a".repeat(60))
        );
        assert_eq!(truncate_preview("ñandú", 2), "ña...");
    }
}
