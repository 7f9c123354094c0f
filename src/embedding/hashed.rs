//! Deterministic feature-hashing embedder.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) to a signed bucket of a
//! [`EMBEDDING_DIM`]-wide vector, then the vector is L2-normalized. Texts sharing words score
//! high cosine similarity; texts sharing none score zero. A lookup table of pinned vectors
//! lets tests fix the geometry of specific texts. No network, no model files.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::error::ProviderError;

pub const HASHED_MODEL_ID: &str = "fnv1a-bow-768";

#[derive(Debug, Clone, Default)]
pub struct HashedEmbeddingProvider {
    pinned: HashMap<String, Vec<f32>>,
}

impl HashedEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `vector` (normalized) whenever exactly `text` is embedded.
    pub fn with_pinned(mut self, text: impl Into<String>, mut vector: Vec<f32>) -> Self {
        l2_normalize(&mut vector);
        self.pinned.insert(text.into(), vector);
        self
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.pinned.get(text) {
            return v.clone();
        }

        let mut v = vec![0.0f32; EMBEDDING_DIM];
        let mut any = false;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            add_feature(&mut v, &token.to_lowercase());
            any = true;
        }
        // punctuation-only text still gets a non-zero vector
        if !any {
            add_feature(&mut v, text);
        }
        l2_normalize(&mut v);
        v
    }
}

fn add_feature(v: &mut [f32], feature: &str) {
    let h = fnv1a(feature.as_bytes());
    let idx = (h % EMBEDDING_DIM as u64) as usize;
    let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
    v[idx] += sign;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_id(&self) -> &str {
        HASHED_MODEL_ID
    }
}
