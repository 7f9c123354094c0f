//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and three implementations: a remote Gemini
//! provider ([`gemini`]), a local ONNX Runtime provider running all-mpnet-base-v2
//! ([`local`]), and a deterministic feature-hashing provider ([`hashed`]) for tests and
//! offline runs. All produce vectors of exactly [`EMBEDDING_DIM`] dimensions. The provider
//! is created via [`create_provider`] from configuration.

pub mod gemini;
pub mod hashed;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ProviderError;

/// Number of dimensions in every stored embedding.
pub const EMBEDDING_DIM: usize = 768;

/// Trait for embedding text into vectors.
///
/// Returns one vector per input text, in input order. Failures are returned as
/// [`ProviderError`]; callers never retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of text strings.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text string.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no embedding returned".into()))
    }

    /// Identifier of the model behind this provider, recorded next to stored vectors.
    fn model_id(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// `"local"` needs the ONNX model on disk (run `projmem model download` first);
/// `"gemini"` needs an API key.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(provider))
        }
        "gemini" => {
            let provider = gemini::GeminiEmbeddingProvider::from_config(config)?;
            Ok(Box::new(provider))
        }
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new())),
        other => {
            anyhow::bail!("unknown embedding provider: {other}. Supported: local, gemini, hashed")
        }
    }
}

/// L2-normalize a vector in place. Leaves zero vectors untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity. Zero-norm inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let mut config = crate::config::EmbeddingConfig::default();
        config.provider = "word2vec".into();
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("unknown embedding provider"));
    }

    #[test]
    fn hashed_provider_from_config() {
        let mut config = crate::config::EmbeddingConfig::default();
        config.provider = "hashed".into();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_id(), hashed::HASHED_MODEL_ID);
    }
}
