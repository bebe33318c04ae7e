//! Embedding collaborator seam.
//!
//! Real embedding models live outside this crate; the pipeline only needs
//! something that turns text into vectors. [`MockEmbeddingProvider`] is the
//! deterministic stand-in used by tests and examples.

use async_trait::async_trait;

use crate::types::PipelineError;

/// Turns batches of text into embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier for logging and telemetry.
    fn id(&self) -> &str;

    /// Embedding dimensionality this provider produces.
    fn dimensions(&self) -> usize;

    /// Embeds every text in `texts`, preserving order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Deterministic hash-bucket embeddings for tests.
///
/// The same text always maps to the same vector, so similarity searches in
/// tests are reproducible without any model downloads.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 16 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimensions] += f32::from(byte) / 255.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let first = provider.embed(&texts).await.unwrap();
        let second = provider.embed(&texts).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), provider.dimensions());
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_embeddings_are_unit_length() {
        let provider = MockEmbeddingProvider::with_dimensions(8);
        let out = provider.embed(&["some chunk text".to_string()]).await.unwrap();
        let norm: f32 = out[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
