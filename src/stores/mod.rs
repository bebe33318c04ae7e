//! Vector storage seam for embedded chunks.
//!
//! The [`VectorStore`] trait abstracts over storage backends so the pipeline
//! never depends on a specific database. Persistence formats and real vector
//! databases are external concerns; [`MemoryVectorStore`] covers tests and
//! small in-process workloads with a brute-force cosine scan.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ingestion::Chunk;
use crate::types::PipelineError;

/// A chunk as persisted alongside its embedding.
///
/// `metadata` is the chunk's [`ChunkMetadata`](crate::ingestion::ChunkMetadata)
/// serialized verbatim; it round-trips through storage untouched and is
/// re-normalized by the citation layer on the way back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Stable chunk identifier, `{source_id}_p{page}_c{seq}`.
    pub id: String,
    /// Originating document.
    pub source_id: String,
    /// The chunk text handed to the embedder.
    pub content: String,
    /// Chunk metadata, persisted verbatim.
    pub metadata: serde_json::Value,
    /// Embedding vector, when one was computed.
    pub embedding: Option<Vec<f32>>,
}

impl StoredChunk {
    /// Builds a storable record from a chunk and its embedding.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Result<Self, PipelineError> {
        let metadata = serde_json::to_value(&chunk.metadata)
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Ok(Self {
            id: chunk.metadata.chunk_id(),
            source_id: chunk.metadata.source_id.clone(),
            content: chunk.text.clone(),
            metadata,
            embedding: Some(embedding),
        })
    }
}

/// Unified interface for chunk storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts chunk records. Records without embeddings are stored but will
    /// not participate in similarity search.
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<(), PipelineError>;

    /// All chunks belonging to a source document.
    async fn get_chunks_by_source(&self, source_id: &str)
    -> Result<Vec<StoredChunk>, PipelineError>;

    /// Deletes a source document's chunks, returning how many were removed.
    async fn delete_chunks_by_source(&self, source_id: &str) -> Result<usize, PipelineError>;

    /// Cosine similarity search, most similar first, limited to `top_k`.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, PipelineError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, PipelineError>;
}

/// Cosine similarity of two vectors; zero for mismatched or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
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

/// Brute-force in-memory store for tests and small corpora.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<(), PipelineError> {
        let mut guard = self.chunks.write();
        guard.extend(chunks);
        Ok(())
    }

    async fn get_chunks_by_source(
        &self,
        source_id: &str,
    ) -> Result<Vec<StoredChunk>, PipelineError> {
        let guard = self.chunks.read();
        Ok(guard
            .iter()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn delete_chunks_by_source(&self, source_id: &str) -> Result<usize, PipelineError> {
        let mut guard = self.chunks.write();
        let before = guard.len();
        guard.retain(|c| c.source_id != source_id);
        Ok(before - guard.len())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>, PipelineError> {
        let guard = self.chunks.read();
        let mut scored: Vec<(StoredChunk, f32)> = guard
            .iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_ref()?;
                Some((chunk.clone(), cosine_similarity(query_embedding, embedding)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.chunks.read().len())
    }
}
