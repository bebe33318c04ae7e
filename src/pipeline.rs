//! End-to-end document pipeline: extract → annotate → chunk → embed → store,
//! plus retrieval and citation assembly on the way back out.
//!
//! Every collaborator is injected; the pipeline owns no process-wide state.
//! Invocation is synchronous per document. Pages are independent, so a
//! per-page failure ([`PipelineError::InvalidPage`]) is logged and counted
//! without aborting the rest of the document, while collaborator failures
//! (extractor, embedder, store) abort the ingest.

use std::path::Path;
use std::sync::Arc;

use crate::citations::CitationFormatter;
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::{Chunk, Chunker, ChunkerConfig, PageExtractor, PageRecord};
use crate::stores::{StoredChunk, VectorStore};
use crate::types::PipelineError;

/// Outcome counters for one document ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Pages that produced chunks (or legitimately produced none).
    pub pages_processed: usize,
    /// Pages rejected as invalid; the rest of the document still ran.
    pub pages_failed: usize,
    /// Chunks embedded and handed to the store.
    pub chunks_stored: usize,
    /// Chunks dropped because no embedding came back for them.
    pub chunks_skipped: usize,
}

/// Document ingestion and retrieval pipeline.
///
/// Construct via [`DocumentPipeline::builder`]:
///
/// ```rust,ignore
/// let pipeline = DocumentPipeline::builder()
///     .extractor(PlainTextExtractor)
///     .embedder(MockEmbeddingProvider::new())
///     .store(MemoryVectorStore::new())
///     .build()?;
/// let summary = pipeline.ingest(Path::new("report.txt")).await?;
/// ```
pub struct DocumentPipeline {
    extractor: Arc<dyn PageExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    annotate_pages: bool,
}

impl DocumentPipeline {
    /// Creates a new builder.
    pub fn builder() -> DocumentPipelineBuilder {
        DocumentPipelineBuilder::default()
    }

    /// The store this pipeline writes to and searches.
    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    /// Extracts and chunks a document without touching the store.
    ///
    /// Chunks come back stable-sorted by
    /// `(source_id, page_number, chunk_sequence)`. Invalid pages are skipped
    /// with a warning, matching [`DocumentPipeline::ingest`].
    pub async fn chunk_document(&self, path: &Path) -> Result<Vec<Chunk>, PipelineError> {
        let pages = self.extractor.extract(path).await?;
        let (chunks, _failed) = self.chunk_pages(pages);
        Ok(chunks)
    }

    /// Runs the full ingest for one document.
    pub async fn ingest(&self, path: &Path) -> Result<IngestSummary, PipelineError> {
        let pages = self.extractor.extract(path).await?;
        let page_count = pages.len();
        let (chunks, pages_failed) = self.chunk_pages(pages);
        let pages_processed = page_count - pages_failed;

        if chunks.is_empty() {
            tracing::info!(path = %path.display(), "document produced no chunks");
            return Ok(IngestSummary {
                pages_processed,
                pages_failed,
                ..IngestSummary::default()
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut stored = Vec::with_capacity(chunks.len());
        let mut chunks_skipped = 0usize;
        let mut embeddings = embeddings.into_iter();
        for chunk in &chunks {
            match embeddings.next() {
                Some(embedding) if !embedding.is_empty() => {
                    stored.push(StoredChunk::from_chunk(chunk, embedding)?);
                }
                _ => chunks_skipped += 1,
            }
        }

        let chunks_stored = stored.len();
        self.store.insert_chunks(stored).await?;

        tracing::info!(
            path = %path.display(),
            embedder = self.embedder.id(),
            pages_processed,
            pages_failed,
            chunks_stored,
            chunks_skipped,
            "ingest complete"
        );
        Ok(IngestSummary {
            pages_processed,
            pages_failed,
            chunks_stored,
            chunks_skipped,
        })
    }

    /// Embeds a query and returns the `top_k` most similar stored chunks.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<StoredChunk>, PipelineError> {
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| PipelineError::Embedding("no embedding for query".to_string()))?;
        let hits = self.store.search_similar(&query_embedding, top_k).await?;
        Ok(hits.into_iter().map(|(chunk, _score)| chunk).collect())
    }

    /// Retrieves for `query` and renders up to `max_display` citation labels.
    pub async fn sources_for(
        &self,
        query: &str,
        top_k: usize,
        max_display: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let retrieved = self.retrieve(query, top_k).await?;
        let records: Vec<serde_json::Value> =
            retrieved.into_iter().map(|chunk| chunk.metadata).collect();
        let mut labels = CitationFormatter::format(&records);
        labels.truncate(max_display);
        Ok(labels)
    }

    fn chunk_pages(&self, pages: Vec<PageRecord>) -> (Vec<Chunk>, usize) {
        let mut chunks = Vec::new();
        let mut failed = 0usize;
        for page in pages {
            let page = if self.annotate_pages {
                page.into_annotated()
            } else {
                page
            };
            match self.chunker.split(&page) {
                Ok(page_chunks) => chunks.extend(page_chunks),
                Err(err) => {
                    tracing::warn!(
                        source = %page.source_id,
                        page = page.page_number,
                        error = %err,
                        "skipping invalid page"
                    );
                    failed += 1;
                }
            }
        }
        // Page ordering must survive any future parallel chunking.
        chunks.sort_by(|a, b| {
            (
                a.metadata.source_id.as_str(),
                a.metadata.page_number,
                a.metadata.chunk_sequence,
            )
                .cmp(&(
                    b.metadata.source_id.as_str(),
                    b.metadata.page_number,
                    b.metadata.chunk_sequence,
                ))
        });
        (chunks, failed)
    }
}

/// Builder for [`DocumentPipeline`].
#[derive(Default)]
pub struct DocumentPipelineBuilder {
    extractor: Option<Arc<dyn PageExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    config: Option<ChunkerConfig>,
    annotate_pages: bool,
}

impl DocumentPipelineBuilder {
    /// Sets the page extractor. Required.
    #[must_use]
    pub fn extractor(mut self, extractor: impl PageExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Sets the embedding provider. Required.
    #[must_use]
    pub fn embedder(mut self, embedder: impl EmbeddingProvider + 'static) -> Self {
        self.embedder = Some(Arc::new(embedder));
        self
    }

    /// Sets the vector store. Required.
    #[must_use]
    pub fn store(mut self, store: impl VectorStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets the vector store from an existing `Arc`, for sharing with other
    /// readers.
    #[must_use]
    pub fn store_arc(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the default 600/150 chunker sizing.
    #[must_use]
    pub fn chunker_config(mut self, config: ChunkerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enables page annotation (`[TABLE_START]`/`[IMAGE_REFERENCE]` markers)
    /// before chunking. Disabled by default: extractors that already emit
    /// annotated text should leave this off.
    #[must_use]
    pub fn annotate_pages(mut self, annotate: bool) -> Self {
        self.annotate_pages = annotate;
        self
    }

    /// Builds the pipeline.
    ///
    /// Returns [`PipelineError::InvalidOverlap`] for a bad chunker config.
    ///
    /// # Panics
    ///
    /// Panics if extractor, embedder, or store was not set.
    pub fn build(self) -> Result<DocumentPipeline, PipelineError> {
        let chunker = Chunker::new(self.config.unwrap_or_default())?;
        Ok(DocumentPipeline {
            extractor: self
                .extractor
                .expect("DocumentPipelineBuilder requires an extractor"),
            embedder: self
                .embedder
                .expect("DocumentPipelineBuilder requires an embedder"),
            store: self.store.expect("DocumentPipelineBuilder requires a store"),
            chunker,
            annotate_pages: self.annotate_pages,
        })
    }

    /// Non-panicking build; `None` when a component is missing.
    pub fn try_build(self) -> Option<Result<DocumentPipeline, PipelineError>> {
        let extractor = self.extractor?;
        let embedder = self.embedder?;
        let store = self.store?;
        let chunker = match Chunker::new(self.config.unwrap_or_default()) {
            Ok(chunker) => chunker,
            Err(err) => return Some(Err(err)),
        };
        Some(Ok(DocumentPipeline {
            extractor,
            embedder,
            store,
            chunker,
            annotate_pages: self.annotate_pages,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::stores::MemoryVectorStore;

    #[test]
    fn builder_requires_all_components() {
        assert!(DocumentPipeline::builder().try_build().is_none());
    }

    #[test]
    fn builder_rejects_bad_chunker_config() {
        let result = DocumentPipeline::builder()
            .extractor(crate::ingestion::PlainTextExtractor)
            .embedder(MockEmbeddingProvider::new())
            .store(MemoryVectorStore::new())
            .chunker_config(ChunkerConfig {
                target_size: 10,
                overlap: 10,
            })
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidOverlap { .. })));
    }
}
