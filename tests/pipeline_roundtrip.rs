//! End-to-end pipeline tests with mock embeddings and the in-memory store.
//!
//! Deterministic and model-free, suitable for CI: extraction comes from a
//! temp file or a canned extractor, embeddings from the hash-bucket mock.

use std::path::Path;

use async_trait::async_trait;

use chunksmith::{
    ChunkerConfig, CitationFormatter, DocumentPipeline, MemoryVectorStore, MockEmbeddingProvider,
    PageExtractor, PageRecord, PipelineError, PlainTextExtractor,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn sample_document() -> String {
    [
        // Page 1: prose plus a figure caption.
        "Qatar's economy expanded steadily through the review period, supported \
         by strong hydrocarbon revenues and a resilient services sector. \
         Figure 1: Real GDP growth over the review period.",
        // Page 2: a table.
        "Fiscal outturn by year.\n2021 | 2022 | 2023\n4.1% | 4.8% | 3.2%",
        // Page 3: annex material.
        "Annex I describes the estimation methodology in full detail, including \
         data sources and revision policies used throughout.",
    ]
    .join("\x0C")
}

async fn build_pipeline(dir: &tempfile::TempDir) -> (DocumentPipeline, std::path::PathBuf) {
    let path = dir.path().join("report.txt");
    tokio::fs::write(&path, sample_document()).await.unwrap();

    let pipeline = DocumentPipeline::builder()
        .extractor(PlainTextExtractor)
        .embedder(MockEmbeddingProvider::new())
        .store(MemoryVectorStore::new())
        .chunker_config(ChunkerConfig {
            target_size: 120,
            overlap: 20,
        })
        .annotate_pages(true)
        .build()
        .unwrap();
    (pipeline, path)
}

#[tokio::test]
async fn ingest_stores_every_embedded_chunk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, path) = build_pipeline(&dir).await;

    let summary = pipeline.ingest(&path).await.unwrap();
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.pages_failed, 0);
    assert!(summary.chunks_stored > 0);
    assert_eq!(summary.chunks_skipped, 0);

    let store = pipeline.store();
    assert_eq!(store.count().await.unwrap(), summary.chunks_stored);

    let stored = store.get_chunks_by_source("report.txt").await.unwrap();
    assert_eq!(stored.len(), summary.chunks_stored);
    for chunk in &stored {
        assert!(chunk.id.starts_with("report.txt_p"));
        assert!(chunk.embedding.is_some());
        assert!(chunk.metadata.get("element_type").is_some());
    }
}

#[tokio::test]
async fn chunking_respects_page_identity_and_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, path) = build_pipeline(&dir).await;

    let chunks = pipeline.chunk_document(&path).await.unwrap();
    assert!(chunks.len() >= 3);

    let mut last_key = None;
    for chunk in &chunks {
        assert_eq!(chunk.metadata.source_id, "report.txt");
        assert!(chunk.metadata.page_number >= 1 && chunk.metadata.page_number <= 3);
        let key = (chunk.metadata.page_number, chunk.metadata.chunk_sequence);
        if let Some(prev) = last_key {
            assert!(key > prev, "chunks out of order: {prev:?} then {key:?}");
        }
        last_key = Some(key);
    }

    // Per-page sequences restart at zero.
    for page in 1..=3 {
        let sequences: Vec<usize> = chunks
            .iter()
            .filter(|c| c.metadata.page_number == page)
            .map(|c| c.metadata.chunk_sequence)
            .collect();
        assert_eq!(sequences, (0..sequences.len()).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn retrieval_yields_well_formed_citations() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, path) = build_pipeline(&dir).await;
    pipeline.ingest(&path).await.unwrap();

    let retrieved = pipeline.retrieve("fiscal outturn by year", 5).await.unwrap();
    assert!(!retrieved.is_empty());
    assert!(retrieved.len() <= 5);

    let labels = pipeline
        .sources_for("fiscal outturn by year", 10, 3)
        .await
        .unwrap();
    assert!(!labels.is_empty());
    assert!(labels.len() <= 3);
    let mut sorted = labels.clone();
    sorted.sort();
    assert_eq!(labels, sorted, "citation labels must be sorted");
    for label in &labels {
        assert!(
            label.contains("Page"),
            "unexpected citation label: {label:?}"
        );
    }
}

#[tokio::test]
async fn grouped_sources_cover_the_mixed_document() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, path) = build_pipeline(&dir).await;
    pipeline.ingest(&path).await.unwrap();

    // Pull everything back and group it; all three content families exist.
    let stored = pipeline
        .store()
        .get_chunks_by_source("report.txt")
        .await
        .unwrap();
    let records: Vec<serde_json::Value> = stored.into_iter().map(|c| c.metadata).collect();
    let block = CitationFormatter::format_grouped(&records);
    assert!(block.starts_with("**Sources:**"));
    assert!(block.contains("**Tables:**"));
    assert!(block.contains("**Images:**"));
    assert!(block.contains("**Text References:**"));
}

/// Extractor that returns canned pages, including an invalid one.
struct CannedExtractor {
    pages: Vec<PageRecord>,
}

#[async_trait]
impl PageExtractor for CannedExtractor {
    async fn extract(&self, _path: &Path) -> Result<Vec<PageRecord>, PipelineError> {
        Ok(self.pages.clone())
    }
}

#[tokio::test]
async fn invalid_pages_fail_alone_without_aborting_the_document() {
    init_tracing();
    let pipeline = DocumentPipeline::builder()
        .extractor(CannedExtractor {
            pages: vec![
                PageRecord::new("doc.pdf", 1, "A valid opening page of prose."),
                PageRecord::new("doc.pdf", 0, "Bad page number."),
                PageRecord::new("doc.pdf", 3, "Another valid page of content."),
                PageRecord::new("doc.pdf", 4, "   "),
            ],
        })
        .embedder(MockEmbeddingProvider::new())
        .store(MemoryVectorStore::new())
        .build()
        .unwrap();

    let summary = pipeline.ingest(Path::new("doc.pdf")).await.unwrap();
    assert_eq!(summary.pages_failed, 1);
    // The blank page processed cleanly to zero chunks.
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.chunks_stored, 2);

    let stored = pipeline
        .store()
        .get_chunks_by_source("doc.pdf")
        .await
        .unwrap();
    let pages: Vec<u64> = stored
        .iter()
        .map(|c| c.metadata["page_number"].as_u64().unwrap())
        .collect();
    assert_eq!(pages, vec![1, 3]);
}
