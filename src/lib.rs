//! # chunksmith: structure-aware chunking and citations for RAG
//!
//! Splits page-extracted document text into overlapping, boundary-aware
//! chunks, classifies each chunk as text/table/figure/annex content, and
//! renders deduplicated, human-readable citation lists from retrieved chunk
//! metadata.
//!
//! ```text
//! Document ──► PageExtractor ──► PageRecord (per page)
//!                                     │
//!                  (optional) page annotation ── [TABLE_START]/[IMAGE_REFERENCE]
//!                                     │
//!                    ingestion::Chunker ──► Chunk { text, ChunkMetadata }
//!                                     │            (classify per chunk)
//!                EmbeddingProvider ───┴──► VectorStore (StoredChunk)
//!
//! Retrieved metadata ──► citations::CitationFormatter ──► citation labels
//! ```
//!
//! The chunking and citation layers are pure functions over immutable inputs;
//! extraction, embedding, and storage are injected collaborators behind
//! traits, with mock/in-memory implementations for tests. Enable the `pdf`
//! feature for a `pdf-extract`-backed page extractor.
//!
//! ## Quick start
//!
//! ```rust
//! use chunksmith::ingestion::{Chunker, PageRecord};
//! use chunksmith::citations::CitationFormatter;
//!
//! let chunker = Chunker::with_defaults();
//! let page = PageRecord::new("report.pdf", 1, "Figure 1: GDP growth of 3.2%");
//! let chunks = chunker.split(&page).unwrap();
//!
//! let records: Vec<serde_json::Value> = chunks
//!     .iter()
//!     .map(|c| serde_json::to_value(&c.metadata).unwrap())
//!     .collect();
//! let labels = CitationFormatter::format(&records);
//! assert_eq!(labels, vec!["📊 Table on Page 1"]);
//! ```

pub mod citations;
pub mod embeddings;
pub mod ingestion;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use citations::{Citation, CitationFormatter, PageLabel, Provenance};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider};
pub use ingestion::{
    Chunk, ChunkMetadata, Chunker, ChunkerConfig, ElementType, PageExtractor, PageRecord,
    PlainTextExtractor,
};
pub use pipeline::{DocumentPipeline, DocumentPipelineBuilder, IngestSummary};
pub use stores::{MemoryVectorStore, StoredChunk, VectorStore};
pub use types::PipelineError;

#[cfg(feature = "pdf")]
pub use ingestion::PdfPageExtractor;
