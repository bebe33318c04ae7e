//! Error taxonomy shared across the ingestion and retrieval pipeline.
//!
//! Two failure classes deliberately do **not** appear here:
//!
//! * A page whose extracted text is empty or whitespace-only simply yields
//!   zero chunks ([`Chunker::split`](crate::ingestion::Chunker::split)
//!   returns `Ok(vec![])`).
//! * Retrieved records with unusable citation metadata are skipped during
//!   formatting, logged at debug level, and never surfaced to the caller.

use thiserror::Error;

/// Errors produced by the chunking/citation pipeline and its collaborator seams.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A page record carried a non-positive page number. Fatal for that page
    /// only; the rest of the document keeps processing.
    #[error("invalid page record for '{source_id}': page_number must be >= 1")]
    InvalidPage { source_id: String },

    /// Chunker configuration violated `overlap < target_size`.
    #[error("invalid chunker config: overlap {overlap} must be smaller than target size {target_size}")]
    InvalidOverlap { target_size: usize, overlap: usize },

    /// The page extractor collaborator failed for a whole document.
    #[error("extraction failed for '{source_id}': {message}")]
    Extraction { source_id: String, message: String },

    /// The embedding collaborator failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store collaborator failed.
    #[error("store operation failed: {0}")]
    Store(String),

    /// Filesystem failure in a file-backed extractor.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
