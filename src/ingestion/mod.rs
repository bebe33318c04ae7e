//! Ingestion: from extracted page text to classified, overlapping chunks.
//!
//! The pieces in this module cover three concerns:
//!
//! * [`page`] — page records, page-level annotation, and the [`PageExtractor`]
//!   collaborator seam.
//! * [`detect`] — structural element detection (text/table/figure/annex).
//! * [`chunk`] — boundary-preserving splitting with overlap and per-chunk
//!   metadata.

pub mod chunk;
pub mod detect;
pub mod page;

pub use chunk::{Chunk, ChunkMetadata, Chunker, ChunkerConfig};
pub use detect::{DetectionRule, ElementType, classify, is_table_line, rules};
pub use page::{PageExtractor, PageRecord, PlainTextExtractor, pages_from_text};

#[cfg(feature = "pdf")]
pub use page::PdfPageExtractor;
