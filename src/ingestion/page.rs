//! Page records, page-level annotation, and the extraction seam.
//!
//! Extraction itself (turning document bytes into per-page text) is a
//! collaborator behind the [`PageExtractor`] trait. Two implementations ship
//! here: [`PlainTextExtractor`] for form-feed separated text files, and
//! [`PdfPageExtractor`] behind the `pdf` feature.
//!
//! [`PageRecord::into_annotated`] reproduces the upstream loader's page
//! treatment: table-looking lines are gathered into an explicit
//! `[TABLE_START]…[TABLE_END]` block and pages referencing charts or figures
//! get an `[IMAGE_REFERENCE]` note, so the per-chunk classifier sees the same
//! structural markers the rest of the pipeline expects.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::detect::{self, IMAGE_REFERENCE_MARKER, TABLE_END_MARKER, TABLE_START_MARKER};
use crate::types::PipelineError;

/// One physical page of extracted text. Immutable input to the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Originating document, typically a filename.
    pub source_id: String,
    /// 1-based physical page number. Never recomputed downstream.
    pub page_number: u32,
    /// Raw page text. Control characters pass through untouched.
    pub raw_text: String,
}

impl PageRecord {
    /// Creates a page record.
    pub fn new(
        source_id: impl Into<String>,
        page_number: u32,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            page_number,
            raw_text: raw_text.into(),
        }
    }

    /// Does this page contain any table-looking lines?
    pub fn has_tables(&self) -> bool {
        self.raw_text.contains(TABLE_START_MARKER)
            || self.raw_text.lines().any(detect::is_table_line)
    }

    /// Does this page reference figures or charts?
    pub fn has_figures(&self) -> bool {
        self.raw_text.contains("Figure") || self.raw_text.contains("Chart")
    }

    /// Rewrites the page so structural content carries explicit markers.
    ///
    /// Table-looking lines are moved into a single `[TABLE_START]` block after
    /// the prose, and an `[IMAGE_REFERENCE]` note is appended when the page
    /// mentions figures or charts. Pages without structural content come back
    /// unchanged. Page identity (`source_id`, `page_number`) is preserved.
    pub fn into_annotated(self) -> PageRecord {
        if self.raw_text.contains(TABLE_START_MARKER) {
            // Already annotated upstream; don't nest markers.
            return self;
        }

        let mut table_content = String::new();
        let mut text_content = String::new();
        for line in self.raw_text.lines() {
            if detect::is_table_line(line) {
                table_content.push_str(line);
                table_content.push('\n');
            } else {
                text_content.push_str(line);
                text_content.push('\n');
            }
        }

        let has_figures = self.has_figures();
        if table_content.trim().is_empty() && !has_figures {
            return self;
        }

        let mut content = String::new();
        if !text_content.trim().is_empty() {
            content.push_str(&text_content);
        }
        if !table_content.trim().is_empty() {
            content.push_str(&format!(
                "\n{TABLE_START_MARKER}\n{table_content}\n{TABLE_END_MARKER}\n"
            ));
        }
        if has_figures {
            content.push_str(&format!(
                "\n{IMAGE_REFERENCE_MARKER} Contains charts/figures\n"
            ));
        }

        PageRecord {
            source_id: self.source_id,
            page_number: self.page_number,
            raw_text: content,
        }
    }
}

/// Collaborator seam that turns a document into ordered page records.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extracts all pages of the document at `path`, in physical order.
    ///
    /// Implementations must number pages 1-based and may drop blank pages.
    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, PipelineError>;
}

fn source_id_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Splits already-extracted text into page records on form feeds.
///
/// Page numbering is positional: the text before the first `\x0C` is page 1
/// even when later pages end up blank and are skipped.
pub fn pages_from_text(source_id: &str, text: &str) -> Vec<PageRecord> {
    if !text.contains('\x0C') {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![PageRecord::new(source_id, 1, trimmed)];
    }

    text.split('\x0C')
        .enumerate()
        .filter(|(_, page_text)| !page_text.trim().is_empty())
        .map(|(i, page_text)| PageRecord::new(source_id, (i + 1) as u32, page_text.trim()))
        .collect()
}

/// Reads UTF-8 text files and splits them into pages on form feeds.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl PageExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, PipelineError> {
        let source_id = source_id_for(path);
        let text = tokio::fs::read_to_string(path).await?;
        let pages = pages_from_text(&source_id, &text);
        tracing::debug!(source = %source_id, pages = pages.len(), "extracted text pages");
        Ok(pages)
    }
}

/// Extracts page text from PDF bytes via `pdf-extract`.
///
/// `pdf-extract` returns the whole document as one string with form feeds
/// between pages, so page splitting matches [`pages_from_text`].
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Default)]
pub struct PdfPageExtractor;

#[cfg(feature = "pdf")]
#[async_trait]
impl PageExtractor for PdfPageExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, PipelineError> {
        let source_id = source_id_for(path);
        let bytes = tokio::fs::read(path).await?;
        let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|err| {
            PipelineError::Extraction {
                source_id: source_id.clone(),
                message: err.to_string(),
            }
        })?;
        let pages = pages_from_text(&source_id, &text);
        tracing::info!(source = %source_id, pages = pages.len(), "extracted pdf pages");
        Ok(pages)
    }
}
