//! Boundary-preserving chunking of page text.
//!
//! The splitter works in three passes:
//!
//! 1. **Marker injection** — a paragraph break is inserted before every
//!    `"Figure "`, `"Table "`, and `"Annex "` occurrence so captions become
//!    affinity points for split boundaries instead of being cut mid-sentence.
//! 2. **Recursive splitting** — spans over the size bound are split on a
//!    priority-ordered separator table, coarsest first. Marker separators bind
//!    to the *following* span (the caption stays with its content); whitespace
//!    separators bind to the *preceding* span. Adjacent small spans are merged
//!    greedily back up to the bound, and whitespace-only spans are folded into
//!    a neighbour, so concatenating the resulting spans reproduces the
//!    marker-injected text exactly. No character is dropped; the only chunks
//!    that can exceed the bound are ones that absorbed a whitespace run whose
//!    neighbours were already full, and then only by that run's length.
//! 3. **Overlap** — every span after the first is prefixed with the trailing
//!    `overlap` characters of the previous span's pre-overlap text, unless the
//!    span already starts with that tail.
//!
//! The split bound is `target_size - overlap`, so no emitted chunk ever
//! exceeds `target_size`, overlap prefix included.

use serde::{Deserialize, Serialize};

use super::detect::{self, ElementType};
use super::page::PageRecord;
use crate::types::PipelineError;

/// Structured record attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating document (filename or equivalent).
    pub source_id: String,
    /// 1-based page number, copied verbatim from the source [`PageRecord`].
    pub page_number: u32,
    /// Dominant content classification of this chunk.
    pub element_type: ElementType,
    /// 0-based position of the chunk within its page.
    pub chunk_sequence: usize,
    /// Content-type tag derived from the element type.
    pub content_type: String,
    /// Page-level flag: the page contained table-looking lines. Independent
    /// of `element_type`; a text chunk on a table-bearing page keeps it set.
    pub has_table_marker: bool,
    /// Page-level flag: the page referenced figures or charts.
    pub has_figure_marker: bool,
}

impl ChunkMetadata {
    /// Stable identifier of the form `{source_id}_p{page_number}_c{chunk_sequence}`.
    pub fn chunk_id(&self) -> String {
        format!(
            "{}_p{}_c{}",
            self.source_id, self.page_number, self.chunk_sequence
        )
    }
}

/// A bounded substring of page text plus its metadata. Immutable once built;
/// downstream consumers embed `text` and persist `metadata` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Chunker sizing parameters, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length, overlap included.
    pub target_size: usize,
    /// Trailing characters of a chunk repeated at the start of the next.
    /// Must be strictly smaller than `target_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: 600,
            overlap: 150,
        }
    }
}

/// Which side of a split a separator's text stays attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    /// Separator text begins the following span (figure/table/annex markers).
    Next,
    /// Separator text ends the preceding span (plain whitespace breaks).
    Previous,
}

struct Separator {
    pattern: &'static str,
    affinity: Affinity,
}

/// Priority-ordered separator table: marker boundaries first, then paragraph,
/// line, and word breaks. Character windows are the fallback when none match.
const SEPARATORS: &[Separator] = &[
    Separator {
        pattern: "\n\nFigure ",
        affinity: Affinity::Next,
    },
    Separator {
        pattern: "\n\nTable ",
        affinity: Affinity::Next,
    },
    Separator {
        pattern: "\n\nAnnex ",
        affinity: Affinity::Next,
    },
    Separator {
        pattern: "\n\n",
        affinity: Affinity::Previous,
    },
    Separator {
        pattern: "\n",
        affinity: Affinity::Previous,
    },
    Separator {
        pattern: " ",
        affinity: Affinity::Previous,
    },
];

/// Splits page text into overlapping, classified chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Creates a chunker, validating `overlap < target_size`.
    pub fn new(config: ChunkerConfig) -> Result<Self, PipelineError> {
        if config.overlap >= config.target_size {
            return Err(PipelineError::InvalidOverlap {
                target_size: config.target_size,
                overlap: config.overlap,
            });
        }
        Ok(Self { config })
    }

    /// Chunker with the default 600/150 sizing.
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Splits one page into chunks.
    ///
    /// A page with empty or whitespace-only text yields zero chunks. A page
    /// numbered `0` is rejected with [`PipelineError::InvalidPage`] before any
    /// splitting begins.
    pub fn split(&self, page: &PageRecord) -> Result<Vec<Chunk>, PipelineError> {
        if page.page_number == 0 {
            return Err(PipelineError::InvalidPage {
                source_id: page.source_id.clone(),
            });
        }
        if page.raw_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let has_table_marker = page.has_tables();
        let has_figure_marker = page.has_figures();

        let injected = inject_markers(&page.raw_text);
        let bound = self.config.target_size - self.config.overlap;
        let spans = coalesce_whitespace(split_spans(&injected, bound, SEPARATORS), bound);

        let mut chunks = Vec::with_capacity(spans.len());
        let mut prev_tail: Option<String> = None;
        for (chunk_sequence, span) in spans.into_iter().enumerate() {
            let text = match &prev_tail {
                Some(tail) if !tail.is_empty() && !span.starts_with(tail.as_str()) => {
                    format!("{tail}{span}")
                }
                _ => span.clone(),
            };
            prev_tail = Some(char_tail(&span, self.config.overlap));

            let element_type = detect::classify(&text);
            chunks.push(Chunk {
                metadata: ChunkMetadata {
                    source_id: page.source_id.clone(),
                    page_number: page.page_number,
                    element_type,
                    chunk_sequence,
                    content_type: element_type.content_tag().to_string(),
                    has_table_marker,
                    has_figure_marker,
                },
                text,
            });
        }

        tracing::debug!(
            source = %page.source_id,
            page = page.page_number,
            chunks = chunks.len(),
            "split page"
        );
        Ok(chunks)
    }
}

/// Inserts a paragraph break before every figure/table/annex marker so the
/// splitter can break there. The inserted `\n\n` are the only characters the
/// chunk stream adds relative to the raw page text.
pub(crate) fn inject_markers(text: &str) -> String {
    text.replace("Figure ", "\n\nFigure ")
        .replace("Table ", "\n\nTable ")
        .replace("Annex ", "\n\nAnnex ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`, whole string if shorter.
pub(crate) fn char_tail(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let len = char_len(s);
    if len <= n {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn split_spans(text: &str, bound: usize, seps: &[Separator]) -> Vec<String> {
    if char_len(text) <= bound {
        return vec![text.to_string()];
    }
    let Some(idx) = seps.iter().position(|sep| text.contains(sep.pattern)) else {
        return char_windows(text, bound);
    };
    let sep = &seps[idx];
    let parts = match sep.affinity {
        Affinity::Next => split_before(text, sep.pattern),
        Affinity::Previous => split_after(text, sep.pattern),
    };
    merge_parts(parts, bound, &seps[idx + 1..])
}

/// Greedily packs parts back together up to `bound`; parts still too large
/// recurse with the finer separators.
fn merge_parts(parts: Vec<String>, bound: usize, rest: &[Separator]) -> Vec<String> {
    let mut spans = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;
    for part in parts {
        let part_len = char_len(&part);
        if part_len > bound {
            if !buf.is_empty() {
                spans.push(std::mem::take(&mut buf));
                buf_len = 0;
            }
            spans.extend(split_spans(&part, bound, rest));
            continue;
        }
        if buf_len + part_len > bound && !buf.is_empty() {
            spans.push(std::mem::take(&mut buf));
            buf_len = 0;
        }
        buf.push_str(&part);
        buf_len += part_len;
    }
    if !buf.is_empty() {
        spans.push(buf);
    }
    spans
}

/// Folds whitespace-only spans into a neighbour so every character of the
/// input survives into some chunk. The preceding span absorbs the run when it
/// still fits the bound; otherwise the run prefixes the next non-whitespace
/// span. A trailing run with no following span joins the last span regardless.
fn coalesce_whitespace(spans: Vec<String>, bound: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending = String::new();
    for span in spans {
        if span.trim().is_empty() {
            match out.last_mut() {
                Some(prev) if char_len(prev) + char_len(&span) <= bound => prev.push_str(&span),
                _ => pending.push_str(&span),
            }
            continue;
        }
        if pending.is_empty() {
            out.push(span);
        } else {
            out.push(format!("{}{span}", std::mem::take(&mut pending)));
        }
    }
    if !pending.is_empty() {
        if out.is_empty() {
            out.push(pending);
        } else {
            let last = out.len() - 1;
            out[last].push_str(&pending);
        }
    }
    out
}

/// Splits `text` so each occurrence of `sep` *begins* a new part.
fn split_before(text: &str, sep: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut search = 0;
    while let Some(found) = text[search..].find(sep) {
        let pos = search + found;
        if pos > start {
            parts.push(text[start..pos].to_string());
        }
        start = pos;
        search = pos + sep.len();
    }
    if start < text.len() || parts.is_empty() {
        parts.push(text[start..].to_string());
    }
    parts
}

/// Splits `text` so each occurrence of `sep` *ends* the preceding part.
fn split_after(text: &str, sep: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(found) = text[start..].find(sep) {
        let end = start + found + sep.len();
        parts.push(text[start..end].to_string());
        start = end;
    }
    if start < text.len() {
        parts.push(text[start..].to_string());
    }
    parts
}

/// Last-resort split into fixed character windows, for tokens that exceed
/// the bound on their own.
fn char_windows(text: &str, bound: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        buf.push(ch);
        count += 1;
        if count == bound {
            out.push(std::mem::take(&mut buf));
            count = 0;
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}
