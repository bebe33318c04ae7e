//! Citation rendering for retrieved chunks.
//!
//! Retrieval hands back loosely-shaped records: sometimes a plain metadata
//! map, sometimes a `{"metadata": {...}}`-tagged object, with page numbers
//! stored as integers, floats, or strings depending on what wrote them.
//! [`Provenance::from_value`] is the single normalizing constructor that
//! folds all of those shapes into one canonical form, so shape checks never
//! leak into the rest of the pipeline.
//!
//! Everything here is a pure function over in-memory data; records without
//! usable metadata are skipped (debug-logged), never raised to the caller.
//! Citations are display-only values, recomputed on every response.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::ingestion::{Chunk, ChunkMetadata, ElementType};

/// A page reference that may be unknown after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageLabel {
    /// A concrete 0-or-positive page number.
    Page(u64),
    /// Missing or unparseable; renders as `N/A`.
    Unknown,
}

impl PageLabel {
    /// Normalizes a raw JSON page value.
    ///
    /// Integers pass through; floats and numeric strings are truncated to the
    /// nearest integer (`5.0` → `5`); anything else — including negatives —
    /// becomes [`PageLabel::Unknown`].
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_u64() {
                    Self::Page(i)
                } else if let Some(f) = n.as_f64() {
                    Self::from_float(f)
                } else {
                    Self::Unknown
                }
            }
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<u64>() {
                    Self::Page(i)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Self::from_float(f)
                } else {
                    Self::Unknown
                }
            }
            _ => Self::Unknown,
        }
    }

    fn from_float(f: f64) -> Self {
        if f >= 0.0 {
            Self::Page(f.trunc() as u64)
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for PageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Unknown => write!(f, "N/A"),
        }
    }
}

/// Canonical provenance of one retrieved chunk: the citation dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub source_id: String,
    pub page: PageLabel,
    pub element_type: ElementType,
}

impl Provenance {
    /// Normalizes a retrieved record of either supported shape.
    ///
    /// Accepts a plain metadata map or an object carrying a `metadata` key.
    /// Field fallbacks: `source_id`/`source`, `page_number`/`page`; a missing
    /// element type defaults to text, and the legacy `"image"` spelling maps
    /// to figure. Returns `None` when the value holds no usable metadata at
    /// all (non-object, or none of the known fields present).
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(outer) = value else {
            tracing::debug!("skipping non-object retrieval record");
            return None;
        };
        let map = match outer.get("metadata") {
            Some(Value::Object(inner)) => inner,
            _ => outer,
        };

        let source = map
            .get("source_id")
            .or_else(|| map.get("source"))
            .and_then(Value::as_str);
        let page_value = map.get("page_number").or_else(|| map.get("page"));
        let element = map.get("element_type").and_then(Value::as_str);

        if source.is_none() && page_value.is_none() && element.is_none() {
            tracing::debug!("skipping retrieval record without citation metadata");
            return None;
        }

        Some(Self {
            source_id: source.unwrap_or_default().to_string(),
            page: PageLabel::from_value(page_value),
            element_type: element.map(ElementType::parse_lenient).unwrap_or(ElementType::Text),
        })
    }
}

impl From<&ChunkMetadata> for Provenance {
    fn from(metadata: &ChunkMetadata) -> Self {
        Self {
            source_id: metadata.source_id.clone(),
            page: PageLabel::Page(u64::from(metadata.page_number)),
            element_type: metadata.element_type,
        }
    }
}

/// A rendered citation. Derived and display-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub source_id: String,
    pub page: PageLabel,
    pub element_type: ElementType,
    /// The human-readable label, deterministic in `(page, element_type)`.
    pub label: String,
}

impl Citation {
    fn new(provenance: Provenance) -> Self {
        let label = render_label(provenance.element_type, provenance.page);
        Self {
            source_id: provenance.source_id,
            page: provenance.page,
            element_type: provenance.element_type,
            label,
        }
    }

    /// Label qualified with the originating document, e.g.
    /// `📄 Page 5 of 'doc.pdf'`.
    pub fn qualified_label(&self) -> String {
        format!("{} of '{}'", self.label, self.source_id)
    }
}

fn render_label(element_type: ElementType, page: PageLabel) -> String {
    match element_type {
        ElementType::Table => format!("📊 Table on Page {page}"),
        ElementType::Figure => format!("🖼️ Image on Page {page}"),
        ElementType::Annex | ElementType::Text => format!("📄 Page {page}"),
    }
}

/// Deduplicates and renders provenance metadata into citation lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationFormatter;

impl CitationFormatter {
    /// Unique citations for a set of retrieved records, in first-seen order.
    ///
    /// Dedup key is `(source_id, page, element_type)`; the first record to
    /// produce a key wins.
    pub fn citations(records: &[Value]) -> Vec<Citation> {
        let mut seen: HashSet<Provenance> = HashSet::new();
        let mut citations = Vec::new();
        for record in records {
            let Some(provenance) = Provenance::from_value(record) else {
                continue;
            };
            if seen.insert(provenance.clone()) {
                citations.push(Citation::new(provenance));
            }
        }
        citations
    }

    /// Citations for strongly typed chunks, same dedup rules.
    pub fn citations_for_chunks(chunks: &[Chunk]) -> Vec<Citation> {
        let mut seen: HashSet<Provenance> = HashSet::new();
        let mut citations = Vec::new();
        for chunk in chunks {
            let provenance = Provenance::from(&chunk.metadata);
            if seen.insert(provenance.clone()) {
                citations.push(Citation::new(provenance));
            }
        }
        citations
    }

    /// Deduplicated labels, lexicographically sorted for stable output.
    ///
    /// Identical labels from different sources collapse to one line; use
    /// [`CitationFormatter::format_qualified`] to keep sources distinct.
    pub fn format(records: &[Value]) -> Vec<String> {
        let mut labels: Vec<String> = Self::citations(records)
            .into_iter()
            .map(|c| c.label)
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Like [`CitationFormatter::format`] but each label names its document.
    pub fn format_qualified(records: &[Value]) -> Vec<String> {
        let mut labels: Vec<String> = Self::citations(records)
            .iter()
            .map(Citation::qualified_label)
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Renders a `**Sources:**` block grouped by element type, with tables
    /// first, then images, then text references (annexes count as text).
    ///
    /// Returns an empty string when no record yields a citation.
    pub fn format_grouped(records: &[Value]) -> String {
        let citations = Self::citations(records);
        if citations.is_empty() {
            return String::new();
        }

        let mut tables = Vec::new();
        let mut images = Vec::new();
        let mut texts = Vec::new();
        for citation in &citations {
            match citation.element_type {
                ElementType::Table => tables.push(citation.label.clone()),
                ElementType::Figure => images.push(citation.label.clone()),
                ElementType::Text | ElementType::Annex => texts.push(citation.label.clone()),
            }
        }

        let mut out = String::from("**Sources:**\n");
        for (heading, mut group) in [
            ("**Tables:**", tables),
            ("**Images:**", images),
            ("**Text References:**", texts),
        ] {
            if group.is_empty() {
                continue;
            }
            group.sort();
            group.dedup();
            out.push('\n');
            out.push_str(heading);
            out.push('\n');
            for label in group {
                out.push_str("- ");
                out.push_str(&label);
                out.push('\n');
            }
        }
        out
    }

    /// Appends up to `max_display` sorted source labels to an answer.
    ///
    /// Truncation is purely presentational; the underlying citation set stays
    /// deduplicated and sorted. The answer comes back untouched when nothing
    /// is citable.
    pub fn append_sources(answer: &str, records: &[Value], max_display: usize) -> String {
        let labels = Self::format(records);
        if labels.is_empty() {
            return answer.to_string();
        }
        let mut out = format!("{answer}\n\n**Sources:**\n");
        for label in labels.iter().take(max_display) {
            out.push_str("- ");
            out.push_str(label);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_keys_collapse_to_one_citation() {
        let records = vec![
            json!({"source": "doc.pdf", "page": 5, "element_type": "table"}),
            json!({"source": "doc.pdf", "page": 5, "element_type": "table"}),
        ];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📊 Table on Page 5"]);
    }

    #[test]
    fn float_pages_are_truncated() {
        let records = vec![json!({"source": "doc.pdf", "page": 5.0, "element_type": "text"})];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📄 Page 5"]);
    }

    #[test]
    fn numeric_string_pages_parse() {
        let records = vec![
            json!({"source": "doc.pdf", "page": "7", "element_type": "table"}),
            json!({"source": "doc.pdf", "page": "9.0", "element_type": "text"}),
        ];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📄 Page 9", "📊 Table on Page 7"]);
    }

    #[test]
    fn missing_page_renders_not_available() {
        let records = vec![json!({"source": "doc.pdf", "element_type": "text"})];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📄 Page N/A"]);
    }

    #[test]
    fn both_record_shapes_are_accepted() {
        let tagged = json!({"metadata": {"source": "a.pdf", "page": 1, "element_type": "figure"}});
        let plain = json!({"source_id": "b.pdf", "page_number": 2, "element_type": "annex"});
        let labels = CitationFormatter::format(&[tagged, plain]);
        assert_eq!(labels, vec!["📄 Page 2", "🖼️ Image on Page 1"]);
    }

    #[test]
    fn legacy_image_spelling_maps_to_figure() {
        let image = json!({"source": "doc.pdf", "page": 3, "element_type": "image"});
        let figure = json!({"source": "doc.pdf", "page": 3, "element_type": "figure"});
        // Both spellings normalize to the same key: one citation survives.
        let citations = CitationFormatter::citations(&[image, figure]);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].element_type, ElementType::Figure);
        assert_eq!(citations[0].label, "🖼️ Image on Page 3");
    }

    #[test]
    fn unusable_records_are_skipped_silently() {
        let records = vec![
            json!("just a string"),
            json!(42),
            json!({"score": 0.93}),
            json!({"source": "doc.pdf", "page": 1, "element_type": "text"}),
        ];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📄 Page 1"]);
    }

    #[test]
    fn missing_element_type_defaults_to_text() {
        let records = vec![json!({"source": "doc.pdf", "page": 8})];
        let labels = CitationFormatter::format(&records);
        assert_eq!(labels, vec!["📄 Page 8"]);
    }

    #[test]
    fn output_is_lexicographically_sorted() {
        let records = vec![
            json!({"source": "doc.pdf", "page": 2, "element_type": "figure"}),
            json!({"source": "doc.pdf", "page": 1, "element_type": "table"}),
            json!({"source": "doc.pdf", "page": 3, "element_type": "text"}),
        ];
        let labels = CitationFormatter::format(&records);
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }

    #[test]
    fn identical_labels_across_sources_collapse_in_compact_format() {
        let records = vec![
            json!({"source": "a.pdf", "page": 5, "element_type": "table"}),
            json!({"source": "b.pdf", "page": 5, "element_type": "table"}),
        ];
        assert_eq!(
            CitationFormatter::format(&records),
            vec!["📊 Table on Page 5"]
        );
        // The qualified format keeps them apart.
        assert_eq!(
            CitationFormatter::format_qualified(&records),
            vec![
                "📊 Table on Page 5 of 'a.pdf'",
                "📊 Table on Page 5 of 'b.pdf'",
            ]
        );
    }

    #[test]
    fn grouped_format_orders_tables_images_text() {
        let records = vec![
            json!({"source": "doc.pdf", "page": 1, "element_type": "text"}),
            json!({"source": "doc.pdf", "page": 2, "element_type": "figure"}),
            json!({"source": "doc.pdf", "page": 3, "element_type": "table"}),
            json!({"source": "doc.pdf", "page": 4, "element_type": "annex"}),
        ];
        let block = CitationFormatter::format_grouped(&records);
        let tables_at = block.find("**Tables:**").unwrap();
        let images_at = block.find("**Images:**").unwrap();
        let texts_at = block.find("**Text References:**").unwrap();
        assert!(tables_at < images_at && images_at < texts_at);
        assert!(block.contains("- 📊 Table on Page 3"));
        assert!(block.contains("- 📄 Page 4"));
    }

    #[test]
    fn grouped_format_of_nothing_is_empty() {
        assert_eq!(CitationFormatter::format_grouped(&[]), "");
        assert_eq!(CitationFormatter::format_grouped(&[json!(1)]), "");
    }

    #[test]
    fn append_sources_truncates_for_display() {
        let records: Vec<Value> = (1..=5)
            .map(|p| json!({"source": "doc.pdf", "page": p, "element_type": "text"}))
            .collect();
        let out = CitationFormatter::append_sources("The answer.", &records, 3);
        assert!(out.starts_with("The answer.\n\n**Sources:**\n"));
        assert_eq!(out.matches("- 📄 Page").count(), 3);
    }

    #[test]
    fn append_sources_leaves_answer_alone_without_citations() {
        assert_eq!(
            CitationFormatter::append_sources("The answer.", &[], 3),
            "The answer."
        );
    }

    #[test]
    fn typed_chunk_metadata_round_trips_through_provenance() {
        let metadata = ChunkMetadata {
            source_id: "doc.pdf".into(),
            page_number: 5,
            element_type: ElementType::Table,
            chunk_sequence: 0,
            content_type: "numerical_data".into(),
            has_table_marker: true,
            has_figure_marker: false,
        };
        let provenance = Provenance::from(&metadata);
        assert_eq!(provenance.page, PageLabel::Page(5));

        // Serialized metadata normalizes back to the same provenance.
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(Provenance::from_value(&value).unwrap(), provenance);
    }
}
