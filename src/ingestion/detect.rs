//! Structural element detection for chunk classification.
//!
//! Classification is an ordered table of predicate → label rules evaluated
//! first-match-wins. The ordering is deliberate: numeric/tabular evidence
//! outranks narrative figure references, so a span mentioning both a table
//! and a figure is classified [`ElementType::Table`].
//!
//! The rule table is exposed via [`rules`] so tests can enumerate it directly
//! instead of probing the classifier blind.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Marker wrapped around detected table regions during page annotation.
pub const TABLE_START_MARKER: &str = "[TABLE_START]";
/// Closes a [`TABLE_START_MARKER`] region.
pub const TABLE_END_MARKER: &str = "[TABLE_END]";
/// Annotation appended to pages that reference charts or figures.
pub const IMAGE_REFERENCE_MARKER: &str = "[IMAGE_REFERENCE]";

/// Coarse content classification of a chunk.
///
/// Mutually exclusive; a page may still yield chunks of mixed element types
/// because classification runs per chunk, after splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// Narrative prose. The default when no structural evidence matches.
    Text,
    /// Tabular or numeric data.
    Table,
    /// A figure, chart, graph, or diagram reference.
    Figure,
    /// Annex / appendix material.
    Annex,
}

impl ElementType {
    /// Content-type tag carried alongside the element type in chunk metadata.
    pub fn content_tag(&self) -> &'static str {
        match self {
            Self::Text => "descriptive",
            Self::Table => "numerical_data",
            Self::Figure => "visual_analysis",
            Self::Annex => "technical_appendix",
        }
    }

    /// Parses a loosely-spelled element type from retrieved metadata.
    ///
    /// Accepts `"image"` as an alias for [`ElementType::Figure`]; earlier
    /// revisions of the storage layer persisted figures under that name.
    /// Unknown spellings fall back to [`ElementType::Text`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "figure" | "image" => Self::Figure,
            "annex" => Self::Annex,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Table => write!(f, "table"),
            Self::Figure => write!(f, "figure"),
            Self::Annex => write!(f, "annex"),
        }
    }
}

static CURRENCY_OR_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*\s*[%$€£]").expect("valid currency pattern"));

static TABLE_CAPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Table \d+").expect("valid table caption pattern"));

static FIGURE_CAPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Figure \d+").expect("valid figure caption pattern"));

// Token-bounded so narrative words like "paragraph" don't register as charts.
static VISUAL_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(chart|graph|diagram)s?\b").expect("valid visual token pattern")
});

/// Returns `true` when a single line looks like a table row: at least two
/// pipe or tab separators, or a numeric token with a currency/percent symbol.
pub fn is_table_line(line: &str) -> bool {
    line.matches('|').count() >= 2
        || line.matches('\t').count() >= 2
        || CURRENCY_OR_PERCENT.is_match(line)
}

fn matches_table(span: &str) -> bool {
    span.contains(TABLE_START_MARKER)
        || span.lines().any(is_table_line)
        || TABLE_CAPTION.is_match(span)
}

fn matches_figure(span: &str) -> bool {
    FIGURE_CAPTION.is_match(span)
        || VISUAL_TOKENS.is_match(span)
        || span.contains(IMAGE_REFERENCE_MARKER)
}

fn matches_annex(span: &str) -> bool {
    span.contains("Annex")
}

/// A single predicate → label rule in the detection table.
pub struct DetectionRule {
    /// Stable rule name, for diagnostics and test enumeration.
    pub name: &'static str,
    /// Label assigned when the predicate matches.
    pub label: ElementType,
    predicate: fn(&str) -> bool,
}

impl DetectionRule {
    /// Evaluates this rule's predicate against a span.
    pub fn matches(&self, span: &str) -> bool {
        (self.predicate)(span)
    }
}

/// The ordered detection table. First match wins; [`ElementType::Text`] is
/// the implicit default when nothing matches.
pub fn rules() -> &'static [DetectionRule] {
    const RULES: &[DetectionRule] = &[
        DetectionRule {
            name: "table",
            label: ElementType::Table,
            predicate: matches_table,
        },
        DetectionRule {
            name: "figure",
            label: ElementType::Figure,
            predicate: matches_figure,
        },
        DetectionRule {
            name: "annex",
            label: ElementType::Annex,
            predicate: matches_annex,
        },
    ];
    RULES
}

/// Classifies a span of text as its dominant element type.
///
/// Deterministic: the same span always yields the same label.
pub fn classify(span: &str) -> ElementType {
    rules()
        .iter()
        .find(|rule| rule.matches(span))
        .map(|rule| rule.label)
        .unwrap_or(ElementType::Text)
}
