//! Section-level types.

use super::{Block, TextStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identity of a section, assigned once by the parser.
///
/// Ids survive reordering and reclassification, so changes and user edits
/// can refer to a section regardless of where it currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl FromStr for SectionId {
    type Err = String;

    /// Accepts `s3` as well as a bare `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('s');
        digits
            .parse()
            .map(SectionId)
            .map_err(|_| format!("invalid section id: {}", s))
    }
}

/// Semantic type of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    /// Abstract
    Abstract,
    /// Keywords / Index Terms
    Keywords,
    /// Introduction
    Introduction,
    /// Related work / background
    RelatedWork,
    /// Literature review
    LiteratureReview,
    /// Methodology / methods / approach
    Methodology,
    /// Results / experiments
    Results,
    /// Discussion / analysis
    Discussion,
    /// Conclusion
    Conclusion,
    /// Future work
    FutureWork,
    /// Acknowledgments
    Acknowledgments,
    /// References / bibliography
    References,
    /// Appendix
    Appendix,
    /// Heading did not match the vocabulary
    Uncategorized,
}

impl SectionType {
    /// All section types in declaration order.
    pub const ALL: [SectionType; 14] = [
        SectionType::Abstract,
        SectionType::Keywords,
        SectionType::Introduction,
        SectionType::RelatedWork,
        SectionType::LiteratureReview,
        SectionType::Methodology,
        SectionType::Results,
        SectionType::Discussion,
        SectionType::Conclusion,
        SectionType::FutureWork,
        SectionType::Acknowledgments,
        SectionType::References,
        SectionType::Appendix,
        SectionType::Uncategorized,
    ];

    /// Human-readable name, used as the canonical heading text.
    pub fn name(&self) -> &'static str {
        match self {
            SectionType::Abstract => "Abstract",
            SectionType::Keywords => "Keywords",
            SectionType::Introduction => "Introduction",
            SectionType::RelatedWork => "Related Work",
            SectionType::LiteratureReview => "Literature Review",
            SectionType::Methodology => "Methodology",
            SectionType::Results => "Results",
            SectionType::Discussion => "Discussion",
            SectionType::Conclusion => "Conclusion",
            SectionType::FutureWork => "Future Work",
            SectionType::Acknowledgments => "Acknowledgments",
            SectionType::References => "References",
            SectionType::Appendix => "Appendix",
            SectionType::Uncategorized => "Uncategorized",
        }
    }

    /// Whether a document may contain at most one section of this type.
    pub fn is_singular(&self) -> bool {
        !matches!(self, SectionType::Appendix | SectionType::Uncategorized)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SectionType {
    type Err = String;

    /// Accepts the display name or its snake_case form, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        SectionType::ALL
            .into_iter()
            .find(|kind| {
                kind.name()
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .eq(wanted.chars())
            })
            .ok_or_else(|| format!("unknown section type: {}", s))
    }
}

/// A semantically-typed region of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identity
    pub id: SectionId,

    /// Semantic type
    pub kind: SectionType,

    /// Current heading text
    pub heading: Option<String>,

    /// Heading text as it appeared in the source
    pub original_heading: Option<String>,

    /// Position in the document (0-based, equals index in `Document::sections`)
    pub order: u32,

    /// Position in the source document
    pub source_index: u32,

    /// Classifier confidence for `kind` (0.0 - 1.0)
    #[serde(default)]
    pub confidence: f32,

    /// Heading text style
    #[serde(default)]
    pub heading_style: TextStyle,

    /// Content blocks
    pub blocks: Vec<Block>,
}

impl Section {
    /// Create a new section with the given type and heading.
    pub fn new(id: SectionId, kind: SectionType, heading: Option<String>) -> Self {
        Self {
            id,
            kind,
            original_heading: heading.clone(),
            heading,
            order: 0,
            source_index: 0,
            confidence: 1.0,
            heading_style: TextStyle::default(),
            blocks: Vec::new(),
        }
    }

    /// Add a block to the section.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Heading text or an empty string.
    pub fn heading_text(&self) -> &str {
        self.heading.as_deref().unwrap_or("")
    }

    /// Check whether the section has a non-blank heading.
    pub fn has_heading(&self) -> bool {
        self.heading
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }

    /// Plain text of all blocks, one block per line.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Word count over body text (subheadings and captions excluded).
    pub fn word_count(&self) -> usize {
        self.blocks.iter().map(|b| b.word_count()).sum()
    }
}
