//! Document-level types.

use super::{Bibliography, Section, SectionId, SectionType, TextStyle};
use serde::{Deserialize, Serialize};

/// A parsed manuscript.
///
/// Owns all sections exclusively. `sections` is kept in document order and
/// each section's `order` equals its index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, authors, etc.)
    pub metadata: Metadata,

    /// Sections in document order
    pub sections: Vec<Section>,

    /// Reference list
    #[serde(default)]
    pub bibliography: Bibliography,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        let mut doc = Self::new();
        doc.metadata.title = Some(title.into());
        doc
    }

    /// Number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Check if the document has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Append a section, assigning it a fresh id and the next order index.
    ///
    /// Returns the assigned id.
    pub fn push_section(&mut self, mut section: Section) -> SectionId {
        let id = self.next_section_id();
        section.id = id;
        section.order = self.sections.len() as u32;
        section.source_index = self
            .sections
            .iter()
            .map(|s| s.source_index + 1)
            .max()
            .unwrap_or(0);
        self.sections.push(section);
        id
    }

    /// Next unused section id.
    pub fn next_section_id(&self) -> SectionId {
        SectionId(self.sections.iter().map(|s| s.id.0 + 1).max().unwrap_or(0))
    }

    /// Get a section by id.
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Get a mutable section by id.
    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Current position of a section.
    pub fn position(&self, id: SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    /// First section of the given type.
    pub fn find_kind(&self, kind: SectionType) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Check whether a section of the given type exists.
    pub fn has_kind(&self, kind: SectionType) -> bool {
        self.find_kind(kind).is_some()
    }

    /// Section ids in current order.
    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|s| s.id).collect()
    }

    /// Section ids in the order they appeared in the source.
    pub fn original_order(&self) -> Vec<SectionId> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.source_index);
        sections.iter().map(|s| s.id).collect()
    }

    /// Reassign `order` so it matches the current positions.
    pub fn renumber(&mut self) {
        for (i, section) in self.sections.iter_mut().enumerate() {
            section.order = i as u32;
        }
    }

    /// Abstract text, if an abstract section exists.
    pub fn abstract_text(&self) -> Option<String> {
        self.find_kind(SectionType::Abstract).map(|s| s.plain_text())
    }

    /// Total word count over body text.
    pub fn word_count(&self) -> usize {
        self.sections.iter().map(|s| s.word_count()).sum()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref title) = self.metadata.title {
            parts.push(title.clone());
        }
        for section in &self.sections {
            let mut part = String::new();
            if let Some(ref heading) = section.heading {
                part.push_str(heading);
                part.push('\n');
            }
            part.push_str(&section.plain_text());
            parts.push(part);
        }
        parts.join("\n\n")
    }

    /// Check the structural invariants of the model.
    ///
    /// Order indices must be `0..n` in position order, section ids unique,
    /// singular section types present at most once, and bibliography keys
    /// unique.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (i, section) in self.sections.iter().enumerate() {
            if section.order as usize != i {
                return Err(format!(
                    "section {} has order {} at position {}",
                    section.id, section.order, i
                ));
            }
        }

        let mut ids: Vec<SectionId> = self.section_ids();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err("duplicate section id".to_string());
        }

        for kind in SectionType::ALL.iter().filter(|k| k.is_singular()) {
            let count = self.sections.iter().filter(|s| s.kind == *kind).count();
            if count > 1 {
                return Err(format!("section type {} appears {} times", kind, count));
            }
        }

        if !self.bibliography.has_unique_keys() {
            return Err("duplicate bibliography key".to_string());
        }

        Ok(())
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Author names
    #[serde(default)]
    pub authors: Vec<String>,

    /// Affiliation / contact lines
    #[serde(default)]
    pub affiliations: Vec<String>,

    /// Keywords (index terms)
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Source container format (e.g. "docx")
    pub source_format: Option<String>,

    /// Title text style
    #[serde(default)]
    pub title_style: TextStyle,

    /// Page layout, when the source carries one
    pub layout: Option<PageLayout>,
}

impl Metadata {
    /// Authors joined for display.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}

/// Page geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page margins in inches
    pub margins: Margins,

    /// Number of text columns
    pub columns: u8,

    /// Gap between columns in inches
    pub column_gap: f32,
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    /// Top margin
    pub top: f32,
    /// Bottom margin
    pub bottom: f32,
    /// Left margin
    pub left: f32,
    /// Right margin
    pub right: f32,
}

impl Margins {
    /// Compare two margin sets within a tolerance (inches).
    pub fn approx_eq(&self, other: &Margins, tolerance: f32) -> bool {
        (self.top - other.top).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
            && (self.left - other.left).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
    }
}
