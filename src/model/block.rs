//! Block and text-level types.

use serde::{Deserialize, Serialize};

/// A typed content unit owned by exactly one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block content
    pub content: BlockContent,

    /// Character-level style
    #[serde(default)]
    pub text_style: TextStyle,

    /// Paragraph-level style
    #[serde(default)]
    pub paragraph_style: ParagraphStyle,
}

impl Block {
    /// Create a block with default styling.
    pub fn new(content: BlockContent) -> Self {
        Self {
            content,
            text_style: TextStyle::default(),
            paragraph_style: ParagraphStyle::default(),
        }
    }

    /// Create a body text paragraph.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(BlockContent::Text { text: text.into() })
    }

    /// Create a subsection heading.
    pub fn subheading(text: impl Into<String>) -> Self {
        Self::new(BlockContent::Subheading { text: text.into() })
    }

    /// Create a figure reference with its caption.
    pub fn figure(caption: impl Into<String>, source: Option<String>) -> Self {
        Self::new(BlockContent::Figure {
            caption: caption.into(),
            source,
        })
    }

    /// Create a table with its caption.
    pub fn table(caption: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self::new(BlockContent::Table {
            caption: caption.into(),
            rows,
        })
    }

    /// Create a display equation.
    pub fn equation(tex: impl Into<String>) -> Self {
        Self::new(BlockContent::Equation { tex: tex.into() })
    }

    /// Get plain text content of the block.
    pub fn plain_text(&self) -> String {
        match &self.content {
            BlockContent::Text { text } | BlockContent::Subheading { text } => text.clone(),
            BlockContent::Figure { caption, .. } => caption.clone(),
            BlockContent::Table { caption, rows } => {
                let mut lines = vec![caption.clone()];
                lines.extend(rows.iter().map(|r| r.join("\t")));
                lines.join("\n")
            }
            BlockContent::Equation { tex } => tex.clone(),
        }
    }

    /// Body text of a text paragraph.
    pub fn body_text(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Mutable body text of a text paragraph.
    pub fn body_text_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            BlockContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Caption of a figure or table.
    pub fn caption(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Figure { caption, .. } | BlockContent::Table { caption, .. } => {
                Some(caption)
            }
            _ => None,
        }
    }

    /// Check whether this is a body text paragraph.
    pub fn is_text(&self) -> bool {
        matches!(self.content, BlockContent::Text { .. })
    }

    /// Check whether this is a subsection heading.
    pub fn is_subheading(&self) -> bool {
        matches!(self.content, BlockContent::Subheading { .. })
    }

    /// Number of whitespace-separated words in body text.
    pub fn word_count(&self) -> usize {
        self.body_text()
            .map(|t| t.split_whitespace().count())
            .unwrap_or(0)
    }
}

/// Content of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    /// A paragraph of body text
    Text {
        /// Paragraph text (may contain citation markers)
        text: String,
    },

    /// A subsection heading inside a section
    Subheading {
        /// Heading text
        text: String,
    },

    /// A figure reference
    Figure {
        /// Figure caption
        caption: String,
        /// Image path or identifier
        source: Option<String>,
    },

    /// A table
    Table {
        /// Table caption
        caption: String,
        /// Cell text, row-major
        rows: Vec<Vec<String>>,
    },

    /// A display equation
    Equation {
        /// Equation source (TeX)
        tex: String,
    },
}

/// Character-level styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font family name
    pub font_family: Option<String>,

    /// Font size in points
    pub font_size: Option<f32>,

    /// Bold text
    #[serde(default)]
    pub bold: bool,

    /// Italic text
    #[serde(default)]
    pub italic: bool,
}

impl TextStyle {
    /// Create a text style from its parts.
    pub fn new(font_family: impl Into<String>, font_size: f32, bold: bool, italic: bool) -> Self {
        Self {
            font_family: Some(font_family.into()),
            font_size: Some(font_size),
            bold,
            italic,
        }
    }

    /// Check if any styling is applied.
    pub fn has_styling(&self) -> bool {
        self.font_family.is_some() || self.font_size.is_some() || self.bold || self.italic
    }
}

/// Paragraph styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Text alignment
    pub alignment: Option<Alignment>,

    /// Line spacing multiplier (1.0 = single, 2.0 = double)
    pub line_spacing: Option<f32>,

    /// Space before paragraph in points
    pub space_before: Option<f32>,

    /// Space after paragraph in points
    pub space_after: Option<f32>,

    /// First line indent in points
    pub first_line_indent: Option<f32>,
}

/// Text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// WordprocessingML `w:jc` value.
    pub fn as_ooxml(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }

    /// Parse a WordprocessingML `w:jc` value.
    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }
}
