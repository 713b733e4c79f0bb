//! Export options.

use crate::error::ExportError;
use std::fmt;
use std::str::FromStr;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    /// Canonical JSON
    #[default]
    Json,
    /// Markdown
    Markdown,
    /// Plain text
    Text,
    /// Office Open XML word processing document
    Docx,
    /// PDF typeset with Typst (feature `pdf`)
    Pdf,
}

impl ExportFormat {
    /// All formats.
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Json,
        ExportFormat::Markdown,
        ExportFormat::Text,
        ExportFormat::Docx,
        ExportFormat::Pdf,
    ];

    /// Short name.
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Check whether the format keeps every field of the document.
    pub fn is_lossless(&self) -> bool {
        matches!(self, ExportFormat::Json)
    }

    /// Check whether the output is binary rather than text.
    pub fn is_binary(&self) -> bool {
        matches!(self, ExportFormat::Docx | ExportFormat::Pdf)
    }

    /// Check whether this build can export the format.
    pub fn is_available(&self) -> bool {
        match self {
            ExportFormat::Pdf => cfg!(feature = "pdf"),
            _ => true,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            "docx" => Ok(ExportFormat::Docx),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(ExportError::UnsupportedTarget(other.to_string())),
        }
    }
}

/// Options for [`export`](super::export).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Output format
    pub format: ExportFormat,

    /// Pretty-print JSON
    pub pretty: bool,

    /// Include the change log
    pub annotate: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            pretty: true,
            annotate: false,
        }
    }
}

impl ExportOptions {
    /// Create options for a format.
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Set JSON pretty-printing.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Include the change log in the output.
    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("docx".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!(
            "odt".parse::<ExportFormat>().unwrap_err(),
            ExportError::UnsupportedTarget("odt".to_string())
        );
    }

    #[test]
    fn test_binary_formats() {
        assert!(ExportFormat::Pdf.is_binary());
        assert!(ExportFormat::Docx.is_binary());
        assert!(!ExportFormat::Markdown.is_binary());
        assert_eq!(ExportFormat::Pdf.is_available(), cfg!(feature = "pdf"));
    }

    #[test]
    fn test_builder() {
        let options = ExportOptions::new(ExportFormat::Text)
            .with_pretty(false)
            .with_annotations(true);
        assert_eq!(options.format, ExportFormat::Text);
        assert!(!options.pretty);
        assert!(options.annotate);
    }
}
