//! Parsing options and configuration.

use crate::detect::SourceFormat;

/// Options for parsing manuscripts.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Declared source format (`None` = detect from bytes)
    pub format: Option<SourceFormat>,

    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Apply Unicode NFC normalization to all text
    pub normalize_unicode: bool,

    /// Turn "Fig. 1." / "TABLE I" paragraphs into figure and table blocks
    pub detect_captions: bool,

    /// Maximum length of a bold paragraph that still counts as a heading
    pub bold_heading_max_chars: usize,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the source format instead of detecting it.
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (repair invariant violations in canonical input).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Enable or disable Unicode normalization.
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize_unicode = normalize;
        self
    }

    /// Enable or disable caption detection.
    pub fn with_caption_detection(mut self, detect: bool) -> Self {
        self.detect_captions = detect;
        self
    }

    /// Set the bold heading length limit.
    pub fn with_bold_heading_max_chars(mut self, chars: usize) -> Self {
        self.bold_heading_max_chars = chars;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            format: None,
            error_mode: ErrorMode::Strict,
            normalize_unicode: true,
            detect_captions: true,
            bold_heading_max_chars: 100,
        }
    }
}

/// Error handling mode during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Reject canonical documents that break model invariants
    #[default]
    Strict,
    /// Repair what can be repaired (renumber, demote duplicates) and log it
    Lenient,
}
