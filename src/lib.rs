//! # ieeefmt
//!
//! Manuscript analysis and reformatting against IEEE conference rules.
//!
//! This library parses a manuscript into a structured document, detects
//! violations of a rule set, rewrites the document to comply, converts
//! citations to IEEE numeric style, records every change, scores compliance
//! and exports the result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ieeefmt::{parse_file, ExportFormat, RuleSet};
//!
//! fn main() -> ieeefmt::Result<()> {
//!     let doc = parse_file("paper.md")?;
//!
//!     let rules = RuleSet::default();
//!     let (formatted, changes) = ieeefmt::apply_formatting(&doc, &rules)?;
//!     println!("{} change(s)", changes.len());
//!
//!     let report = ieeefmt::score_with(&formatted, &rules);
//!     println!("compliance: {:.1}", report.overall);
//!
//!     let markdown = ieeefmt::export(&formatted, ExportFormat::Markdown)?;
//!     println!("{}", String::from_utf8_lossy(&markdown));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Input formats**: canonical JSON, Markdown, plain text, DOCX
//! - **Rule sets**: versioned configuration in TOML or JSON
//! - **Change tracking**: ordered, attributable record of every edit
//! - **Citations**: author-year and mixed styles to IEEE numeric
//! - **Grammar correction**: optional external service (feature `ai`)
//! - **PDF export**: Typst typesetting (feature `pdf`)
//! - **Sessions**: user edits, overrides and pluggable storage

pub mod cancel;
pub mod changes;
pub mod citation;
pub mod correct;
pub mod detect;
pub mod edits;
pub mod error;
pub mod export;
pub mod format;
pub mod issues;
pub mod model;
pub mod parser;
pub mod ruleset;
pub mod score;
pub mod session;
pub mod template;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use changes::{Change, ChangeKind, ChangeLog, DocumentDiff, Snapshot};
pub use citation::{CitationConverter, CitationReport, CitationStyle};
pub use correct::{Corrector, CorrectorConfig, GrammarService, Suggestion};
pub use detect::{detect_format_from_bytes, detect_format_from_path, SourceFormat};
pub use edits::{EditOutcome, UserEdit};
pub use error::{EditError, Error, ExportError, ParseError, Result, Warning};
pub use export::{ExportFormat, ExportOptions};
pub use format::{FormatOutcome, Formatter, FormattingRule, UserOverrides};
pub use issues::{Category, Check, Issue, IssueDetector, IssueKind, Severity};
pub use model::{
    Alignment, BibEntry, Bibliography, Block, BlockContent, Document, Location, Metadata,
    PageLayout, ParagraphStyle, Section, SectionId, SectionType, TextStyle,
};
pub use parser::{ErrorMode, ManuscriptParser, ParseOptions};
pub use ruleset::RuleSet;
pub use score::{ComplianceReport, ComplianceScorer};
pub use session::{FileStore, MemoryStore, ProcessingResult, Session, SessionStore};

use std::path::Path;
use std::sync::Arc;

/// Parse a manuscript from bytes, detecting its format.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("paper.docx").unwrap();
/// let doc = ieeefmt::parse(&data).unwrap();
/// println!("Sections: {}", doc.sections.len());
/// ```
pub fn parse(data: &[u8]) -> Result<Document> {
    ManuscriptParser::from_bytes(data)?.parse()
}

/// Parse a manuscript from bytes with custom options.
///
/// # Example
///
/// ```no_run
/// use ieeefmt::{parse_with_options, ParseOptions, SourceFormat};
///
/// let options = ParseOptions::new().with_format(SourceFormat::Text).lenient();
/// let doc = parse_with_options(b"Title\n\nIntroduction\n\nBody.", options).unwrap();
/// ```
pub fn parse_with_options(data: &[u8], options: ParseOptions) -> Result<Document> {
    ManuscriptParser::from_bytes_with_options(data, options)?.parse()
}

/// Parse a manuscript file. The extension picks the format when it is known.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    ManuscriptParser::open(path)?.parse()
}

/// Detect issues against the default IEEE conference rules.
pub fn detect_issues(doc: &Document) -> Vec<Issue> {
    detect_issues_with(doc, &RuleSet::default())
}

/// Detect issues against a rule set.
pub fn detect_issues_with(doc: &Document, rules: &RuleSet) -> Vec<Issue> {
    IssueDetector::with_defaults().detect(doc, rules)
}

/// Format a copy of the document and return it with the changes made.
///
/// The input document is left untouched.
pub fn apply_formatting(doc: &Document, rules: &RuleSet) -> Result<(Document, Vec<Change>)> {
    let mut formatted = doc.clone();
    let mut log = ChangeLog::new();
    Formatter::new().format(
        &mut formatted,
        rules,
        &UserOverrides::default(),
        &mut log,
        &CancelToken::new(),
    )?;
    Ok((formatted, log.as_slice().to_vec()))
}

/// Apply one user edit to a copy of the document.
///
/// Overrides the edit sets are dropped: a `LockSectionOrder` reorders the
/// returned document once, but later formatting may move sections back.
/// Use [`apply_user_edit_with`] or a [`Session`] to keep them.
pub fn apply_user_edit(doc: &Document, edit: &UserEdit) -> Result<(Document, Vec<Change>)> {
    apply_user_edit_with(doc, &mut UserOverrides::default(), edit)
}

/// Apply one user edit to a copy of the document, updating `overrides`.
///
/// Pass the same overrides to [`Formatter::format`] to honour locks.
pub fn apply_user_edit_with(
    doc: &Document,
    overrides: &mut UserOverrides,
    edit: &UserEdit,
) -> Result<(Document, Vec<Change>)> {
    let mut edited = doc.clone();
    let mut log = ChangeLog::new();
    edits::apply_edit(&mut edited, overrides, edit, &mut log)?;
    Ok((edited, log.as_slice().to_vec()))
}

/// Score a document against the default IEEE conference rules.
pub fn score(doc: &Document) -> ComplianceReport {
    score_with(doc, &RuleSet::default())
}

/// Score a document against a rule set.
pub fn score_with(doc: &Document, rules: &RuleSet) -> ComplianceReport {
    ComplianceScorer::new().score(doc, rules)
}

/// Export a document with default options for the format.
pub fn export(doc: &Document, format: ExportFormat) -> Result<Vec<u8>> {
    export::export(doc, None, &ExportOptions::new(format))
}

/// Export a document, optionally annotated with its change log.
pub fn export_with_options(
    doc: &Document,
    changes: Option<&[Change]>,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    export::export(doc, changes, options)
}

/// Builder that opens processing sessions with shared settings.
///
/// # Example
///
/// ```no_run
/// use ieeefmt::{ExportFormat, ExportOptions, Ieeefmt};
///
/// let mut session = Ieeefmt::new()
///     .lenient()
///     .open_session("draft", "paper.md")
///     .unwrap();
/// let result = session.process().unwrap();
/// println!("Score: {:.1}", result.report.overall);
/// let json = session.export(&ExportOptions::new(ExportFormat::Json)).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Ieeefmt {
    options: ParseOptions,
    rules: Arc<RuleSet>,
    corrector: CorrectorConfig,
}

impl Ieeefmt {
    /// Create a builder with default parse options and rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set parse options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Recover from malformed input where possible.
    pub fn lenient(mut self) -> Self {
        self.options = self.options.lenient();
        self
    }

    /// Use a rule set instead of the built-in IEEE conference rules.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// Configure the grammar corrector.
    pub fn with_corrector(mut self, config: CorrectorConfig) -> Self {
        self.corrector = config;
        self
    }

    /// Rule set new sessions use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Parse a file and open a session on it.
    pub fn open_session<P: AsRef<Path>>(&self, id: impl Into<String>, path: P) -> Result<Session> {
        let doc = ManuscriptParser::open_with_options(path, self.options.clone())?.parse()?;
        Ok(self.session(id, doc))
    }

    /// Parse bytes and open a session on them.
    pub fn session_from_bytes(&self, id: impl Into<String>, data: &[u8]) -> Result<Session> {
        let doc = ManuscriptParser::from_bytes_with_options(data, self.options.clone())?.parse()?;
        Ok(self.session(id, doc))
    }

    /// Open a session on an already parsed document.
    pub fn session(&self, id: impl Into<String>, doc: Document) -> Session {
        Session::new(id, doc, Arc::clone(&self.rules))
            .with_corrector(Corrector::from_config(self.corrector.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "# Results Before Methods\n\n\
        Ada Lovelace\n\n\
        Analytical Engine Society\n\n\
        ## Introduction\n\nWe follow prior work (Smith, 2020).\n\n\
        ## Results\n\nThe results agree with Lee (2019).\n\n\
        ## Abstract\n\nA short abstract.\n\n\
        ## References\n\n\
        - Lee, K. Engines. 2019.\n\n\
        - Smith, J. Looms. 2020.\n";

    fn paper() -> Document {
        parse(PAPER.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_markdown() {
        let doc = paper();
        assert_eq!(doc.metadata.title.as_deref(), Some("Results Before Methods"));
        assert_eq!(doc.metadata.authors, vec!["Ada Lovelace".to_string()]);
        assert_eq!(doc.bibliography.entries.len(), 2);
        assert_eq!(doc.sections[0].kind, SectionType::Introduction);
    }

    #[test]
    fn test_parse_empty_data() {
        let result = parse(b"");
        assert!(matches!(result, Err(Error::Parse(ParseError::EmptyDocument))));
    }

    #[test]
    fn test_apply_formatting_leaves_input() {
        let doc = paper();
        let rules = RuleSet::default();
        let (formatted, changes) = apply_formatting(&doc, &rules).unwrap();
        assert_eq!(doc, paper());
        assert!(!changes.is_empty());
        assert_eq!(formatted.sections[0].kind, SectionType::Abstract);
        assert!(changes.windows(2).all(|w| w[0].seq < w[1].seq));

        let (again, more) = apply_formatting(&formatted, &rules).unwrap();
        assert!(more.is_empty());
        assert_eq!(again, formatted);
    }

    #[test]
    fn test_formatting_improves_score() {
        let doc = paper();
        let (formatted, _) = apply_formatting(&doc, &RuleSet::default()).unwrap();
        assert!(score(&formatted).overall > score(&doc).overall);
        assert!(detect_issues(&formatted).len() < detect_issues(&doc).len());
    }

    #[test]
    fn test_apply_user_edit() {
        let doc = paper();
        let edit = UserEdit::SetTitle {
            title: "Engines".to_string(),
        };
        let (edited, changes) = apply_user_edit(&doc, &edit).unwrap();
        assert_eq!(edited.metadata.title.as_deref(), Some("Engines"));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::UserEdit);

        let bad = UserEdit::SetTitle {
            title: "  ".to_string(),
        };
        assert!(matches!(
            apply_user_edit(&doc, &bad),
            Err(Error::Edit(EditError::EmptyValue(_)))
        ));
    }

    #[test]
    fn test_lock_survives_only_with_overrides() {
        let doc = paper();
        let mut order = doc.section_ids();
        order.reverse();
        let edit = UserEdit::LockSectionOrder {
            order: order.clone(),
        };
        let rules = RuleSet::default();

        let (edited, _) = apply_user_edit(&doc, &edit).unwrap();
        assert_eq!(edited.section_ids(), order);
        let (reformatted, _) = apply_formatting(&edited, &rules).unwrap();
        assert_ne!(reformatted.section_ids(), order);

        let mut overrides = UserOverrides::default();
        let (mut edited, _) = apply_user_edit_with(&doc, &mut overrides, &edit).unwrap();
        assert_eq!(overrides.locked_order.as_ref(), Some(&order));
        let mut log = ChangeLog::new();
        Formatter::new()
            .format(&mut edited, &rules, &overrides, &mut log, &CancelToken::new())
            .unwrap();
        assert_eq!(edited.section_ids(), order);
    }

    #[test]
    fn test_export_json_round_trip() {
        let doc = paper();
        let bytes = export(&doc, ExportFormat::Json).unwrap();
        assert_eq!(parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_builder_session() {
        let mut session = Ieeefmt::new()
            .lenient()
            .session_from_bytes("lib-test", PAPER.as_bytes())
            .unwrap();
        assert_eq!(session.id(), "lib-test");
        let result = session.process().unwrap();
        assert!(result.report.overall > 0.0);
        assert!(!session.changes().is_empty());
    }
}
