//! Compliance issue detection.
//!
//! Detection is a read-only pass over a document snapshot. Each check is an
//! independent [`Check`] held by an [`IssueDetector`] registry; new checks
//! are added with [`IssueDetector::register`] without touching existing
//! ones.
//!
//! # Example
//!
//! ```no_run
//! use ieeefmt::issues::IssueDetector;
//! use ieeefmt::RuleSet;
//!
//! fn main() -> ieeefmt::Result<()> {
//!     let doc = ieeefmt::parse_file("paper.md")?;
//!     let issues = IssueDetector::with_defaults().detect(&doc, &RuleSet::default());
//!     for issue in &issues {
//!         println!("{} {}: {}", issue.severity, issue.location, issue.message);
//!     }
//!     Ok(())
//! }
//! ```

mod checks;

pub use checks::{
    AbstractLengthCheck, CaptionCheck, CitationCheck, HeadingCheck, LayoutCheck,
    RequiredSectionsCheck, SectionOrderCheck, SpacingCheck, TitleCheck, TypographyCheck,
};

use crate::model::{Document, Location, SectionId};
use crate::ruleset::RuleSet;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic deviation
    Low,
    /// Noticeable deviation
    Medium,
    /// Submission blocker
    High,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Score category an issue counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Sections, title, order
    Structural,
    /// Fonts, spacing, layout, headings, captions
    Stylistic,
    /// Citations and references
    Citation,
}

impl Category {
    /// All categories.
    pub const ALL: [Category; 3] = [Category::Structural, Category::Stylistic, Category::Citation];

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Structural => "structural",
            Category::Stylistic => "stylistic",
            Category::Citation => "citation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of compliance issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Document has no title
    MissingTitle,
    /// A required section type is absent
    MissingRequiredSection,
    /// A section appears before one that should precede it
    SectionOutOfOrder,
    /// Abstract length is outside the allowed range
    AbstractWordCount,
    /// A section has no heading
    MissingSectionHeading,
    /// Heading numbering or case differs from the template
    HeadingFormat,
    /// Font family, size or weight differs from the template
    FontMismatch,
    /// Paragraph spacing or alignment differs from the template
    SpacingMismatch,
    /// Margins or columns differ from the template
    LayoutMismatch,
    /// Figure or table caption is not in template style
    CaptionFormat,
    /// Citations use a non-numeric style
    NonIeeeCitationStyle,
    /// Numeric and author-year citations are mixed
    MixedCitationStyles,
    /// References are not numbered in order of first citation
    CitationOrder,
    /// A citation does not resolve to a reference entry
    UnresolvedReference,
    /// A reference entry is never cited
    UncitedReference,
}

impl IssueKind {
    /// Category this kind counts against.
    pub fn category(&self) -> Category {
        match self {
            IssueKind::MissingTitle
            | IssueKind::MissingRequiredSection
            | IssueKind::SectionOutOfOrder
            | IssueKind::AbstractWordCount => Category::Structural,
            IssueKind::MissingSectionHeading
            | IssueKind::HeadingFormat
            | IssueKind::FontMismatch
            | IssueKind::SpacingMismatch
            | IssueKind::LayoutMismatch
            | IssueKind::CaptionFormat => Category::Stylistic,
            IssueKind::NonIeeeCitationStyle
            | IssueKind::MixedCitationStyles
            | IssueKind::CitationOrder
            | IssueKind::UnresolvedReference
            | IssueKind::UncitedReference => Category::Citation,
        }
    }

    /// Default severity.
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::MissingTitle | IssueKind::MissingRequiredSection => Severity::High,
            IssueKind::SectionOutOfOrder
            | IssueKind::AbstractWordCount
            | IssueKind::NonIeeeCitationStyle
            | IssueKind::MixedCitationStyles
            | IssueKind::UnresolvedReference => Severity::Medium,
            IssueKind::MissingSectionHeading
            | IssueKind::HeadingFormat
            | IssueKind::FontMismatch
            | IssueKind::SpacingMismatch
            | IssueKind::LayoutMismatch
            | IssueKind::CaptionFormat
            | IssueKind::CitationOrder
            | IssueKind::UncitedReference => Severity::Low,
        }
    }

    /// Whether the formatter can fix issues of this kind.
    pub fn is_fixable(&self) -> bool {
        !matches!(
            self,
            IssueKind::MissingTitle
                | IssueKind::MissingRequiredSection
                | IssueKind::AbstractWordCount
                | IssueKind::UnresolvedReference
                | IssueKind::UncitedReference
        )
    }
}

/// A detected deviation from the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue kind
    pub kind: IssueKind,

    /// Severity
    pub severity: Severity,

    /// Score category
    pub category: Category,

    /// Where the issue is
    pub location: Location,

    /// Human-readable description
    pub message: String,

    /// Id of the check that reported it
    pub rule_id: String,

    /// Whether the formatter can fix it
    pub fixable: bool,
}

impl Issue {
    /// Create an issue with the kind's default severity and category.
    pub fn new(kind: IssueKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            category: kind.category(),
            location,
            message: message.into(),
            rule_id: String::new(),
            fixable: kind.is_fixable(),
        }
    }

    /// Override the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Override the fixable flag.
    pub fn with_fixable(mut self, fixable: bool) -> Self {
        self.fixable = fixable;
        self
    }
}

/// A single compliance check.
///
/// Implement this trait to add a check to an [`IssueDetector`].
pub trait Check: Send + Sync {
    /// Stable check id, recorded on every issue it reports.
    fn id(&self) -> &str;

    /// Inspect a document and report issues. Must not have side effects.
    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue>;
}

/// Registry of checks.
pub struct IssueDetector {
    checks: Vec<Arc<dyn Check>>,
    by_id: HashMap<String, usize>,
}

impl IssueDetector {
    /// Create a detector with no checks.
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Create a detector with the built-in checks.
    pub fn with_defaults() -> Self {
        let mut detector = Self::new();
        detector.register(Arc::new(TitleCheck));
        detector.register(Arc::new(RequiredSectionsCheck));
        detector.register(Arc::new(SectionOrderCheck));
        detector.register(Arc::new(AbstractLengthCheck));
        detector.register(Arc::new(HeadingCheck));
        detector.register(Arc::new(TypographyCheck));
        detector.register(Arc::new(SpacingCheck));
        detector.register(Arc::new(LayoutCheck));
        detector.register(Arc::new(CaptionCheck));
        detector.register(Arc::new(CitationCheck));
        detector
    }

    /// Register a check.
    ///
    /// A check with the same id as an existing one replaces it.
    pub fn register(&mut self, check: Arc<dyn Check>) {
        let id = check.id().to_string();
        match self.by_id.get(&id) {
            Some(&index) => self.checks[index] = check,
            None => {
                self.by_id.insert(id, self.checks.len());
                self.checks.push(check);
            }
        }
    }

    /// Get a check by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Check>> {
        self.by_id.get(id).map(|&i| self.checks[i].clone())
    }

    /// Ids of registered checks, in registration order.
    pub fn check_ids(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.id()).collect()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Check if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check and return issues in a stable order.
    ///
    /// Issues are sorted by section position (document-level issues first),
    /// then block index, then check id; ties keep the order the check
    /// reported them in.
    pub fn detect(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let per_check: Vec<Vec<Issue>> = self
            .checks
            .par_iter()
            .map(|check| {
                let mut issues = check.check(doc, rules);
                for issue in issues.iter_mut() {
                    issue.rule_id = check.id().to_string();
                }
                issues
            })
            .collect();

        let positions: HashMap<SectionId, usize> = doc
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let mut issues: Vec<Issue> = per_check.into_iter().flatten().collect();
        issues.sort_by(|a, b| {
            sort_key(a, &positions)
                .cmp(&sort_key(b, &positions))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        debug!("Detected {} issues with {} checks", issues.len(), self.checks.len());
        issues
    }
}

impl Default for IssueDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn sort_key(issue: &Issue, positions: &HashMap<SectionId, usize>) -> (usize, usize) {
    let section = issue
        .location
        .section()
        .map(|id| positions.get(&id).map(|p| p + 1).unwrap_or(usize::MAX))
        .unwrap_or(0);
    let block = issue.location.block().map(|i| i + 1).unwrap_or(0);
    (section, block)
}

/// Count issues per severity.
pub fn count_by_severity(issues: &[Issue]) -> [usize; 3] {
    let mut counts = [0; 3];
    for issue in issues {
        counts[issue.severity as usize] += 1;
    }
    counts
}
