//! Compliance scoring.
//!
//! Each category starts at 100 and loses the rule set's penalty for every
//! issue in it, clamped at 0. The overall score is the weighted mean of the
//! category scores. Penalties and weights come from [`RuleSet::scoring`], so
//! a report always matches the template that produced its issues.

use crate::issues::{count_by_severity, Category, Issue, IssueDetector, Severity};
use crate::model::Document;
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};

/// Highest possible score.
pub const MAX_SCORE: f64 = 100.0;

/// Score per category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    /// Sections, title, order
    pub structural: f64,
    /// Fonts, spacing, layout, headings, captions
    pub stylistic: f64,
    /// Citations and references
    pub citation: f64,
}

impl CategoryScores {
    /// Score of one category.
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Structural => self.structural,
            Category::Stylistic => self.stylistic,
            Category::Citation => self.citation,
        }
    }
}

/// Issue counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Low severity issues
    pub low: usize,
    /// Medium severity issues
    pub medium: usize,
    /// High severity issues
    pub high: usize,
}

impl SeverityCounts {
    /// Count issues.
    pub fn of(issues: &[Issue]) -> Self {
        let [low, medium, high] = count_by_severity(issues);
        Self { low, medium, high }
    }

    /// Count for one severity.
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
        }
    }

    /// Total number of issues.
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Compliance of a document against a rule set.
///
/// Derived data: recompute it after every change instead of storing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Weighted overall score, 0 to 100
    pub overall: f64,
    /// Score per category
    pub categories: CategoryScores,
    /// Issue counts per severity
    pub counts: SeverityCounts,
    /// Issues the score was computed from
    pub issues: Vec<Issue>,
    /// Rule set name
    pub rule_set: String,
    /// Rule set version
    pub rule_set_version: String,
    /// Number of sections in the document
    pub section_count: usize,
    /// Number of words in the document
    pub word_count: usize,
}

impl ComplianceReport {
    /// Check whether no issues remain.
    pub fn is_compliant(&self) -> bool {
        self.issues.is_empty()
    }

    /// Remaining issues the formatter cannot fix.
    pub fn blocking(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.fixable)
    }
}

/// Computes compliance reports.
pub struct ComplianceScorer {
    detector: IssueDetector,
}

impl Default for ComplianceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceScorer {
    /// Create a scorer with the built-in checks.
    pub fn new() -> Self {
        Self {
            detector: IssueDetector::with_defaults(),
        }
    }

    /// Create a scorer with a custom detector.
    pub fn with_detector(detector: IssueDetector) -> Self {
        Self { detector }
    }

    /// Detect issues and score them.
    pub fn score(&self, doc: &Document, rules: &RuleSet) -> ComplianceReport {
        let issues = self.detector.detect(doc, rules);
        Self::report(doc, issues, rules)
    }

    /// Score an already detected issue list.
    pub fn report(doc: &Document, issues: Vec<Issue>, rules: &RuleSet) -> ComplianceReport {
        let categories = category_scores(&issues, rules);
        ComplianceReport {
            overall: overall_score(&categories, rules),
            categories,
            counts: SeverityCounts::of(&issues),
            issues,
            rule_set: rules.name.clone(),
            rule_set_version: rules.version.clone(),
            section_count: doc.section_count(),
            word_count: doc.word_count(),
        }
    }
}

/// Per-category scores for an issue list.
pub fn category_scores(issues: &[Issue], rules: &RuleSet) -> CategoryScores {
    let score = |category: Category| {
        let penalty: f64 = issues
            .iter()
            .filter(|i| i.category == category)
            .map(|i| rules.penalty(i.severity))
            .sum();
        round2((MAX_SCORE - penalty).clamp(0.0, MAX_SCORE))
    };
    CategoryScores {
        structural: score(Category::Structural),
        stylistic: score(Category::Stylistic),
        citation: score(Category::Citation),
    }
}

/// Weighted mean of category scores.
pub fn overall_score(categories: &CategoryScores, rules: &RuleSet) -> f64 {
    let total_weight: f64 = Category::ALL.iter().map(|c| rules.weight(*c)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = Category::ALL
        .iter()
        .map(|c| categories.get(*c) * rules.weight(*c))
        .sum();
    round2((weighted / total_weight).clamp(0.0, MAX_SCORE))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueKind;
    use crate::model::Location;

    fn issue(kind: IssueKind) -> Issue {
        Issue::new(kind, Location::Document, "x")
    }

    #[test]
    fn test_no_issues_is_perfect() {
        let rules = RuleSet::default();
        let report = ComplianceScorer::report(&Document::new(), Vec::new(), &rules);
        assert_eq!(report.overall, 100.0);
        assert!(report.is_compliant());
        assert_eq!(report.rule_set, rules.name);
    }

    #[test]
    fn test_penalties_per_category() {
        let rules = RuleSet::default();
        let issues = vec![
            issue(IssueKind::MissingRequiredSection),
            issue(IssueKind::FontMismatch),
            issue(IssueKind::FontMismatch),
            issue(IssueKind::UnresolvedReference),
        ];
        let report = ComplianceScorer::report(&Document::new(), issues, &rules);
        assert_eq!(report.categories.structural, 80.0);
        assert_eq!(report.categories.stylistic, 96.0);
        assert_eq!(report.categories.citation, 92.0);
        // 0.5 * 80 + 0.25 * 96 + 0.25 * 92
        assert_eq!(report.overall, 87.0);
        assert_eq!(report.counts.total(), 4);
        assert_eq!(report.counts.get(Severity::Low), 2);
        assert_eq!(report.blocking().count(), 2);
    }

    #[test]
    fn test_clamped_at_zero() {
        let rules = RuleSet::default();
        let issues = vec![issue(IssueKind::MissingTitle); 10];
        let scores = category_scores(&issues, &rules);
        assert_eq!(scores.structural, 0.0);
        assert_eq!(scores.citation, 100.0);
    }

    #[test]
    fn test_fewer_issues_never_score_lower() {
        let rules = RuleSet::default();
        let mut issues = vec![
            issue(IssueKind::SectionOutOfOrder),
            issue(IssueKind::CaptionFormat),
            issue(IssueKind::MixedCitationStyles),
        ];
        let mut previous = overall_score(&category_scores(&issues, &rules), &rules);
        while issues.pop().is_some() {
            let current = overall_score(&category_scores(&issues, &rules), &rules);
            assert!(current >= previous);
            previous = current;
        }
    }
}
