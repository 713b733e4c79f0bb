//! Rule-based reformatting.
//!
//! A [`Formatter`] applies [`FormattingRule`]s in a fixed order: structural
//! rules first, then stylistic rules, then citation rules. Each rule runs on
//! a staged copy of the document and its changes are committed to the
//! [`ChangeLog`] only when it completes, so an aborted rule leaves neither
//! the document nor the log half-modified.
//!
//! Rules derive their targets from [`crate::template`], the same source the
//! issue checks use, which makes formatting idempotent: a second run on the
//! output records no changes.

mod citations;
mod structure;
mod style;

pub use citations::CitationRule;
pub use structure::{HeadingRule, SectionOrderRule};
pub use style::{CaptionRule, LayoutRule, SpacingRule, TypographyRule};

use crate::cancel::CancelToken;
use crate::changes::{ChangeLog, PendingChanges};
use crate::citation::CitationReport;
use crate::error::{Error, Result};
use crate::issues::{Issue, IssueDetector};
use crate::model::{Document, Location, SectionId};
use crate::ruleset::RuleSet;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

/// Phase a rule belongs to. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStage {
    /// Section order and headings
    Structural,
    /// Fonts, spacing, layout, captions
    Stylistic,
    /// Citations and references
    Citation,
}

/// Explicit user decisions that take priority over automatic rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrides {
    /// Section order pinned by the user
    #[serde(default)]
    pub locked_order: Option<Vec<SectionId>>,

    /// Rules the user turned off
    #[serde(default)]
    pub disabled_rules: BTreeSet<String>,
}

impl UserOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the section order.
    pub fn with_locked_order(mut self, order: Vec<SectionId>) -> Self {
        self.locked_order = Some(order);
        self
    }

    /// Turn off a rule by id.
    pub fn with_disabled_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.disabled_rules.insert(rule_id.into());
        self
    }

    /// Check whether a rule is turned off.
    pub fn is_disabled(&self, rule_id: &str) -> bool {
        self.disabled_rules.contains(rule_id)
    }
}

/// An automatic rule that lost to a user override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConflict {
    /// Rule that was overridden
    pub rule_id: String,
    /// What the conflict concerned
    pub location: Location,
    /// Human-readable description
    pub description: String,
}

/// Inputs shared by every rule in one formatting run.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Target template
    pub rules: &'a RuleSet,
    /// User overrides
    pub overrides: &'a UserOverrides,
}

/// Side results of applying one rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutput {
    /// Overrides that won over this rule
    pub conflicts: Vec<RuleConflict>,
    /// Citation conversion report, from the citation rule
    pub citations: Option<CitationReport>,
}

/// One formatting rule.
///
/// Rules mutate the staged document and record every mutation in
/// `pending`. A rule must be idempotent: applied to its own output it
/// records nothing.
pub trait FormattingRule: Send + Sync {
    /// Stable rule id, recorded on every change.
    fn id(&self) -> &str;

    /// Phase the rule runs in.
    fn stage(&self) -> RuleStage;

    /// Apply the rule.
    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput>;
}

/// A rule that ran and committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplication {
    /// Rule id
    pub rule_id: String,
    /// Rule phase
    pub stage: RuleStage,
    /// Sequence numbers of the committed changes
    pub changes: Range<u64>,
}

impl RuleApplication {
    /// Number of changes committed.
    pub fn change_count(&self) -> usize {
        (self.changes.end - self.changes.start) as usize
    }
}

/// Result of a formatting run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOutcome {
    /// Rules that ran, in order
    pub applied: Vec<RuleApplication>,
    /// Rules skipped because the user disabled them
    pub skipped: Vec<String>,
    /// Rules that failed, with the error; their changes were discarded
    pub failed: Vec<(String, String)>,
    /// User overrides that won over automatic rules
    pub conflicts: Vec<RuleConflict>,
    /// Citation conversion report
    pub citations: Option<CitationReport>,
    /// Issues left after formatting
    pub remaining: Vec<Issue>,
}

impl FormatOutcome {
    /// Total number of committed changes.
    pub fn change_count(&self) -> usize {
        self.applied.iter().map(|a| a.change_count()).sum()
    }

    /// Remaining issues the formatter cannot fix.
    pub fn unfixable(&self) -> impl Iterator<Item = &Issue> {
        self.remaining.iter().filter(|i| !i.fixable)
    }
}

/// Applies formatting rules in phase order.
pub struct Formatter {
    rules: Vec<Arc<dyn FormattingRule>>,
    detector: IssueDetector,
}

impl Formatter {
    /// Create a formatter with the built-in rules.
    pub fn new() -> Self {
        let mut formatter = Self::empty();
        formatter.register(Arc::new(SectionOrderRule));
        formatter.register(Arc::new(HeadingRule));
        formatter.register(Arc::new(TypographyRule));
        formatter.register(Arc::new(SpacingRule));
        formatter.register(Arc::new(LayoutRule));
        formatter.register(Arc::new(CaptionRule));
        formatter.register(Arc::new(CitationRule));
        formatter
    }

    /// Create a formatter with no rules.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            detector: IssueDetector::with_defaults(),
        }
    }

    /// Use a custom detector for the post-formatting issue report.
    pub fn with_detector(mut self, detector: IssueDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Register a rule after the existing rules of its phase.
    pub fn register(&mut self, rule: Arc<dyn FormattingRule>) {
        let position = self
            .rules
            .iter()
            .position(|r| r.stage() > rule.stage())
            .unwrap_or(self.rules.len());
        self.rules.insert(position, rule);
    }

    /// Detector used for the post-formatting issue report.
    pub fn detector(&self) -> &IssueDetector {
        &self.detector
    }

    /// Rule ids in application order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Format a document in place.
    ///
    /// Returns [`Error::Cancelled`] if the token is cancelled; rules that
    /// completed before that stay committed.
    pub fn format(
        &self,
        doc: &mut Document,
        rules: &RuleSet,
        overrides: &UserOverrides,
        log: &mut ChangeLog,
        cancel: &CancelToken,
    ) -> Result<FormatOutcome> {
        let ctx = RuleContext { rules, overrides };
        let mut outcome = FormatOutcome::default();

        for rule in &self.rules {
            let rule_id = rule.id();
            if overrides.is_disabled(rule_id) {
                debug!("Skipping disabled rule {}", rule_id);
                outcome.skipped.push(rule_id.to_string());
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    stage: rule_id.to_string(),
                });
            }

            let mut staged = doc.clone();
            let mut pending = log.stage(rule_id);
            let output = match rule.apply(&mut staged, &ctx, &mut pending) {
                Ok(output) => output,
                Err(err) => {
                    warn!("Rule {} failed, discarding its changes: {}", rule_id, err);
                    outcome.failed.push((rule_id.to_string(), err.to_string()));
                    continue;
                }
            };
            if let Err(reason) = staged.validate() {
                warn!("Rule {} broke document invariants: {}", rule_id, reason);
                outcome.failed.push((rule_id.to_string(), reason));
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    stage: rule_id.to_string(),
                });
            }

            *doc = staged;
            let changes = log.commit(pending);
            debug!(
                "Rule {} committed {} change(s)",
                rule_id,
                changes.end - changes.start
            );
            for conflict in &output.conflicts {
                warn!("{}: {}", conflict.rule_id, conflict.description);
            }
            outcome.conflicts.extend(output.conflicts);
            if output.citations.is_some() {
                outcome.citations = output.citations;
            }
            outcome.applied.push(RuleApplication {
                rule_id: rule_id.to_string(),
                stage: rule.stage(),
                changes,
            });
        }

        outcome.remaining = self.detector.detect(doc, rules);
        info!(
            "Formatting with {} {} committed {} change(s), {} issue(s) remain",
            rules.name,
            rules.version,
            outcome.change_count(),
            outcome.remaining.len()
        );
        Ok(outcome)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}
