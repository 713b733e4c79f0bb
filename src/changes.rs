//! Append-only change log.
//!
//! Every mutation of a session document is recorded as an immutable
//! [`Change`] with a monotonically increasing sequence number. Stages record
//! into a [`PendingChanges`] buffer and only [`ChangeLog::commit`] assigns
//! sequence numbers, so a stage that fails or is cancelled leaves no trace.

use crate::model::{Document, Location, PageLayout, ParagraphStyle, SectionId, SectionType, TextStyle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Category of a recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A section moved to a new position
    SectionReorder,
    /// A section heading was rewritten
    HeadingRename,
    /// Font family, size or weight changed
    FontChange,
    /// Paragraph spacing or alignment changed
    SpacingChange,
    /// Page margins or columns changed
    LayoutChange,
    /// A figure or table caption was rewritten
    CaptionFormat,
    /// In-text citation markers were rewritten
    CitationRenumber,
    /// The reference list was rewritten
    BibliographyRewrite,
    /// Text was changed by the grammar corrector
    GrammarCorrection,
    /// A change requested directly by the user
    UserEdit,
}

impl ChangeKind {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::SectionReorder => "section reorder",
            ChangeKind::HeadingRename => "heading rename",
            ChangeKind::FontChange => "font change",
            ChangeKind::SpacingChange => "spacing change",
            ChangeKind::LayoutChange => "layout change",
            ChangeKind::CaptionFormat => "caption format",
            ChangeKind::CitationRenumber => "citation renumber",
            ChangeKind::BibliographyRewrite => "bibliography rewrite",
            ChangeKind::GrammarCorrection => "grammar correction",
            ChangeKind::UserEdit => "user edit",
        }
    }
}

/// Value of the changed element before or after a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Snapshot {
    /// The element did not exist
    Absent,
    /// Section position
    Position(u32),
    /// Text (heading, paragraph, caption, title)
    Text(String),
    /// Character style
    TextStyle(TextStyle),
    /// Paragraph style
    ParagraphStyle(ParagraphStyle),
    /// Page layout
    Layout(PageLayout),
    /// List of strings (keywords, authors, reference entries)
    List(Vec<String>),
    /// Section type
    Kind(SectionType),
}

/// Longest text shown by a snapshot's display form.
const DISPLAY_TEXT_LEN: usize = 60;

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Absent => f.write_str("(none)"),
            Snapshot::Position(p) => write!(f, "position {}", p),
            Snapshot::Text(text) => {
                if text.chars().count() > DISPLAY_TEXT_LEN {
                    let short: String = text.chars().take(DISPLAY_TEXT_LEN).collect();
                    write!(f, "\"{}...\"", short)
                } else {
                    write!(f, "\"{}\"", text)
                }
            }
            Snapshot::TextStyle(style) => {
                write!(f, "{}", style.font_family.as_deref().unwrap_or("default"))?;
                if let Some(size) = style.font_size {
                    write!(f, " {}pt", size)?;
                }
                if style.bold {
                    f.write_str(" bold")?;
                }
                if style.italic {
                    f.write_str(" italic")?;
                }
                Ok(())
            }
            Snapshot::ParagraphStyle(style) => write!(
                f,
                "line {}, before {}pt, after {}pt",
                style.line_spacing.unwrap_or(1.0),
                style.space_before.unwrap_or(0.0),
                style.space_after.unwrap_or(0.0)
            ),
            Snapshot::Layout(layout) => write!(
                f,
                "{} column(s), margins {}/{}/{}/{} in",
                layout.columns,
                layout.margins.top,
                layout.margins.bottom,
                layout.margins.left,
                layout.margins.right
            ),
            Snapshot::List(items) => write!(f, "{} item(s)", items.len()),
            Snapshot::Kind(kind) => f.write_str(kind.name()),
        }
    }
}

/// One committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Sequence number, starting at 1
    pub seq: u64,

    /// Mutation category
    pub kind: ChangeKind,

    /// Rule or edit that produced the change
    pub rule_id: String,

    /// Element that changed
    pub location: Location,

    /// Value before
    pub before: Snapshot,

    /// Value after
    pub after: Snapshot,

    /// Set when an explicit user override won over an automatic rule
    #[serde(default)]
    pub user_override: bool,

    /// Commit time
    pub timestamp: DateTime<Utc>,
}

/// A change recorded by a stage but not yet committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    /// Mutation category
    pub kind: ChangeKind,
    /// Element that changed
    pub location: Location,
    /// Value before
    pub before: Snapshot,
    /// Value after
    pub after: Snapshot,
    /// User override flag
    pub user_override: bool,
}

/// Changes staged by a single rule or edit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChanges {
    rule_id: String,
    changes: Vec<PendingChange>,
}

impl PendingChanges {
    /// Create an empty buffer for a rule.
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            changes: Vec::new(),
        }
    }

    /// Rule or edit id.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Record a change.
    pub fn record(&mut self, kind: ChangeKind, location: Location, before: Snapshot, after: Snapshot) {
        self.push(kind, location, before, after, false);
    }

    /// Record a change that overrides an automatic rule.
    pub fn record_override(
        &mut self,
        kind: ChangeKind,
        location: Location,
        before: Snapshot,
        after: Snapshot,
    ) {
        self.push(kind, location, before, after, true);
    }

    fn push(
        &mut self,
        kind: ChangeKind,
        location: Location,
        before: Snapshot,
        after: Snapshot,
        user_override: bool,
    ) {
        if before == after {
            return;
        }
        self.changes.push(PendingChange {
            kind,
            location,
            before,
            after,
            user_override,
        });
    }

    /// Number of staged changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate over staged changes.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }

    /// Append another buffer's changes to this one.
    pub fn extend(&mut self, other: PendingChanges) {
        self.changes.extend(other.changes);
    }
}

/// Ordered, append-only log of committed changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeLog {
    changes: Vec<Change>,
}

impl ChangeLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start staging changes for a rule.
    pub fn stage(&self, rule_id: impl Into<String>) -> PendingChanges {
        PendingChanges::new(rule_id)
    }

    /// Commit staged changes, assigning sequence numbers.
    ///
    /// Returns the range of sequence numbers assigned.
    pub fn commit(&mut self, pending: PendingChanges) -> Range<u64> {
        let start = self.next_seq();
        let timestamp = Utc::now();
        let rule_id = pending.rule_id;
        for (offset, change) in pending.changes.into_iter().enumerate() {
            self.changes.push(Change {
                seq: start + offset as u64,
                kind: change.kind,
                rule_id: rule_id.clone(),
                location: change.location,
                before: change.before,
                after: change.after,
                user_override: change.user_override,
                timestamp,
            });
        }
        start..self.next_seq()
    }

    fn next_seq(&self) -> u64 {
        self.changes.len() as u64 + 1
    }

    /// Number of committed changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Get a change by sequence number.
    pub fn get(&self, seq: u64) -> Option<&Change> {
        if seq == 0 {
            return None;
        }
        self.changes.get((seq - 1) as usize)
    }

    /// Iterate in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// All changes as a slice.
    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    /// Changes of one kind, in sequence order.
    pub fn replay(&self, kind: ChangeKind) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }

    /// Changes committed after the given sequence number.
    pub fn since(&self, seq: u64) -> &[Change] {
        let start = (seq as usize).min(self.changes.len());
        &self.changes[start..]
    }

    /// Number of changes per kind.
    pub fn summary(&self) -> BTreeMap<ChangeKind, usize> {
        let mut counts = BTreeMap::new();
        for change in &self.changes {
            *counts.entry(change.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Structural diff between two document states.
    pub fn diff(before: &Document, after: &Document) -> DocumentDiff {
        DocumentDiff::between(before, after)
    }
}

/// A section that moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMove {
    /// Section id
    pub section: SectionId,
    /// Position before
    pub from: u32,
    /// Position after
    pub to: u32,
}

/// A section whose heading changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingChange {
    /// Section id
    pub section: SectionId,
    /// Heading before
    pub before: Option<String>,
    /// Heading after
    pub after: Option<String>,
}

/// A section whose type changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindChange {
    /// Section id
    pub section: SectionId,
    /// Type before
    pub before: SectionType,
    /// Type after
    pub after: SectionType,
}

/// A block whose text changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEdit {
    /// Section id
    pub section: SectionId,
    /// Block index
    pub index: usize,
    /// Text before (empty if the block is new)
    pub before: String,
    /// Text after (empty if the block was removed)
    pub after: String,
}

/// Before/after comparison of two document states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDiff {
    /// Title changed
    pub title_changed: bool,
    /// Authors, affiliations or keywords changed
    pub metadata_changed: bool,
    /// Sections that moved
    pub moved: Vec<SectionMove>,
    /// Sections whose heading changed
    pub renamed: Vec<HeadingChange>,
    /// Sections whose type changed
    pub reclassified: Vec<KindChange>,
    /// Blocks whose text changed
    pub edited_blocks: Vec<BlockEdit>,
    /// Sections only present after
    pub added: Vec<SectionId>,
    /// Sections only present before
    pub removed: Vec<SectionId>,
}

impl DocumentDiff {
    /// Compare two document states section by section.
    pub fn between(before: &Document, after: &Document) -> Self {
        let mut diff = DocumentDiff {
            title_changed: before.metadata.title != after.metadata.title,
            metadata_changed: before.metadata.authors != after.metadata.authors
                || before.metadata.affiliations != after.metadata.affiliations
                || before.metadata.keywords != after.metadata.keywords,
            ..Default::default()
        };

        for old in &before.sections {
            let Some(new) = after.section(old.id) else {
                diff.removed.push(old.id);
                continue;
            };
            if old.order != new.order {
                diff.moved.push(SectionMove {
                    section: old.id,
                    from: old.order,
                    to: new.order,
                });
            }
            if old.heading != new.heading {
                diff.renamed.push(HeadingChange {
                    section: old.id,
                    before: old.heading.clone(),
                    after: new.heading.clone(),
                });
            }
            if old.kind != new.kind {
                diff.reclassified.push(KindChange {
                    section: old.id,
                    before: old.kind,
                    after: new.kind,
                });
            }
            let len = old.blocks.len().max(new.blocks.len());
            for index in 0..len {
                let a = old.blocks.get(index).map(|b| b.plain_text()).unwrap_or_default();
                let b = new.blocks.get(index).map(|b| b.plain_text()).unwrap_or_default();
                if a != b {
                    diff.edited_blocks.push(BlockEdit {
                        section: old.id,
                        index,
                        before: a,
                        after: b,
                    });
                }
            }
        }

        diff.added = after
            .sections
            .iter()
            .filter(|s| before.section(s.id).is_none())
            .map(|s| s.id)
            .collect();

        diff
    }

    /// Check whether the two states are textually and structurally identical.
    pub fn is_empty(&self) -> bool {
        !self.title_changed
            && !self.metadata_changed
            && self.moved.is_empty()
            && self.renamed.is_empty()
            && self.reclassified.is_empty()
            && self.edited_blocks.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }
}
