//! User-requested edits.
//!
//! Edits only ever apply content the user supplied: a section is added only
//! when the user provides its paragraphs, and keywords create an "Index
//! Terms" section only from the user's list. Each edit is one transaction:
//! it either commits all its changes or leaves the document untouched.

use crate::changes::{ChangeKind, ChangeLog, PendingChanges, Snapshot};
use crate::error::{EditError, Result};
use crate::format::UserOverrides;
use crate::issues::Issue;
use crate::model::{Block, BlockContent, Document, Location, Section, SectionId, SectionType};
use crate::score::ComplianceReport;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Rule id recorded on changes made by user edits.
pub const USER_EDIT_ID: &str = "user-edit";

/// An edit requested by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum UserEdit {
    /// Replace the title.
    SetTitle {
        /// New title
        title: String,
    },

    /// Replace the author list.
    SetAuthors {
        /// Author names
        authors: Vec<String>,
    },

    /// Replace the affiliation lines.
    SetAffiliations {
        /// Affiliation lines
        affiliations: Vec<String>,
    },

    /// Replace the keywords, creating an index terms section if needed.
    SetKeywords {
        /// Keywords
        keywords: Vec<String>,
    },

    /// Correct a section's detected type.
    ReclassifySection {
        /// Target section
        section: SectionId,
        /// Correct type
        kind: SectionType,
    },

    /// Replace a section heading.
    RenameHeading {
        /// Target section
        section: SectionId,
        /// New heading
        heading: String,
    },

    /// Replace the text of one block (body text, subheading, caption or
    /// equation source).
    ReplaceText {
        /// Target section
        section: SectionId,
        /// Block index within the section
        index: usize,
        /// New text
        text: String,
    },

    /// Append a section with user-written paragraphs.
    AddSection {
        /// Section type
        kind: SectionType,
        /// Heading; the heading rule supplies one when absent
        #[serde(default)]
        heading: Option<String>,
        /// Paragraphs, at least one non-empty
        paragraphs: Vec<String>,
    },

    /// Pin the section order. Names every section exactly once.
    LockSectionOrder {
        /// Section ids in the wanted order
        order: Vec<SectionId>,
    },

    /// Release a pinned section order.
    UnlockSectionOrder,
}

impl UserEdit {
    /// Short name of the edit.
    pub fn name(&self) -> &'static str {
        match self {
            UserEdit::SetTitle { .. } => "set title",
            UserEdit::SetAuthors { .. } => "set authors",
            UserEdit::SetAffiliations { .. } => "set affiliations",
            UserEdit::SetKeywords { .. } => "set keywords",
            UserEdit::ReclassifySection { .. } => "reclassify section",
            UserEdit::RenameHeading { .. } => "rename heading",
            UserEdit::ReplaceText { .. } => "replace text",
            UserEdit::AddSection { .. } => "add section",
            UserEdit::LockSectionOrder { .. } => "lock section order",
            UserEdit::UnlockSectionOrder => "unlock section order",
        }
    }
}

/// Result of applying one edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// Sequence numbers of the committed changes
    pub changes: Range<u64>,
    /// Issues after the edit
    pub issues: Vec<Issue>,
    /// Compliance after the edit
    pub report: ComplianceReport,
}

/// Apply an edit to a document and the user's overrides.
///
/// On error neither the document, the overrides nor the log change.
pub fn apply_edit(
    doc: &mut Document,
    overrides: &mut UserOverrides,
    edit: &UserEdit,
    log: &mut ChangeLog,
) -> Result<Range<u64>> {
    let mut staged = doc.clone();
    let mut pending = log.stage(USER_EDIT_ID);

    match edit {
        UserEdit::SetTitle { title } => {
            let title = non_empty(title, "title")?;
            let before = match staged.metadata.title.replace(title.clone()) {
                Some(old) => Snapshot::Text(old),
                None => Snapshot::Absent,
            };
            pending.record(ChangeKind::UserEdit, Location::Document, before, Snapshot::Text(title));
        }
        UserEdit::SetAuthors { authors } => {
            let authors = non_empty_list(authors, "authors")?;
            let before = std::mem::replace(&mut staged.metadata.authors, authors.clone());
            pending.record(
                ChangeKind::UserEdit,
                Location::Document,
                Snapshot::List(before),
                Snapshot::List(authors),
            );
        }
        UserEdit::SetAffiliations { affiliations } => {
            let affiliations = non_empty_list(affiliations, "affiliations")?;
            let before = std::mem::replace(&mut staged.metadata.affiliations, affiliations.clone());
            pending.record(
                ChangeKind::UserEdit,
                Location::Document,
                Snapshot::List(before),
                Snapshot::List(affiliations),
            );
        }
        UserEdit::SetKeywords { keywords } => {
            let keywords = non_empty_list(keywords, "keywords")?;
            set_keywords(&mut staged, keywords, &mut pending);
        }
        UserEdit::ReclassifySection { section, kind } => {
            let id = *section;
            if kind.is_singular() && staged.sections.iter().any(|s| s.kind == *kind && s.id != id) {
                return Err(EditError::DuplicateSection(*kind).into());
            }
            let target = section_mut(&mut staged, id)?;
            let before = std::mem::replace(&mut target.kind, *kind);
            target.confidence = 1.0;
            pending.record(
                ChangeKind::UserEdit,
                Location::Section { section: id },
                Snapshot::Kind(before),
                Snapshot::Kind(*kind),
            );
        }
        UserEdit::RenameHeading { section, heading } => {
            let heading = non_empty(heading, "heading")?;
            let target = section_mut(&mut staged, *section)?;
            let before = match target.heading.replace(heading.clone()) {
                Some(old) => Snapshot::Text(old),
                None => Snapshot::Absent,
            };
            pending.record(
                ChangeKind::UserEdit,
                Location::Section { section: *section },
                before,
                Snapshot::Text(heading),
            );
        }
        UserEdit::ReplaceText {
            section,
            index,
            text,
        } => {
            let replacement = non_empty(text, "text")?;
            let target = section_mut(&mut staged, *section)?;
            let len = target.blocks.len();
            let block = target.blocks.get_mut(*index).ok_or(EditError::BlockOutOfRange {
                section: *section,
                index: *index,
                len,
            })?;
            let slot = match &mut block.content {
                BlockContent::Text { text } | BlockContent::Subheading { text } => text,
                BlockContent::Figure { caption, .. } | BlockContent::Table { caption, .. } => caption,
                BlockContent::Equation { tex } => tex,
            };
            let before = std::mem::replace(slot, replacement.clone());
            pending.record(
                ChangeKind::UserEdit,
                Location::Block {
                    section: *section,
                    index: *index,
                },
                Snapshot::Text(before),
                Snapshot::Text(replacement),
            );
        }
        UserEdit::AddSection {
            kind,
            heading,
            paragraphs,
        } => {
            let paragraphs = non_empty_list(paragraphs, "paragraphs")?;
            if kind.is_singular() && staged.has_kind(*kind) {
                return Err(EditError::DuplicateSection(*kind).into());
            }
            let heading = heading
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string);
            let mut section = Section::new(SectionId(0), *kind, heading);
            for paragraph in paragraphs {
                section.add_block(Block::text(paragraph));
            }
            let id = staged.push_section(section);
            pending.record(
                ChangeKind::UserEdit,
                Location::Section { section: id },
                Snapshot::Absent,
                Snapshot::Kind(*kind),
            );
        }
        UserEdit::LockSectionOrder { order } => {
            check_order(&staged, order)?;
            reorder(&mut staged, order, &mut pending);
        }
        UserEdit::UnlockSectionOrder => {}
    }

    staged
        .validate()
        .map_err(EditError::InvalidOrder)?;

    // Overrides change only once the document edit is known to succeed.
    match edit {
        UserEdit::LockSectionOrder { order } => overrides.locked_order = Some(order.clone()),
        UserEdit::UnlockSectionOrder => overrides.locked_order = None,
        _ => {}
    }

    *doc = staged;
    let range = log.commit(pending);
    debug!("Applied {} with {} change(s)", edit.name(), range.end - range.start);
    Ok(range)
}

fn non_empty(value: &str, field: &'static str) -> std::result::Result<String, EditError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EditError::EmptyValue(field));
    }
    Ok(value.to_string())
}

fn non_empty_list(values: &[String], field: &'static str) -> std::result::Result<Vec<String>, EditError> {
    let values: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(EditError::EmptyValue(field));
    }
    Ok(values)
}

fn section_mut(doc: &mut Document, id: SectionId) -> std::result::Result<&mut Section, EditError> {
    doc.section_mut(id).ok_or(EditError::UnknownSection(id))
}

/// Store keywords in the metadata and in the index terms section.
fn set_keywords(doc: &mut Document, keywords: Vec<String>, pending: &mut PendingChanges) {
    let line = keywords.join(", ");
    let before = std::mem::replace(&mut doc.metadata.keywords, keywords.clone());
    pending.record(
        ChangeKind::UserEdit,
        Location::Document,
        Snapshot::List(before),
        Snapshot::List(keywords),
    );

    if let Some(section) = doc.sections.iter_mut().find(|s| s.kind == SectionType::Keywords) {
        let before = section.plain_text();
        section.blocks = vec![Block::text(line.clone())];
        pending.record(
            ChangeKind::UserEdit,
            Location::Section {
                section: section.id,
            },
            Snapshot::Text(before),
            Snapshot::Text(line),
        );
        return;
    }

    let mut section = Section::new(SectionId(0), SectionType::Keywords, None);
    section.add_block(Block::text(line));
    let id = doc.push_section(section);
    // Index terms follow the abstract.
    let target = doc
        .sections
        .iter()
        .position(|s| s.kind == SectionType::Abstract)
        .map(|p| p + 1)
        .unwrap_or(0);
    if let Some(section) = doc.sections.pop() {
        doc.sections.insert(target, section);
    }
    doc.renumber();
    pending.record(
        ChangeKind::UserEdit,
        Location::Section { section: id },
        Snapshot::Absent,
        Snapshot::Kind(SectionType::Keywords),
    );
}

fn check_order(doc: &Document, order: &[SectionId]) -> std::result::Result<(), EditError> {
    let mut expected = doc.section_ids();
    let mut given = order.to_vec();
    expected.sort();
    given.sort();
    if expected != given {
        return Err(EditError::InvalidOrder(format!(
            "order names {} section(s) but must name each of the document's {} sections once",
            order.len(),
            doc.section_count()
        )));
    }
    Ok(())
}

/// Move sections into the locked order, flagging each move as a user
/// override.
fn reorder(doc: &mut Document, order: &[SectionId], pending: &mut PendingChanges) {
    let current = doc.section_ids();
    let mut by_id: HashMap<SectionId, Section> = doc.sections.drain(..).map(|s| (s.id, s)).collect();
    doc.sections = order.iter().filter_map(|id| by_id.remove(id)).collect();
    doc.renumber();

    for (to, id) in order.iter().enumerate() {
        let Some(from) = current.iter().position(|c| c == id) else {
            continue;
        };
        pending.record_override(
            ChangeKind::SectionReorder,
            Location::Section { section: *id },
            Snapshot::Position(from as u32),
            Snapshot::Position(to as u32),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample() -> Document {
        let mut doc = Document::with_title("Paper");
        let mut abs = Section::new(SectionId(0), SectionType::Abstract, Some("Abstract".into()));
        abs.add_block(Block::text("We study."));
        doc.push_section(abs);
        let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("Intro".into()));
        intro.add_block(Block::text("Hello."));
        intro.add_block(Block::figure("Fig. 1. Plot", None));
        doc.push_section(intro);
        doc.push_section(Section::new(SectionId(0), SectionType::Uncategorized, Some("Misc".into())));
        doc
    }

    fn apply(doc: &mut Document, edit: UserEdit) -> Result<(Range<u64>, UserOverrides, ChangeLog)> {
        let mut overrides = UserOverrides::default();
        let mut log = ChangeLog::new();
        let range = apply_edit(doc, &mut overrides, &edit, &mut log)?;
        Ok((range, overrides, log))
    }

    #[test]
    fn test_set_title_and_authors() {
        let mut doc = sample();
        let (_, _, log) = apply(
            &mut doc,
            UserEdit::SetAuthors {
                authors: vec![" A. Author ".into(), "".into()],
            },
        )
        .unwrap();
        assert_eq!(doc.metadata.authors, vec!["A. Author"]);
        assert_eq!(log.len(), 1);

        apply(&mut doc, UserEdit::SetTitle { title: "New".into() }).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("New"));

        let err = apply(&mut doc, UserEdit::SetTitle { title: "  ".into() }).unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::EmptyValue("title"))));
    }

    #[test]
    fn test_keywords_create_section_after_abstract() {
        let mut doc = sample();
        let (range, _, log) = apply(
            &mut doc,
            UserEdit::SetKeywords {
                keywords: vec!["rust".into(), "parsing".into()],
            },
        )
        .unwrap();
        assert_eq!(range, 1..3);
        assert_eq!(doc.sections[1].kind, SectionType::Keywords);
        assert_eq!(doc.sections[1].plain_text(), "rust, parsing");
        assert_eq!(doc.sections[1].order, 1);
        assert_eq!(log.get(2).map(|c| &c.before), Some(&Snapshot::Absent));
        assert!(doc.validate().is_ok());

        // A second edit updates the existing section
        let (_, _, log) = apply(
            &mut doc,
            UserEdit::SetKeywords {
                keywords: vec!["rust".into()],
            },
        )
        .unwrap();
        assert_eq!(doc.sections.iter().filter(|s| s.kind == SectionType::Keywords).count(), 1);
        assert_eq!(log.get(2).map(|c| &c.after), Some(&Snapshot::Text("rust".into())));
    }

    #[test]
    fn test_reclassify() {
        let mut doc = sample();
        apply(
            &mut doc,
            UserEdit::ReclassifySection {
                section: SectionId(2),
                kind: SectionType::Conclusion,
            },
        )
        .unwrap();
        assert_eq!(doc.sections[2].kind, SectionType::Conclusion);

        let before = doc.clone();
        let err = apply(
            &mut doc,
            UserEdit::ReclassifySection {
                section: SectionId(2),
                kind: SectionType::Abstract,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Edit(EditError::DuplicateSection(SectionType::Abstract))
        ));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_replace_text() {
        let mut doc = sample();
        apply(
            &mut doc,
            UserEdit::ReplaceText {
                section: SectionId(1),
                index: 1,
                text: "Fig. 1. Better plot".into(),
            },
        )
        .unwrap();
        assert_eq!(doc.sections[1].blocks[1].caption(), Some("Fig. 1. Better plot"));

        let err = apply(
            &mut doc,
            UserEdit::ReplaceText {
                section: SectionId(1),
                index: 5,
                text: "x".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Edit(EditError::BlockOutOfRange { index: 5, len: 2, .. })
        ));

        let err = apply(
            &mut doc,
            UserEdit::RenameHeading {
                section: SectionId(9),
                heading: "X".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::UnknownSection(SectionId(9)))));
    }

    #[test]
    fn test_add_section_requires_content() {
        let mut doc = sample();
        let err = apply(
            &mut doc,
            UserEdit::AddSection {
                kind: SectionType::Conclusion,
                heading: None,
                paragraphs: vec!["   ".into()],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::EmptyValue("paragraphs"))));

        apply(
            &mut doc,
            UserEdit::AddSection {
                kind: SectionType::Conclusion,
                heading: Some("Conclusion".into()),
                paragraphs: vec!["We conclude.".into()],
            },
        )
        .unwrap();
        let added = doc.find_kind(SectionType::Conclusion).unwrap();
        assert_eq!(added.id, SectionId(3));
        assert_eq!(added.plain_text(), "We conclude.");

        let err = apply(
            &mut doc,
            UserEdit::AddSection {
                kind: SectionType::Abstract,
                heading: None,
                paragraphs: vec!["Again.".into()],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::DuplicateSection(_))));
    }

    #[test]
    fn test_lock_and_unlock_order() {
        let mut doc = sample();
        let mut overrides = UserOverrides::default();
        let mut log = ChangeLog::new();
        let order = vec![SectionId(2), SectionId(0), SectionId(1)];
        apply_edit(
            &mut doc,
            &mut overrides,
            &UserEdit::LockSectionOrder { order: order.clone() },
            &mut log,
        )
        .unwrap();
        assert_eq!(doc.section_ids(), order);
        assert_eq!(overrides.locked_order, Some(order));
        assert_eq!(log.len(), 3);
        assert!(log
            .iter()
            .all(|c| c.kind == ChangeKind::SectionReorder && c.user_override));

        apply_edit(&mut doc, &mut overrides, &UserEdit::UnlockSectionOrder, &mut log).unwrap();
        assert!(overrides.locked_order.is_none());
        assert_eq!(log.len(), 3);

        let err = apply_edit(
            &mut doc,
            &mut overrides,
            &UserEdit::LockSectionOrder {
                order: vec![SectionId(0), SectionId(0), SectionId(1)],
            },
            &mut log,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Edit(EditError::InvalidOrder(_))));
        assert!(overrides.locked_order.is_none());
    }

    #[test]
    fn test_edit_serde() {
        let edit = UserEdit::RenameHeading {
            section: SectionId(1),
            heading: "Background".into(),
        };
        let json = serde_json::to_string(&edit).unwrap();
        assert!(json.contains("\"edit\":\"rename_heading\""));
        assert_eq!(serde_json::from_str::<UserEdit>(&json).unwrap(), edit);
    }
}
