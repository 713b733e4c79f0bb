//! Structural rules: section order and headings.

use super::{FormattingRule, RuleConflict, RuleContext, RuleOutput, RuleStage};
use crate::changes::{ChangeKind, PendingChanges, Snapshot};
use crate::error::Result;
use crate::model::{BlockContent, Document, Location, Section, SectionId};
use crate::template;
use std::collections::HashMap;

/// Moves sections into canonical order, or into the user's locked order.
pub struct SectionOrderRule;

impl FormattingRule for SectionOrderRule {
    fn id(&self) -> &str {
        "section-order"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Structural
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        let canonical = template::canonical_order(doc, ctx.rules);
        let target = match &ctx.overrides.locked_order {
            Some(locked) => template::locked_order(doc, locked),
            None => canonical.clone(),
        };
        let current = doc.section_ids();
        let user_override = target != canonical;

        let mut output = RuleOutput::default();
        if user_override {
            output.conflicts.push(RuleConflict {
                rule_id: self.id().to_string(),
                location: Location::Document,
                description: "user-locked section order kept instead of the canonical order"
                    .to_string(),
            });
        }
        if target == current {
            return Ok(output);
        }

        let mut by_id: HashMap<SectionId, Section> =
            doc.sections.drain(..).map(|s| (s.id, s)).collect();
        doc.sections = target.iter().filter_map(|id| by_id.remove(id)).collect();
        doc.renumber();

        for (to, id) in target.iter().enumerate() {
            let Some(from) = current.iter().position(|c| c == id) else {
                continue;
            };
            if from == to {
                continue;
            }
            let location = Location::Section { section: *id };
            let before = Snapshot::Position(from as u32);
            let after = Snapshot::Position(to as u32);
            if user_override {
                pending.record_override(ChangeKind::SectionReorder, location, before, after);
            } else {
                pending.record(ChangeKind::SectionReorder, location, before, after);
            }
        }
        Ok(output)
    }
}

/// Numbers and cases section headings and letters subsection headings.
///
/// A categorized section without a heading gets its type's name; no body
/// text is ever added.
pub struct HeadingRule;

impl FormattingRule for HeadingRule {
    fn id(&self) -> &str {
        "headings"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Structural
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        let expected = template::expected_headings(doc, ctx.rules);

        for (section, expected) in doc.sections.iter_mut().zip(expected) {
            if let Some(expected) = expected {
                if section.heading.as_deref() != Some(expected.as_str()) {
                    let before = match section.heading.replace(expected.clone()) {
                        Some(old) => Snapshot::Text(old),
                        None => Snapshot::Absent,
                    };
                    pending.record(
                        ChangeKind::HeadingRename,
                        Location::Section {
                            section: section.id,
                        },
                        before,
                        Snapshot::Text(expected),
                    );
                }
            }

            let mut n = 0;
            for (index, block) in section.blocks.iter_mut().enumerate() {
                let BlockContent::Subheading { text } = &mut block.content else {
                    continue;
                };
                n += 1;
                let expected = template::expected_subheading(text, n, ctx.rules);
                if *text != expected {
                    let before = std::mem::replace(text, expected.clone());
                    pending.record(
                        ChangeKind::HeadingRename,
                        Location::Block {
                            section: section.id,
                            index,
                        },
                        Snapshot::Text(before),
                        Snapshot::Text(expected),
                    );
                }
            }
        }
        Ok(RuleOutput::default())
    }
}
