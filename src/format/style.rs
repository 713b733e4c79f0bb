//! Stylistic rules: fonts, spacing, page layout and captions.

use super::{FormattingRule, RuleContext, RuleOutput, RuleStage};
use crate::changes::{ChangeKind, PendingChanges, Snapshot};
use crate::error::Result;
use crate::model::{BlockContent, Document, Location};
use crate::template::{self, CaptionKind};

/// Applies the template fonts to the title, headings and blocks.
pub struct TypographyRule;

impl FormattingRule for TypographyRule {
    fn id(&self) -> &str {
        "typography"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Stylistic
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        let typography = &ctx.rules.typography;

        if doc.metadata.title.is_some() && !typography.title.matches(&doc.metadata.title_style) {
            let style = typography.title.text_style();
            let before = std::mem::replace(&mut doc.metadata.title_style, style.clone());
            pending.record(
                ChangeKind::FontChange,
                Location::Document,
                Snapshot::TextStyle(before),
                Snapshot::TextStyle(style),
            );
        }

        for section in doc.sections.iter_mut() {
            if section.has_heading() && !typography.heading.matches(&section.heading_style) {
                let style = typography.heading.text_style();
                let before = std::mem::replace(&mut section.heading_style, style.clone());
                pending.record(
                    ChangeKind::FontChange,
                    Location::Section {
                        section: section.id,
                    },
                    Snapshot::TextStyle(before),
                    Snapshot::TextStyle(style),
                );
            }

            let kind = section.kind;
            for (index, block) in section.blocks.iter_mut().enumerate() {
                let font = template::block_font(kind, block, ctx.rules);
                if font.matches(&block.text_style) {
                    continue;
                }
                let style = font.text_style();
                let before = std::mem::replace(&mut block.text_style, style.clone());
                pending.record(
                    ChangeKind::FontChange,
                    Location::Block {
                        section: section.id,
                        index,
                    },
                    Snapshot::TextStyle(before),
                    Snapshot::TextStyle(style),
                );
            }
        }
        Ok(RuleOutput::default())
    }
}

/// Applies line spacing, paragraph spacing, indent and alignment.
pub struct SpacingRule;

impl FormattingRule for SpacingRule {
    fn id(&self) -> &str {
        "spacing"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Stylistic
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        for section in doc.sections.iter_mut() {
            let kind = section.kind;
            for (index, block) in section.blocks.iter_mut().enumerate() {
                let expected = template::expected_paragraph_style(kind, block, ctx.rules);
                if block.paragraph_style == expected {
                    continue;
                }
                let before = std::mem::replace(&mut block.paragraph_style, expected.clone());
                pending.record(
                    ChangeKind::SpacingChange,
                    Location::Block {
                        section: section.id,
                        index,
                    },
                    Snapshot::ParagraphStyle(before),
                    Snapshot::ParagraphStyle(expected),
                );
            }
        }
        Ok(RuleOutput::default())
    }
}

/// Sets the template margins and column layout.
pub struct LayoutRule;

impl FormattingRule for LayoutRule {
    fn id(&self) -> &str {
        "page-layout"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Stylistic
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        if template::layout_matches(doc.metadata.layout.as_ref(), ctx.rules) {
            return Ok(RuleOutput::default());
        }
        let layout = ctx.rules.layout.clone();
        let before = match doc.metadata.layout.replace(layout.clone()) {
            Some(old) => Snapshot::Layout(old),
            None => Snapshot::Absent,
        };
        pending.record(
            ChangeKind::LayoutChange,
            Location::Document,
            before,
            Snapshot::Layout(layout),
        );
        Ok(RuleOutput::default())
    }
}

/// Rewrites figure and table captions with template labels and numbers.
pub struct CaptionRule;

impl FormattingRule for CaptionRule {
    fn id(&self) -> &str {
        "captions"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Stylistic
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        let mut figures = 0;
        let mut tables = 0;
        for section in doc.sections.iter_mut() {
            for (index, block) in section.blocks.iter_mut().enumerate() {
                let (kind, caption, n) = match &mut block.content {
                    BlockContent::Figure { caption, .. } => {
                        figures += 1;
                        (CaptionKind::Figure, caption, figures)
                    }
                    BlockContent::Table { caption, .. } => {
                        tables += 1;
                        (CaptionKind::Table, caption, tables)
                    }
                    _ => continue,
                };
                let expected = template::expected_caption(kind, n, caption, ctx.rules);
                if *caption == expected {
                    continue;
                }
                let before = std::mem::replace(caption, expected.clone());
                pending.record(
                    ChangeKind::CaptionFormat,
                    Location::Block {
                        section: section.id,
                        index,
                    },
                    Snapshot::Text(before),
                    Snapshot::Text(expected),
                );
            }
        }
        Ok(RuleOutput::default())
    }
}
