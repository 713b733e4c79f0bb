//! Citation rule.

use super::{FormattingRule, RuleContext, RuleOutput, RuleStage};
use crate::changes::PendingChanges;
use crate::citation::CitationConverter;
use crate::error::Result;
use crate::model::{Block, Document, SectionType};
use crate::template;

/// Converts in-text citations to IEEE numeric style and renumbers the
/// reference list.
pub struct CitationRule;

impl FormattingRule for CitationRule {
    fn id(&self) -> &str {
        "citations"
    }

    fn stage(&self) -> RuleStage {
        RuleStage::Citation
    }

    fn apply(
        &self,
        doc: &mut Document,
        ctx: &RuleContext<'_>,
        pending: &mut PendingChanges,
    ) -> Result<RuleOutput> {
        let entry = Block::text("");
        let converter = CitationConverter::new().with_entry_style(
            template::expected_text_style(SectionType::References, &entry, ctx.rules),
            template::expected_paragraph_style(SectionType::References, &entry, ctx.rules),
        );
        let report = converter.convert(doc, pending);
        Ok(RuleOutput {
            citations: Some(report),
            ..RuleOutput::default()
        })
    }
}
