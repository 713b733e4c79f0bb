//! What a compliant document looks like under a rule set.
//!
//! The issue checks and the formatting rules both derive their targets from
//! these functions, so a document the formatter has rewritten produces no
//! further issues or changes for the same rule set.

use crate::model::{
    Block, BlockContent, Document, PageLayout, ParagraphStyle, Section, SectionId, SectionType,
    TextStyle,
};
use crate::parser::{strip_caption_label, strip_numbering, strip_subsection_numbering};
use crate::ruleset::{FontRule, RuleSet};

const LAYOUT_TOLERANCE: f32 = 0.01;

/// Section order the rule set asks for.
///
/// Sections of a listed type are sorted by rank. Any other section keeps its
/// place after the categorized section that precedes it in the current
/// order, or stays in front when nothing precedes it.
pub fn canonical_order(doc: &Document, rules: &RuleSet) -> Vec<SectionId> {
    let mut anchor: i64 = -1;
    let mut keyed: Vec<((i64, u8, usize), SectionId)> = doc
        .sections
        .iter()
        .enumerate()
        .map(|(pos, section)| match rules.rank(section.kind) {
            Some(rank) if section.kind != SectionType::Uncategorized => {
                anchor = rank as i64;
                ((anchor, 0, pos), section.id)
            }
            _ => ((anchor, 1, pos), section.id),
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, id)| id).collect()
}

/// Section order pinned by the user.
///
/// Locked ids that no longer exist are skipped; sections added after the
/// lock follow in their current relative order.
pub fn locked_order(doc: &Document, locked: &[SectionId]) -> Vec<SectionId> {
    let mut order: Vec<SectionId> = locked
        .iter()
        .copied()
        .filter(|id| doc.section(*id).is_some())
        .collect();
    for id in doc.section_ids() {
        if !order.contains(&id) {
            order.push(id);
        }
    }
    order
}

/// Heading text before numbering and case are applied.
///
/// `None` for an uncategorized section without a heading, which has no name
/// to give it.
pub fn heading_base(section: &Section, rules: &RuleSet) -> Option<String> {
    if let Some(fixed) = rules.fixed_heading(section.kind) {
        return Some(fixed.to_string());
    }
    let written = section
        .heading
        .as_deref()
        .map(strip_numbering)
        .filter(|h| !h.is_empty());
    match written {
        Some(text) => Some(text.to_string()),
        None if section.kind != SectionType::Uncategorized => Some(section.kind.name().to_string()),
        None => None,
    }
}

/// Expected heading for every section, by current position.
///
/// Numbers are assigned in document order to numbered sections that have a
/// heading to show.
pub fn expected_headings(doc: &Document, rules: &RuleSet) -> Vec<Option<String>> {
    let mut counter = 0;
    doc.sections
        .iter()
        .map(|section| {
            let base = heading_base(section, rules)?;
            let text = rules.headings.case.apply(&base);
            if !rules.is_numbered(section.kind) {
                return Some(text);
            }
            counter += 1;
            match rules.headings.numbering.format(counter) {
                Some(number) => Some(format!("{}. {}", number, text)),
                None => Some(text),
            }
        })
        .collect()
}

/// Expected text of the `n`th (1-based) subheading in a section.
pub fn expected_subheading(text: &str, n: u32, rules: &RuleSet) -> String {
    let base = strip_subsection_numbering(text);
    match rules.headings.subsection_numbering.format(n) {
        Some(label) => format!("{}. {}", label, base),
        None => base.to_string(),
    }
}

/// Caption kinds that carry their own numbering sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionKind {
    /// Figure caption
    Figure,
    /// Table caption
    Table,
}

/// Expected caption for the `n`th (1-based) figure or table.
pub fn expected_caption(kind: CaptionKind, n: u32, caption: &str, rules: &RuleSet) -> String {
    let (prefix, numbering) = match kind {
        CaptionKind::Figure => (&rules.captions.figure_prefix, rules.captions.figure_numbering),
        CaptionKind::Table => (&rules.captions.table_prefix, rules.captions.table_numbering),
    };
    let label = match numbering.format(n) {
        Some(number) => format!("{} {}.", prefix, number),
        None => format!("{}.", prefix),
    };
    let body = strip_caption_label(caption);
    if body.is_empty() {
        label
    } else {
        format!("{} {}", label, body)
    }
}

/// Font rule for a block inside a section of the given type.
pub fn block_font<'a>(kind: SectionType, block: &Block, rules: &'a RuleSet) -> &'a FontRule {
    match block.content {
        BlockContent::Subheading { .. } => &rules.typography.subheading,
        BlockContent::Figure { .. } | BlockContent::Table { .. } => &rules.typography.caption,
        BlockContent::Text { .. } | BlockContent::Equation { .. } => rules.body_font(kind),
    }
}

/// Character style a block should carry.
pub fn expected_text_style(kind: SectionType, block: &Block, rules: &RuleSet) -> TextStyle {
    block_font(kind, block, rules).text_style()
}

/// Paragraph style a block should carry.
pub fn expected_paragraph_style(kind: SectionType, block: &Block, rules: &RuleSet) -> ParagraphStyle {
    let spacing = &rules.spacing;
    let alignment = match block.content {
        BlockContent::Equation { .. } => crate::model::Alignment::Center,
        _ => block_font(kind, block, rules).alignment,
    };
    ParagraphStyle {
        alignment: Some(alignment),
        line_spacing: Some(spacing.line_spacing),
        space_before: Some(spacing.space_before),
        space_after: Some(spacing.space_after),
        first_line_indent: Some(spacing.first_line_indent),
    }
}

/// Check whether a document's page layout satisfies the rule set.
pub fn layout_matches(layout: Option<&PageLayout>, rules: &RuleSet) -> bool {
    match layout {
        Some(layout) => {
            layout.columns == rules.layout.columns
                && layout
                    .margins
                    .approx_eq(&rules.layout.margins, LAYOUT_TOLERANCE)
                && (layout.column_gap - rules.layout.column_gap).abs() <= LAYOUT_TOLERANCE
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_of(kinds: &[(SectionType, Option<&str>)]) -> Document {
        let mut doc = Document::with_title("Paper");
        for (kind, heading) in kinds {
            doc.push_section(Section::new(
                SectionId(0),
                *kind,
                heading.map(|h| h.to_string()),
            ));
        }
        doc
    }

    #[test]
    fn test_canonical_order_sorts_by_rank() {
        let doc = doc_of(&[
            (SectionType::References, None),
            (SectionType::Introduction, None),
            (SectionType::Abstract, None),
        ]);
        let order = canonical_order(&doc, &RuleSet::default());
        assert_eq!(order, vec![SectionId(2), SectionId(1), SectionId(0)]);
    }

    #[test]
    fn test_uncategorized_follows_its_anchor() {
        let doc = doc_of(&[
            (SectionType::Results, None),
            (SectionType::Uncategorized, Some("Case Study")),
            (SectionType::Introduction, None),
            (SectionType::Uncategorized, Some("System Model")),
        ]);
        let rules = RuleSet::default();
        let order = canonical_order(&doc, &rules);
        assert_eq!(
            order,
            vec![SectionId(2), SectionId(3), SectionId(0), SectionId(1)]
        );

        // Applying the order again changes nothing.
        let mut sorted = doc.clone();
        sorted.sections = order
            .iter()
            .filter_map(|id| doc.section(*id).cloned())
            .collect();
        sorted.renumber();
        assert_eq!(canonical_order(&sorted, &rules), order);
    }

    #[test]
    fn test_locked_order_skips_missing_and_appends_new() {
        let doc = doc_of(&[
            (SectionType::Abstract, None),
            (SectionType::Introduction, None),
            (SectionType::Results, None),
        ]);
        let order = locked_order(&doc, &[SectionId(1), SectionId(9), SectionId(0)]);
        assert_eq!(order, vec![SectionId(1), SectionId(0), SectionId(2)]);
    }

    #[test]
    fn test_expected_headings() {
        let doc = doc_of(&[
            (SectionType::Abstract, Some("Summary")),
            (SectionType::Keywords, None),
            (SectionType::Introduction, Some("1. Introduction")),
            (SectionType::Uncategorized, Some("Proposed system")),
            (SectionType::Uncategorized, None),
            (SectionType::Methodology, None),
            (SectionType::References, Some("Bibliography")),
        ]);
        let headings = expected_headings(&doc, &RuleSet::default());
        assert_eq!(
            headings,
            vec![
                Some("ABSTRACT".to_string()),
                Some("INDEX TERMS".to_string()),
                Some("I. INTRODUCTION".to_string()),
                Some("II. PROPOSED SYSTEM".to_string()),
                None,
                Some("III. METHODOLOGY".to_string()),
                Some("REFERENCES".to_string()),
            ]
        );
    }

    #[test]
    fn test_expected_heading_is_stable() {
        let rules = RuleSet::default();
        let doc = doc_of(&[(SectionType::Introduction, Some("I. INTRODUCTION"))]);
        assert_eq!(
            expected_headings(&doc, &rules)[0].as_deref(),
            Some("I. INTRODUCTION")
        );
    }

    #[test]
    fn test_subheadings_and_captions() {
        let rules = RuleSet::default();
        assert_eq!(expected_subheading("2.1 Data", 1, &rules), "A. Data");
        assert_eq!(expected_subheading("A. Data", 1, &rules), "A. Data");
        assert_eq!(
            expected_caption(CaptionKind::Figure, 3, "Figure 1: Accuracy", &rules),
            "Fig. 3. Accuracy"
        );
        assert_eq!(
            expected_caption(CaptionKind::Table, 2, "Table 2 - Datasets", &rules),
            "TABLE II. Datasets"
        );
        assert_eq!(expected_caption(CaptionKind::Table, 1, "", &rules), "TABLE I.");
        assert_eq!(
            expected_caption(CaptionKind::Figure, 1, "Fig. 1. Accuracy", &rules),
            "Fig. 1. Accuracy"
        );
    }

    #[test]
    fn test_block_styles() {
        let rules = RuleSet::default();
        let text = Block::text("x");
        assert_eq!(
            expected_text_style(SectionType::Abstract, &text, &rules).font_size,
            Some(9.0)
        );
        let caption = Block::figure("Fig. 1.", None);
        assert_eq!(
            expected_text_style(SectionType::Results, &caption, &rules).font_size,
            Some(8.0)
        );
        let style = expected_paragraph_style(SectionType::Results, &Block::equation("x"), &rules);
        assert_eq!(style.alignment, Some(crate::model::Alignment::Center));
    }

    #[test]
    fn test_layout_matches() {
        let rules = RuleSet::default();
        assert!(!layout_matches(None, &rules));
        assert!(layout_matches(Some(&rules.layout), &rules));
        let mut wide = rules.layout.clone();
        wide.margins.left = 1.0;
        assert!(!layout_matches(Some(&wide), &rules));
    }
}
