//! Built-in checks.

use super::{Check, Issue, IssueKind};
use crate::citation::{self, CitationStyle};
use crate::model::{BlockContent, Document, Location, SectionType};
use crate::ruleset::RuleSet;
use crate::template::{self, CaptionKind};

/// The document has a title.
pub struct TitleCheck;

impl Check for TitleCheck {
    fn id(&self) -> &str {
        "title"
    }

    fn check(&self, doc: &Document, _rules: &RuleSet) -> Vec<Issue> {
        let has_title = doc
            .metadata
            .title
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if has_title {
            Vec::new()
        } else {
            vec![Issue::new(
                IssueKind::MissingTitle,
                Location::Document,
                "Document has no title",
            )]
        }
    }
}

/// Every required section type is present.
pub struct RequiredSectionsCheck;

impl Check for RequiredSectionsCheck {
    fn id(&self) -> &str {
        "required-sections"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        rules
            .required_sections
            .iter()
            .filter(|kind| !doc.has_kind(**kind))
            .map(|kind| {
                Issue::new(
                    IssueKind::MissingRequiredSection,
                    Location::Document,
                    format!("Required section '{}' is missing", kind),
                )
            })
            .collect()
    }
}

/// Categorized sections follow the canonical order.
pub struct SectionOrderCheck;

impl Check for SectionOrderCheck {
    fn id(&self) -> &str {
        "section-order"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut furthest: Option<(usize, SectionType)> = None;

        for section in &doc.sections {
            if section.kind == SectionType::Uncategorized {
                continue;
            }
            let Some(rank) = rules.rank(section.kind) else {
                continue;
            };
            match furthest {
                Some((max, kind)) if rank < max => issues.push(Issue::new(
                    IssueKind::SectionOutOfOrder,
                    Location::Section {
                        section: section.id,
                    },
                    format!(
                        "Section '{}' should appear before '{}'",
                        section.kind, kind
                    ),
                )),
                Some((max, _)) if rank == max => {}
                _ => furthest = Some((rank, section.kind)),
            }
        }
        issues
    }
}

/// The abstract length is within the configured range.
pub struct AbstractLengthCheck;

impl Check for AbstractLengthCheck {
    fn id(&self) -> &str {
        "abstract-length"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let Some(section) = doc.find_kind(SectionType::Abstract) else {
            return Vec::new();
        };
        let words = section.word_count();
        let range = rules.abstract_words;
        if range.contains(words) {
            return Vec::new();
        }
        vec![Issue::new(
            IssueKind::AbstractWordCount,
            Location::Section {
                section: section.id,
            },
            format!(
                "Abstract has {} words (expected {}-{})",
                words, range.min, range.max
            ),
        )]
    }
}

/// Section headings and subheadings are present, numbered and cased.
pub struct HeadingCheck;

impl Check for HeadingCheck {
    fn id(&self) -> &str {
        "headings"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let mut issues = Vec::new();
        let expected = template::expected_headings(doc, rules);

        for (section, expected) in doc.sections.iter().zip(expected) {
            let location = Location::Section {
                section: section.id,
            };
            if !section.has_heading() {
                issues.push(
                    Issue::new(
                        IssueKind::MissingSectionHeading,
                        location,
                        format!("'{}' section has no heading", section.kind),
                    )
                    .with_fixable(expected.is_some()),
                );
            } else if let Some(expected) = expected {
                if section.heading_text() != expected {
                    issues.push(Issue::new(
                        IssueKind::HeadingFormat,
                        location,
                        format!(
                            "Heading '{}' should read '{}'",
                            section.heading_text(),
                            expected
                        ),
                    ));
                }
            }

            let mut n = 0;
            for (index, block) in section.blocks.iter().enumerate() {
                if let BlockContent::Subheading { text } = &block.content {
                    n += 1;
                    let expected = template::expected_subheading(text, n, rules);
                    if *text != expected {
                        issues.push(Issue::new(
                            IssueKind::HeadingFormat,
                            Location::Block {
                                section: section.id,
                                index,
                            },
                            format!("Subheading '{}' should read '{}'", text, expected),
                        ));
                    }
                }
            }
        }
        issues
    }
}

/// Title, headings and blocks use the template fonts.
pub struct TypographyCheck;

impl Check for TypographyCheck {
    fn id(&self) -> &str {
        "typography"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let mut issues = Vec::new();
        let title_rule = &rules.typography.title;
        if doc.metadata.title.is_some() && !title_rule.matches(&doc.metadata.title_style) {
            issues.push(Issue::new(
                IssueKind::FontMismatch,
                Location::Document,
                format!(
                    "Title should be {}pt {}{}",
                    title_rule.size,
                    title_rule.family,
                    if title_rule.bold { " bold" } else { "" }
                ),
            ));
        }

        for section in &doc.sections {
            let mut mismatched = section
                .blocks
                .iter()
                .filter(|b| !template::block_font(section.kind, b, rules).matches(&b.text_style))
                .count();
            if section.has_heading() && !rules.typography.heading.matches(&section.heading_style) {
                mismatched += 1;
            }
            if mismatched > 0 {
                let body = rules.body_font(section.kind);
                issues.push(Issue::new(
                    IssueKind::FontMismatch,
                    Location::Section {
                        section: section.id,
                    },
                    format!(
                        "{} element(s) in '{}' differ from {}pt {}",
                        mismatched, section.kind, body.size, body.family
                    ),
                ));
            }
        }
        issues
    }
}

/// Paragraph spacing and alignment match the template.
pub struct SpacingCheck;

impl Check for SpacingCheck {
    fn id(&self) -> &str {
        "spacing"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        doc.sections
            .iter()
            .filter_map(|section| {
                let mismatched = section
                    .blocks
                    .iter()
                    .filter(|b| {
                        b.paragraph_style
                            != template::expected_paragraph_style(section.kind, b, rules)
                    })
                    .count();
                (mismatched > 0).then(|| {
                    Issue::new(
                        IssueKind::SpacingMismatch,
                        Location::Section {
                            section: section.id,
                        },
                        format!(
                            "{} paragraph(s) in '{}' have non-template spacing or alignment",
                            mismatched, section.kind
                        ),
                    )
                })
            })
            .collect()
    }
}

/// Page margins and columns match the template.
pub struct LayoutCheck;

impl Check for LayoutCheck {
    fn id(&self) -> &str {
        "page-layout"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        if template::layout_matches(doc.metadata.layout.as_ref(), rules) {
            return Vec::new();
        }
        let expected = &rules.layout;
        let message = match &doc.metadata.layout {
            None => format!(
                "Page layout is unspecified (expected {}\" margins, {} columns)",
                expected.margins.top, expected.columns
            ),
            Some(layout) => format!(
                "Page layout has {} column(s) and {}\"/{}\"/{}\"/{}\" margins (expected {} columns, {}\" margins)",
                layout.columns,
                layout.margins.top,
                layout.margins.bottom,
                layout.margins.left,
                layout.margins.right,
                expected.columns,
                expected.margins.top
            ),
        };
        vec![Issue::new(IssueKind::LayoutMismatch, Location::Document, message)]
    }
}

/// Figure and table captions use the template labels and numbering.
pub struct CaptionCheck;

impl Check for CaptionCheck {
    fn id(&self) -> &str {
        "captions"
    }

    fn check(&self, doc: &Document, rules: &RuleSet) -> Vec<Issue> {
        let mut issues = Vec::new();
        let mut figures = 0;
        let mut tables = 0;
        for section in &doc.sections {
            for (index, block) in section.blocks.iter().enumerate() {
                let (kind, caption, n) = match &block.content {
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
                let expected = template::expected_caption(kind, n, caption, rules);
                if *caption != expected {
                    issues.push(Issue::new(
                        IssueKind::CaptionFormat,
                        Location::Block {
                            section: section.id,
                            index,
                        },
                        format!("Caption '{}' should read '{}'", caption, expected),
                    ));
                }
            }
        }
        issues
    }
}

/// Citations are numeric, consistent, ordered and resolvable.
pub struct CitationCheck;

impl Check for CitationCheck {
    fn id(&self) -> &str {
        "citations"
    }

    fn check(&self, doc: &Document, _rules: &RuleSet) -> Vec<Issue> {
        let analysis = citation::analyze(doc);
        let mut issues = Vec::new();

        if analysis.has_style(CitationStyle::Numeric) && analysis.has_style(CitationStyle::AuthorYear)
        {
            issues.push(Issue::new(
                IssueKind::MixedCitationStyles,
                Location::Document,
                "Numeric and author-year citations are mixed",
            ));
        }

        let mut flagged: Vec<Location> = Vec::new();
        for occurrence in &analysis.occurrences {
            if occurrence.marker.style == CitationStyle::AuthorYear
                && !flagged.contains(&occurrence.location)
            {
                flagged.push(occurrence.location);
                issues.push(Issue::new(
                    IssueKind::NonIeeeCitationStyle,
                    occurrence.location,
                    format!(
                        "Citation '{}' is not in IEEE numeric style",
                        occurrence.marker.text
                    ),
                ));
            }
        }

        if !doc.bibliography.is_empty() && !analysis.is_in_citation_order(&doc.bibliography) {
            issues.push(Issue::new(
                IssueKind::CitationOrder,
                Location::Document,
                "References are not numbered in order of first citation",
            ));
        }

        for unresolved in &analysis.unresolved {
            issues.push(Issue::new(
                IssueKind::UnresolvedReference,
                unresolved.location,
                format!(
                    "Citation '{}' does not match any reference entry",
                    unresolved.marker
                ),
            ));
        }

        for entry in analysis.uncited(&doc.bibliography) {
            issues.push(Issue::new(
                IssueKind::UncitedReference,
                Location::Document,
                format!("Reference '{}' is never cited", entry.key),
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, PageLayout, Section, SectionId};

    fn doc_with(kinds: &[SectionType]) -> Document {
        let mut doc = Document::with_title("A Study");
        for kind in kinds {
            doc.push_section(Section::new(
                SectionId(0),
                *kind,
                Some(kind.name().to_string()),
            ));
        }
        doc
    }

    fn kinds(issues: &[Issue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_missing_title() {
        let rules = RuleSet::default();
        assert_eq!(
            kinds(&TitleCheck.check(&Document::new(), &rules)),
            vec![IssueKind::MissingTitle]
        );
        assert!(TitleCheck.check(&doc_with(&[]), &rules).is_empty());
    }

    #[test]
    fn test_required_sections() {
        let doc = doc_with(&[SectionType::Introduction, SectionType::References]);
        let issues = RequiredSectionsCheck.check(&doc, &RuleSet::default());
        assert_eq!(issues.len(), 5);
        assert!(issues[0].message.contains("Abstract"));
        assert!(!issues[0].fixable);
    }

    #[test]
    fn test_section_order() {
        let doc = doc_with(&[
            SectionType::References,
            SectionType::Introduction,
            SectionType::Abstract,
        ]);
        let issues = SectionOrderCheck.check(&doc, &RuleSet::default());
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0].location,
            Location::Section {
                section: SectionId(1)
            }
        );
    }

    #[test]
    fn test_abstract_length() {
        let mut doc = doc_with(&[SectionType::Abstract]);
        doc.sections[0].add_block(Block::text("Too short."));
        let issues = AbstractLengthCheck.check(&doc, &RuleSet::default());
        assert_eq!(kinds(&issues), vec![IssueKind::AbstractWordCount]);
        assert!(issues[0].message.contains("2 words"));

        doc.sections[0].blocks[0] = Block::text(vec!["word"; 180].join(" "));
        assert!(AbstractLengthCheck.check(&doc, &RuleSet::default()).is_empty());
    }

    #[test]
    fn test_headings() {
        let mut doc = doc_with(&[SectionType::Introduction, SectionType::Uncategorized]);
        doc.sections[1].heading = None;
        doc.sections[0].add_block(Block::subheading("Scope"));
        let issues = HeadingCheck.check(&doc, &RuleSet::default());
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::HeadingFormat,
                IssueKind::HeadingFormat,
                IssueKind::MissingSectionHeading
            ]
        );
        assert!(!issues[2].fixable);
    }

    #[test]
    fn test_typography_and_spacing() {
        let rules = RuleSet::default();
        let mut doc = doc_with(&[SectionType::Results]);
        doc.sections[0].add_block(Block::text("Body."));
        assert_eq!(TypographyCheck.check(&doc, &rules).len(), 2);
        assert_eq!(SpacingCheck.check(&doc, &rules).len(), 1);

        doc.metadata.title_style = rules.typography.title.text_style();
        doc.sections[0].heading_style = rules.typography.heading.text_style();
        let block = &mut doc.sections[0].blocks[0];
        block.text_style = rules.typography.body.text_style();
        block.paragraph_style =
            template::expected_paragraph_style(SectionType::Results, block, &rules);
        assert!(TypographyCheck.check(&doc, &rules).is_empty());
        assert!(SpacingCheck.check(&doc, &rules).is_empty());
    }

    #[test]
    fn test_layout() {
        let rules = RuleSet::default();
        let mut doc = doc_with(&[]);
        assert_eq!(LayoutCheck.check(&doc, &rules).len(), 1);
        doc.metadata.layout = Some(PageLayout {
            columns: 1,
            ..rules.layout.clone()
        });
        assert!(LayoutCheck.check(&doc, &rules)[0].message.contains("1 column"));
        doc.metadata.layout = Some(rules.layout.clone());
        assert!(LayoutCheck.check(&doc, &rules).is_empty());
    }

    #[test]
    fn test_captions() {
        let mut doc = doc_with(&[SectionType::Results]);
        doc.sections[0].add_block(Block::figure("Figure 1: Accuracy", None));
        doc.sections[0].add_block(Block::table("TABLE I. Data", Vec::new()));
        let issues = CaptionCheck.check(&doc, &RuleSet::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Fig. 1. Accuracy"));
    }

    #[test]
    fn test_citations() {
        let mut doc = doc_with(&[SectionType::Introduction]);
        doc.sections[0].add_block(Block::text("See (Smith, 2020) and [1] and [4]."));
        doc.bibliography.push(Some("1".into()), "Smith, J. Deep. 2020.");
        doc.bibliography.push(Some("2".into()), "Lee, K. Graphs. 2019.");
        let issues = CitationCheck.check(&doc, &RuleSet::default());
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::MixedCitationStyles,
                IssueKind::NonIeeeCitationStyle,
                IssueKind::UnresolvedReference,
                IssueKind::UncitedReference,
            ]
        );
    }
}
