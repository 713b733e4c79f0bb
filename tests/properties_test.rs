//! Property tests for formatting, detection, scoring and round trips.

use ieeefmt::score::{category_scores, overall_score};
use ieeefmt::{
    apply_formatting, detect_issues, parse, Block, Document, ExportFormat, Issue, IssueKind,
    Location, RuleSet, Section, SectionId, SectionType, Severity,
};
use proptest::prelude::*;

const ISSUE_KINDS: [IssueKind; 8] = [
    IssueKind::MissingTitle,
    IssueKind::MissingRequiredSection,
    IssueKind::SectionOutOfOrder,
    IssueKind::FontMismatch,
    IssueKind::CaptionFormat,
    IssueKind::NonIeeeCitationStyle,
    IssueKind::UnresolvedReference,
    IssueKind::UncitedReference,
];

/// Citation markers appended to generated paragraphs, resolvable or not.
const MARKERS: [&str; 9] = [
    "",
    " (Smith, 2020)",
    " (Lee, 2019)",
    " [1]",
    " [2]",
    " [1, 9]",
    " [2-3]",
    " [?4]",
    " (Lee, 2019; Nobody, 1999)",
];

fn paragraph() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z]{1,8}", 1..12),
        prop::collection::vec(0..MARKERS.len(), 1..3),
    )
        .prop_map(|(words, markers)| {
            let mut text = words.join(" ");
            for marker in markers {
                text.push_str(MARKERS[marker]);
            }
            text.push('.');
            text
        })
}

fn section_shape() -> impl Strategy<Value = (bool, Vec<String>)> {
    (prop::bool::ANY, prop::collection::vec(paragraph(), 0..4))
}

prop_compose! {
    fn document()(
        kinds in prop::sample::subsequence(SectionType::ALL.to_vec(), 0..8).prop_shuffle(),
        shapes in prop::collection::vec(section_shape(), 8),
        titled in prop::bool::ANY,
        bibliography in prop::bool::ANY,
    ) -> Document {
        let mut doc = if titled { Document::with_title("Generated Paper") } else { Document::new() };
        for (kind, (headed, paragraphs)) in kinds.into_iter().zip(shapes) {
            let heading = headed.then(|| kind.name().to_string());
            let mut section = Section::new(SectionId(0), kind, heading);
            for text in paragraphs {
                section.add_block(Block::text(text));
            }
            doc.push_section(section);
        }
        if bibliography {
            doc.bibliography.push(Some("1".into()), "Smith, J. Trees. 2020.");
            doc.bibliography.push(Some("2".into()), "Brown, A. Unused. 2015.");
            doc.bibliography.push(Some("3".into()), "Lee, K. Graphs. 2019.");
        }
        doc
    }
}

fn issues() -> impl Strategy<Value = Vec<Issue>> {
    prop::collection::vec((0..ISSUE_KINDS.len(), 0..3usize), 0..30).prop_map(|shapes| {
        shapes
            .into_iter()
            .map(|(kind, severity)| {
                Issue::new(ISSUE_KINDS[kind], Location::Document, "generated")
                    .with_severity(Severity::ALL[severity])
            })
            .collect()
    })
}

fn overall(issues: &[Issue], rules: &RuleSet) -> f64 {
    overall_score(&category_scores(issues, rules), rules)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn formatting_is_idempotent(doc in document()) {
        let rules = RuleSet::default();
        let (formatted, _) = apply_formatting(&doc, &rules).unwrap();
        let (again, changes) = apply_formatting(&formatted, &rules).unwrap();
        prop_assert!(changes.is_empty(), "second run changed: {:?}", changes);
        prop_assert_eq!(again, formatted);
    }

    #[test]
    fn formatting_never_adds_sections(doc in document()) {
        let (formatted, _) = apply_formatting(&doc, &RuleSet::default()).unwrap();
        prop_assert_eq!(formatted.sections.len(), doc.sections.len());
        prop_assert!(formatted.validate().is_ok());
    }

    #[test]
    fn detection_is_deterministic(doc in document()) {
        prop_assert_eq!(detect_issues(&doc), detect_issues(&doc));
    }

    #[test]
    fn json_round_trip(doc in document()) {
        prop_assume!(doc.metadata.title.is_some() && !doc.sections.is_empty());
        let bytes = ieeefmt::export(&doc, ExportFormat::Json).unwrap();
        prop_assert_eq!(parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn removing_issues_never_lowers_the_score(
        all in issues(),
        keep in prop::collection::vec(prop::bool::ANY, 30),
    ) {
        let rules = RuleSet::default();
        let subset: Vec<Issue> = all
            .iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(issue, _)| issue.clone())
            .collect();
        prop_assert!(overall(&subset, &rules) >= overall(&all, &rules));
    }

    #[test]
    fn lowering_severity_never_lowers_the_score(all in issues()) {
        let rules = RuleSet::default();
        let milder: Vec<Issue> = all
            .iter()
            .map(|issue| issue.clone().with_severity(Severity::Low))
            .collect();
        prop_assert!(overall(&milder, &rules) >= overall(&all, &rules));
        let score = overall(&all, &rules);
        prop_assert!((0.0..=100.0).contains(&score));
    }
}
