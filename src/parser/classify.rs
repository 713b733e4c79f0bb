//! Heading classification.
//!
//! Maps heading text to a [`SectionType`] by keyword match against a fixed
//! vocabulary. The classifier is a pure function so the heuristic can be
//! tested apart from any container format.

use crate::model::SectionType;
use regex::Regex;
use std::sync::OnceLock;

/// Result of classifying one heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Section type
    pub kind: SectionType,
    /// Confidence in `kind` (0.0 - 1.0)
    pub confidence: f32,
}

impl Classification {
    /// Heading did not match the vocabulary.
    pub const UNCATEGORIZED: Classification = Classification {
        kind: SectionType::Uncategorized,
        confidence: 0.0,
    };

    /// Check whether the heading matched a known section type.
    pub fn is_known(&self) -> bool {
        self.kind != SectionType::Uncategorized
    }
}

const VOCABULARY: &[(&str, SectionType)] = &[
    ("abstract", SectionType::Abstract),
    ("summary", SectionType::Abstract),
    ("keywords", SectionType::Keywords),
    ("keyword", SectionType::Keywords),
    ("index terms", SectionType::Keywords),
    ("key words", SectionType::Keywords),
    ("introduction", SectionType::Introduction),
    ("intro", SectionType::Introduction),
    ("methodology", SectionType::Methodology),
    ("methods", SectionType::Methodology),
    ("method", SectionType::Methodology),
    ("materials and methods", SectionType::Methodology),
    ("proposed method", SectionType::Methodology),
    ("approach", SectionType::Methodology),
    ("results", SectionType::Results),
    ("experimental results", SectionType::Results),
    ("experiments", SectionType::Results),
    ("experiment", SectionType::Results),
    ("findings", SectionType::Results),
    ("key findings", SectionType::Results),
    ("key finding", SectionType::Results),
    ("evaluation", SectionType::Results),
    ("data", SectionType::Results),
    ("conclusion", SectionType::Conclusion),
    ("conclusions", SectionType::Conclusion),
    ("concluding remarks", SectionType::Conclusion),
    ("final thoughts", SectionType::Conclusion),
    ("final thought", SectionType::Conclusion),
    ("final remarks", SectionType::Conclusion),
    ("closing remarks", SectionType::Conclusion),
    ("closing", SectionType::Conclusion),
    ("references", SectionType::References),
    ("reference list", SectionType::References),
    ("bibliography", SectionType::References),
    ("works cited", SectionType::References),
    ("related work", SectionType::RelatedWork),
    ("related works", SectionType::RelatedWork),
    ("prior work", SectionType::RelatedWork),
    ("background", SectionType::RelatedWork),
    ("literature review", SectionType::LiteratureReview),
    ("review of literature", SectionType::LiteratureReview),
    ("literature", SectionType::LiteratureReview),
    ("discussion", SectionType::Discussion),
    ("analysis", SectionType::Discussion),
    ("implications", SectionType::Discussion),
    ("implication", SectionType::Discussion),
    ("recommendations", SectionType::Discussion),
    ("threats to validity", SectionType::Discussion),
    ("future work", SectionType::FutureWork),
    ("future works", SectionType::FutureWork),
    ("future research", SectionType::FutureWork),
    ("future directions", SectionType::FutureWork),
    ("what next", SectionType::FutureWork),
    ("acknowledgments", SectionType::Acknowledgments),
    ("acknowledgment", SectionType::Acknowledgments),
    ("acknowledgements", SectionType::Acknowledgments),
    ("acknowledgement", SectionType::Acknowledgments),
    ("appendix", SectionType::Appendix),
    ("appendices", SectionType::Appendix),
];

fn numbering_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:section|part|chapter)\s+\d+\s*[:.]?|[ivxlcdm]+[.)]|\d+(?:\.\d+)*[.)]?)\s+",
        )
        .expect("valid numbering regex")
    })
}

fn letter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[A-Za-z][.)]\s+").expect("valid letter regex"))
}

/// Remove a leading section number ("IV.", "2.", "Section 3:", "Part 1").
pub fn strip_numbering(heading: &str) -> &str {
    let rest = match numbering_regex().find(heading) {
        Some(m) => &heading[m.end()..],
        None => heading,
    };
    rest.trim()
}

/// Remove a leading subsection letter ("A.", "b)") or section number.
pub fn strip_subsection_numbering(heading: &str) -> &str {
    let heading = strip_numbering(heading);
    match letter_regex().find(heading) {
        Some(m) => heading[m.end()..].trim(),
        None => heading,
    }
}

/// Classify heading text into a section type.
///
/// Numbering prefixes are stripped, then every vocabulary keyword that
/// occurs on word boundaries is a candidate. A keyword at the start of the
/// heading beats one further in; among those, the longest wins. An exact
/// match has confidence 1.0, a leading match 0.9 and any other match 0.6.
pub fn classify_heading(heading: &str) -> Classification {
    let cleaned = strip_numbering(heading)
        .trim_end_matches([':', '.'])
        .to_lowercase();
    if cleaned.is_empty() {
        return Classification::UNCATEGORIZED;
    }

    let mut best: Option<(bool, usize, SectionType)> = None;
    for (keyword, kind) in VOCABULARY {
        let Some(pos) = find_word(&cleaned, keyword) else {
            continue;
        };
        let candidate = (pos == 0, keyword.len(), *kind);
        let better = match best {
            None => true,
            Some((leading, len, _)) => (candidate.0, candidate.1) > (leading, len),
        };
        if better {
            best = Some(candidate);
        }
    }

    match best {
        Some((leading, len, kind)) => {
            let confidence = if leading && len == cleaned.len() {
                1.0
            } else if leading {
                0.9
            } else {
                0.6
            };
            Classification { kind, confidence }
        }
        None => Classification::UNCATEGORIZED,
    }
}

/// Find `needle` in `haystack` on word boundaries.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before_ok = haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[i + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}
