//! In-text citation analysis and IEEE numeric conversion.
//!
//! Markers in any supported style are scanned out of body text, resolved
//! against the bibliography, and rewritten as `[n]` in order of first
//! appearance. The reference list is renumbered to match.

use crate::changes::{ChangeKind, PendingChanges, Snapshot};
use crate::model::{
    BibEntry, Bibliography, Block, BlockContent, Document, Location, ParagraphStyle, SectionType,
    TextStyle,
};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::OnceLock;

/// Largest numeric range ("[2-40]") expanded into individual labels.
const MAX_RANGE_SPAN: u32 = 100;

/// Prefix marking a numeric label that matched no reference, as in `[?9]`.
/// Flagged labels never resolve, so renumbering cannot redirect them.
const UNRESOLVED_MARK: char = '?';

fn numeric_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\s*(\??\d+(?:\s*[-–]\s*\d+)?(?:\s*,\s*\??\d+(?:\s*[-–]\s*\d+)?)*)\s*\]")
            .expect("valid numeric citation regex")
    })
}

fn parenthetical_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]+)\)").expect("valid parenthetical citation regex"))
}

fn bracketed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid bracketed citation regex"))
}

fn author_year_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(\p{Lu}[\p{L}'\-]+)(?:\s+et\s+al\.?|\s+(?:and|&)\s+\p{Lu}[\p{L}'\-]+)?\s*,?\s+((?:19|20)\d{2}[a-z]?)\s*$",
        )
        .expect("valid author-year regex")
    })
}

fn narrative_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(\p{Lu}[\p{L}'\-]+)(?:\s+et\s+al\.?|\s+(?:and|&)\s+\p{Lu}[\p{L}'\-]+)?\s+(\(((?:19|20)\d{2}[a-z]?)\))",
        )
        .expect("valid narrative citation regex")
    })
}

/// Citation style of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    /// `[1]`, `[1, 3]`, `[2-4]`, and flagged labels such as `[?9]`
    Numeric,
    /// `(Smith, 2020)`, `[Smith, 2020]`, `Smith (2020)`
    AuthorYear,
}

/// One cited source inside a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CitationRef {
    /// Reference list label, as in `[3]`
    Label {
        /// Label text
        label: String,
    },
    /// First author and year
    AuthorYear {
        /// First author's surname
        surname: String,
        /// Year, possibly with a disambiguating letter
        year: String,
    },
}

impl CitationRef {
    /// Find the bibliography entry this reference points to.
    pub fn resolve<'a>(&self, bibliography: &'a Bibliography) -> Option<&'a BibEntry> {
        match self {
            CitationRef::Label { label } if label.starts_with(UNRESOLVED_MARK) => None,
            CitationRef::Label { label } => bibliography.by_label(label),
            CitationRef::AuthorYear { surname, year } => {
                let key = format!("{}{}", surname.to_lowercase(), year);
                bibliography
                    .get(&key)
                    .or_else(|| bibliography.by_author_year(&key))
            }
        }
    }
}

/// A citation marker found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMarker {
    /// Byte range of the marker in the scanned text
    pub range: Range<usize>,
    /// Marker style
    pub style: CitationStyle,
    /// Cited sources, in the order written
    pub refs: Vec<CitationRef>,
    /// Written text of each source, parallel to `refs`
    pub sources: Vec<String>,
    /// Marker text as written
    pub text: String,
}

/// Find all citation markers in a piece of text, in order.
///
/// For narrative citations ("Smith (2020)") only the parenthesised year is
/// the marker; the author's name stays part of the sentence.
pub fn scan_markers(text: &str) -> Vec<CitationMarker> {
    let mut found = Vec::new();

    for caps in numeric_regex().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let refs = expand_labels(inner.as_str());
        let sources = refs
            .iter()
            .map(|r| match r {
                CitationRef::Label { label } => label.clone(),
                CitationRef::AuthorYear { surname, year } => format!("{}, {}", surname, year),
            })
            .collect();
        found.push(CitationMarker {
            range: whole.range(),
            style: CitationStyle::Numeric,
            refs,
            sources,
            text: whole.as_str().to_string(),
        });
    }

    for regex in [parenthetical_regex(), bracketed_regex()] {
        for caps in regex.captures_iter(text) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(items) = parse_author_year_list(inner.as_str()) {
                let (refs, sources) = items.into_iter().unzip();
                found.push(CitationMarker {
                    range: whole.range(),
                    style: CitationStyle::AuthorYear,
                    refs,
                    sources,
                    text: whole.as_str().to_string(),
                });
            }
        }
    }

    for caps in narrative_regex().captures_iter(text) {
        let (Some(surname), Some(paren), Some(year)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            continue;
        };
        found.push(CitationMarker {
            range: paren.range(),
            style: CitationStyle::AuthorYear,
            refs: vec![CitationRef::AuthorYear {
                surname: surname.as_str().to_string(),
                year: year.as_str().to_string(),
            }],
            sources: vec![format!("{}, {}", surname.as_str(), year.as_str())],
            text: paren.as_str().to_string(),
        });
    }

    found.sort_by_key(|m| (m.range.start, std::cmp::Reverse(m.range.end)));
    let mut markers: Vec<CitationMarker> = Vec::with_capacity(found.len());
    for marker in found {
        let overlaps = markers
            .last()
            .map(|prev| marker.range.start < prev.range.end)
            .unwrap_or(false);
        if !overlaps {
            markers.push(marker);
        }
    }
    markers
}

fn expand_labels(inner: &str) -> Vec<CitationRef> {
    let mut labels = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if let Some(flagged) = part.strip_prefix(UNRESOLVED_MARK) {
            if let Ok(n) = flagged.trim().parse::<u32>() {
                labels.push(format!("{}{}", UNRESOLVED_MARK, n));
            }
            continue;
        }
        let bounds: Vec<u32> = part
            .split(['-', '–'])
            .filter_map(|n| n.trim().parse().ok())
            .collect();
        match bounds.as_slice() {
            [start, end] if start <= end && end - start <= MAX_RANGE_SPAN => {
                labels.extend((*start..=*end).map(|n| n.to_string()));
            }
            [single] => labels.push(single.to_string()),
            _ => labels.extend(bounds.iter().map(|n| n.to_string())),
        }
    }
    labels
        .into_iter()
        .map(|label| CitationRef::Label { label })
        .collect()
}

fn parse_author_year_list(inner: &str) -> Option<Vec<(CitationRef, String)>> {
    inner
        .split(';')
        .map(|item| {
            let caps = author_year_item_regex().captures(item)?;
            let reference = CitationRef::AuthorYear {
                surname: caps.get(1)?.as_str().to_string(),
                year: caps.get(2)?.as_str().to_string(),
            };
            Some((reference, item.trim().to_string()))
        })
        .collect()
}

/// A marker found at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationOccurrence {
    /// Block holding the marker
    pub location: Location,
    /// The marker
    pub marker: CitationMarker,
}

/// A marker that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCitation {
    /// Block holding the marker
    pub location: Location,
    /// Marker text as written
    pub marker: String,
}

/// Citation usage across a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationAnalysis {
    /// Every marker in body text, in reading order
    pub occurrences: Vec<CitationOccurrence>,
    /// Keys of cited entries, in order of first appearance, including
    /// resolvable sources of partly unresolved markers
    pub cited: Vec<String>,
    /// Markers with at least one unresolvable source
    pub unresolved: Vec<UnresolvedCitation>,
}

impl CitationAnalysis {
    /// Check whether any marker uses the given style.
    pub fn has_style(&self, style: CitationStyle) -> bool {
        self.occurrences.iter().any(|o| o.marker.style == style)
    }

    /// Bibliography entries never cited.
    pub fn uncited<'a>(&self, bibliography: &'a Bibliography) -> Vec<&'a BibEntry> {
        bibliography
            .entries
            .iter()
            .filter(|e| !self.cited.contains(&e.key))
            .collect()
    }

    /// Check whether the reference list is numbered 1..n and cited entries
    /// come first, in order of first appearance.
    pub fn is_in_citation_order(&self, bibliography: &Bibliography) -> bool {
        let labels_sequential = bibliography
            .entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.label.as_deref() == Some((i + 1).to_string().as_str()));
        let cited_first = bibliography
            .entries
            .iter()
            .zip(self.cited.iter())
            .all(|(entry, key)| entry.key == *key);
        labels_sequential && cited_first
    }
}

/// Blocks whose text is scanned for citations: body text outside the
/// reference list.
fn citing_blocks(doc: &Document) -> impl Iterator<Item = (Location, &str)> {
    doc.sections
        .iter()
        .filter(|s| s.kind != SectionType::References)
        .flat_map(|section| {
            section
                .blocks
                .iter()
                .enumerate()
                .filter_map(move |(index, block)| {
                    block.body_text().map(|text| {
                        (
                            Location::Block {
                                section: section.id,
                                index,
                            },
                            text,
                        )
                    })
                })
        })
}

/// Analyze citation usage in a document.
pub fn analyze(doc: &Document) -> CitationAnalysis {
    let mut analysis = CitationAnalysis::default();
    for (location, text) in citing_blocks(doc) {
        for marker in scan_markers(text) {
            let resolved: Vec<Option<&BibEntry>> = marker
                .refs
                .iter()
                .map(|r| r.resolve(&doc.bibliography))
                .collect();
            if resolved.iter().any(|r| r.is_none()) {
                analysis.unresolved.push(UnresolvedCitation {
                    location,
                    marker: marker.text.clone(),
                });
            }
            for entry in resolved.into_iter().flatten() {
                if !analysis.cited.contains(&entry.key) {
                    analysis.cited.push(entry.key.clone());
                }
            }
            analysis.occurrences.push(CitationOccurrence { location, marker });
        }
    }
    analysis
}

/// Result of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationReport {
    /// Bibliography key to new reference number
    pub mapping: BTreeMap<String, u32>,
    /// Markers with a source that could not be resolved
    pub unresolved: Vec<UnresolvedCitation>,
    /// Number of distinct cited entries
    pub cited: usize,
}

/// Converts citations to IEEE numeric style.
#[derive(Debug, Clone, Default)]
pub struct CitationConverter {
    entry_style: Option<(TextStyle, ParagraphStyle)>,
}

impl CitationConverter {
    /// Create a converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Style given to rewritten reference list entries.
    ///
    /// Without it, entries copy the style of the first existing entry.
    pub fn with_entry_style(mut self, text_style: TextStyle, paragraph_style: ParagraphStyle) -> Self {
        self.entry_style = Some((text_style, paragraph_style));
        self
    }

    /// Rewrite markers and the reference list in place.
    ///
    /// Cited entries are numbered by first appearance; uncited entries
    /// follow in their current order. Resolvable sources are always
    /// renumbered. Unresolvable numeric labels are flagged as `[?n]` and
    /// unresolvable author-year sources keep their written form; both are
    /// reported.
    pub fn convert(&self, doc: &mut Document, pending: &mut PendingChanges) -> CitationReport {
        let analysis = analyze(doc);

        let mut mapping: BTreeMap<String, u32> = BTreeMap::new();
        let mut next = 1;
        let uncited: Vec<String> = analysis
            .uncited(&doc.bibliography)
            .into_iter()
            .map(|e| e.key.clone())
            .collect();
        for key in analysis.cited.iter().chain(uncited.iter()) {
            mapping.insert(key.clone(), next);
            next += 1;
        }

        self.rewrite_markers(doc, &analysis, &mapping, pending);
        self.rewrite_bibliography(doc, &mapping, pending);

        debug!(
            "Converted citations: {} cited, {} unresolved, {} entries",
            analysis.cited.len(),
            analysis.unresolved.len(),
            mapping.len()
        );

        CitationReport {
            mapping,
            cited: analysis.cited.len(),
            unresolved: analysis.unresolved,
        }
    }

    fn rewrite_markers(
        &self,
        doc: &mut Document,
        analysis: &CitationAnalysis,
        mapping: &BTreeMap<String, u32>,
        pending: &mut PendingChanges,
    ) {
        let mut by_block: HashMap<Location, Vec<&CitationMarker>> = HashMap::new();
        let mut order: Vec<Location> = Vec::new();
        for occurrence in &analysis.occurrences {
            if !by_block.contains_key(&occurrence.location) {
                order.push(occurrence.location);
            }
            by_block
                .entry(occurrence.location)
                .or_default()
                .push(&occurrence.marker);
        }

        for location in order {
            let (Some(section_id), Some(index)) = (location.section(), location.block()) else {
                continue;
            };
            let markers = &by_block[&location];
            let replacements: Vec<String> = markers
                .iter()
                .map(|m| render_marker(m, &doc.bibliography, mapping))
                .collect();

            let Some(text) = doc
                .section_mut(section_id)
                .and_then(|s| s.blocks.get_mut(index))
                .and_then(|b| b.body_text_mut())
            else {
                continue;
            };

            let mut rewritten = String::with_capacity(text.len());
            let mut cursor = 0;
            for (marker, replacement) in markers.iter().zip(replacements) {
                rewritten.push_str(&text[cursor..marker.range.start]);
                rewritten.push_str(&replacement);
                cursor = marker.range.end;
            }
            rewritten.push_str(&text[cursor..]);

            if *text != rewritten {
                let before = std::mem::replace(text, rewritten.clone());
                pending.record(
                    ChangeKind::CitationRenumber,
                    location,
                    Snapshot::Text(before),
                    Snapshot::Text(rewritten),
                );
            }
        }
    }

    fn rewrite_bibliography(
        &self,
        doc: &mut Document,
        mapping: &BTreeMap<String, u32>,
        pending: &mut PendingChanges,
    ) {
        if doc.bibliography.is_empty() {
            return;
        }

        let before = list_entries(&doc.bibliography);
        let mut entries = std::mem::take(&mut doc.bibliography.entries);
        entries.sort_by_key(|e| mapping.get(&e.key).copied().unwrap_or(u32::MAX));
        for entry in entries.iter_mut() {
            if let Some(n) = mapping.get(&entry.key) {
                entry.label = Some(n.to_string());
            }
        }
        doc.bibliography.entries = entries;
        let after = list_entries(&doc.bibliography);
        pending.record(
            ChangeKind::BibliographyRewrite,
            Location::Document,
            Snapshot::List(before),
            Snapshot::List(after.clone()),
        );

        let Some(section) = doc
            .sections
            .iter_mut()
            .find(|s| s.kind == SectionType::References)
        else {
            return;
        };
        let (text_style, paragraph_style) = match &self.entry_style {
            Some(style) => style.clone(),
            None => section
                .blocks
                .iter()
                .find(|b| b.is_text())
                .map(|b| (b.text_style.clone(), b.paragraph_style.clone()))
                .unwrap_or_default(),
        };

        let old_texts: Vec<String> = section
            .blocks
            .iter()
            .filter_map(|b| b.body_text().map(str::to_string))
            .collect();
        let mut blocks: Vec<Block> = after
            .iter()
            .map(|line| Block {
                content: BlockContent::Text { text: line.clone() },
                text_style: text_style.clone(),
                paragraph_style: paragraph_style.clone(),
            })
            .collect();
        blocks.extend(section.blocks.iter().filter(|b| !b.is_text()).cloned());

        if blocks != section.blocks {
            section.blocks = blocks;
            pending.record(
                ChangeKind::BibliographyRewrite,
                Location::Section {
                    section: section.id,
                },
                Snapshot::List(old_texts),
                Snapshot::List(after),
            );
        }
    }
}

/// New text for a marker: resolved sources as `[n]` in ascending order,
/// then whatever could not be resolved.
fn render_marker(
    marker: &CitationMarker,
    bibliography: &Bibliography,
    mapping: &BTreeMap<String, u32>,
) -> String {
    let mut numbers: Vec<u32> = Vec::new();
    let mut unresolved: Vec<&str> = Vec::new();
    for (reference, source) in marker.refs.iter().zip(&marker.sources) {
        match reference
            .resolve(bibliography)
            .and_then(|e| mapping.get(&e.key))
        {
            Some(n) => numbers.push(*n),
            None if !unresolved.contains(&source.as_str()) => unresolved.push(source),
            None => {}
        }
    }
    if marker.refs.is_empty() || (numbers.is_empty() && marker.style == CitationStyle::AuthorYear) {
        return marker.text.clone();
    }
    numbers.sort_unstable();
    numbers.dedup();

    let mut parts: Vec<String> = numbers.iter().map(|n| format!("[{}]", n)).collect();
    match marker.style {
        CitationStyle::Numeric => parts.extend(unresolved.iter().map(|label| {
            let label = label.trim_start_matches(UNRESOLVED_MARK);
            format!("[{}{}]", UNRESOLVED_MARK, label)
        })),
        CitationStyle::AuthorYear if !unresolved.is_empty() => {
            let (open, close) = if marker.text.starts_with('[') {
                ('[', ']')
            } else {
                ('(', ')')
            };
            parts.push(format!("{}{}{}", open, unresolved.join("; "), close));
        }
        CitationStyle::AuthorYear => {}
    }
    parts.join(", ")
}

fn list_entries(bibliography: &Bibliography) -> Vec<String> {
    bibliography
        .entries
        .iter()
        .map(|e| match &e.label {
            Some(label) => format!("[{}] {}", label, e.text),
            None => e.text.clone(),
        })
        .collect()
}
