//! Assembly of raw blocks into a [`Document`].
//!
//! Every source reader lowers its input to a flat list of [`RawBlock`]s and
//! hands it to [`assemble`], so all formats share the same rules for title,
//! author, section and caption detection.

use super::classify::{classify_heading, Classification};
use super::options::ParseOptions;
use crate::error::ParseError;
use crate::model::{
    Block, BlockContent, Document, PageLayout, ParagraphStyle, Section, SectionId, SectionType,
    TextStyle,
};
use log::{debug, warn};
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Kind of a raw block produced by a source reader.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawKind {
    /// Heading with its outline level (1 = top)
    Heading(u8),
    /// Body paragraph
    Paragraph,
    /// Figure with an optional image source
    Figure { source: Option<String> },
    /// Table cells
    Table { rows: Vec<Vec<String>> },
    /// Display equation
    Equation,
}

/// A block as read from the source, before sectioning.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawBlock {
    pub kind: RawKind,
    pub text: String,
    pub text_style: TextStyle,
    pub paragraph_style: ParagraphStyle,
}

impl RawBlock {
    pub fn new(kind: RawKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            text_style: TextStyle::default(),
            paragraph_style: ParagraphStyle::default(),
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::new(RawKind::Heading(level), text)
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(RawKind::Paragraph, text)
    }

    fn heading_level(&self) -> Option<u8> {
        match self.kind {
            RawKind::Heading(level) => Some(level),
            _ => None,
        }
    }
}

/// Source-level facts that are not blocks.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawDocument {
    pub blocks: Vec<RawBlock>,
    pub source_format: String,
    pub layout: Option<PageLayout>,
}

fn caption_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(fig\.?|figure|table)\s+([0-9]+|[ivxlcdm]+)(?:\s*[.:\-—–]\s*|\s*$)")
            .expect("valid caption regex")
    })
}

fn inline_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(abstract|index\s+terms|key\s*words)\s*(?:[—–:]|-{1,2})\s*(\S.*)$")
            .expect("valid inline heading regex")
    })
}

fn reference_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\[(\d+)\]|(\d+)[.)]|[-*•])\s*").expect("valid reference label regex")
    })
}

fn reference_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s\[\d+\]\s").expect("valid reference split regex"))
}

/// What a caption paragraph introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptionTarget {
    Figure,
    Table,
}

fn caption_target(text: &str) -> Option<CaptionTarget> {
    let caps = caption_regex().captures(text)?;
    let word = caps.get(1)?.as_str().to_lowercase();
    if word.starts_with("fig") {
        Some(CaptionTarget::Figure)
    } else {
        Some(CaptionTarget::Table)
    }
}

fn caption_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:fig\.?|figure|table)\s+(?:[0-9]+|[ivxlcdm]+)\b\s*[.:\-—–]?\s*")
            .expect("valid caption label regex")
    })
}

/// Caption text without its "Fig. 3." / "TABLE II:" label.
pub(crate) fn strip_caption_label(text: &str) -> &str {
    match caption_label_regex().find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    }
}

/// Build a document from raw blocks.
pub(crate) fn assemble(raw: RawDocument, options: &ParseOptions) -> Result<Document, ParseError> {
    let blocks: Vec<RawBlock> = raw
        .blocks
        .into_iter()
        .map(|mut b| {
            if options.normalize_unicode {
                b.text = b.text.nfc().collect();
            }
            b.text = b.text.trim().to_string();
            b
        })
        .filter(|b| {
            !b.text.is_empty() || !matches!(b.kind, RawKind::Heading(_) | RawKind::Paragraph)
        })
        .collect();

    if blocks.is_empty() {
        return Err(ParseError::EmptyDocument);
    }
    let blocks = resolve_pseudo_headings(blocks);

    let mut doc = Document::new();
    doc.metadata.source_format = Some(raw.source_format);
    doc.metadata.layout = raw.layout;

    let mut rest = blocks.as_slice();

    // Title: first block, unless it already names a known section.
    if let Some(first) = rest.first() {
        let opens_section =
            first.heading_level().is_some() && classify_heading(&first.text).is_known();
        if !opens_section && matches!(first.kind, RawKind::Heading(_) | RawKind::Paragraph) {
            doc.metadata.title = Some(first.text.clone());
            doc.metadata.title_style = first.text_style.clone();
            rest = &rest[1..];
        }
    }

    let section_level = rest.iter().filter_map(|b| b.heading_level()).min();

    // Authors and affiliations: paragraphs before the first section heading.
    let front_len = rest
        .iter()
        .position(|b| b.heading_level().is_some() || inline_heading_regex().is_match(&b.text))
        .unwrap_or(rest.len());
    let front: Vec<&RawBlock> = rest[..front_len]
        .iter()
        .filter(|b| b.kind == RawKind::Paragraph)
        .collect();
    if let Some((authors, affiliations)) = front.split_first() {
        doc.metadata.authors = split_authors(&authors.text);
        doc.metadata.affiliations = affiliations.iter().map(|b| b.text.clone()).collect();
    }
    rest = &rest[front_len..];

    let mut current: Option<Section> = None;
    let mut pending_table_caption: Option<String> = None;

    for raw in rest {
        // A table caption not followed by a table stands on its own.
        if !matches!(raw.kind, RawKind::Table { .. }) {
            if let Some(caption) = pending_table_caption.take() {
                let section = current.get_or_insert_with(untitled_section);
                section.add_block(Block::table(caption, Vec::new()));
            }
        }

        match &raw.kind {
            RawKind::Heading(level) if Some(*level) == section_level => {
                flush(&mut doc, current.take());
                current = Some(open_section(&doc, &raw.text, raw.text_style.clone()));
            }
            RawKind::Heading(_) => {
                let section = current.get_or_insert_with(untitled_section);
                section.add_block(styled(
                    BlockContent::Subheading {
                        text: raw.text.clone(),
                    },
                    raw,
                ));
            }
            RawKind::Paragraph => {
                if let Some(caps) = inline_heading_regex().captures(&raw.text) {
                    flush(&mut doc, current.take());
                    let mut section = open_section(&doc, &caps[1], TextStyle::default());
                    section.add_block(styled(
                        BlockContent::Text {
                            text: caps[2].trim().to_string(),
                        },
                        raw,
                    ));
                    current = Some(section);
                    continue;
                }

                let section = current.get_or_insert_with(untitled_section);
                match caption_target(&raw.text).filter(|_| options.detect_captions) {
                    Some(CaptionTarget::Figure) => {
                        let attached = match section.blocks.last_mut() {
                            Some(Block {
                                content: BlockContent::Figure { caption, .. },
                                ..
                            }) if caption.is_empty() => {
                                *caption = raw.text.clone();
                                true
                            }
                            _ => false,
                        };
                        if !attached {
                            section.add_block(styled(
                                BlockContent::Figure {
                                    caption: raw.text.clone(),
                                    source: None,
                                },
                                raw,
                            ));
                        }
                    }
                    Some(CaptionTarget::Table) => {
                        pending_table_caption = Some(raw.text.clone());
                        continue;
                    }
                    None => section.add_block(styled(
                        BlockContent::Text {
                            text: raw.text.clone(),
                        },
                        raw,
                    )),
                }
            }
            RawKind::Figure { source } => {
                let section = current.get_or_insert_with(untitled_section);
                section.add_block(styled(
                    BlockContent::Figure {
                        caption: raw.text.clone(),
                        source: source.clone(),
                    },
                    raw,
                ));
            }
            RawKind::Table { rows } => {
                let section = current.get_or_insert_with(untitled_section);
                let caption = pending_table_caption
                    .take()
                    .unwrap_or_else(|| raw.text.clone());
                section.add_block(styled(
                    BlockContent::Table {
                        caption,
                        rows: rows.clone(),
                    },
                    raw,
                ));
            }
            RawKind::Equation => {
                let section = current.get_or_insert_with(untitled_section);
                section.add_block(styled(
                    BlockContent::Equation {
                        tex: raw.text.clone(),
                    },
                    raw,
                ));
            }
        }
    }
    if let Some(caption) = pending_table_caption.take() {
        let section = current.get_or_insert_with(untitled_section);
        section.add_block(Block::table(caption, Vec::new()));
    }
    flush(&mut doc, current.take());

    if doc.metadata.title.is_none() && doc.sections.is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    collect_keywords(&mut doc);
    collect_references(&mut doc);

    debug!(
        "Assembled document: {} sections, {} references, {} words",
        doc.section_count(),
        doc.bibliography.len(),
        doc.word_count()
    );

    doc.validate().map_err(ParseError::CorruptStructure)?;
    Ok(doc)
}

/// Give bold pseudo-headings (level 0) the level of the shallowest real
/// heading after the first block, or 1 when there is none.
fn resolve_pseudo_headings(mut blocks: Vec<RawBlock>) -> Vec<RawBlock> {
    let level = blocks
        .iter()
        .skip(1)
        .filter_map(|b| b.heading_level())
        .filter(|l| *l > 0)
        .min()
        .unwrap_or(1);
    for block in blocks.iter_mut() {
        if block.kind == RawKind::Heading(0) {
            block.kind = RawKind::Heading(level);
        }
    }
    blocks
}

fn styled(content: BlockContent, raw: &RawBlock) -> Block {
    Block {
        content,
        text_style: raw.text_style.clone(),
        paragraph_style: raw.paragraph_style.clone(),
    }
}

fn open_section(doc: &Document, heading: &str, heading_style: TextStyle) -> Section {
    let Classification {
        mut kind,
        confidence,
    } = classify_heading(heading);
    if kind.is_singular() && doc.has_kind(kind) {
        warn!(
            "Second {} section \"{}\" kept as uncategorized",
            kind, heading
        );
        kind = SectionType::Uncategorized;
    }
    let mut section = Section::new(SectionId(0), kind, Some(heading.to_string()));
    section.confidence = if kind == SectionType::Uncategorized {
        0.0
    } else {
        confidence
    };
    section.heading_style = heading_style;
    section
}

fn untitled_section() -> Section {
    let mut section = Section::new(SectionId(0), SectionType::Uncategorized, None);
    section.confidence = 0.0;
    section
}

fn flush(doc: &mut Document, section: Option<Section>) {
    if let Some(section) = section {
        doc.push_section(section);
    }
}

fn split_authors(line: &str) -> Vec<String> {
    line.split([',', ';'])
        .flat_map(|part| part.split(" and "))
        .map(|s| s.trim().trim_start_matches("and ").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split keyword text ("a, b; c") into terms.
pub(crate) fn split_keywords(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(|s| s.trim().trim_end_matches('.').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn collect_keywords(doc: &mut Document) {
    if let Some(section) = doc.find_kind(SectionType::Keywords) {
        let text = section.plain_text();
        doc.metadata.keywords = split_keywords(&text);
    }
}

/// Split a References paragraph that holds several "[n] ..." entries.
fn split_reference_block(text: &str) -> Vec<String> {
    let starts: Vec<usize> = reference_split_regex()
        .find_iter(text)
        .map(|m| m.start() + 1)
        .collect();
    if starts.is_empty() {
        return vec![text.to_string()];
    }
    let mut parts = Vec::new();
    let mut prev = 0;
    for start in starts {
        parts.push(text[prev..start].trim().to_string());
        prev = start;
    }
    parts.push(text[prev..].trim().to_string());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Parse one reference list line into (label, text).
pub(crate) fn parse_reference_line(line: &str) -> (Option<String>, String) {
    match reference_label_regex().captures(line) {
        Some(caps) => {
            let label = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            (label, line[end..].trim().to_string())
        }
        None => (None, line.trim().to_string()),
    }
}

fn collect_references(doc: &mut Document) {
    let Some(pos) = doc
        .sections
        .iter()
        .position(|s| s.kind == SectionType::References)
    else {
        return;
    };

    let section = &mut doc.sections[pos];
    let mut blocks = Vec::new();
    for block in section.blocks.drain(..) {
        match block.body_text() {
            Some(text) if text.starts_with('[') || reference_split_regex().is_match(text) => {
                for part in split_reference_block(text) {
                    blocks.push(Block {
                        content: BlockContent::Text { text: part },
                        ..block.clone()
                    });
                }
            }
            _ => blocks.push(block),
        }
    }
    section.blocks = blocks;

    let mut bibliography = std::mem::take(&mut doc.bibliography);
    for block in &doc.sections[pos].blocks {
        if let Some(text) = block.body_text() {
            let (label, entry) = parse_reference_line(text);
            if !entry.is_empty() {
                bibliography.push(label, entry);
            }
        }
    }
    doc.bibliography = bibliography;
}
