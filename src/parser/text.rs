//! Plain text source reader.
//!
//! Plain text has no markup, so headings are recognised by shape: short
//! lines without terminal punctuation that either name a known section,
//! carry a section number ("III. Proposed System") or are written in
//! capitals. "A. Title" lines become subsection headings.

use super::assemble::{RawBlock, RawDocument};
use super::classify::{classify_heading, strip_numbering};
use regex::Regex;
use std::sync::OnceLock;

const MAX_HEADING_CHARS: usize = 80;
const MAX_HEADING_WORDS: usize = 8;

fn numbered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[IVX]+\.|\d+\.?)\s+\p{Lu}").expect("valid numbered heading regex")
    })
}

fn lettered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Z]\.|\d+\.\d+\.?)\s+\p{Lu}").expect("valid subheading regex")
    })
}

/// Lower plain text to raw blocks.
pub(crate) fn read_text(text: &str) -> RawDocument {
    let mut blocks = Vec::new();

    for chunk in split_paragraphs(text) {
        let mut lines = chunk.iter().copied();
        let mut body: Vec<&str> = Vec::new();
        for line in lines.by_ref() {
            match heading_level(line) {
                Some(level) if body.is_empty() => blocks.push(RawBlock::heading(level, line)),
                _ => {
                    body.push(line);
                    break;
                }
            }
        }
        body.extend(lines);
        push_body(&body, &mut blocks);
    }

    RawDocument {
        blocks,
        source_format: "text".to_string(),
        layout: None,
    }
}

fn split_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Join paragraph lines, keeping "[n]" reference entries apart.
fn push_body(lines: &[&str], blocks: &mut Vec<RawBlock>) {
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.starts_with('[') && !current.is_empty() {
            blocks.push(RawBlock::paragraph(current.join(" ")));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(RawBlock::paragraph(current.join(" ")));
    }
}

/// Heading level of a line, if it looks like a heading.
fn heading_level(line: &str) -> Option<u8> {
    if line.chars().count() > MAX_HEADING_CHARS
        || line.split_whitespace().count() > MAX_HEADING_WORDS
        || line.ends_with(['.', ',', ';', '?', '!'])
    {
        return None;
    }
    if numbered_regex().is_match(line) {
        return Some(1);
    }
    if lettered_regex().is_match(line) {
        return Some(2);
    }
    let class = classify_heading(line);
    if class.is_known() && class.confidence >= 0.9 {
        return Some(1);
    }
    let stripped = strip_numbering(line);
    let has_letters = stripped.chars().any(|c| c.is_alphabetic());
    let words = stripped.split_whitespace().count();
    // Single capitalised words are usually acronyms in the front matter.
    if has_letters && words >= 2 && stripped.chars().all(|c| !c.is_lowercase()) {
        return Some(1);
    }
    None
}
