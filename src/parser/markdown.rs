//! Markdown source reader.

use super::assemble::{RawBlock, RawDocument, RawKind};
use super::options::ParseOptions;

/// Lower Markdown text to raw blocks.
pub(crate) fn read_markdown(text: &str, options: &ParseOptions) -> RawDocument {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks, options);
            continue;
        }

        if let Some((level, heading)) = atx_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks, options);
            blocks.push(RawBlock::heading(level, heading));
            continue;
        }

        if let Some((alt, src)) = image(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks, options);
            blocks.push(RawBlock::new(
                RawKind::Figure {
                    source: Some(src.to_string()),
                },
                alt,
            ));
            continue;
        }

        if trimmed.starts_with("$$") {
            flush_paragraph(&mut paragraph, &mut blocks, options);
            let inner = trimmed.trim_start_matches("$$");
            if let Some(single) = inner.strip_suffix("$$") {
                blocks.push(RawBlock::new(RawKind::Equation, single.trim()));
                continue;
            }
            let mut tex = vec![inner.trim()];
            for next in lines.by_ref() {
                let next = next.trim();
                if let Some(last) = next.strip_suffix("$$") {
                    tex.push(last.trim());
                    break;
                }
                tex.push(next);
            }
            let tex: Vec<&str> = tex.into_iter().filter(|l| !l.is_empty()).collect();
            blocks.push(RawBlock::new(RawKind::Equation, tex.join("\n")));
            continue;
        }

        if is_table_row(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks, options);
            let mut rows = vec![split_row(trimmed)];
            while let Some(next) = lines.peek() {
                let next = next.trim();
                if !is_table_row(next) {
                    break;
                }
                if !is_separator_row(next) {
                    rows.push(split_row(next));
                }
                lines.next();
            }
            blocks.push(RawBlock::new(RawKind::Table { rows }, ""));
            continue;
        }

        // List items and reference entries are separate paragraphs.
        if is_list_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks, options);
        }
        paragraph.push(trimmed);
    }
    flush_paragraph(&mut paragraph, &mut blocks, options);

    RawDocument {
        blocks,
        source_format: "markdown".to_string(),
        layout: None,
    }
}

fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<RawBlock>, options: &ParseOptions) {
    if paragraph.is_empty() {
        return;
    }
    let text = paragraph.join(" ");
    paragraph.clear();

    let mut block = match strip_bold(&text) {
        Some(inner) => {
            let mut block = RawBlock::paragraph(inner);
            block.text_style.bold = true;
            if inner.chars().count() <= options.bold_heading_max_chars {
                block.kind = RawKind::Heading(0);
            }
            block
        }
        None => RawBlock::paragraph(text),
    };
    if let Some(item) = block.text.strip_prefix("- ").or_else(|| block.text.strip_prefix("* ")) {
        block.text = item.to_string();
    }
    blocks.push(block);
}

fn atx_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    let text = strip_bold(text).unwrap_or(text);
    Some((hashes as u8, text))
}

fn image(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("![")?;
    let (alt, rest) = rest.split_once("](")?;
    let src = rest.strip_suffix(')')?;
    let src = src.split_whitespace().next().unwrap_or(src);
    Some((alt, src))
}

fn strip_bold(text: &str) -> Option<&str> {
    let inner = text
        .strip_prefix("**")
        .and_then(|t| t.strip_suffix("**"))
        .or_else(|| text.strip_prefix("__").and_then(|t| t.strip_suffix("__")))?;
    if inner.is_empty() || inner.contains("**") {
        return None;
    }
    Some(inner.trim())
}

fn is_table_row(line: &str) -> bool {
    line.len() > 1 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn split_row(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn is_list_item(line: &str) -> bool {
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with('[') {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Vec<RawBlock> {
        read_markdown(text, &ParseOptions::default()).blocks
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let blocks = read("# Title\n\n## Introduction\nFirst line\nsecond line.\n\n### Scope\nText.");
        assert_eq!(blocks[0].kind, RawKind::Heading(1));
        assert_eq!(blocks[1], RawBlock::heading(2, "Introduction"));
        assert_eq!(blocks[2].text, "First line second line.");
        assert_eq!(blocks[3].kind, RawKind::Heading(3));
    }

    #[test]
    fn test_bold_paragraph_is_pseudo_heading() {
        let blocks = read("# Title\n\n**Abstract**\n\nWe study.\n\n**A much longer bold line**");
        assert_eq!(blocks[1].kind, RawKind::Heading(0));
        assert_eq!(blocks[1].text, "Abstract");
        assert!(blocks[1].text_style.bold);

        let options = ParseOptions::new().with_bold_heading_max_chars(10);
        let blocks = read_markdown("**A much longer bold line**", &options).blocks;
        assert_eq!(blocks[0].kind, RawKind::Paragraph);
    }

    #[test]
    fn test_figure_table_equation() {
        let blocks = read(
            "![Accuracy plot](img/acc.png \"title\")\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n$$\nE = mc^2\n$$\n\n$$x+y$$",
        );
        assert_eq!(
            blocks[0].kind,
            RawKind::Figure {
                source: Some("img/acc.png".into())
            }
        );
        assert_eq!(blocks[0].text, "Accuracy plot");
        assert_eq!(
            blocks[1].kind,
            RawKind::Table {
                rows: vec![vec!["a".into(), "b".into()], vec!["1".into(), "2".into()]]
            }
        );
        assert_eq!(blocks[2], RawBlock::new(RawKind::Equation, "E = mc^2"));
        assert_eq!(blocks[3], RawBlock::new(RawKind::Equation, "x+y"));
    }

    #[test]
    fn test_reference_entries_are_split() {
        let blocks = read("[1] First entry\n[2] Second entry\n- Bullet entry");
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["[1] First entry", "[2] Second entry", "Bullet entry"]);
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        let blocks = read("#notaheading");
        assert_eq!(blocks[0].kind, RawKind::Paragraph);
    }
}
