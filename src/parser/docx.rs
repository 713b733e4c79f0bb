//! DOCX source reader.
//!
//! Reads `word/document.xml` (and the style names from `word/styles.xml`)
//! out of the ZIP container and lowers paragraphs, tables, drawings and
//! equations to raw blocks.

use super::assemble::{RawBlock, RawDocument, RawKind};
use super::options::ParseOptions;
use crate::error::ParseError;
use crate::model::{Alignment, Margins, PageLayout, ParagraphStyle, TextStyle};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Twentieths of a point per point.
pub(crate) const TWIPS_PER_POINT: f32 = 20.0;
/// Twentieths of a point per inch.
pub(crate) const TWIPS_PER_INCH: f32 = 1440.0;
/// `w:spacing/@w:line` units per single line.
pub(crate) const LINE_UNITS: f32 = 240.0;

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";
pub(crate) const STYLES_PART: &str = "word/styles.xml";

/// Lower a DOCX container to raw blocks.
pub(crate) fn read_docx(data: &[u8], options: &ParseOptions) -> Result<RawDocument, ParseError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?;
    let has_styles = archive.file_names().any(|name| name == STYLES_PART);
    let styles = if has_styles {
        style_names(&read_part(&mut archive, STYLES_PART)?)?
    } else {
        HashMap::new()
    };

    let mut raw = read_document_xml(&document, &styles, options)?;
    raw.source_format = "docx".to_string();
    debug!("Read {} blocks from DOCX", raw.blocks.len());
    Ok(raw)
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String, ParseError> {
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| ParseError::CorruptStructure(format!("{}: {}", name, e)))?;
    Ok(content)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn attr_f32(e: &BytesStart<'_>, name: &[u8]) -> Option<f32> {
    attr(e, name).and_then(|v| v.parse::<f32>().ok())
}

/// `w:b`, `w:i`: absent value or anything but "0"/"false" means on.
fn toggle(e: &BytesStart<'_>) -> bool {
    !matches!(attr(e, b"w:val").as_deref(), Some("0") | Some("false") | Some("off"))
}

/// Map style ids to display names ("Heading1" -> "heading 1").
fn style_names(xml: &str) -> Result<HashMap<String, String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut names = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"w:style" => current = attr(e, b"w:styleId"),
                b"w:name" => {
                    if let (Some(id), Some(name)) = (&current, attr(e, b"w:val")) {
                        names.insert(id.clone(), name.to_lowercase());
                    }
                }
                _ => {}
            },
            Event::End(ref e) if e.name().as_ref() == b"w:style" => current = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

#[derive(Debug, Default)]
struct Paragraph {
    style: Option<String>,
    text: String,
    math: String,
    text_style: Option<TextStyle>,
    paragraph_style: ParagraphStyle,
    has_drawing: bool,
    image: Option<String>,
}

#[derive(Debug, Default)]
struct Run {
    style: TextStyle,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

fn read_document_xml(
    xml: &str,
    styles: &HashMap<String, String>,
    options: &ParseOptions,
) -> Result<RawDocument, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut blocks = Vec::new();
    let mut layout: Option<PageLayout> = None;
    let mut para: Option<Paragraph> = None;
    let mut run: Option<Run> = None;
    let mut table: Option<Table> = None;
    let mut table_depth = 0usize;
    let mut in_ppr = false;
    let mut in_rpr = false;
    let mut in_text = false;
    let mut in_math_text = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.name().as_ref() {
                    b"w:tbl" if is_start => {
                        table_depth += 1;
                        if table_depth == 1 {
                            table = Some(Table::default());
                        }
                    }
                    b"w:tr" if table_depth == 1 => {
                        if let Some(t) = table.as_mut() {
                            t.row.clear();
                        }
                    }
                    b"w:tc" if table_depth == 1 => {
                        if let Some(t) = table.as_mut() {
                            t.cell.clear();
                        }
                    }
                    b"w:p" if is_start => para = Some(Paragraph::default()),
                    b"w:pPr" if is_start => in_ppr = true,
                    b"w:rPr" if is_start => in_rpr = true,
                    b"w:r" if is_start => run = Some(Run::default()),
                    b"w:t" if is_start => in_text = true,
                    b"m:t" if is_start => in_math_text = true,
                    b"w:pStyle" if in_ppr => {
                        if let Some(p) = para.as_mut() {
                            p.style = attr(e, b"w:val");
                        }
                    }
                    b"w:jc" if in_ppr => {
                        if let Some(p) = para.as_mut() {
                            p.paragraph_style.alignment =
                                attr(e, b"w:val").and_then(|v| Alignment::from_ooxml(&v));
                        }
                    }
                    b"w:spacing" if in_ppr => {
                        if let Some(p) = para.as_mut() {
                            let ps = &mut p.paragraph_style;
                            ps.line_spacing = attr_f32(e, b"w:line").map(|v| v / LINE_UNITS);
                            ps.space_before = attr_f32(e, b"w:before").map(|v| v / TWIPS_PER_POINT);
                            ps.space_after = attr_f32(e, b"w:after").map(|v| v / TWIPS_PER_POINT);
                        }
                    }
                    b"w:ind" if in_ppr => {
                        if let Some(p) = para.as_mut() {
                            p.paragraph_style.first_line_indent =
                                attr_f32(e, b"w:firstLine").map(|v| v / TWIPS_PER_POINT);
                        }
                    }
                    b"w:b" if in_rpr => {
                        if let Some(r) = run.as_mut() {
                            r.style.bold = toggle(e);
                        }
                    }
                    b"w:i" if in_rpr => {
                        if let Some(r) = run.as_mut() {
                            r.style.italic = toggle(e);
                        }
                    }
                    b"w:sz" if in_rpr => {
                        if let Some(r) = run.as_mut() {
                            // Half-points
                            r.style.font_size = attr_f32(e, b"w:val").map(|v| v / 2.0);
                        }
                    }
                    b"w:rFonts" if in_rpr => {
                        if let Some(r) = run.as_mut() {
                            r.style.font_family = attr(e, b"w:ascii").or_else(|| attr(e, b"w:hAnsi"));
                        }
                    }
                    b"w:tab" if run.is_some() && !in_ppr => push_text(&mut para, "\t"),
                    b"w:br" if run.is_some() => push_text(&mut para, " "),
                    b"w:drawing" | b"w:pict" => {
                        if let Some(p) = para.as_mut() {
                            p.has_drawing = true;
                        }
                    }
                    b"a:blip" => {
                        if let Some(p) = para.as_mut() {
                            p.image = attr(e, b"r:embed");
                        }
                    }
                    b"w:pgMar" => {
                        let inches = |name: &[u8]| attr_f32(e, name).map(|v| v / TWIPS_PER_INCH);
                        let entry = layout.get_or_insert_with(default_layout);
                        entry.margins = Margins {
                            top: inches(b"w:top").unwrap_or(entry.margins.top),
                            bottom: inches(b"w:bottom").unwrap_or(entry.margins.bottom),
                            left: inches(b"w:left").unwrap_or(entry.margins.left),
                            right: inches(b"w:right").unwrap_or(entry.margins.right),
                        };
                    }
                    b"w:cols" => {
                        let entry = layout.get_or_insert_with(default_layout);
                        if let Some(num) = attr(e, b"w:num").and_then(|v| v.parse::<u8>().ok()) {
                            entry.columns = num.max(1);
                        }
                        if let Some(space) = attr_f32(e, b"w:space") {
                            entry.column_gap = space / TWIPS_PER_INCH;
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if in_text || in_math_text {
                    let text = t.unescape()?;
                    if in_math_text {
                        if let Some(p) = para.as_mut() {
                            p.math.push_str(&text);
                        }
                    } else {
                        if let (Some(p), Some(r)) = (para.as_mut(), run.as_ref()) {
                            if p.text_style.is_none() && !text.trim().is_empty() {
                                p.text_style = Some(r.style.clone());
                            }
                        }
                        push_text(&mut para, &text);
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:pPr" => in_ppr = false,
                b"w:rPr" => in_rpr = false,
                b"w:r" => run = None,
                b"w:t" => in_text = false,
                b"m:t" => in_math_text = false,
                b"w:p" => {
                    if let Some(p) = para.take() {
                        if table_depth > 0 {
                            if let Some(t) = table.as_mut() {
                                if !t.cell.is_empty() && !p.text.trim().is_empty() {
                                    t.cell.push(' ');
                                }
                                t.cell.push_str(p.text.trim());
                            }
                        } else if let Some(block) = finish_paragraph(p, styles, options) {
                            blocks.push(block);
                        }
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        let cell = std::mem::take(&mut t.cell);
                        t.row.push(cell);
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        let row = std::mem::take(&mut t.row);
                        t.rows.push(row);
                    }
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        if let Some(t) = table.take() {
                            blocks.push(RawBlock::new(RawKind::Table { rows: t.rows }, ""));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(RawDocument {
        blocks,
        source_format: String::new(),
        layout,
    })
}

fn default_layout() -> PageLayout {
    PageLayout {
        margins: Margins {
            top: 1.0,
            bottom: 1.0,
            left: 1.0,
            right: 1.0,
        },
        columns: 1,
        column_gap: 0.5,
    }
}

fn push_text(para: &mut Option<Paragraph>, text: &str) {
    if let Some(p) = para.as_mut() {
        p.text.push_str(text);
    }
}

fn heading_level(style_name: &str) -> Option<u8> {
    let rest = style_name.strip_prefix("heading")?;
    rest.trim().parse::<u8>().ok().filter(|l| (1..=9).contains(l))
}

fn finish_paragraph(
    p: Paragraph,
    styles: &HashMap<String, String>,
    options: &ParseOptions,
) -> Option<RawBlock> {
    let text = p.text.trim().to_string();
    let style_name = p
        .style
        .as_ref()
        .map(|id| styles.get(id).cloned().unwrap_or_else(|| id.to_lowercase()))
        .unwrap_or_default();
    let text_style = p.text_style.unwrap_or_default();

    let kind = if !p.math.trim().is_empty() && text.is_empty() {
        return Some(RawBlock::new(RawKind::Equation, p.math.trim()));
    } else if p.has_drawing {
        RawKind::Figure { source: p.image }
    } else if text.is_empty() {
        return None;
    } else if let Some(level) = heading_level(&style_name) {
        RawKind::Heading(level)
    } else if text_style.bold
        && style_name != "title"
        && text.chars().count() <= options.bold_heading_max_chars
    {
        // Placeholder level, resolved during assembly.
        RawKind::Heading(0)
    } else {
        RawKind::Paragraph
    };

    Some(RawBlock {
        kind,
        text,
        text_style,
        paragraph_style: p.paragraph_style,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn para(style: Option<&str>, bold: bool, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, s))
            .unwrap_or_default();
        let rpr = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
        format!("<w:p>{}<w:r>{}<w:t>{}</w:t></w:r></w:p>", ppr, rpr, text)
    }

    #[test]
    fn test_read_headings_and_paragraphs() {
        let body = [
            para(Some("Title"), false, "My Paper"),
            para(Some("Heading1"), false, "Introduction"),
            para(None, false, "Body &amp; more."),
            para(Some("Heading2"), false, "Scope"),
            para(None, true, "Results"),
        ]
        .concat();
        let raw = read_docx(&build_docx(&body), &ParseOptions::default()).unwrap();
        let kinds: Vec<&RawKind> = raw.blocks.iter().map(|b| &b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &RawKind::Paragraph,
                &RawKind::Heading(1),
                &RawKind::Paragraph,
                &RawKind::Heading(2),
                &RawKind::Heading(0),
            ]
        );
        assert_eq!(raw.blocks[2].text, "Body & more.");
        assert!(raw.blocks[4].text_style.bold);
        assert_eq!(raw.source_format, "docx");
    }

    #[test]
    fn test_read_run_and_paragraph_style() {
        let body = r#"<w:p><w:pPr><w:jc w:val="both"/><w:spacing w:line="480" w:before="240" w:after="0"/></w:pPr><w:r><w:rPr><w:rFonts w:ascii="Arial"/><w:sz w:val="24"/><w:i/></w:rPr><w:t>Styled</w:t></w:r></w:p>"#;
        let raw = read_docx(&build_docx(body), &ParseOptions::default()).unwrap();
        let block = &raw.blocks[0];
        assert_eq!(block.text_style, TextStyle::new("Arial", 12.0, false, true));
        assert_eq!(block.paragraph_style.alignment, Some(Alignment::Justify));
        assert_eq!(block.paragraph_style.line_spacing, Some(2.0));
        assert_eq!(block.paragraph_style.space_before, Some(12.0));
        assert_eq!(block.paragraph_style.space_after, Some(0.0));
    }

    #[test]
    fn test_read_table_and_layout() {
        let body = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:sectPr><w:pgMar w:top="1080" w:bottom="1080" w:left="1080" w:right="1080"/><w:cols w:num="2" w:space="360"/></w:sectPr>"#;
        let raw = read_docx(&build_docx(body), &ParseOptions::default()).unwrap();
        assert_eq!(
            raw.blocks[0].kind,
            RawKind::Table {
                rows: vec![vec!["a".to_string(), "b".to_string()]]
            }
        );
        let layout = raw.layout.unwrap();
        assert_eq!(layout.columns, 2);
        assert!((layout.margins.top - 0.75).abs() < 1e-6);
        assert!((layout.column_gap - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_bold_off_is_not_bold() {
        let body = r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>Plain</w:t></w:r></w:p>"#;
        let raw = read_docx(&build_docx(body), &ParseOptions::default()).unwrap();
        assert_eq!(raw.blocks[0].kind, RawKind::Paragraph);
    }

    #[test]
    fn test_corrupt_container() {
        let result = read_docx(b"PK\x03\x04garbage", &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::CorruptStructure(_))));
    }

    #[test]
    fn test_missing_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let data = writer.finish().unwrap().into_inner();
        assert!(matches!(
            read_docx(&data, &ParseOptions::default()),
            Err(ParseError::CorruptStructure(_))
        ));
    }
}
