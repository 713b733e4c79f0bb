//! DOCX rendering.
//!
//! Writes a minimal WordprocessingML package: content types, package
//! relationships, `word/styles.xml` and `word/document.xml`. Fonts, spacing,
//! alignment and page layout are written as direct formatting so the DOCX
//! reader recovers them. Figures become caption paragraphs that hold a
//! drawing marker; image data is not embedded.

use crate::error::{ExportError, Result};
use crate::model::{Block, BlockContent, Document, PageLayout, ParagraphStyle, TextStyle};
use crate::parser::docx::{DOCUMENT_PART, LINE_UNITS, STYLES_PART, TWIPS_PER_INCH, TWIPS_PER_POINT};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const MATH_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";

/// US Letter, in twips.
const PAGE_WIDTH: &str = "12240";
const PAGE_HEIGHT: &str = "15840";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// Paragraph styles referenced by the document part: (id, display name).
const STYLES: [(&str, &str); 5] = [
    ("Normal", "Normal"),
    ("Title", "Title"),
    ("Heading1", "heading 1"),
    ("Heading2", "heading 2"),
    ("Caption", "caption"),
];

/// Build a DOCX package.
pub(super) fn to_docx(doc: &Document) -> Result<Vec<u8>> {
    let document = document_xml(doc)?;
    let styles = styles_xml()?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let parts: [(&str, &[u8]); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        (STYLES_PART, &styles),
        (DOCUMENT_PART, &document),
    ];
    for (name, data) in parts {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(data)
            .map_err(|e| ExportError::SerializationFailure(format!("DOCX: {}", e)))?;
    }
    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(err: zip::result::ZipError) -> ExportError {
    ExportError::SerializationFailure(format!("DOCX container: {}", err))
}

/// Thin event writer that maps XML errors to export errors.
struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> std::result::Result<Self, ExportError> {
        let mut writer = Self {
            inner: Writer::new(Vec::new()),
        };
        writer.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(writer)
    }

    fn event(&mut self, event: Event<'_>) -> std::result::Result<(), ExportError> {
        self.inner
            .write_event(event)
            .map_err(|e| ExportError::SerializationFailure(format!("DOCX XML: {}", e)))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::result::Result<(), ExportError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> std::result::Result<(), ExportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::result::Result<(), ExportError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.event(Event::Empty(element))
    }

    fn text(&mut self, text: &str) -> std::result::Result<(), ExportError> {
        self.event(Event::Text(BytesText::new(text)))
    }

    fn finish(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

fn styles_xml() -> std::result::Result<Vec<u8>, ExportError> {
    let mut w = XmlWriter::new()?;
    w.start("w:styles", &[("xmlns:w", WORDML_NS)])?;
    for (id, name) in STYLES {
        w.start("w:style", &[("w:type", "paragraph"), ("w:styleId", id)])?;
        w.empty("w:name", &[("w:val", name)])?;
        w.end("w:style")?;
    }
    w.end("w:styles")?;
    Ok(w.finish())
}

fn document_xml(doc: &Document) -> std::result::Result<Vec<u8>, ExportError> {
    let mut w = XmlWriter::new()?;
    w.start("w:document", &[("xmlns:w", WORDML_NS), ("xmlns:m", MATH_NS)])?;
    w.start("w:body", &[])?;

    if let Some(title) = &doc.metadata.title {
        paragraph(&mut w, Some("Title"), &ParagraphStyle::default(), &doc.metadata.title_style, title)?;
    }
    if !doc.metadata.authors.is_empty() {
        paragraph(
            &mut w,
            None,
            &ParagraphStyle::default(),
            &TextStyle::default(),
            &doc.metadata.author_line(),
        )?;
    }
    for affiliation in &doc.metadata.affiliations {
        paragraph(&mut w, None, &ParagraphStyle::default(), &TextStyle::default(), affiliation)?;
    }

    for section in &doc.sections {
        if let Some(heading) = &section.heading {
            paragraph(
                &mut w,
                Some("Heading1"),
                &ParagraphStyle::default(),
                &section.heading_style,
                heading,
            )?;
        }
        for block in &section.blocks {
            write_block(&mut w, block)?;
        }
    }

    if let Some(layout) = &doc.metadata.layout {
        section_properties(&mut w, layout)?;
    }

    w.end("w:body")?;
    w.end("w:document")?;
    Ok(w.finish())
}

fn write_block(w: &mut XmlWriter, block: &Block) -> std::result::Result<(), ExportError> {
    let (ps, ts) = (&block.paragraph_style, &block.text_style);
    match &block.content {
        BlockContent::Text { text } => paragraph(w, None, ps, ts, text),
        BlockContent::Subheading { text } => paragraph(w, Some("Heading2"), ps, ts, text),
        BlockContent::Figure { caption, .. } => {
            w.start("w:p", &[])?;
            paragraph_properties(w, Some("Caption"), ps)?;
            w.start("w:r", &[])?;
            w.empty("w:drawing", &[])?;
            w.end("w:r")?;
            if !caption.is_empty() {
                run(w, ts, caption)?;
            }
            w.end("w:p")
        }
        BlockContent::Table { caption, rows } => {
            if !caption.is_empty() {
                paragraph(w, Some("Caption"), ps, ts, caption)?;
            }
            table(w, rows)
        }
        BlockContent::Equation { tex } => {
            w.start("w:p", &[])?;
            paragraph_properties(w, None, ps)?;
            w.start("m:oMathPara", &[])?;
            w.start("m:oMath", &[])?;
            w.start("m:r", &[])?;
            w.start("m:t", &[])?;
            w.text(tex)?;
            w.end("m:t")?;
            w.end("m:r")?;
            w.end("m:oMath")?;
            w.end("m:oMathPara")?;
            w.end("w:p")
        }
    }
}

fn paragraph(
    w: &mut XmlWriter,
    style: Option<&str>,
    ps: &ParagraphStyle,
    ts: &TextStyle,
    text: &str,
) -> std::result::Result<(), ExportError> {
    w.start("w:p", &[])?;
    paragraph_properties(w, style, ps)?;
    run(w, ts, text)?;
    w.end("w:p")
}

fn paragraph_properties(
    w: &mut XmlWriter,
    style: Option<&str>,
    ps: &ParagraphStyle,
) -> std::result::Result<(), ExportError> {
    let spacing: Vec<(&str, String)> = [
        ("w:before", ps.space_before.map(|v| v * TWIPS_PER_POINT)),
        ("w:after", ps.space_after.map(|v| v * TWIPS_PER_POINT)),
        ("w:line", ps.line_spacing.map(|v| v * LINE_UNITS)),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, twips(v))))
    .collect();

    if style.is_none() && spacing.is_empty() && ps.first_line_indent.is_none() && ps.alignment.is_none() {
        return Ok(());
    }

    w.start("w:pPr", &[])?;
    if let Some(style) = style {
        w.empty("w:pStyle", &[("w:val", style)])?;
    }
    if !spacing.is_empty() {
        let mut attrs: Vec<(&str, &str)> = spacing.iter().map(|(n, v)| (*n, v.as_str())).collect();
        if ps.line_spacing.is_some() {
            attrs.push(("w:lineRule", "auto"));
        }
        w.empty("w:spacing", &attrs)?;
    }
    if let Some(indent) = ps.first_line_indent {
        let value = twips(indent * TWIPS_PER_POINT);
        w.empty("w:ind", &[("w:firstLine", value.as_str())])?;
    }
    if let Some(alignment) = ps.alignment {
        w.empty("w:jc", &[("w:val", alignment.as_ooxml())])?;
    }
    w.end("w:pPr")
}

fn run(w: &mut XmlWriter, ts: &TextStyle, text: &str) -> std::result::Result<(), ExportError> {
    w.start("w:r", &[])?;
    if ts.has_styling() {
        w.start("w:rPr", &[])?;
        if let Some(family) = &ts.font_family {
            w.empty("w:rFonts", &[("w:ascii", family.as_str()), ("w:hAnsi", family.as_str())])?;
        }
        if ts.bold {
            w.empty("w:b", &[])?;
        }
        if ts.italic {
            w.empty("w:i", &[])?;
        }
        if let Some(size) = ts.font_size {
            // Half-points
            let half_points = twips(size * 2.0);
            w.empty("w:sz", &[("w:val", half_points.as_str())])?;
        }
        w.end("w:rPr")?;
    }
    w.start("w:t", &[("xml:space", "preserve")])?;
    w.text(text)?;
    w.end("w:t")?;
    w.end("w:r")
}

fn table(w: &mut XmlWriter, rows: &[Vec<String>]) -> std::result::Result<(), ExportError> {
    w.start("w:tbl", &[])?;
    for row in rows {
        w.start("w:tr", &[])?;
        for cell in row {
            w.start("w:tc", &[])?;
            paragraph(w, None, &ParagraphStyle::default(), &TextStyle::default(), cell)?;
            w.end("w:tc")?;
        }
        w.end("w:tr")?;
    }
    w.end("w:tbl")
}

fn section_properties(w: &mut XmlWriter, layout: &PageLayout) -> std::result::Result<(), ExportError> {
    let inches = |v: f32| twips(v * TWIPS_PER_INCH);
    let (top, bottom, left, right) = (
        inches(layout.margins.top),
        inches(layout.margins.bottom),
        inches(layout.margins.left),
        inches(layout.margins.right),
    );
    let columns = layout.columns.to_string();
    let gap = inches(layout.column_gap);

    w.start("w:sectPr", &[])?;
    w.empty("w:pgSz", &[("w:w", PAGE_WIDTH), ("w:h", PAGE_HEIGHT)])?;
    w.empty(
        "w:pgMar",
        &[
            ("w:top", top.as_str()),
            ("w:bottom", bottom.as_str()),
            ("w:left", left.as_str()),
            ("w:right", right.as_str()),
        ],
    )?;
    w.empty("w:cols", &[("w:num", columns.as_str()), ("w:space", gap.as_str())])?;
    w.end("w:sectPr")
}

/// Format a measurement as an integer string.
fn twips(value: f32) -> String {
    format!("{}", value.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alignment, Margins, Section, SectionId, SectionType};
    use crate::parser::ManuscriptParser;
    use std::io::Read;

    fn sample() -> Document {
        let mut doc = Document::with_title("A Study of Things");
        doc.metadata.title_style = TextStyle::new("Times New Roman", 24.0, false, false);
        doc.metadata.authors = vec!["A. Author".into()];
        doc.metadata.layout = Some(PageLayout {
            margins: Margins {
                top: 0.75,
                bottom: 1.0,
                left: 0.625,
                right: 0.625,
            },
            columns: 2,
            column_gap: 0.25,
        });

        let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("I. INTRODUCTION".into()));
        let mut body = Block::text("Tom & Jerry <study> things [1].");
        body.text_style = TextStyle::new("Times New Roman", 10.0, false, false);
        body.paragraph_style = ParagraphStyle {
            alignment: Some(Alignment::Justify),
            line_spacing: Some(1.0),
            space_before: Some(0.0),
            space_after: Some(6.0),
            first_line_indent: Some(10.0),
        };
        intro.add_block(body);
        intro.add_block(Block::table(
            "TABLE I. Data",
            vec![vec!["a".into(), "b".into()], vec!["1".into(), "2".into()]],
        ));
        doc.push_section(intro);

        let mut results = Section::new(SectionId(0), SectionType::Results, Some("II. RESULTS".into()));
        results.add_block(Block::text("It works."));
        doc.push_section(results);
        doc
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_package_parts() {
        let bytes = to_docx(&sample()).unwrap();
        let xml = part(&bytes, DOCUMENT_PART);
        assert!(xml.contains("Tom &amp; Jerry &lt;study&gt; things [1]."));
        assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(xml.contains(r#"<w:cols w:num="2" w:space="360"/>"#));
        assert!(part(&bytes, STYLES_PART).contains("heading 1"));
        assert!(part(&bytes, "[Content_Types].xml").contains("wordprocessingml"));
    }

    #[test]
    fn test_reader_recovers_structure_and_styles() {
        let bytes = to_docx(&sample()).unwrap();
        let doc = ManuscriptParser::from_bytes(&bytes).unwrap().parse().unwrap();

        assert_eq!(doc.metadata.title.as_deref(), Some("A Study of Things"));
        let kinds: Vec<SectionType> = doc.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SectionType::Introduction, SectionType::Results]);

        let body = &doc.sections[0].blocks[0];
        assert_eq!(body.plain_text(), "Tom & Jerry <study> things [1].");
        assert_eq!(body.text_style.font_size, Some(10.0));
        assert_eq!(body.paragraph_style.space_after, Some(6.0));
        assert_eq!(body.paragraph_style.alignment, Some(Alignment::Justify));

        let layout = doc.metadata.layout.unwrap();
        assert_eq!(layout.columns, 2);
        assert!((layout.margins.left - 0.625).abs() < 1e-3);
    }
}
