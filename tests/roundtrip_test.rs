//! Export then parse again.

use ieeefmt::{
    apply_formatting, parse, BibEntry, Block, Document, ExportFormat, ExportOptions, RuleSet,
    Section, SectionId, SectionType,
};

fn manuscript() -> Document {
    let mut doc = Document::with_title("Round Trips in Practice");
    doc.metadata.authors = vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()];
    doc.metadata.affiliations = vec!["Analytical Engine Society".to_string()];

    let mut abs = Section::new(SectionId(0), SectionType::Abstract, Some("Abstract".into()));
    abs.add_block(Block::text("We measure how documents survive export."));
    doc.push_section(abs);

    let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("Introduction".into()));
    intro.add_block(Block::text("Formats drift [1]."));
    intro.add_block(Block::subheading("Scope"));
    intro.add_block(Block::text("We cover three targets."));
    doc.push_section(intro);

    let mut results = Section::new(SectionId(0), SectionType::Results, Some("Results".into()));
    results.add_block(Block::table(
        "Table 1: Sizes",
        vec![
            vec!["format".into(), "bytes".into()],
            vec!["json".into(), "900".into()],
        ],
    ));
    results.add_block(Block::equation("E = mc^2"));
    doc.push_section(results);

    let mut refs = Section::new(SectionId(0), SectionType::References, Some("References".into()));
    refs.add_block(Block::text("[1] Knuth, D. Literate Programming. 1984."));
    doc.push_section(refs);
    doc.bibliography.entries.push(BibEntry {
        key: "knuth1984".into(),
        label: Some("1".into()),
        text: "Knuth, D. Literate Programming. 1984.".into(),
    });
    doc
}

fn kinds(doc: &Document) -> Vec<SectionType> {
    doc.sections.iter().map(|s| s.kind).collect()
}

#[test]
fn test_json_is_lossless() {
    let doc = manuscript();
    let bytes = ieeefmt::export(&doc, ExportFormat::Json).unwrap();
    assert_eq!(parse(&bytes).unwrap(), doc);

    let (formatted, changes) = apply_formatting(&doc, &RuleSet::default()).unwrap();
    let options = ExportOptions::new(ExportFormat::Json)
        .with_pretty(false)
        .with_annotations(true);
    let bytes = ieeefmt::export_with_options(&formatted, Some(&changes), &options).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("\"changes\""));
    assert_eq!(parse(&bytes).unwrap(), formatted);
}

#[test]
fn test_markdown_keeps_structure() {
    let (formatted, _) = apply_formatting(&manuscript(), &RuleSet::default()).unwrap();
    let bytes = ieeefmt::export(&formatted, ExportFormat::Markdown).unwrap();
    let reparsed = parse(&bytes).unwrap();

    assert_eq!(reparsed.metadata.title, formatted.metadata.title);
    assert_eq!(kinds(&reparsed), kinds(&formatted));
    assert_eq!(reparsed.sections[1].blocks[0].plain_text(), "Formats drift [1].");
    assert!(reparsed.sections[2]
        .blocks
        .iter()
        .any(|b| b.caption().is_some()));
    assert_eq!(reparsed.bibliography.len(), 1);
}

#[test]
fn test_docx_keeps_structure_and_layout() {
    let (formatted, _) = apply_formatting(&manuscript(), &RuleSet::default()).unwrap();
    let bytes = ieeefmt::export(&formatted, ExportFormat::Docx).unwrap();
    assert!(ieeefmt::detect::is_docx_bytes(&bytes));

    let reparsed = parse(&bytes).unwrap();
    assert_eq!(reparsed.metadata.title, formatted.metadata.title);
    assert_eq!(kinds(&reparsed), kinds(&formatted));
    assert_eq!(
        reparsed.metadata.layout.as_ref().map(|l| l.columns),
        formatted.metadata.layout.as_ref().map(|l| l.columns)
    );
}

#[test]
fn test_text_export_is_plain() {
    let doc = manuscript();
    let text = String::from_utf8(ieeefmt::export(&doc, ExportFormat::Text).unwrap()).unwrap();
    assert!(text.starts_with("Round Trips in Practice"));
    assert!(text.contains("Formats drift [1]."));
    assert!(!text.contains('#'));
}
