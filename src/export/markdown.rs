//! Markdown rendering.

use super::change_appendix;
use crate::changes::Change;
use crate::model::{Block, BlockContent, Document};

/// Render a document as Markdown.
///
/// The title is the level-1 heading, sections are level 2 and subsection
/// headings level 3, which is the outline the Markdown reader expects.
pub(super) fn to_markdown(doc: &Document, changes: Option<&[Change]>) -> String {
    let mut output = String::new();

    if let Some(title) = &doc.metadata.title {
        output.push_str(&format!("# {}\n\n", title));
    }
    if !doc.metadata.authors.is_empty() {
        output.push_str(&doc.metadata.author_line());
        output.push_str("\n\n");
    }
    for affiliation in &doc.metadata.affiliations {
        output.push_str(affiliation);
        output.push_str("\n\n");
    }

    for section in &doc.sections {
        if let Some(heading) = &section.heading {
            output.push_str(&format!("## {}\n\n", heading));
        }
        for block in &section.blocks {
            render_block(&mut output, block);
        }
    }

    if let Some(changes) = changes.filter(|c| !c.is_empty()) {
        output.push_str("## Change Log\n\n");
        for line in change_appendix(changes) {
            output.push_str(&format!("- {}\n", line));
        }
    }

    format!("{}\n", output.trim_end())
}

fn render_block(output: &mut String, block: &Block) {
    match &block.content {
        BlockContent::Text { text } => {
            output.push_str(text);
            output.push_str("\n\n");
        }
        BlockContent::Subheading { text } => {
            output.push_str(&format!("### {}\n\n", text));
        }
        BlockContent::Figure { caption, source } => {
            output.push_str(&format!(
                "![{}]({})\n\n",
                caption,
                source.as_deref().unwrap_or_default()
            ));
        }
        BlockContent::Table { caption, rows } => {
            if !caption.is_empty() {
                output.push_str(caption);
                output.push_str("\n\n");
            }
            render_table(output, rows);
        }
        BlockContent::Equation { tex } => {
            output.push_str(&format!("$$\n{}\n$$\n\n", tex));
        }
    }
}

fn render_table(output: &mut String, rows: &[Vec<String>]) {
    let Some(header) = rows.first() else {
        return;
    };
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0).max(1);
    let row_line = |row: &[String]| {
        let cells: Vec<String> = (0..width)
            .map(|i| row.get(i).map(|c| c.replace('|', "\\|")).unwrap_or_default())
            .collect();
        format!("| {} |\n", cells.join(" | "))
    };

    output.push_str(&row_line(header));
    output.push_str(&format!("|{}\n", " --- |".repeat(width)));
    for row in &rows[1..] {
        output.push_str(&row_line(row));
    }
    output.push('\n');
}
