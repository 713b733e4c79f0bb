//! Plain text rendering.

use super::change_appendix;
use crate::changes::Change;
use crate::model::Document;

/// Render a document as plain text: title, author lines, then each section
/// heading followed by its blocks.
pub(super) fn to_text(doc: &Document, changes: Option<&[Change]>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = &doc.metadata.title {
        parts.push(title.clone());
    }
    if !doc.metadata.authors.is_empty() {
        parts.push(doc.metadata.author_line());
    }
    parts.extend(doc.metadata.affiliations.iter().cloned());

    for section in &doc.sections {
        if let Some(heading) = &section.heading {
            parts.push(heading.clone());
        }
        parts.extend(
            section
                .blocks
                .iter()
                .map(|b| b.plain_text())
                .filter(|t| !t.trim().is_empty()),
        );
    }

    if let Some(changes) = changes.filter(|c| !c.is_empty()) {
        let mut appendix = vec!["Change Log".to_string()];
        appendix.extend(change_appendix(changes));
        parts.push(appendix.join("\n"));
    }

    format!("{}\n", parts.join("\n\n"))
}
