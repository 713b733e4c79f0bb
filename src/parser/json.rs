//! Canonical JSON source reader.

use super::options::{ErrorMode, ParseOptions};
use crate::error::ParseError;
use crate::model::{Bibliography, Document, SectionType};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

/// Value of the envelope's `format` field.
pub(crate) const FORMAT_TAG: &str = "ieeefmt";
/// Current canonical format version.
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Canonical document envelope as read back from disk.
///
/// An annotated export also carries a `changes` array, which is ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    document: Document,
}

/// Read a canonical JSON document.
///
/// Accepts the `{"format":"ieeefmt","version":1,"document":{..}}` envelope
/// and, for convenience, a bare serialized [`Document`].
pub(crate) fn read_json(data: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let value: Value = serde_json::from_slice(data)?;
    let Value::Object(ref map) = value else {
        return Err(ParseError::UnsupportedFormat(
            "JSON input is not an object".to_string(),
        ));
    };

    let mut doc = if map.contains_key("format") {
        let envelope: Envelope = serde_json::from_value(value)?;
        if envelope.format != FORMAT_TAG {
            return Err(ParseError::UnsupportedFormat(format!(
                "JSON document format \"{}\"",
                envelope.format
            )));
        }
        if envelope.version > FORMAT_VERSION {
            return Err(ParseError::UnsupportedFormat(format!(
                "canonical format version {} (newest supported is {})",
                envelope.version, FORMAT_VERSION
            )));
        }
        envelope.document
    } else if map.contains_key("sections") {
        serde_json::from_value::<Document>(value)?
    } else {
        return Err(ParseError::UnsupportedFormat(
            "JSON input is not an ieeefmt document".to_string(),
        ));
    };

    if doc.metadata.title.is_none() && doc.sections.is_empty() {
        return Err(ParseError::EmptyDocument);
    }

    if let Err(reason) = doc.validate() {
        match options.error_mode {
            ErrorMode::Strict => return Err(ParseError::CorruptStructure(reason)),
            ErrorMode::Lenient => {
                warn!("Repairing canonical document: {}", reason);
                repair(&mut doc);
                doc.validate().map_err(ParseError::CorruptStructure)?;
            }
        }
    }

    Ok(doc)
}

/// Restore model invariants on a deserialized document.
fn repair(doc: &mut Document) {
    doc.sections.sort_by_key(|s| s.order);
    doc.renumber();

    let mut next_id = doc.sections.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
    let mut seen_ids = Vec::new();
    let mut seen_kinds: Vec<SectionType> = Vec::new();
    for section in doc.sections.iter_mut() {
        if seen_ids.contains(&section.id) {
            section.id.0 = next_id;
            next_id += 1;
        }
        seen_ids.push(section.id);

        if section.kind.is_singular() {
            if seen_kinds.contains(&section.kind) {
                section.kind = SectionType::Uncategorized;
                section.confidence = 0.0;
            } else {
                seen_kinds.push(section.kind);
            }
        }
    }

    if !doc.bibliography.has_unique_keys() {
        let entries = std::mem::take(&mut doc.bibliography.entries);
        let mut rebuilt = Bibliography::new();
        for entry in entries {
            rebuilt.push(entry.label, entry.text);
        }
        doc.bibliography = rebuilt;
    }
}
