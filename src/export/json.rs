//! Canonical JSON export.

use crate::changes::Change;
use crate::error::{ExportError, Result};
use crate::model::Document;
use crate::parser::json::{FORMAT_TAG, FORMAT_VERSION};
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<'a> {
    format: &'static str,
    version: u32,
    document: &'a Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<&'a [Change]>,
}

/// Serialize a document in the canonical envelope.
pub(super) fn to_json(doc: &Document, changes: Option<&[Change]>, pretty: bool) -> Result<String> {
    let envelope = Envelope {
        format: FORMAT_TAG,
        version: FORMAT_VERSION,
        document: doc,
        changes,
    };
    let result = if pretty {
        serde_json::to_string_pretty(&envelope)
    } else {
        serde_json::to_string(&envelope)
    };
    result.map_err(|e| ExportError::SerializationFailure(format!("JSON: {}", e)).into())
}
