//! Error types for ieeefmt library.

use crate::model::{Location, SectionId, SectionType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for ieeefmt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while processing a manuscript.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input could not be turned into a document.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The document could not be written in the requested format.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// A user edit was rejected.
    #[error("Edit rejected: {0}")]
    Edit(#[from] EditError),

    /// The rule set is malformed or inconsistent.
    #[error("Invalid rule set: {0}")]
    Config(String),

    /// The session store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The session was cancelled before a stage could commit.
    #[error("Cancelled during {stage}")]
    Cancelled {
        /// Stage that was interrupted
        stage: String,
    },
}

/// Errors raised while parsing raw input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input is not in a supported container format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container was recognised but its structure is broken.
    #[error("Corrupt structure: {0}")]
    CorruptStructure(String),

    /// The input contains no text.
    #[error("Document is empty")]
    EmptyDocument,
}

/// Errors raised while exporting a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// The requested output format is unknown.
    #[error("Unsupported export target: {0}")]
    UnsupportedTarget(String),

    /// The document cannot be serialized in the target format.
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// The target format needs a crate feature this build lacks.
    #[error("Export to {format} requires the '{feature}' feature")]
    FeatureRequired {
        /// Requested format
        format: String,
        /// Feature to enable
        feature: String,
    },
}

/// Errors raised when a user edit cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// No section with this id exists.
    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),

    /// Block index is past the end of the section.
    #[error("Block {index} is out of range (section {section} has {len} blocks)")]
    BlockOutOfRange {
        /// Target section
        section: SectionId,
        /// Requested block index
        index: usize,
        /// Number of blocks in the section
        len: usize,
    },

    /// A required value was empty.
    #[error("Value for {0} must not be empty")]
    EmptyValue(&'static str),

    /// The edit would create a second section of a required type.
    #[error("Section type {0} already exists")]
    DuplicateSection(SectionType),

    /// A locked section order does not name the document's sections.
    #[error("Invalid section order: {0}")]
    InvalidOrder(String),
}

/// A non-fatal problem surfaced to the caller alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The grammar service failed; the corrector left the document unchanged.
    ExternalServiceFailure {
        /// Service name
        service: String,
        /// Failure reason
        reason: String,
    },

    /// A user override won over an automatic rule.
    RuleConflict {
        /// Rule that was overridden
        rule_id: String,
        /// What the conflict concerned
        location: Location,
        /// Human-readable description
        description: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ExternalServiceFailure { service, reason } => {
                write!(f, "{} unavailable: {}", service, reason)
            }
            Warning::RuleConflict {
                rule_id,
                location,
                description,
            } => write!(f, "{} at {}: {}", rule_id, location, description),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::CorruptStructure(format!("JSON: {}", err))
    }
}

impl From<zip::result::ZipError> for ParseError {
    fn from(err: zip::result::ZipError) -> Self {
        ParseError::CorruptStructure(format!("DOCX container: {}", err))
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::CorruptStructure(format!("DOCX XML: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Parse(ParseError::EmptyDocument);
        assert_eq!(err.to_string(), "Parse error: Document is empty");

        let err = EditError::BlockOutOfRange {
            section: SectionId(3),
            index: 7,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "Block 7 is out of range (section s3 has 2 blocks)"
        );
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::ExternalServiceFailure {
            service: "grammar".into(),
            reason: "timed out".into(),
        };
        assert_eq!(warning.to_string(), "grammar unavailable: timed out");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_is_corrupt_structure() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let parse: ParseError = err.into();
        assert!(matches!(parse, ParseError::CorruptStructure(_)));
    }
}
