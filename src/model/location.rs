//! Addresses of elements inside a document.

use super::SectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an issue or change applies.
///
/// Locations use section ids rather than positions, so they stay valid
/// after sections are reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Location {
    /// The document as a whole (metadata, layout, bibliography)
    Document,
    /// A whole section or its heading
    Section {
        /// Section id
        section: SectionId,
    },
    /// One block inside a section
    Block {
        /// Section id
        section: SectionId,
        /// Block index within the section
        index: usize,
    },
}

impl Location {
    /// Section this location points into, if any.
    pub fn section(&self) -> Option<SectionId> {
        match self {
            Location::Document => None,
            Location::Section { section } | Location::Block { section, .. } => Some(*section),
        }
    }

    /// Block index this location points at, if any.
    pub fn block(&self) -> Option<usize> {
        match self {
            Location::Block { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Document => f.write_str("document"),
            Location::Section { section } => write!(f, "{}", section),
            Location::Block { section, index } => write!(f, "{}/b{}", section, index),
        }
    }
}
