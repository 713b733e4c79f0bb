//! Document model types for manuscript content representation.
//!
//! This module defines the canonical structured representation that every
//! other stage reads and mutates: the parser produces it, the formatter and
//! citation converter rewrite it, and the exporter serializes it. The model
//! is independent of any source or target container format.

mod bibliography;
mod block;
mod document;
mod location;
mod section;

pub use bibliography::{author_year_key, BibEntry, Bibliography};
pub use block::{Alignment, Block, BlockContent, ParagraphStyle, TextStyle};
pub use document::{Document, Margins, Metadata, PageLayout};
pub use location::Location;
pub use section::{Section, SectionId, SectionType};
