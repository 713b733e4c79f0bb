//! Bibliography types.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The document's reference list, keyed by stable identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bibliography {
    /// Entries in list order
    pub entries: Vec<BibEntry>,
}

impl Bibliography {
    /// Create an empty bibliography.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by key.
    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Get an entry by its list label (e.g. "3" for "[3]").
    pub fn by_label(&self, label: &str) -> Option<&BibEntry> {
        self.entries
            .iter()
            .find(|e| e.label.as_deref() == Some(label))
    }

    /// Get an entry by first-author surname and year.
    pub fn by_author_year(&self, key: &str) -> Option<&BibEntry> {
        self.entries
            .iter()
            .find(|e| author_year_key(&e.text).as_deref() == Some(key))
    }

    /// Add an entry from list text, deriving a unique key.
    ///
    /// Returns the key assigned to the entry.
    pub fn push(&mut self, label: Option<String>, text: impl Into<String>) -> String {
        let text = text.into();
        let base = match (&label, author_year_key(&text)) {
            (_, Some(ay)) => ay,
            (Some(l), None) => format!("ref{}", l),
            (None, None) => format!("ref{}", self.entries.len() + 1),
        };
        let key = self.unique_key(&base);
        self.entries.push(BibEntry {
            key: key.clone(),
            label,
            text,
        });
        key
    }

    /// Check that all keys are distinct.
    pub fn has_unique_keys(&self) -> bool {
        let mut keys: Vec<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        keys.windows(2).all(|w| w[0] != w[1])
    }

    fn unique_key(&self, base: &str) -> String {
        if self.get(base).is_none() {
            return base.to_string();
        }
        // smith2020, smith2020b, smith2020c, ...
        (b'b'..=b'z')
            .map(|c| format!("{}{}", base, c as char))
            .chain((1..).map(|n| format!("{}-{}", base, n)))
            .find(|k| self.get(k).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

/// A single bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibEntry {
    /// Stable identifier
    pub key: String,

    /// Label as numbered in the list (e.g. "3")
    pub label: Option<String>,

    /// Entry text without its list prefix
    pub text: String,
}

fn surname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[A-Z]\.\s*)*([A-Z][A-Za-z'\-]+)").expect("valid surname regex")
    })
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:19|20)\d{2}[a-z]?)\b").expect("valid year regex"))
}

/// Derive an author-year key ("smith2020") from reference text.
///
/// Handles both "Smith, J. ..." and "J. Smith, ..." name orders. Returns
/// `None` when no surname or year can be found.
pub fn author_year_key(text: &str) -> Option<String> {
    let surname = surname_regex().captures(text)?.get(1)?.as_str();
    let year = year_regex().captures(text)?.get(1)?.as_str();
    Some(format!("{}{}", surname.to_lowercase(), year))
}
