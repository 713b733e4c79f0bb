//! Versioned formatting rule sets.
//!
//! A [`RuleSet`] describes a target template: section order, required
//! sections, heading conventions, typography, spacing, page layout, caption
//! style and scoring weights. Every stage reads thresholds from here, so
//! issues, fixes and scores always agree on the template version that
//! produced them.

use crate::error::{Error, Result};
use crate::issues::{Category, Severity};
use crate::model::{Alignment, Margins, PageLayout, SectionType, TextStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Formatting template configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Template name
    pub name: String,

    /// Template version
    pub version: String,

    /// Canonical section order
    pub section_order: Vec<SectionType>,

    /// Sections that must be present
    pub required_sections: Vec<SectionType>,

    /// Sections whose headings carry no number
    pub unnumbered_sections: Vec<SectionType>,

    /// Fixed heading text for specific section types
    pub fixed_headings: Vec<FixedHeading>,

    /// Abstract length limits
    pub abstract_words: WordRange,

    /// Heading conventions
    pub headings: HeadingRules,

    /// Fonts per element
    pub typography: TypographyRules,

    /// Paragraph spacing
    pub spacing: SpacingRules,

    /// Page geometry
    pub layout: PageLayout,

    /// Figure and table captions
    pub captions: CaptionRules,

    /// Compliance scoring weights
    pub scoring: ScoringRules,
}

impl RuleSet {
    /// The IEEE conference template.
    pub fn ieee_conference() -> Self {
        let tnr = "Times New Roman";
        Self {
            name: "ieee-conference".to_string(),
            version: "2024.1".to_string(),
            section_order: vec![
                SectionType::Abstract,
                SectionType::Keywords,
                SectionType::Introduction,
                SectionType::RelatedWork,
                SectionType::LiteratureReview,
                SectionType::Methodology,
                SectionType::Results,
                SectionType::Discussion,
                SectionType::Conclusion,
                SectionType::FutureWork,
                SectionType::Acknowledgments,
                SectionType::References,
                SectionType::Appendix,
            ],
            required_sections: vec![
                SectionType::Abstract,
                SectionType::Keywords,
                SectionType::Introduction,
                SectionType::Methodology,
                SectionType::Results,
                SectionType::Conclusion,
                SectionType::References,
            ],
            unnumbered_sections: vec![
                SectionType::Abstract,
                SectionType::Keywords,
                SectionType::Acknowledgments,
                SectionType::References,
            ],
            fixed_headings: vec![
                FixedHeading::new(SectionType::Abstract, "Abstract"),
                FixedHeading::new(SectionType::Keywords, "Index Terms"),
                FixedHeading::new(SectionType::Acknowledgments, "Acknowledgment"),
                FixedHeading::new(SectionType::References, "References"),
            ],
            abstract_words: WordRange { min: 150, max: 250 },
            headings: HeadingRules {
                case: HeadingCase::Upper,
                numbering: Numbering::Roman,
                subsection_numbering: Numbering::UpperAlpha,
            },
            typography: TypographyRules {
                title: FontRule::new(tnr, 24.0, true, false, Alignment::Center),
                authors: FontRule::new(tnr, 10.0, false, false, Alignment::Center),
                affiliations: FontRule::new(tnr, 10.0, false, true, Alignment::Center),
                heading: FontRule::new(tnr, 10.0, true, false, Alignment::Left),
                subheading: FontRule::new(tnr, 10.0, false, true, Alignment::Left),
                body: FontRule::new(tnr, 10.0, false, false, Alignment::Justify),
                abstract_text: FontRule::new(tnr, 9.0, false, false, Alignment::Justify),
                keywords: FontRule::new(tnr, 9.0, false, true, Alignment::Justify),
                references: FontRule::new(tnr, 10.0, false, false, Alignment::Justify),
                caption: FontRule::new(tnr, 8.0, false, false, Alignment::Center),
            },
            spacing: SpacingRules {
                line_spacing: 1.0,
                space_before: 0.0,
                space_after: 0.0,
                first_line_indent: 0.0,
            },
            layout: PageLayout {
                margins: Margins {
                    top: 0.75,
                    bottom: 0.75,
                    left: 0.75,
                    right: 0.75,
                },
                columns: 2,
                column_gap: 0.25,
            },
            captions: CaptionRules {
                figure_prefix: "Fig.".to_string(),
                figure_numbering: Numbering::Arabic,
                table_prefix: "TABLE".to_string(),
                table_numbering: Numbering::Roman,
            },
            scoring: ScoringRules {
                category_weights: CategoryWeights {
                    structural: 0.5,
                    stylistic: 0.25,
                    citation: 0.25,
                },
                severity_penalty: SeverityPenalty {
                    low: 2.0,
                    medium: 8.0,
                    high: 20.0,
                },
            },
        }
    }

    /// Parse a rule set from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let rules: RuleSet = toml::from_str(s)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Parse a rule set from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let rules: RuleSet = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load a rule set from a `.toml` or `.json` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&content),
            other => Err(Error::Config(format!(
                "unsupported rule set extension: {}",
                other.unwrap_or("(none)")
            ))),
        }
    }

    /// Serialize the rule set as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check the rule set for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.section_order.is_empty() {
            return Err(Error::Config("section_order must not be empty".into()));
        }
        for (i, kind) in self.section_order.iter().enumerate() {
            if self.section_order[..i].contains(kind) {
                return Err(Error::Config(format!(
                    "section_order lists {} twice",
                    kind
                )));
            }
        }
        for kind in &self.required_sections {
            if !self.section_order.contains(kind) {
                return Err(Error::Config(format!(
                    "required section {} is missing from section_order",
                    kind
                )));
            }
            if !kind.is_singular() {
                return Err(Error::Config(format!(
                    "section type {} cannot be required",
                    kind
                )));
            }
        }
        if self.abstract_words.min > self.abstract_words.max {
            return Err(Error::Config(format!(
                "abstract_words.min ({}) exceeds max ({})",
                self.abstract_words.min, self.abstract_words.max
            )));
        }
        let p = &self.scoring.severity_penalty;
        if p.low < 0.0 || p.low > p.medium || p.medium > p.high {
            return Err(Error::Config(
                "severity penalties must satisfy 0 <= low <= medium <= high".into(),
            ));
        }
        let w = &self.scoring.category_weights;
        if w.structural < 0.0 || w.stylistic < 0.0 || w.citation < 0.0 {
            return Err(Error::Config("category weights must be non-negative".into()));
        }
        if w.structural + w.stylistic + w.citation <= 0.0 {
            return Err(Error::Config("category weights must not all be zero".into()));
        }
        if self.layout.columns == 0 {
            return Err(Error::Config("layout.columns must be at least 1".into()));
        }
        for font in self.typography.all() {
            if font.size <= 0.0 {
                return Err(Error::Config(format!(
                    "font size for {} must be positive",
                    font.family
                )));
            }
        }
        Ok(())
    }

    /// Rank of a section type in the canonical order.
    pub fn rank(&self, kind: SectionType) -> Option<usize> {
        self.section_order.iter().position(|k| *k == kind)
    }

    /// Check whether a section type is required.
    pub fn is_required(&self, kind: SectionType) -> bool {
        self.required_sections.contains(&kind)
    }

    /// Check whether headings of this type are numbered.
    pub fn is_numbered(&self, kind: SectionType) -> bool {
        !self.unnumbered_sections.contains(&kind) && self.headings.numbering != Numbering::None
    }

    /// Fixed heading text for a section type.
    pub fn fixed_heading(&self, kind: SectionType) -> Option<&str> {
        self.fixed_headings
            .iter()
            .find(|h| h.section == kind)
            .map(|h| h.text.as_str())
    }

    /// Body font rule for blocks of a section type.
    pub fn body_font(&self, kind: SectionType) -> &FontRule {
        match kind {
            SectionType::Abstract => &self.typography.abstract_text,
            SectionType::Keywords => &self.typography.keywords,
            SectionType::References => &self.typography.references,
            _ => &self.typography.body,
        }
    }

    /// Penalty for one issue of the given severity.
    pub fn penalty(&self, severity: Severity) -> f64 {
        let p = &self.scoring.severity_penalty;
        match severity {
            Severity::Low => p.low,
            Severity::Medium => p.medium,
            Severity::High => p.high,
        }
    }

    /// Weight of a score category.
    pub fn weight(&self, category: Category) -> f64 {
        let w = &self.scoring.category_weights;
        match category {
            Category::Structural => w.structural,
            Category::Stylistic => w.stylistic,
            Category::Citation => w.citation,
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::ieee_conference()
    }
}

/// Fixed heading text for a section type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedHeading {
    /// Section type
    pub section: SectionType,
    /// Heading text before case conversion
    pub text: String,
}

impl FixedHeading {
    /// Create a fixed heading entry.
    pub fn new(section: SectionType, text: impl Into<String>) -> Self {
        Self {
            section,
            text: text.into(),
        }
    }
}

/// Inclusive word count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRange {
    /// Minimum words
    pub min: usize,
    /// Maximum words
    pub max: usize,
}

impl WordRange {
    /// Check whether a count lies within the range.
    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Heading conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRules {
    /// Letter case of section headings
    pub case: HeadingCase,
    /// Section numbering style
    pub numbering: Numbering,
    /// Subsection numbering style
    pub subsection_numbering: Numbering,
}

/// Letter case applied to headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingCase {
    /// ALL CAPS
    Upper,
    /// Title Case
    Title,
    /// Leave as written
    AsIs,
}

impl HeadingCase {
    /// Apply the case convention to a heading.
    pub fn apply(&self, text: &str) -> String {
        match self {
            HeadingCase::Upper => text.to_uppercase(),
            HeadingCase::Title => title_case(text),
            HeadingCase::AsIs => text.to_string(),
        }
    }
}

const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "in", "of", "on", "or", "the", "to", "via",
    "vs",
];

/// Convert text to Title Case, keeping short function words lowercase.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && SMALL_WORDS.contains(&lower.as_str()) {
                return lower;
            }
            // Keep acronyms such as "CNN" intact
            if word.len() > 1 && word.chars().all(|c| !c.is_lowercase()) {
                return word.to_string();
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbering style for headings and captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Numbering {
    /// I, II, III, ...
    Roman,
    /// 1, 2, 3, ...
    Arabic,
    /// A, B, C, ...
    UpperAlpha,
    /// No numbering
    None,
}

impl Numbering {
    /// Format a 1-based number; `None` for `Numbering::None`.
    pub fn format(&self, n: u32) -> Option<String> {
        match self {
            Numbering::Roman => Some(to_roman(n)),
            Numbering::Arabic => Some(n.to_string()),
            Numbering::UpperAlpha => Some(to_alpha(n)),
            Numbering::None => None,
        }
    }
}

/// Convert number to Roman numerals.
pub fn to_roman(mut num: u32) -> String {
    let numerals = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut result = String::new();
    for (value, symbol) in numerals {
        while num >= value {
            result.push_str(symbol);
            num -= value;
        }
    }
    result
}

/// Convert number to spreadsheet-style letters (1 = A, 27 = AA).
fn to_alpha(mut num: u32) -> String {
    let mut letters = Vec::new();
    while num > 0 {
        let rem = (num - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        num = (num - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Font and alignment for one element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontRule {
    /// Font family
    pub family: String,
    /// Size in points
    pub size: f32,
    /// Bold
    pub bold: bool,
    /// Italic
    pub italic: bool,
    /// Paragraph alignment
    pub alignment: Alignment,
}

impl FontRule {
    /// Create a font rule.
    pub fn new(
        family: impl Into<String>,
        size: f32,
        bold: bool,
        italic: bool,
        alignment: Alignment,
    ) -> Self {
        Self {
            family: family.into(),
            size,
            bold,
            italic,
            alignment,
        }
    }

    /// Text style this rule prescribes.
    pub fn text_style(&self) -> TextStyle {
        TextStyle::new(self.family.clone(), self.size, self.bold, self.italic)
    }

    /// Check whether a text style satisfies this rule.
    pub fn matches(&self, style: &TextStyle) -> bool {
        style.font_family.as_deref() == Some(self.family.as_str())
            && style
                .font_size
                .map(|s| (s - self.size).abs() < 0.01)
                .unwrap_or(false)
            && style.bold == self.bold
            && style.italic == self.italic
    }
}

/// Fonts for each element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypographyRules {
    /// Paper title
    pub title: FontRule,
    /// Author line
    pub authors: FontRule,
    /// Affiliation lines
    pub affiliations: FontRule,
    /// Section headings
    pub heading: FontRule,
    /// Subsection headings
    pub subheading: FontRule,
    /// Body text
    pub body: FontRule,
    /// Abstract body
    #[serde(rename = "abstract")]
    pub abstract_text: FontRule,
    /// Index terms
    pub keywords: FontRule,
    /// Reference list
    pub references: FontRule,
    /// Figure and table captions
    pub caption: FontRule,
}

impl TypographyRules {
    fn all(&self) -> [&FontRule; 10] {
        [
            &self.title,
            &self.authors,
            &self.affiliations,
            &self.heading,
            &self.subheading,
            &self.body,
            &self.abstract_text,
            &self.keywords,
            &self.references,
            &self.caption,
        ]
    }
}

/// Paragraph spacing in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacingRules {
    /// Line spacing multiplier
    pub line_spacing: f32,
    /// Space before paragraphs
    pub space_before: f32,
    /// Space after paragraphs
    pub space_after: f32,
    /// First line indent
    pub first_line_indent: f32,
}

/// Caption conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRules {
    /// Figure caption prefix ("Fig.")
    pub figure_prefix: String,
    /// Figure numbering
    pub figure_numbering: Numbering,
    /// Table caption prefix ("TABLE")
    pub table_prefix: String,
    /// Table numbering
    pub table_numbering: Numbering,
}

/// Compliance scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Weight per category in the overall score
    pub category_weights: CategoryWeights,
    /// Points deducted per issue, by severity
    pub severity_penalty: SeverityPenalty,
}

/// Weight per score category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    /// Structural issues
    pub structural: f64,
    /// Stylistic issues
    pub stylistic: f64,
    /// Citation issues
    pub citation: f64,
}

/// Points deducted per issue, by severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityPenalty {
    /// Low severity
    pub low: f64,
    /// Medium severity
    pub medium: f64,
    /// High severity
    pub high: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RuleSet::ieee_conference().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let rules = RuleSet::ieee_conference();
        let toml = rules.to_toml_string().unwrap();
        let parsed = RuleSet::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, rules);
    }

    #[test]
    fn test_json_round_trip() {
        let rules = RuleSet::ieee_conference();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed = RuleSet::from_json_str(&json).unwrap();
        assert_eq!(parsed.section_order, rules.section_order);
    }

    #[test]
    fn test_validate_rejects_unordered_penalties() {
        let mut rules = RuleSet::ieee_conference();
        rules.scoring.severity_penalty.low = 50.0;
        assert!(matches!(rules.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_required_outside_order() {
        let mut rules = RuleSet::ieee_conference();
        rules.section_order.retain(|k| *k != SectionType::Keywords);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_word_range() {
        let mut rules = RuleSet::ieee_conference();
        rules.abstract_words = WordRange { min: 300, max: 100 };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_numbering() {
        assert_eq!(Numbering::Roman.format(4).as_deref(), Some("IV"));
        assert_eq!(Numbering::Arabic.format(12).as_deref(), Some("12"));
        assert_eq!(Numbering::UpperAlpha.format(1).as_deref(), Some("A"));
        assert_eq!(Numbering::UpperAlpha.format(28).as_deref(), Some("AB"));
        assert_eq!(Numbering::None.format(1), None);
    }

    #[test]
    fn test_to_roman() {
        assert_eq!(to_roman(1), "I");
        assert_eq!(to_roman(9), "IX");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(2024), "MMXXIV");
    }

    #[test]
    fn test_heading_case() {
        assert_eq!(HeadingCase::Upper.apply("Related work"), "RELATED WORK");
        assert_eq!(
            HeadingCase::Title.apply("results of the CNN study"),
            "Results of the CNN Study"
        );
    }

    #[test]
    fn test_rule_lookup() {
        let rules = RuleSet::ieee_conference();
        assert!(rules.is_required(SectionType::Abstract));
        assert!(!rules.is_numbered(SectionType::References));
        assert!(rules.is_numbered(SectionType::Introduction));
        assert_eq!(rules.fixed_heading(SectionType::Keywords), Some("Index Terms"));
        assert_eq!(rules.body_font(SectionType::Abstract).size, 9.0);
        assert!(rules.rank(SectionType::Abstract) < rules.rank(SectionType::References));
    }
}
