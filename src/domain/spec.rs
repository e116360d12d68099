//! Structural specification model.
//!
//! A capability specification must carry a `## Purpose` section and a
//! `## Requirements` section. This model is what the validator reasons
//! about; the byte-preserving view used by merges lives in
//! [`super::block::RequirementsRegion`].

use super::section::{find_section, parse_sections};

/// A parsed requirement: its statement text and the scenarios beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// The requirement statement, falling back to the header title when the
    /// block has no body text.
    pub text: String,
    /// Raw text of each scenario sub-section, in document order.
    pub scenarios: Vec<String>,
}

impl Requirement {
    /// Whether the statement uses normative wording, matching `SHALL` or
    /// `MUST` as a whole word.
    #[must_use]
    pub fn has_normative_wording(&self) -> bool {
        contains_shall_or_must(&self.text)
    }
}

/// Whether `text` contains `SHALL` or `MUST` as a whole word.
#[must_use]
pub fn contains_shall_or_must(text: &str) -> bool {
    use std::sync::LazyLock;

    use regex::Regex;

    static NORMATIVE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(SHALL|MUST)\b").expect("normative pattern is valid"));
    NORMATIVE.is_match(text)
}

/// A capability specification in structural form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    /// The capability name, taken from the containing directory.
    pub name: String,
    /// Trimmed content of the `## Purpose` section.
    pub purpose: String,
    /// Parsed requirements, in document order.
    pub requirements: Vec<Requirement>,
}

/// Structural parse failures for specification documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// The `## Purpose` section is absent or empty.
    #[error("spec must have a Purpose section")]
    MissingPurpose,

    /// The `## Requirements` section is absent.
    #[error("spec must have a Requirements section")]
    MissingRequirements,
}

impl Spec {
    /// Parses specification content into the structural model.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::MissingPurpose`] if the `Purpose` section is
    /// absent or has no content, and [`SpecError::MissingRequirements`] if
    /// the `Requirements` section is absent.
    pub fn parse(name: &str, content: &str) -> Result<Self, SpecError> {
        let sections = parse_sections(content);

        let purpose = find_section(&sections, "Purpose")
            .map(|section| section.content.trim().to_string())
            .unwrap_or_default();
        if purpose.is_empty() {
            return Err(SpecError::MissingPurpose);
        }

        let requirements_section =
            find_section(&sections, "Requirements").ok_or(SpecError::MissingRequirements)?;

        let requirements = requirements_section
            .children
            .iter()
            .map(|child| {
                let text = requirement_text(&child.content)
                    .unwrap_or_else(|| child.title.clone());
                let scenarios = child
                    .children
                    .iter()
                    .filter(|scenario| !scenario.content.trim().is_empty())
                    .map(|scenario| scenario.content.clone())
                    .collect();
                Requirement { text, scenarios }
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            purpose,
            requirements,
        })
    }
}

/// First non-empty content line before any nested header.
fn requirement_text(content: &str) -> Option<String> {
    content
        .lines()
        .take_while(|line| !line.trim().starts_with('#'))
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = "# Demo Specification\n\n## Purpose\nTracks demo behavior end to end.\n\n## Requirements\n### Requirement: Alpha\nThe system SHALL do alpha.\n\n#### Scenario: Basic\n- **WHEN** a\n- **THEN** b\n\n### Requirement: Beta\nFree-form text without keywords.\n";

    #[test]
    fn parses_purpose_and_requirements() {
        let spec = Spec::parse("demo", SPEC).unwrap();

        assert_eq!(spec.name, "demo");
        assert_eq!(spec.purpose, "Tracks demo behavior end to end.");
        assert_eq!(spec.requirements.len(), 2);
        assert_eq!(spec.requirements[0].text, "The system SHALL do alpha.");
        assert_eq!(spec.requirements[0].scenarios.len(), 1);
        assert!(spec.requirements[1].scenarios.is_empty());
    }

    #[test]
    fn missing_purpose_is_an_error() {
        let result = Spec::parse("demo", "## Requirements\n### Requirement: A\nbody\n");

        assert_eq!(result, Err(SpecError::MissingPurpose));
    }

    #[test]
    fn empty_purpose_is_an_error() {
        let result = Spec::parse("demo", "## Purpose\n\n## Requirements\n");

        assert_eq!(result, Err(SpecError::MissingPurpose));
    }

    #[test]
    fn missing_requirements_is_an_error() {
        let result = Spec::parse("demo", "## Purpose\nSome purpose text.\n");

        assert_eq!(result, Err(SpecError::MissingRequirements));
    }

    #[test]
    fn requirement_text_falls_back_to_the_header_title() {
        let spec = Spec::parse(
            "demo",
            "## Purpose\nText.\n\n## Requirements\n### Requirement: Bare\n#### Scenario: S\n- step\n",
        )
        .unwrap();

        // No body text before the first scenario, so the full header title is
        // used as the statement.
        assert_eq!(spec.requirements[0].text, "Requirement: Bare");
    }

    #[test]
    fn normative_wording_matches_whole_words_only() {
        let shall = Requirement {
            text: "The system SHALL respond.".to_string(),
            scenarios: Vec::new(),
        };
        let mustard = Requirement {
            text: "Add MUSTARD to taste.".to_string(),
            scenarios: Vec::new(),
        };

        assert!(shall.has_normative_wording());
        assert!(!mustard.has_normative_wording());
    }
}
