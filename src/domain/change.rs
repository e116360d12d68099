//! Change proposal documents.
//!
//! Every change carries a `proposal.md` with a `## Why` section and a
//! `## What Changes` section. The proposal is rationale only; the operations
//! themselves live in the per-capability delta documents.

use super::section::{find_section, parse_sections};

/// A parsed change proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The change identifier, taken from the containing directory.
    pub name: String,
    /// Trimmed content of the `## Why` section.
    pub why: String,
    /// Trimmed content of the `## What Changes` section.
    pub what_changes: String,
}

/// Structural parse failures for proposal documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// The `## Why` section is absent or empty.
    #[error("change must have a Why section")]
    MissingWhy,

    /// The `## What Changes` section is absent or empty.
    #[error("change must have a What Changes section")]
    MissingWhatChanges,
}

impl Change {
    /// Parses proposal content.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError::MissingWhy`] or
    /// [`ChangeError::MissingWhatChanges`] when the corresponding section is
    /// absent or empty.
    pub fn parse(name: &str, content: &str) -> Result<Self, ChangeError> {
        let sections = parse_sections(content);

        let why = find_section(&sections, "Why")
            .map(|section| section.content.trim().to_string())
            .unwrap_or_default();
        if why.is_empty() {
            return Err(ChangeError::MissingWhy);
        }

        let what_changes = find_section(&sections, "What Changes")
            .map(|section| section.content.trim().to_string())
            .unwrap_or_default();
        if what_changes.is_empty() {
            return Err(ChangeError::MissingWhatChanges);
        }

        Ok(Self {
            name: name.to_string(),
            why,
            what_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_why_and_what_changes() {
        let change = Change::parse(
            "add-rate-limits",
            "## Why\nThe API is being overwhelmed by unthrottled clients.\n\n## What Changes\n- **api**: add rate limiting requirements\n",
        )
        .unwrap();

        assert_eq!(change.name, "add-rate-limits");
        assert!(change.why.starts_with("The API"));
        assert!(change.what_changes.contains("rate limiting"));
    }

    #[test]
    fn missing_why_is_an_error() {
        let result = Change::parse("c", "## What Changes\nsomething\n");

        assert_eq!(result, Err(ChangeError::MissingWhy));
    }

    #[test]
    fn missing_what_changes_is_an_error() {
        let result = Change::parse("c", "## Why\nbecause\n");

        assert_eq!(result, Err(ChangeError::MissingWhatChanges));
    }
}
