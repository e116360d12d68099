//! Requirement block extraction.
//!
//! Within a capability specification, requirements live under a
//! `## Requirements` header as `### Requirement: <name>` blocks. This module
//! splits a document into the text surrounding that region and the ordered
//! blocks inside it, preserving everything byte-for-byte for later
//! recomposition.

use std::sync::LazyLock;

use regex::Regex;

use super::section::normalize_line_endings;

static REQUIREMENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^###\s+Requirement:\s*(.+?)\s*$").expect("requirement header pattern is valid")
});

static REQUIREMENTS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^##\s+Requirements\s*$").expect("requirements section pattern is valid")
});

static TOP_LEVEL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+").expect("top-level header pattern is valid"));

static SCENARIO_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^####\s+").expect("scenario header pattern is valid"));

static METADATA_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*[^*]+\*\*:").expect("metadata pattern is valid"));

/// Normalizes a requirement name for identity comparison.
///
/// Only surrounding whitespace is stripped; case is preserved, so two names
/// differing only in case are distinct identities.
#[must_use]
pub fn normalize_name(name: &str) -> &str {
    name.trim()
}

/// A named requirement and its raw body, including any scenario sub-blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementBlock {
    /// The `### Requirement: <name>` line, verbatim.
    pub header_line: String,
    /// The trimmed, case-preserving requirement name.
    pub name: String,
    /// The full block: header line plus everything up to the next requirement
    /// or shallower header, with trailing whitespace trimmed.
    pub raw: String,
}

impl RequirementBlock {
    /// Returns a copy of this block re-headed with a new name.
    ///
    /// The body is carried over unchanged; only the header line is rewritten.
    #[must_use]
    pub fn renamed(&self, to: &str) -> Self {
        let header_line = format!("### Requirement: {to}");
        let mut lines: Vec<&str> = self.raw.lines().collect();
        let raw = if lines.is_empty() {
            header_line.clone()
        } else {
            lines[0] = &header_line;
            lines.join("\n")
        };
        Self {
            header_line,
            name: to.to_string(),
            raw,
        }
    }

    /// The requirement statement: the first non-blank body line that is not a
    /// `**Key**: value` metadata line, stopping at the first scenario header.
    #[must_use]
    pub fn requirement_text(&self) -> Option<&str> {
        for line in self.raw.lines().skip(1) {
            if SCENARIO_HEADER.is_match(line) {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || METADATA_LINE.is_match(trimmed) {
                continue;
            }
            return Some(trimmed);
        }
        None
    }

    /// Counts scenario sub-blocks by scanning the raw body for level-4
    /// headers.
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.raw
            .lines()
            .filter(|line| SCENARIO_HEADER.is_match(line))
            .count()
    }

    /// Whether `line` is a requirement header, returning the captured name.
    pub(crate) fn match_header(line: &str) -> Option<&str> {
        REQUIREMENT_HEADER
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|name| normalize_name(name.as_str()))
    }
}

/// A specification document decomposed around its `## Requirements` section.
///
/// `blocks` order is the authoritative display order; everything else is
/// carried through recomposition unchanged (modulo blank-line normalization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsRegion {
    /// Text preceding the `## Requirements` header.
    pub before: String,
    /// The `## Requirements` header line itself.
    pub header_line: String,
    /// Free text between the header and the first requirement block.
    pub preamble: String,
    /// Ordered requirement blocks.
    pub blocks: Vec<RequirementBlock>,
    /// Text from the next `##` header onwards, with a guaranteed leading
    /// newline.
    pub after: String,
}

impl RequirementsRegion {
    /// Locates the `## Requirements` section and parses its blocks.
    ///
    /// If the document has no such section, an empty region is synthesized at
    /// the end of the document so that merges against it can still append
    /// requirements.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let normalized = normalize_line_endings(content);
        // split('\n') keeps a trailing empty element so the document's final
        // newline survives recomposition.
        let lines: Vec<&str> = normalized.split('\n').collect();

        let Some(header_index) = lines.iter().position(|l| REQUIREMENTS_SECTION.is_match(l))
        else {
            return Self {
                before: normalized,
                header_line: "## Requirements".to_string(),
                preamble: String::new(),
                blocks: Vec::new(),
                after: "\n".to_string(),
            };
        };

        let end_index = lines
            .iter()
            .enumerate()
            .skip(header_index + 1)
            .find(|(_, l)| TOP_LEVEL_HEADER.is_match(l))
            .map_or(lines.len(), |(i, _)| i);

        let body = &lines[header_index + 1..end_index];
        let first_block = body
            .iter()
            .position(|l| RequirementBlock::match_header(l).is_some())
            .unwrap_or(body.len());

        let preamble = body[..first_block].join("\n").trim_end().to_string();
        let blocks = parse_blocks_from_lines(&body[first_block..]);

        let after = lines[end_index..].join("\n");
        let after = if after.starts_with('\n') {
            after
        } else {
            format!("\n{after}")
        };

        Self {
            before: lines[..header_index].join("\n"),
            header_line: lines[header_index].to_string(),
            preamble,
            blocks,
            after,
        }
    }
}

/// Parses requirement blocks from a section body (e.g. an `ADDED
/// Requirements` delta section).
#[must_use]
pub fn parse_blocks(section_body: &str) -> Vec<RequirementBlock> {
    if section_body.is_empty() {
        return Vec::new();
    }
    let normalized = normalize_line_endings(section_body);
    let lines: Vec<&str> = normalized.split('\n').collect();
    parse_blocks_from_lines(&lines)
}

fn parse_blocks_from_lines(lines: &[&str]) -> Vec<RequirementBlock> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        let Some(name) = RequirementBlock::match_header(lines[cursor]) else {
            cursor += 1;
            continue;
        };
        let header_line = lines[cursor].to_string();
        let mut body: Vec<&str> = vec![lines[cursor]];
        cursor += 1;
        while cursor < lines.len()
            && RequirementBlock::match_header(lines[cursor]).is_none()
            && !TOP_LEVEL_HEADER.is_match(lines[cursor])
        {
            body.push(lines[cursor]);
            cursor += 1;
        }
        blocks.push(RequirementBlock {
            header_line,
            name: name.to_string(),
            raw: body.join("\n").trim_end().to_string(),
        });
    }

    blocks
}
