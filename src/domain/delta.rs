//! Delta plan construction.
//!
//! A change ships one delta document per affected capability. The document is
//! partitioned into `ADDED` / `MODIFIED` / `REMOVED` / `RENAMED Requirements`
//! sections, each parsed into its operation list. Section presence is tracked
//! separately from entry counts so that "header present but empty" can be
//! reported as an error while "section absent" stays a no-op.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    block::{RequirementBlock, normalize_name, parse_blocks},
    section::normalize_line_endings,
};

static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+(.+)$").expect("section header pattern is valid"));

static REMOVED_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s*`?###\s*Requirement:\s*(.+?)`?\s*$")
        .expect("removed bullet pattern is valid")
});

static RENAME_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-?\s*FROM:\s*`?###\s*Requirement:\s*(.+?)`?\s*$")
        .expect("rename FROM pattern is valid")
});

static RENAME_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-?\s*TO:\s*`?###\s*Requirement:\s*(.+?)`?\s*$")
        .expect("rename TO pattern is valid")
});

/// A requirement rename, from old name to new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// The existing requirement name.
    pub from: String,
    /// The replacement requirement name.
    pub to: String,
}

/// Which delta sections were present in the document, independent of whether
/// they parsed to any entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionPresence {
    /// An `## ADDED Requirements` header was found.
    pub added: bool,
    /// A `## MODIFIED Requirements` header was found.
    pub modified: bool,
    /// A `## REMOVED Requirements` header was found.
    pub removed: bool,
    /// A `## RENAMED Requirements` header was found.
    pub renamed: bool,
}

impl SectionPresence {
    /// Headers that were present, by display name.
    #[must_use]
    pub fn present_headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.added {
            headers.push("## ADDED Requirements");
        }
        if self.modified {
            headers.push("## MODIFIED Requirements");
        }
        if self.removed {
            headers.push("## REMOVED Requirements");
        }
        if self.renamed {
            headers.push("## RENAMED Requirements");
        }
        headers
    }

    /// Whether any delta section header was found.
    #[must_use]
    pub fn any(&self) -> bool {
        self.added || self.modified || self.removed || self.renamed
    }
}

/// The categorized operations parsed from one delta document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPlan {
    /// Requirements to insert; full blocks.
    pub added: Vec<RequirementBlock>,
    /// Requirements to replace; full blocks keyed by header name.
    pub modified: Vec<RequirementBlock>,
    /// Requirement names to delete; names only.
    pub removed: Vec<String>,
    /// Requirement renames, in document order.
    pub renamed: Vec<Rename>,
    /// Which section headers appeared in the document.
    pub presence: SectionPresence,
}

impl DeltaPlan {
    /// Parses a delta document into its operation lists.
    ///
    /// Section titles are matched case-insensitively. Unmatched trailing
    /// `FROM:`/`TO:` rename halves are discarded with a debug-level
    /// diagnostic rather than raising a parse error.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let normalized = normalize_line_endings(content);
        let sections = split_top_level_sections(&normalized);

        let (added_body, added_found) = lookup(&sections, "ADDED Requirements");
        let (modified_body, modified_found) = lookup(&sections, "MODIFIED Requirements");
        let (removed_body, removed_found) = lookup(&sections, "REMOVED Requirements");
        let (renamed_body, renamed_found) = lookup(&sections, "RENAMED Requirements");

        Self {
            added: parse_blocks(added_body),
            modified: parse_blocks(modified_body),
            removed: parse_removed_names(removed_body),
            renamed: parse_renamed_pairs(renamed_body),
            presence: SectionPresence {
                added: added_found,
                modified: modified_found,
                removed: removed_found,
                renamed: renamed_found,
            },
        }
    }

    /// Total number of operations across all categories.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len() + self.renamed.len()
    }

    /// Whether the plan carries no operations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operation_count() == 0
    }
}

fn split_top_level_sections(content: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = content.split('\n').collect();
    let headers: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            SECTION_HEADER
                .captures(line)
                .map(|captures| (i, captures[1].trim().to_string()))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(n, (index, title))| {
            let end = headers.get(n + 1).map_or(lines.len(), |(next, _)| *next);
            (title.clone(), lines[index + 1..end].join("\n"))
        })
        .collect()
}

fn lookup<'a>(sections: &'a [(String, String)], title: &str) -> (&'a str, bool) {
    sections
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(title))
        .map_or(("", false), |(_, body)| (body.as_str(), true))
}

fn parse_removed_names(body: &str) -> Vec<String> {
    body.split('\n')
        .filter_map(|line| {
            RequirementBlock::match_header(line)
                .map(str::to_string)
                .or_else(|| {
                    REMOVED_BULLET
                        .captures(line)
                        .map(|captures| normalize_name(&captures[1]).to_string())
                })
        })
        .collect()
}

fn parse_renamed_pairs(body: &str) -> Vec<Rename> {
    let mut pairs = Vec::new();
    let mut from: Option<String> = None;
    let mut to: Option<String> = None;

    for line in body.split('\n') {
        if let Some(captures) = RENAME_FROM.captures(line) {
            from = Some(normalize_name(&captures[1]).to_string());
        } else if let Some(captures) = RENAME_TO.captures(line) {
            let target = normalize_name(&captures[1]).to_string();
            if let Some(source) = from.take() {
                pairs.push(Rename {
                    from: source,
                    to: target,
                });
                to = None;
            } else {
                to = Some(target);
            }
        }
    }

    if from.is_some() || to.is_some() {
        tracing::debug!("discarding incomplete rename pair (unmatched FROM/TO line)");
    }

    pairs
}
