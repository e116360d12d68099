//! Header-delimited section extraction.
//!
//! Markdown documents are decomposed into a tree of [`Section`]s keyed by
//! heading depth. A section's content runs from just after its header line to
//! just before the next header of the same or shallower level.

use std::sync::LazyLock;

use regex::Regex;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("header pattern is valid"));

/// A header-delimited region of a markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading depth, 1 through 6.
    pub level: u8,
    /// Header text with surrounding whitespace trimmed.
    pub title: String,
    /// Raw text between this header and the next header of level <= this
    /// one, trimmed.
    pub content: String,
    /// Nested subsections, in document order.
    pub children: Vec<Section>,
}

/// Replaces CRLF and bare CR line endings with LF.
#[must_use]
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Parses a document into its top-level sections with full recursive nesting.
///
/// Children strictly nest by level: a new header closes every open section
/// whose level is greater than or equal to its own, then attaches to the
/// nearest remaining ancestor (or becomes a root). Single forward scan, no
/// backtracking.
#[must_use]
pub fn parse_sections(content: &str) -> Vec<Section> {
    let normalized = normalize_line_endings(content);
    let lines: Vec<&str> = normalized.lines().collect();

    let mut roots: Vec<Section> = Vec::new();
    let mut stack: Vec<Section> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some(captures) = HEADER.captures(line) else {
            continue;
        };
        let level = u8::try_from(captures[1].len()).expect("heading depth is at most 6");
        let title = captures[2].trim().to_string();
        let content = content_until_next_header(&lines, index + 1, level);

        while stack.last().is_some_and(|open| open.level >= level) {
            if let Some(closed) = stack.pop() {
                attach(closed, &mut stack, &mut roots);
            }
        }

        stack.push(Section {
            level,
            title,
            content,
            children: Vec::new(),
        });
    }

    while let Some(closed) = stack.pop() {
        attach(closed, &mut stack, &mut roots);
    }

    roots
}

fn attach(section: Section, stack: &mut Vec<Section>, roots: &mut Vec<Section>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(section),
        None => roots.push(section),
    }
}

fn content_until_next_header(lines: &[&str], start: usize, level: u8) -> String {
    let mut captured: Vec<&str> = Vec::new();

    for line in &lines[start.min(lines.len())..] {
        if let Some(captures) = HEADER.captures(line) {
            let next_level = u8::try_from(captures[1].len()).expect("heading depth is at most 6");
            if next_level <= level {
                break;
            }
        }
        captured.push(line);
    }

    captured.join("\n").trim().to_string()
}

/// Finds a section by title, case-insensitively, searching depth-first.
#[must_use]
pub fn find_section<'a>(sections: &'a [Section], title: &str) -> Option<&'a Section> {
    for section in sections {
        if section.title.eq_ignore_ascii_case(title) {
            return Some(section);
        }
        if let Some(child) = find_section(&section.children, title) {
            return Some(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_document_produces_sibling_sections() {
        let sections = parse_sections("## One\nalpha\n\n## Two\nbeta\n");

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "One");
        assert_eq!(sections[0].content, "alpha");
        assert_eq!(sections[1].title, "Two");
        assert_eq!(sections[1].content, "beta");
    }

    #[test]
    fn deeper_headers_nest_under_parents() {
        let input = "# Top\nintro\n\n## Middle\nbody\n\n### Leaf\ndetail\n\n## Other\n";
        let sections = parse_sections(input);

        assert_eq!(sections.len(), 1);
        let top = &sections[0];
        assert_eq!(top.children.len(), 2);
        assert_eq!(top.children[0].title, "Middle");
        assert_eq!(top.children[0].children[0].title, "Leaf");
        assert_eq!(top.children[1].title, "Other");
    }

    #[test]
    fn parent_content_stops_at_first_child_of_same_or_shallower_level() {
        let input = "## A\nline one\n### A1\nnested\n## B\n";
        let sections = parse_sections(input);

        assert_eq!(sections[0].content, "line one\n### A1\nnested");
        assert_eq!(sections[0].children.len(), 1);
        assert_eq!(sections[0].children[0].content, "nested");
    }

    #[test]
    fn crlf_input_parses_identically_to_lf() {
        let lf = parse_sections("## A\none\n\n## B\ntwo\n");
        let crlf = parse_sections("## A\r\none\r\n\r\n## B\r\ntwo\r\n");

        assert_eq!(lf, crlf);
    }

    #[test]
    fn siblings_after_a_deep_subtree_rejoin_the_correct_parent() {
        let input = "# R\n## A\n### A1\n#### A1a\n## B\n";
        let sections = parse_sections(input);

        let root = &sections[0];
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].title, "A");
        assert_eq!(root.children[1].title, "B");
        assert_eq!(root.children[0].children[0].children[0].title, "A1a");
    }

    #[test]
    fn find_section_is_case_insensitive_and_recursive() {
        let sections = parse_sections("# Doc\n## Purpose\ntext\n## Requirements\n");

        assert!(find_section(&sections, "purpose").is_some());
        assert!(find_section(&sections, "REQUIREMENTS").is_some());
        assert!(find_section(&sections, "missing").is_none());
    }

    #[test]
    fn non_header_hash_lines_are_not_sections() {
        let sections = parse_sections("## A\n####### too deep\n#nospace\n");

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "####### too deep\n#nospace");
    }
}
