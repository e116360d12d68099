//! Delta merge and document recomposition.
//!
//! A validated [`DeltaPlan`] is applied against the base document's block map
//! in a fixed operation order (RENAMED, then REMOVED, then MODIFIED, then
//! ADDED) so a rename frees its old identity before removal or modification
//! logic sees the name space, and an added name can never shadow a name a
//! rename still occupies. All consistency checks run before any mutation.

use std::{collections::HashMap, fmt, sync::LazyLock};

use regex::Regex;

use super::{
    block::{RequirementBlock, RequirementsRegion, normalize_name},
    delta::DeltaPlan,
};

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern is valid"));

/// A delta operation category, used in conflict diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The `ADDED Requirements` section.
    Added,
    /// The `MODIFIED Requirements` section.
    Modified,
    /// The `REMOVED Requirements` section.
    Removed,
    /// `FROM:` entries of the `RENAMED Requirements` section.
    RenamedFrom,
    /// `TO:` entries of the `RENAMED Requirements` section.
    RenamedTo,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Removed => "REMOVED",
            Self::RenamedFrom => "RENAMED FROM",
            Self::RenamedTo => "RENAMED TO",
        };
        f.write_str(label)
    }
}

/// Errors detected while validating or applying a delta plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The same name appears twice within one category.
    #[error("duplicate requirement in {category} for header \"### Requirement: {name}\"")]
    DuplicateInCategory {
        /// The category containing the duplicate.
        category: Category,
        /// The duplicated requirement name.
        name: String,
    },

    /// A name appears in more than one of ADDED / MODIFIED / REMOVED.
    #[error(
        "requirement present in multiple sections ({first} and {second}) for header \"### Requirement: {name}\""
    )]
    CrossSectionConflict {
        /// The conflicting requirement name.
        name: String,
        /// The first category it appears in.
        first: Category,
        /// The second category it appears in.
        second: Category,
    },

    /// MODIFIED references a name that a rename in the same delta retires.
    #[error(
        "when a rename exists, MODIFIED must reference the new header \"### Requirement: {to}\", not \"### Requirement: {from}\""
    )]
    ModifiedTargetsRenamedFrom {
        /// The retired name the MODIFIED entry referenced.
        from: String,
        /// The new name it must reference instead.
        to: String,
    },

    /// A rename target collides with an added name in the same delta.
    #[error("RENAMED TO header collides with ADDED for \"### Requirement: {to}\"")]
    RenameCollidesWithAdded {
        /// The colliding rename target.
        to: String,
    },

    /// The delta document parsed to zero operations.
    #[error(
        "no delta operations found; provide ## ADDED/MODIFIED/REMOVED/RENAMED Requirements sections with at least one entry"
    )]
    EmptyPlan,

    /// A rename source is absent from the base document.
    #[error("RENAMED failed for header \"### Requirement: {name}\": source not found")]
    RenameSourceMissing {
        /// The missing source name.
        name: String,
    },

    /// A rename target already exists in the base document.
    #[error("RENAMED failed for header \"### Requirement: {name}\": target already exists")]
    RenameTargetExists {
        /// The already-present target name.
        name: String,
    },

    /// A removed name is absent from the base document.
    #[error("REMOVED failed for header \"### Requirement: {name}\": not found")]
    RemoveMissing {
        /// The missing name.
        name: String,
    },

    /// A modified name is absent from the base document.
    #[error("MODIFIED failed for header \"### Requirement: {name}\": not found")]
    ModifyMissing {
        /// The missing name.
        name: String,
    },

    /// A modified block's header line does not match the name it targets.
    #[error("MODIFIED failed for header \"### Requirement: {name}\": header mismatch in content")]
    ModifyHeaderMismatch {
        /// The targeted name.
        name: String,
    },

    /// An added name already exists in the base document.
    #[error("ADDED failed for header \"### Requirement: {name}\": already exists")]
    AddExists {
        /// The already-present name.
        name: String,
    },
}

/// Validates a plan's internal consistency before any mutation.
///
/// Checks within-category duplicates, cross-category conflicts, rename
/// interactions, and that the plan carries at least one operation. Returns
/// the first detected error; existence checks against the base document
/// happen in [`apply_plan`].
///
/// # Errors
///
/// Returns the first [`MergeError`] detected, in a fixed check order:
/// duplicates, then rename interactions, then cross-category conflicts, then
/// emptiness.
pub fn check_plan(plan: &DeltaPlan) -> Result<(), MergeError> {
    let added = unique_names(
        plan.added.iter().map(|block| block.name.as_str()),
        Category::Added,
    )?;
    let modified = unique_names(
        plan.modified.iter().map(|block| block.name.as_str()),
        Category::Modified,
    )?;
    let removed = unique_names(plan.removed.iter().map(String::as_str), Category::Removed)?;
    unique_names(
        plan.renamed.iter().map(|rename| rename.from.as_str()),
        Category::RenamedFrom,
    )?;
    unique_names(
        plan.renamed.iter().map(|rename| rename.to.as_str()),
        Category::RenamedTo,
    )?;

    for rename in &plan.renamed {
        if modified.contains(&normalize_name(&rename.from)) {
            return Err(MergeError::ModifiedTargetsRenamedFrom {
                from: rename.from.clone(),
                to: rename.to.clone(),
            });
        }
        if added.contains(&normalize_name(&rename.to)) {
            return Err(MergeError::RenameCollidesWithAdded {
                to: rename.to.clone(),
            });
        }
    }

    for block in &plan.modified {
        let name = normalize_name(&block.name);
        if removed.contains(&name) {
            return Err(conflict(name, Category::Modified, Category::Removed));
        }
        if added.contains(&name) {
            return Err(conflict(name, Category::Modified, Category::Added));
        }
    }
    for block in &plan.added {
        let name = normalize_name(&block.name);
        if removed.contains(&name) {
            return Err(conflict(name, Category::Added, Category::Removed));
        }
    }

    if plan.is_empty() {
        return Err(MergeError::EmptyPlan);
    }

    Ok(())
}

fn conflict(name: &str, first: Category, second: Category) -> MergeError {
    MergeError::CrossSectionConflict {
        name: name.to_string(),
        first,
        second,
    }
}

fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    category: Category,
) -> Result<Vec<&'a str>, MergeError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        let normalized = normalize_name(name);
        if seen.contains(&normalized) {
            return Err(MergeError::DuplicateInCategory {
                category,
                name: name.to_string(),
            });
        }
        seen.push(normalized);
    }
    Ok(seen)
}

/// A name-to-block map that tracks key insertion order, mirroring the
/// semantics the merge relies on: retained keys keep their seed position and
/// re-inserted keys (renames, adds) move to the end.
#[derive(Debug, Default)]
struct BlockMap {
    order: Vec<String>,
    blocks: HashMap<String, RequirementBlock>,
}

impl BlockMap {
    fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Inserts or replaces; a fresh key is appended to the order.
    fn insert(&mut self, name: &str, block: RequirementBlock) {
        if !self.blocks.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.blocks.insert(name.to_string(), block);
    }

    fn remove(&mut self, name: &str) -> Option<RequirementBlock> {
        self.order.retain(|key| key != name);
        self.blocks.remove(name)
    }

    fn get(&self, name: &str) -> Option<&RequirementBlock> {
        self.blocks.get(name)
    }
}

/// Applies a plan against the base region's blocks, producing the rebuilt
/// ordered block list.
///
/// Retained names keep the base document's order; added and renamed names are
/// appended in the plan's encounter order. The caller recomposes the result
/// with [`recompose`].
///
/// # Errors
///
/// Returns the first [`MergeError`] from [`check_plan`] or from apply-time
/// existence checks (missing rename source or removal/modification target,
/// already-present rename target or added name, modified header mismatch).
pub fn apply_plan(
    region: &RequirementsRegion,
    plan: &DeltaPlan,
) -> Result<Vec<RequirementBlock>, MergeError> {
    check_plan(plan)?;

    let mut map = BlockMap::default();
    for block in &region.blocks {
        map.insert(normalize_name(&block.name), block.clone());
    }

    for rename in &plan.renamed {
        let from = normalize_name(&rename.from);
        let to = normalize_name(&rename.to);
        if !map.contains(from) {
            return Err(MergeError::RenameSourceMissing {
                name: rename.from.clone(),
            });
        }
        if map.contains(to) {
            return Err(MergeError::RenameTargetExists {
                name: rename.to.clone(),
            });
        }
        if let Some(block) = map.remove(from) {
            map.insert(to, block.renamed(to));
        }
    }

    for name in &plan.removed {
        let key = normalize_name(name);
        if map.remove(key).is_none() {
            return Err(MergeError::RemoveMissing { name: name.clone() });
        }
    }

    for replacement in &plan.modified {
        let key = normalize_name(&replacement.name);
        if !map.contains(key) {
            return Err(MergeError::ModifyMissing {
                name: replacement.name.clone(),
            });
        }
        let header_name = replacement
            .raw
            .split('\n')
            .next()
            .and_then(RequirementBlock::match_header);
        if header_name != Some(key) {
            return Err(MergeError::ModifyHeaderMismatch {
                name: replacement.name.clone(),
            });
        }
        map.insert(key, replacement.clone());
    }

    for addition in &plan.added {
        let key = normalize_name(&addition.name);
        if map.contains(key) {
            return Err(MergeError::AddExists {
                name: addition.name.clone(),
            });
        }
        map.insert(key, addition.clone());
    }

    // Original order first for retained names, then everything the plan
    // introduced, in encounter order. Renamed blocks are keyed by their new
    // name, so they land in the appended group rather than at their old
    // position.
    let mut rebuilt = Vec::with_capacity(map.order.len());
    let mut emitted: Vec<&str> = Vec::new();
    for block in &region.blocks {
        let key = normalize_name(&block.name);
        if let Some(merged) = map.get(key) {
            rebuilt.push(merged.clone());
            emitted.push(key);
        }
    }
    for key in &map.order {
        if !emitted.contains(&key.as_str()) {
            if let Some(block) = map.get(key) {
                rebuilt.push(block.clone());
            }
        }
    }

    Ok(rebuilt)
}

/// Reassembles the full document text around the rebuilt block list.
///
/// Everything outside the requirements region is preserved; runs of three or
/// more consecutive newlines collapse to a single blank line, and the output
/// ends with exactly one trailing newline.
#[must_use]
pub fn recompose(region: &RequirementsRegion, blocks: &[RequirementBlock]) -> String {
    let mut body_parts: Vec<&str> = Vec::new();
    let preamble = region.preamble.trim_end();
    if !preamble.is_empty() {
        body_parts.push(preamble);
    }
    body_parts.extend(blocks.iter().map(|block| block.raw.as_str()));
    let body = body_parts.join("\n\n");

    let mut parts: Vec<&str> = Vec::new();
    if !region.before.is_empty() {
        parts.push(&region.before);
    }
    parts.push(&region.header_line);
    parts.push(&body);
    parts.push(&region.after);

    let joined = parts.join("\n");
    let collapsed = BLANK_RUNS.replace_all(&joined, "\n\n");
    format!("{}\n", collapsed.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delta::Rename;

    fn block(name: &str, body: &str) -> RequirementBlock {
        let header_line = format!("### Requirement: {name}");
        RequirementBlock {
            header_line: header_line.clone(),
            name: name.to_string(),
            raw: format!("{header_line}\n{body}"),
        }
    }

    fn region(names: &[(&str, &str)]) -> RequirementsRegion {
        RequirementsRegion {
            before: "# Demo Specification\n\n## Purpose\nDemo purpose.\n".to_string(),
            header_line: "## Requirements".to_string(),
            preamble: String::new(),
            blocks: names.iter().map(|(n, b)| block(n, b)).collect(),
            after: "\n".to_string(),
        }
    }

    fn plan() -> DeltaPlan {
        DeltaPlan::default()
    }

    #[test]
    fn empty_plan_is_rejected() {
        assert_eq!(check_plan(&plan()), Err(MergeError::EmptyPlan));
    }

    #[test]
    fn duplicate_within_added_is_rejected() {
        let mut delta = plan();
        delta.added = vec![block("A", "x"), block("A", "y")];

        assert_eq!(
            check_plan(&delta),
            Err(MergeError::DuplicateInCategory {
                category: Category::Added,
                name: "A".to_string(),
            })
        );
    }

    #[test]
    fn name_in_added_and_removed_conflicts() {
        let mut delta = plan();
        delta.added = vec![block("A", "x")];
        delta.removed = vec!["A".to_string()];

        assert_eq!(
            check_plan(&delta),
            Err(MergeError::CrossSectionConflict {
                name: "A".to_string(),
                first: Category::Added,
                second: Category::Removed,
            })
        );
    }

    #[test]
    fn modifying_the_renamed_from_name_is_rejected() {
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "B".to_string(),
        }];
        delta.modified = vec![block("A", "stale")];

        assert_eq!(
            check_plan(&delta),
            Err(MergeError::ModifiedTargetsRenamedFrom {
                from: "A".to_string(),
                to: "B".to_string(),
            })
        );
    }

    #[test]
    fn rename_target_colliding_with_added_is_rejected() {
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "B".to_string(),
        }];
        delta.added = vec![block("B", "fresh")];

        assert_eq!(
            check_plan(&delta),
            Err(MergeError::RenameCollidesWithAdded {
                to: "B".to_string(),
            })
        );
    }

    #[test]
    fn pure_additions_append_after_existing_blocks() {
        let base = region(&[("A", "a body"), ("B", "b body")]);
        let mut delta = plan();
        delta.added = vec![block("C", "c body"), block("D", "d body")];

        let rebuilt = apply_plan(&base, &delta).unwrap();
        let names: Vec<&str> = rebuilt.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
    }

    #[test]
    fn rename_then_modify_targets_the_new_name() {
        let base = region(&[("A", "a body")]);
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "B".to_string(),
        }];
        delta.modified = vec![block("B", "updated body")];

        let rebuilt = apply_plan(&base, &delta).unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].name, "B");
        assert!(rebuilt[0].raw.contains("updated body"));
    }

    #[test]
    fn rename_source_must_exist() {
        let base = region(&[("A", "a body")]);
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "Missing".to_string(),
            to: "B".to_string(),
        }];

        assert_eq!(
            apply_plan(&base, &delta),
            Err(MergeError::RenameSourceMissing {
                name: "Missing".to_string(),
            })
        );
    }

    #[test]
    fn rename_target_must_not_exist_in_base() {
        let base = region(&[("A", "a"), ("B", "b")]);
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "B".to_string(),
        }];

        assert_eq!(
            apply_plan(&base, &delta),
            Err(MergeError::RenameTargetExists {
                name: "B".to_string(),
            })
        );
    }

    #[test]
    fn removing_the_renamed_from_name_is_rejected_as_missing() {
        // The rename runs first and retires the FROM name, so a REMOVED entry
        // naming it no longer finds a target.
        let base = region(&[("A", "a body")]);
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "B".to_string(),
        }];
        delta.removed = vec!["A".to_string()];

        assert_eq!(
            apply_plan(&base, &delta),
            Err(MergeError::RemoveMissing {
                name: "A".to_string(),
            })
        );
    }

    #[test]
    fn modified_header_must_match_target_name() {
        let base = region(&[("A", "a body")]);
        let mut delta = plan();
        let mut bad = block("A", "body");
        bad.raw = "### Requirement: Other\nbody".to_string();
        delta.modified = vec![bad];

        assert_eq!(
            apply_plan(&base, &delta),
            Err(MergeError::ModifyHeaderMismatch {
                name: "A".to_string(),
            })
        );
    }

    #[test]
    fn added_name_must_not_exist() {
        let base = region(&[("A", "a body")]);
        let mut delta = plan();
        delta.added = vec![block("A", "again")];

        assert_eq!(
            apply_plan(&base, &delta),
            Err(MergeError::AddExists {
                name: "A".to_string(),
            })
        );
    }

    #[test]
    fn names_differing_only_in_case_are_distinct() {
        let base = region(&[("Alpha", "a body")]);
        let mut delta = plan();
        delta.added = vec![block("alpha", "lowercase twin")];

        let rebuilt = apply_plan(&base, &delta).unwrap();
        let names: Vec<&str> = rebuilt.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "alpha"]);
    }

    #[test]
    fn combined_operations_follow_the_append_order_rule() {
        // RENAME A -> C, REMOVE B, MODIFY C, ADD D: result order is C then D,
        // with A and B gone.
        let base = region(&[("A", "a body"), ("B", "b body")]);
        let mut delta = plan();
        delta.renamed = vec![Rename {
            from: "A".to_string(),
            to: "C".to_string(),
        }];
        delta.removed = vec!["B".to_string()];
        delta.modified = vec![block("C", "updated C")];
        delta.added = vec![block("D", "content D")];

        let rebuilt = apply_plan(&base, &delta).unwrap();
        let names: Vec<&str> = rebuilt.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["C", "D"]);
        assert!(rebuilt[0].raw.contains("updated C"));
    }

    #[test]
    fn retained_blocks_keep_their_original_positions() {
        let base = region(&[("A", "a"), ("B", "b"), ("C", "c")]);
        let mut delta = plan();
        delta.modified = vec![block("B", "b updated")];

        let rebuilt = apply_plan(&base, &delta).unwrap();
        let names: Vec<&str> = rebuilt.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(rebuilt[1].raw.contains("b updated"));
    }

    #[test]
    fn recompose_preserves_surrounding_text_and_joins_blocks() {
        let base = region(&[("A", "The system SHALL a.")]);
        let rebuilt = apply_plan(&base, &{
            let mut delta = plan();
            delta.added = vec![block("B", "The system SHALL b.")];
            delta
        })
        .unwrap();

        let text = recompose(&base, &rebuilt);
        assert!(text.starts_with("# Demo Specification"));
        assert!(text.contains("## Purpose"));
        assert!(text.contains("### Requirement: A\nThe system SHALL a.\n\n### Requirement: B"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn recompose_collapses_runs_of_blank_lines() {
        let mut base = region(&[("A", "body")]);
        base.preamble = "Preamble.\n\n\n\n".to_string();

        let text = recompose(&base, &base.blocks);
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn recompose_of_unchanged_blocks_round_trips_modulo_blank_lines() {
        let source = "# Demo Specification\n\n## Purpose\nDemo purpose.\n\n\n\n## Requirements\n### Requirement: A\nThe system SHALL a.\n\n#### Scenario: S\n- step\n";
        let base = RequirementsRegion::parse(source);

        let text = recompose(&base, &base.blocks);
        assert_eq!(
            text,
            "# Demo Specification\n\n## Purpose\nDemo purpose.\n\n## Requirements\n### Requirement: A\nThe system SHALL a.\n\n#### Scenario: S\n- step\n"
        );
    }
}
