use std::path::PathBuf;

use clap::Parser;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use specdelta::{
    Repository,
    validation::{Level, ValidationReport, Validator},
};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Validate change deltas and specification documents")]
pub struct Validate {
    /// Change or capability name to validate
    item: Option<String>,

    /// Validate all pending changes and all specifications
    #[arg(long)]
    all: bool,

    /// Validate all pending changes
    #[arg(long)]
    changes: bool,

    /// Validate all specifications
    #[arg(long)]
    specs: bool,

    /// Disambiguate an item that names both a change and a capability
    #[arg(long = "type", value_name = "TYPE")]
    item_kind: Option<ItemKind>,

    /// Escalate warnings to failures
    #[arg(long)]
    strict: bool,

    /// Output a machine-readable JSON report
    #[arg(long)]
    json: bool,

    /// Max concurrent validations for bulk runs
    #[arg(long, value_name = "N", env = "SPECDELTA_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ItemKind {
    /// A pending change under changes/
    Change,
    /// A capability specification under specs/
    Spec,
}

impl ItemKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Spec => "spec",
        }
    }

    const fn noun(self) -> &'static str {
        match self {
            Self::Change => "Change",
            Self::Spec => "Specification",
        }
    }
}

/// One item's outcome in a bulk run.
#[derive(Debug)]
struct BulkItem {
    id: String,
    kind: ItemKind,
    report: ValidationReport,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let repo = Repository::new(root);
        let config = repo.config();
        let strict = self.strict || config.strict;

        if self.all || self.changes || self.specs {
            let scope_changes = self.all || self.changes;
            let scope_specs = self.all || self.specs;
            let concurrency = self
                .concurrency
                .filter(|n| *n > 0)
                .unwrap_or_else(|| config.concurrency());
            return self.run_bulk(&repo, scope_changes, scope_specs, strict, concurrency);
        }

        let Some(item) = self.item.clone() else {
            anyhow::bail!(
                "Nothing to validate. Try one of:\n  spd validate --all\n  spd validate --changes\n  spd validate --specs\n  spd validate <item-name>"
            );
        };

        self.run_single(&repo, &item, strict)
    }

    fn run_single(&self, repo: &Repository, item: &str, strict: bool) -> anyhow::Result<()> {
        let changes = repo.change_ids();
        let specs = repo.capability_ids();
        let is_change = changes.iter().any(|id| id == item);
        let is_spec = specs.iter().any(|id| id == item);

        let kind = match (self.item_kind, is_change, is_spec) {
            (Some(kind), _, _) => kind,
            (None, true, true) => anyhow::bail!(
                "Ambiguous item '{item}' matches both a change and a spec. Pass --type change|spec."
            ),
            (None, true, false) => ItemKind::Change,
            (None, false, true) => ItemKind::Spec,
            (None, false, false) => {
                anyhow::bail!("Unknown item '{item}'")
            }
        };

        let item_result = validate_one(repo, kind, item, strict);

        if self.json {
            print_json(std::slice::from_ref(&item_result));
        } else {
            print_report(&item_result);
        }

        if item_result.report.valid {
            Ok(())
        } else {
            std::process::exit(1);
        }
    }

    fn run_bulk(
        &self,
        repo: &Repository,
        scope_changes: bool,
        scope_specs: bool,
        strict: bool,
        concurrency: usize,
    ) -> anyhow::Result<()> {
        let mut queue: Vec<(ItemKind, String)> = Vec::new();
        if scope_changes {
            queue.extend(
                repo.change_ids()
                    .into_iter()
                    .map(|id| (ItemKind::Change, id)),
            );
        }
        if scope_specs {
            queue.extend(
                repo.capability_ids()
                    .into_iter()
                    .map(|id| (ItemKind::Spec, id)),
            );
        }

        // Each unit of work is read-only; one item failing validation never
        // cancels the others. Completion order is unspecified, so results are
        // re-sorted by identifier before reporting.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .build()?;
        let mut results: Vec<BulkItem> = pool.install(|| {
            queue
                .par_iter()
                .map(|(kind, id)| validate_one(repo, *kind, id, strict))
                .collect()
        });
        results.sort_by(|a, b| a.id.cmp(&b.id));

        let passed = results.iter().filter(|item| item.report.valid).count();
        let failed = results.len() - passed;

        if self.json {
            print_json(&results);
        } else {
            for item in &results {
                if item.report.valid {
                    println!("{} {}/{}", "✓".success(), item.kind.label(), item.id);
                } else {
                    eprintln!("{} {}/{}", "✗".error(), item.kind.label(), item.id);
                    for issue in &item.report.issues {
                        eprintln!("    [{}] {}: {}", issue.level, issue.path, issue.message);
                    }
                }
            }
            println!(
                "Totals: {passed} passed, {failed} failed ({} items)",
                results.len()
            );
        }

        if failed > 0 {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn validate_one(repo: &Repository, kind: ItemKind, id: &str, strict: bool) -> BulkItem {
    let validator = Validator::new(strict);
    let report = match kind {
        ItemKind::Change => validator.validate_change_dir(&repo.change_dir(id)),
        ItemKind::Spec => validator.validate_spec_file(id, &repo.spec_path(id)),
    };
    BulkItem {
        id: id.to_string(),
        kind,
        report,
    }
}

fn print_report(item: &BulkItem) {
    if item.report.valid {
        println!(
            "{}",
            format!("{} '{}' is valid", item.kind.noun(), item.id).success()
        );
        return;
    }

    eprintln!(
        "{}",
        format!("{} '{}' has issues", item.kind.noun(), item.id).error()
    );
    for issue in &item.report.issues {
        let prefix = match issue.level {
            Level::Error => "✗".error(),
            Level::Warning => "⚠".warning(),
            Level::Info => "ℹ".to_string(),
        };
        eprintln!("{prefix} [{}] {}: {}", issue.level, issue.path, issue.message);
    }

    eprintln!("{}", "Next steps:".dim());
    match item.kind {
        ItemKind::Change => {
            eprintln!(
                "{}",
                "  - Ensure the change has deltas in specs/: use headers ## ADDED/MODIFIED/REMOVED/RENAMED Requirements"
                    .dim()
            );
            eprintln!(
                "{}",
                "  - Each requirement MUST include at least one #### Scenario: block".dim()
            );
        }
        ItemKind::Spec => {
            eprintln!(
                "{}",
                "  - Ensure the spec includes ## Purpose and ## Requirements sections".dim()
            );
            eprintln!(
                "{}",
                "  - Each requirement MUST include at least one #### Scenario: block".dim()
            );
        }
    }
}

fn print_json(items: &[BulkItem]) {
    use serde_json::json;

    let passed = items.iter().filter(|item| item.report.valid).count();
    let rendered: Vec<_> = items
        .iter()
        .map(|item| {
            json!({
                "id": item.id,
                "type": item.kind.label(),
                "valid": item.report.valid,
                "issues": item.report.issues,
                "summary": item.report.summary,
            })
        })
        .collect();

    let output = json!({
        "items": rendered,
        "summary": {
            "totals": {
                "items": items.len(),
                "passed": passed,
                "failed": items.len() - passed,
            },
        },
        "version": "1.0",
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(error) => eprintln!("failed to render JSON report: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn seed(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const VALID_SPEC: &str = "# api Specification\n\n## Purpose\nDescribes the API surface and its behavioral guarantees.\n\n## Requirements\n### Requirement: Alpha\nThe system SHALL do alpha.\n\n#### Scenario: Basic\n- **WHEN** a\n- **THEN** b\n";

    #[test]
    fn validate_one_spec_reads_from_the_repository_layout() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path(), "specs/api/spec.md", VALID_SPEC);
        let repo = Repository::new(tmp.path().to_path_buf());

        let item = validate_one(&repo, ItemKind::Spec, "api", false);
        assert!(item.report.valid, "unexpected issues: {:?}", item.report.issues);
    }

    #[test]
    fn validate_one_change_flags_missing_deltas() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("changes/c")).unwrap();
        let repo = Repository::new(tmp.path().to_path_buf());

        let item = validate_one(&repo, ItemKind::Change, "c", false);
        assert!(!item.report.valid);
    }

    #[test]
    fn missing_spec_file_is_a_failed_report_not_a_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::new(tmp.path().to_path_buf());

        let item = validate_one(&repo, ItemKind::Spec, "ghost", false);
        assert!(!item.report.valid);
    }
}
