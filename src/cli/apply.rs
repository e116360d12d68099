use std::path::PathBuf;

use clap::Parser;
use specdelta::{CommitOptions, Repository, apply_change, validation::Level};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Apply a change's deltas to its target specifications")]
pub struct Apply {
    /// The change to apply
    change: String,

    /// Skip delta and rebuilt-spec validation
    #[arg(long)]
    no_validate: bool,

    /// Leave the change directory in place instead of archiving it
    #[arg(long)]
    skip_archive: bool,

    /// Build and validate every document without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output a machine-readable JSON report
    #[arg(long)]
    json: bool,
}

impl Apply {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let repo = Repository::new(root);

        if !self.no_validate {
            self.check_proposal(&repo);
            self.check_deltas(&repo)?;
        } else {
            tracing::warn!(change = %self.change, "validation skipped");
        }

        let options = CommitOptions {
            validate: !self.no_validate,
            archive: !self.skip_archive,
            dry_run: self.dry_run,
        };
        let report = apply_change(&repo, &self.change, &options)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        for document in &report.documents {
            println!(
                "Applying changes to specs/{}/spec.md:",
                document.capability
            );
            let counts = &document.counts;
            if counts.added > 0 {
                println!("  + {} added", counts.added);
            }
            if counts.modified > 0 {
                println!("  ~ {} modified", counts.modified);
            }
            if counts.removed > 0 {
                println!("  - {} removed", counts.removed);
            }
            if counts.renamed > 0 {
                println!("  → {} renamed", counts.renamed);
            }
        }
        println!(
            "Totals: + {}, ~ {}, - {}, → {}",
            report.totals.added, report.totals.modified, report.totals.removed, report.totals.renamed
        );

        if self.dry_run {
            println!("{}", "Dry run: no files were changed.".dim());
        } else if let Some(archived) = &report.archived_to {
            println!(
                "{}",
                format!(
                    "Change '{}' applied and archived to {}",
                    self.change,
                    archived.display()
                )
                .success()
            );
        } else {
            println!(
                "{}",
                format!("Change '{}' applied successfully.", self.change).success()
            );
        }

        Ok(())
    }

    /// Proposal findings are informative only and never block the commit.
    fn check_proposal(&self, repo: &Repository) {
        let Ok(content) = std::fs::read_to_string(repo.proposal_path(&self.change)) else {
            return;
        };
        let report =
            specdelta::Validator::new(false).validate_proposal(&self.change, &content);
        if report.issues.is_empty() {
            return;
        }
        eprintln!(
            "{}",
            "Proposal findings in proposal.md (non-blocking):".warning()
        );
        for issue in &report.issues {
            eprintln!("{}", format!("  [{}] {}", issue.level, issue.message).warning());
        }
    }

    fn check_deltas(&self, repo: &Repository) -> anyhow::Result<()> {
        let report =
            specdelta::Validator::new(false).validate_change_dir(&repo.change_dir(&self.change));
        if report.valid {
            return Ok(());
        }

        eprintln!("{}", "Validation errors in change delta specs:".error());
        for issue in &report.issues {
            match issue.level {
                Level::Error => {
                    eprintln!("{}", format!("  ✗ {}: {}", issue.path, issue.message).error());
                }
                Level::Warning => eprintln!(
                    "{}",
                    format!("  ⚠ {}: {}", issue.path, issue.message).warning()
                ),
                Level::Info => {}
            }
        }
        eprintln!(
            "{}",
            "To skip validation (not recommended), use --no-validate.".dim()
        );
        anyhow::bail!("validation failed for change '{}'", self.change)
    }
}
