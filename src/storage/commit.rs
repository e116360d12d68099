//! Atomic multi-document commits.
//!
//! A change touching N capabilities is applied by building and validating
//! every rebuilt document in memory first, then writing them all in a tight
//! loop. Any failure during the build phase aborts the whole commit with no
//! writes. Individual writes replace whole files via a tempfile rename in the
//! target directory, so a crash mid-write never leaves a truncated document.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{
    domain::{
        DeltaPlan, MergeError, RequirementsRegion, apply_plan, check_plan, merge::recompose,
    },
    storage::Repository,
    validation::Validator,
};

/// Operation counts for one document or a whole change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Requirements inserted.
    pub added: usize,
    /// Requirements replaced.
    pub modified: usize,
    /// Requirements deleted.
    pub removed: usize,
    /// Requirements renamed.
    pub renamed: usize,
}

impl Counts {
    fn accumulate(&mut self, other: Self) {
        self.added += other.added;
        self.modified += other.modified;
        self.removed += other.removed;
        self.renamed += other.renamed;
    }

    fn of(plan: &DeltaPlan) -> Self {
        Self {
            added: plan.added.len(),
            modified: plan.modified.len(),
            removed: plan.removed.len(),
            renamed: plan.renamed.len(),
        }
    }
}

/// Per-document operation counts in a commit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    /// The capability whose document was rebuilt.
    pub capability: String,
    /// Operations applied to it.
    #[serde(flatten)]
    pub counts: Counts,
}

/// The outcome of a successful (or dry-run) commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    /// The change that was applied.
    pub change: String,
    /// Per-document operation counts, in capability order.
    pub documents: Vec<DocumentCounts>,
    /// Cross-document totals.
    pub totals: Counts,
    /// Where the change directory was archived, when archiving ran.
    pub archived_to: Option<PathBuf>,
}

/// Commit behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct CommitOptions {
    /// Re-validate every rebuilt document before writing.
    pub validate: bool,
    /// Move the change directory into the archive after a successful commit.
    pub archive: bool,
    /// Build and validate everything but write nothing.
    pub dry_run: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            validate: true,
            archive: true,
            dry_run: false,
        }
    }
}

/// Failures that abort a commit. Any error raised during the build phase
/// means no document was written.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The named change directory does not exist.
    #[error("change '{0}' not found")]
    ChangeNotFound(String),

    /// The change has no delta documents under `specs/`.
    #[error("change '{0}' has no delta documents under specs/")]
    NoDeltaDocuments(String),

    /// A document could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The unreadable path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A delta failed consistency checks or could not be merged.
    #[error("{capability}: {source}")]
    Document {
        /// The capability whose delta failed.
        capability: String,
        /// The underlying merge error.
        source: MergeError,
    },

    /// The base document is absent and the delta is not purely additive.
    #[error(
        "{capability}: target spec does not exist; only ADDED requirements are allowed for new specs"
    )]
    NewSpecRequiresAdded {
        /// The capability lacking a base document.
        capability: String,
    },

    /// The rebuilt document no longer parses as a valid specification.
    #[error("rebuilt spec for '{capability}' failed validation: {message}")]
    RebuiltInvalid {
        /// The capability whose rebuilt document failed.
        capability: String,
        /// The first validation error.
        message: String,
    },

    /// The archive destination already exists.
    #[error("archive '{0}' already exists")]
    ArchiveExists(String),

    /// A write or rename failed after the build phase.
    #[error(transparent)]
    Io(#[from] io::Error),
}

struct PreparedDocument {
    capability: String,
    path: PathBuf,
    rebuilt: String,
    counts: Counts,
}

/// Applies a change to every capability it touches, all-or-nothing.
///
/// The build phase parses each delta, checks it for conflicts, merges it
/// against its base document, and re-validates the rebuilt text, entirely in
/// memory. Only when every document has passed does the write phase replace
/// the files on disk and, unless disabled, archive the change directory under
/// a date-prefixed name.
///
/// # Errors
///
/// Returns the first failure encountered during the build phase (in which
/// case nothing was written) or an I/O error from the write phase.
pub fn apply_change(
    repo: &Repository,
    change: &str,
    options: &CommitOptions,
) -> Result<CommitReport, CommitError> {
    let change_dir = repo.change_dir(change);
    if !change_dir.is_dir() {
        return Err(CommitError::ChangeNotFound(change.to_string()));
    }

    let capabilities = repo.change_capabilities(change);
    if capabilities.is_empty() {
        return Err(CommitError::NoDeltaDocuments(change.to_string()));
    }

    let archive_target = options.archive.then(|| {
        let stamp = chrono::Local::now().format("%Y-%m-%d");
        repo.archive_dir().join(format!("{stamp}-{change}"))
    });
    if let Some(target) = &archive_target {
        if target.exists() && !options.dry_run {
            let name = target
                .file_name()
                .map_or_else(|| change.to_string(), |n| n.to_string_lossy().into_owned());
            return Err(CommitError::ArchiveExists(name));
        }
    }

    let mut prepared = Vec::with_capacity(capabilities.len());
    let mut totals = Counts::default();
    for capability in &capabilities {
        let document = build_document(repo, change, capability, options)?;
        totals.accumulate(document.counts);
        prepared.push(document);
    }

    let documents = prepared
        .iter()
        .map(|document| DocumentCounts {
            capability: document.capability.clone(),
            counts: document.counts,
        })
        .collect();

    if options.dry_run {
        return Ok(CommitReport {
            change: change.to_string(),
            documents,
            totals,
            archived_to: None,
        });
    }

    for document in &prepared {
        tracing::info!(capability = %document.capability, "writing rebuilt spec");
        atomic_write(&document.path, document.rebuilt.as_bytes())?;
    }

    let archived_to = match archive_target {
        Some(target) => {
            std::fs::create_dir_all(repo.archive_dir())?;
            std::fs::rename(&change_dir, &target)?;
            Some(target)
        }
        None => None,
    };

    Ok(CommitReport {
        change: change.to_string(),
        documents,
        totals,
        archived_to,
    })
}

/// Builds and validates one capability's rebuilt document in memory.
fn build_document(
    repo: &Repository,
    change: &str,
    capability: &str,
    options: &CommitOptions,
) -> Result<PreparedDocument, CommitError> {
    let delta_path = repo.change_spec_path(change, capability);
    let delta_text = read(&delta_path)?;
    let plan = DeltaPlan::parse(&delta_text);
    check_plan(&plan).map_err(|source| CommitError::Document {
        capability: capability.to_string(),
        source,
    })?;

    let spec_path = repo.spec_path(capability);
    let base = match std::fs::read_to_string(&spec_path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            if !plan.modified.is_empty() || !plan.removed.is_empty() || !plan.renamed.is_empty() {
                return Err(CommitError::NewSpecRequiresAdded {
                    capability: capability.to_string(),
                });
            }
            spec_skeleton(capability, change)
        }
        Err(source) => {
            return Err(CommitError::Read {
                path: spec_path,
                source,
            });
        }
    };

    let region = RequirementsRegion::parse(&base);
    let blocks = apply_plan(&region, &plan).map_err(|source| CommitError::Document {
        capability: capability.to_string(),
        source,
    })?;
    let rebuilt = recompose(&region, &blocks);

    if options.validate {
        let report = Validator::new(false).validate_spec_content(capability, &rebuilt);
        if !report.valid {
            let message = report
                .first_error()
                .map_or_else(|| "validation failed".to_string(), |i| i.message.clone());
            return Err(CommitError::RebuiltInvalid {
                capability: capability.to_string(),
                message,
            });
        }
    }

    Ok(PreparedDocument {
        capability: capability.to_string(),
        path: spec_path,
        rebuilt,
        counts: Counts::of(&plan),
    })
}

fn read(path: &Path) -> Result<String, CommitError> {
    std::fs::read_to_string(path).map_err(|source| CommitError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Whole-file replace via a tempfile in the target directory.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn spec_skeleton(capability: &str, change: &str) -> String {
    format!(
        "# {capability} Specification\n\n## Purpose\nTBD - created by applying change {change}. Update Purpose after commit.\n\n## Requirements\n"
    )
}
