//! Repository layout and item discovery.
//!
//! A specification repository keeps one document per capability under
//! `specs/<capability>/spec.md`. Pending changes live under
//! `changes/<change-id>/` with a `proposal.md` and per-capability delta
//! documents in `specs/`; applied changes are moved to `changes/archive/`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::Config;

/// Directory name for base specification documents.
pub const SPECS_DIR: &str = "specs";

/// Directory name for pending changes.
pub const CHANGES_DIR: &str = "changes";

/// Directory name, under [`CHANGES_DIR`], for applied changes.
pub const ARCHIVE_DIR: &str = "archive";

/// The specification document filename used for bases and deltas alike.
pub const SPEC_FILE: &str = "spec.md";

/// A specification repository rooted at a directory.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    /// Opens a repository at the given root. No filesystem access happens
    /// until items are listed or read.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads `.specdelta/config.toml`, falling back to defaults when the file
    /// is absent or unreadable.
    #[must_use]
    pub fn config(&self) -> Config {
        let path = self.root.join(".specdelta").join("config.toml");
        if path.exists() {
            Config::load(&path).unwrap_or_else(|error| {
                tracing::warn!("{error}; using default configuration");
                Config::default()
            })
        } else {
            Config::default()
        }
    }

    /// Path of a capability's base specification document.
    #[must_use]
    pub fn spec_path(&self, capability: &str) -> PathBuf {
        self.root.join(SPECS_DIR).join(capability).join(SPEC_FILE)
    }

    /// Path of a pending change directory.
    #[must_use]
    pub fn change_dir(&self, change: &str) -> PathBuf {
        self.root.join(CHANGES_DIR).join(change)
    }

    /// Path of a change's proposal document.
    #[must_use]
    pub fn proposal_path(&self, change: &str) -> PathBuf {
        self.change_dir(change).join("proposal.md")
    }

    /// Path of a change's delta document for one capability.
    #[must_use]
    pub fn change_spec_path(&self, change: &str, capability: &str) -> PathBuf {
        self.change_dir(change)
            .join(SPECS_DIR)
            .join(capability)
            .join(SPEC_FILE)
    }

    /// The archive directory for applied changes.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(CHANGES_DIR).join(ARCHIVE_DIR)
    }

    /// Capability identifiers with a base specification document, sorted.
    #[must_use]
    pub fn capability_ids(&self) -> Vec<String> {
        subdirectories_with(&self.root.join(SPECS_DIR), SPEC_FILE, &[])
    }

    /// Pending change identifiers, sorted, excluding the archive.
    #[must_use]
    pub fn change_ids(&self) -> Vec<String> {
        subdirectories_with(&self.root.join(CHANGES_DIR), "", &[ARCHIVE_DIR])
    }

    /// Capabilities a change's delta documents touch, sorted.
    #[must_use]
    pub fn change_capabilities(&self, change: &str) -> Vec<String> {
        subdirectories_with(&self.change_dir(change).join(SPECS_DIR), SPEC_FILE, &[])
    }
}

/// Immediate subdirectories of `parent`, optionally requiring a file inside
/// each and excluding the given names. Sorted by name.
fn subdirectories_with(parent: &Path, required_file: &str, exclude: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !exclude.contains(&name.as_str()))
        .filter(|name| required_file.is_empty() || parent.join(name).join(required_file).is_file())
        .collect();
    names.sort();
    names
}
