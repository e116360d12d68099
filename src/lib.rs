//! Plain-text Specification Change Management
//!
//! Specifications are markdown documents stored per capability. Changes
//! describe deltas against them (added, modified, removed, and renamed
//! requirement blocks) which are validated and applied atomically across
//! every affected document.

pub mod domain;
pub use domain::{
    Change, Config, DeltaPlan, MergeError, RequirementBlock, RequirementsRegion, Spec,
};

/// Filesystem storage and commit orchestration for specification
/// repositories.
pub mod storage;
pub use storage::{CommitError, CommitOptions, CommitReport, Repository, apply_change};

/// Accumulating validation of specifications and change deltas.
pub mod validation;
pub use validation::{ValidationReport, Validator};
