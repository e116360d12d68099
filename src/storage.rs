//! Filesystem layout and atomic commits for specification repositories.

pub mod commit;
pub mod repository;

pub use commit::{CommitError, CommitOptions, CommitReport, DocumentCounts, apply_change};
pub use repository::Repository;
