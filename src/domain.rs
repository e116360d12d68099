//! Core document model: section trees, requirement blocks, delta plans, and
//! the merge that applies a plan to a base specification.

pub mod block;
pub mod change;
pub mod config;
pub mod delta;
pub mod merge;
pub mod section;
pub mod spec;

pub use block::{RequirementBlock, RequirementsRegion, normalize_name};
pub use change::{Change, ChangeError};
pub use config::{Config, DEFAULT_CONCURRENCY};
pub use delta::{DeltaPlan, Rename, SectionPresence};
pub use merge::{MergeError, apply_plan, check_plan, recompose};
pub use section::{Section, find_section, parse_sections};
pub use spec::{Spec, SpecError};
