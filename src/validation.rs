//! Validation reports for specifications and change deltas.
//!
//! Two paths consume these checks: the apply path stops at the first error
//! per document (see [`crate::domain::merge`]), while the reporting path here
//! accumulates every finding into a [`ValidationReport`].

use std::{fmt, path::Path};

use serde::Serialize;

use crate::domain::{
    delta::DeltaPlan,
    normalize_name,
    spec::{Spec, contains_shall_or_must},
    Change,
};

/// Minimum purpose length before a brevity warning is raised.
const MIN_PURPOSE_LENGTH: usize = 50;

/// Minimum why-section length before a brevity warning is raised.
const MIN_WHY_LENGTH: usize = 50;

/// Maximum requirement statement length before an informational note.
const MAX_REQUIREMENT_TEXT_LENGTH: usize = 500;

const GUIDE_MISSING_SPEC_SECTIONS: &str = "Missing required sections. Expected headers: \"## Purpose\" and \"## Requirements\". Example:\n## Purpose\n[brief purpose]\n\n## Requirements\n### Requirement: Clear requirement statement\nUsers SHALL ...\n\n#### Scenario: Descriptive name\n- **WHEN** ...\n- **THEN** ...";

const GUIDE_MISSING_CHANGE_SECTIONS: &str = "Missing required sections. Expected headers: \"## Why\" and \"## What Changes\". Ensure deltas are documented in specs/ using delta headers.";

const GUIDE_NO_DELTAS: &str = "No deltas found. Ensure the change has a specs/ directory with capability folders (e.g. specs/http-server/spec.md) whose files use delta headers (## ADDED/MODIFIED/REMOVED/RENAMED Requirements) and that each requirement includes at least one \"#### Scenario:\" block.";

const GUIDE_SCENARIO_FORMAT: &str = "Scenarios must use level-4 headers:\n#### Scenario: Short name\n- **WHEN** ...\n- **THEN** ...";

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// The document cannot be accepted as-is.
    Error,
    /// Suspicious but acceptable; escalated to a failure in strict mode.
    Warning,
    /// Advisory only.
    Info,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        };
        f.write_str(label)
    }
}

/// A single validation finding with a document-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Finding severity.
    pub level: Level,
    /// Where the finding applies, e.g. `api/spec.md` or `requirements[2]`.
    pub path: String,
    /// Human-readable description, including remediation guidance for
    /// structural errors.
    pub message: String,
}

/// Issue counts by severity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Number of error-level findings.
    pub errors: usize,
    /// Number of warning-level findings.
    pub warnings: usize,
    /// Number of info-level findings.
    pub info: usize,
}

/// The outcome of one validation call.
///
/// Constructed fresh per call and never mutated after return.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Whether the document passed. Errors always fail; in strict mode
    /// warnings fail too.
    pub valid: bool,
    /// Every finding, in discovery order.
    pub issues: Vec<Issue>,
    /// Counts by severity.
    pub summary: Summary,
}

impl ValidationReport {
    fn from_issues(issues: Vec<Issue>, strict: bool) -> Self {
        let summary = Summary {
            errors: issues.iter().filter(|i| i.level == Level::Error).count(),
            warnings: issues.iter().filter(|i| i.level == Level::Warning).count(),
            info: issues.iter().filter(|i| i.level == Level::Info).count(),
        };
        let valid = summary.errors == 0 && (!strict || summary.warnings == 0);
        Self {
            valid,
            issues,
            summary,
        }
    }

    /// The first error-level finding, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&Issue> {
        self.issues.iter().find(|i| i.level == Level::Error)
    }
}

/// Accumulating validator for specifications, proposals, and change deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    strict: bool,
}

impl Validator {
    /// Creates a validator; in strict mode warnings fail the report.
    #[must_use]
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Validates a specification document from disk.
    ///
    /// Read failures are reported as error-level findings rather than
    /// returned as errors, so bulk runs can carry on past a broken item.
    #[must_use]
    pub fn validate_spec_file(&self, name: &str, path: &Path) -> ValidationReport {
        match std::fs::read_to_string(path) {
            Ok(content) => self.validate_spec_content(name, &content),
            Err(error) => ValidationReport::from_issues(
                vec![Issue {
                    level: Level::Error,
                    path: "file".to_string(),
                    message: format!("Failed to read {}: {error}", path.display()),
                }],
                self.strict,
            ),
        }
    }

    /// Validates specification content: structural errors plus
    /// content-quality findings.
    #[must_use]
    pub fn validate_spec_content(&self, name: &str, content: &str) -> ValidationReport {
        let mut issues = Vec::new();

        match Spec::parse(name, content) {
            Ok(spec) => {
                if spec.requirements.is_empty() {
                    issues.push(Issue {
                        level: Level::Error,
                        path: "requirements".to_string(),
                        message: "Spec must have at least one requirement".to_string(),
                    });
                }
                for (index, requirement) in spec.requirements.iter().enumerate() {
                    if requirement.text.is_empty() {
                        issues.push(Issue {
                            level: Level::Error,
                            path: format!("requirements[{index}]"),
                            message: "Requirement text cannot be empty".to_string(),
                        });
                    } else if !requirement.has_normative_wording() {
                        issues.push(Issue {
                            level: Level::Error,
                            path: format!("requirements[{index}]"),
                            message: "Requirement must contain SHALL or MUST keyword".to_string(),
                        });
                    }
                    if requirement.scenarios.is_empty() {
                        issues.push(Issue {
                            level: Level::Error,
                            path: format!("requirements[{index}].scenarios"),
                            message: format!(
                                "Requirement must have at least one scenario. {GUIDE_SCENARIO_FORMAT}"
                            ),
                        });
                    }
                    if requirement.text.len() > MAX_REQUIREMENT_TEXT_LENGTH {
                        issues.push(Issue {
                            level: Level::Info,
                            path: format!("requirements[{index}]"),
                            message: format!(
                                "Requirement text is very long (>{MAX_REQUIREMENT_TEXT_LENGTH} characters). Consider breaking it down."
                            ),
                        });
                    }
                }
                if spec.purpose.len() < MIN_PURPOSE_LENGTH {
                    issues.push(Issue {
                        level: Level::Warning,
                        path: "purpose".to_string(),
                        message: format!(
                            "Purpose section is too brief (less than {MIN_PURPOSE_LENGTH} characters)"
                        ),
                    });
                }
            }
            Err(error) => issues.push(Issue {
                level: Level::Error,
                path: "file".to_string(),
                message: format!("{error}. {GUIDE_MISSING_SPEC_SECTIONS}"),
            }),
        }

        ValidationReport::from_issues(issues, self.strict)
    }

    /// Validates a change proposal document.
    #[must_use]
    pub fn validate_proposal(&self, name: &str, content: &str) -> ValidationReport {
        let mut issues = Vec::new();

        match Change::parse(name, content) {
            Ok(change) => {
                if change.why.len() < MIN_WHY_LENGTH {
                    issues.push(Issue {
                        level: Level::Warning,
                        path: "why".to_string(),
                        message: format!(
                            "Why section is too brief (less than {MIN_WHY_LENGTH} characters)"
                        ),
                    });
                }
            }
            Err(error) => issues.push(Issue {
                level: Level::Error,
                path: "file".to_string(),
                message: format!("{error}. {GUIDE_MISSING_CHANGE_SECTIONS}"),
            }),
        }

        ValidationReport::from_issues(issues, self.strict)
    }

    /// Validates every delta document under a change directory.
    ///
    /// Accumulates all findings across all affected capabilities: duplicate
    /// and conflicting names, missing normative wording or scenarios on
    /// ADDED/MODIFIED entries, sections present but empty, and the
    /// no-operations-at-all case.
    #[must_use]
    pub fn validate_change_dir(&self, change_dir: &Path) -> ValidationReport {
        let mut issues = Vec::new();
        let mut total_deltas = 0usize;
        let mut empty_section_docs: Vec<(String, Vec<&'static str>)> = Vec::new();
        let mut missing_header_docs: Vec<String> = Vec::new();

        for (capability, content) in delta_documents(change_dir) {
            let entry_path = format!("{capability}/spec.md");
            let plan = DeltaPlan::parse(&content);
            total_deltas += plan.operation_count();

            if plan.is_empty() {
                if plan.presence.any() {
                    empty_section_docs.push((entry_path, plan.presence.present_headers()));
                } else {
                    missing_header_docs.push(entry_path);
                }
                continue;
            }

            issues.extend(delta_plan_issues(&entry_path, &plan));
        }

        for (path, headers) in empty_section_docs {
            issues.push(Issue {
                level: Level::Error,
                path,
                message: format!(
                    "Delta sections {} were found, but no requirement entries parsed. Ensure each section includes at least one \"### Requirement:\" block (REMOVED may use bullet list syntax).",
                    join_with_and(&headers)
                ),
            });
        }
        for path in missing_header_docs {
            issues.push(Issue {
                level: Level::Error,
                path,
                message: "No delta sections found. Add headers such as \"## ADDED Requirements\" or move non-delta notes outside specs/.".to_string(),
            });
        }

        if total_deltas == 0 {
            issues.push(Issue {
                level: Level::Error,
                path: "change".to_string(),
                message: format!("Change must have at least one delta. {GUIDE_NO_DELTAS}"),
            });
        }

        ValidationReport::from_issues(issues, self.strict)
    }
}

/// Reads `<change_dir>/specs/<capability>/spec.md` for every capability
/// subdirectory, sorted by capability name.
fn delta_documents(change_dir: &Path) -> Vec<(String, String)> {
    let specs_dir = change_dir.join("specs");
    let Ok(entries) = std::fs::read_dir(&specs_dir) else {
        return Vec::new();
    };

    let mut documents: Vec<(String, String)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let capability = entry.file_name().to_string_lossy().into_owned();
            let content = std::fs::read_to_string(entry.path().join("spec.md")).ok()?;
            Some((capability, content))
        })
        .collect();
    documents.sort_by(|a, b| a.0.cmp(&b.0));
    documents
}

/// All findings for a single parsed delta plan.
fn delta_plan_issues(entry_path: &str, plan: &DeltaPlan) -> Vec<Issue> {
    let mut issues = Vec::new();
    let error = |path: &str, message: String| Issue {
        level: Level::Error,
        path: path.to_string(),
        message,
    };

    let mut added_names: Vec<&str> = Vec::new();
    for block in &plan.added {
        let name = normalize_name(&block.name);
        if added_names.contains(&name) {
            issues.push(error(
                entry_path,
                format!("Duplicate requirement in ADDED: \"{}\"", block.name),
            ));
        } else {
            added_names.push(name);
        }
        issues.extend(block_content_issues(entry_path, "ADDED", block));
    }

    let mut modified_names: Vec<&str> = Vec::new();
    for block in &plan.modified {
        let name = normalize_name(&block.name);
        if modified_names.contains(&name) {
            issues.push(error(
                entry_path,
                format!("Duplicate requirement in MODIFIED: \"{}\"", block.name),
            ));
        } else {
            modified_names.push(name);
        }
        issues.extend(block_content_issues(entry_path, "MODIFIED", block));
    }

    let mut removed_names: Vec<&str> = Vec::new();
    for name in &plan.removed {
        let key = normalize_name(name);
        if removed_names.contains(&key) {
            issues.push(error(
                entry_path,
                format!("Duplicate requirement in REMOVED: \"{name}\""),
            ));
        } else {
            removed_names.push(key);
        }
    }

    let mut renamed_from: Vec<&str> = Vec::new();
    let mut renamed_to: Vec<&str> = Vec::new();
    for rename in &plan.renamed {
        let from = normalize_name(&rename.from);
        let to = normalize_name(&rename.to);
        if renamed_from.contains(&from) {
            issues.push(error(
                entry_path,
                format!("Duplicate FROM in RENAMED: \"{}\"", rename.from),
            ));
        } else {
            renamed_from.push(from);
        }
        if renamed_to.contains(&to) {
            issues.push(error(
                entry_path,
                format!("Duplicate TO in RENAMED: \"{}\"", rename.to),
            ));
        } else {
            renamed_to.push(to);
        }
    }

    for name in &modified_names {
        if removed_names.contains(name) {
            issues.push(error(
                entry_path,
                format!("Requirement present in both MODIFIED and REMOVED: \"{name}\""),
            ));
        }
        if added_names.contains(name) {
            issues.push(error(
                entry_path,
                format!("Requirement present in both MODIFIED and ADDED: \"{name}\""),
            ));
        }
    }
    for name in &added_names {
        if removed_names.contains(name) {
            issues.push(error(
                entry_path,
                format!("Requirement present in both ADDED and REMOVED: \"{name}\""),
            ));
        }
    }
    for rename in &plan.renamed {
        let from = normalize_name(&rename.from);
        let to = normalize_name(&rename.to);
        if modified_names.contains(&from) {
            issues.push(error(
                entry_path,
                format!(
                    "MODIFIED references old name from RENAMED. Use new header for \"{}\"",
                    rename.to
                ),
            ));
        }
        if added_names.contains(&to) {
            issues.push(error(
                entry_path,
                format!("RENAMED TO collides with ADDED for \"{}\"", rename.to),
            ));
        }
    }

    issues
}

/// SHALL/MUST and scenario checks for an ADDED or MODIFIED block.
fn block_content_issues(
    entry_path: &str,
    category: &str,
    block: &crate::domain::RequirementBlock,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    let error = |message: String| Issue {
        level: Level::Error,
        path: entry_path.to_string(),
        message,
    };

    match block.requirement_text() {
        None => issues.push(error(format!(
            "{category} \"{}\" is missing requirement text",
            block.name
        ))),
        Some(text) if !contains_shall_or_must(text) => issues.push(error(format!(
            "{category} \"{}\" must contain SHALL or MUST",
            block.name
        ))),
        Some(_) => {}
    }
    if block.scenario_count() < 1 {
        issues.push(error(format!(
            "{category} \"{}\" must include at least one scenario",
            block.name
        )));
    }

    issues
}

fn join_with_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => (*only).to_string(),
        [head @ .., last] => format!("{} and {last}", head.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_SPEC: &str = "# API Specification\n\n## Purpose\nDescribes the public API surface and its guarantees in detail.\n\n## Requirements\n### Requirement: Rate limiting\nThe service SHALL reject clients exceeding their quota.\n\n#### Scenario: Over quota\n- **WHEN** a client exceeds its quota\n- **THEN** requests are rejected\n";

    #[test]
    fn valid_spec_passes() {
        let report = Validator::new(false).validate_spec_content("api", VALID_SPEC);

        assert!(report.valid, "unexpected issues: {:?}", report.issues);
        assert_eq!(report.summary.errors, 0);
    }

    #[test]
    fn missing_purpose_reports_error_with_guidance() {
        let report = Validator::new(false)
            .validate_spec_content("api", "## Requirements\n### Requirement: A\nbody\n");

        assert!(!report.valid);
        let first = report.first_error().unwrap();
        assert!(first.message.contains("Purpose"));
        assert!(first.message.contains("Expected headers"));
    }

    #[test]
    fn requirement_without_normative_wording_is_an_error() {
        let spec = "## Purpose\nLong enough purpose text to avoid the brevity warning here.\n\n## Requirements\n### Requirement: Weak\nThe system should probably do the thing.\n\n#### Scenario: S\n- step\n";
        let report = Validator::new(false).validate_spec_content("api", spec);

        assert!(!report.valid);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.message.contains("SHALL or MUST"))
        );
    }

    #[test]
    fn requirement_without_scenarios_is_an_error() {
        let spec = "## Purpose\nLong enough purpose text to avoid the brevity warning here.\n\n## Requirements\n### Requirement: Bare\nThe system SHALL work.\n";
        let report = Validator::new(false).validate_spec_content("api", spec);

        assert!(!report.valid);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.path == "requirements[0].scenarios")
        );
    }

    #[test]
    fn brief_purpose_warns_and_strict_mode_escalates() {
        let spec = "## Purpose\nShort.\n\n## Requirements\n### Requirement: A\nThe system SHALL a.\n\n#### Scenario: S\n- step\n";

        let lenient = Validator::new(false).validate_spec_content("api", spec);
        assert!(lenient.valid);
        assert_eq!(lenient.summary.warnings, 1);

        let strict = Validator::new(true).validate_spec_content("api", spec);
        assert!(!strict.valid);
    }

    #[test]
    fn overlong_requirement_text_is_informational() {
        let long_text = format!("The system SHALL {}.", "x".repeat(600));
        let spec = format!(
            "## Purpose\nLong enough purpose text to avoid the brevity warning here.\n\n## Requirements\n### Requirement: A\n{long_text}\n\n#### Scenario: S\n- step\n"
        );
        let report = Validator::new(false).validate_spec_content("api", &spec);

        assert!(report.valid);
        assert_eq!(report.summary.info, 1);
    }

    #[test]
    fn proposal_missing_why_is_an_error() {
        let report = Validator::new(false).validate_proposal("c", "## What Changes\nstuff\n");

        assert!(!report.valid);
        assert!(
            report
                .first_error()
                .unwrap()
                .message
                .contains("Why section")
        );
    }

    mod change_dir {
        use std::path::PathBuf;

        use super::*;

        fn write_delta(root: &Path, capability: &str, content: &str) -> PathBuf {
            let dir = root.join("specs").join(capability);
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("spec.md");
            std::fs::write(&path, content).unwrap();
            path
        }

        #[test]
        fn change_without_specs_dir_reports_no_deltas() {
            let tmp = tempfile::tempdir().unwrap();
            let report = Validator::new(false).validate_change_dir(tmp.path());

            assert!(!report.valid);
            assert!(
                report
                    .first_error()
                    .unwrap()
                    .message
                    .contains("at least one delta")
            );
        }

        #[test]
        fn empty_sections_are_distinct_from_missing_headers() {
            let tmp = tempfile::tempdir().unwrap();
            write_delta(tmp.path(), "api", "## ADDED Requirements\n\nnothing parsed\n");
            write_delta(tmp.path(), "cli", "free-form notes, no headers\n");

            let report = Validator::new(false).validate_change_dir(tmp.path());

            assert!(!report.valid);
            assert!(report.issues.iter().any(|i| {
                i.path == "api/spec.md" && i.message.contains("no requirement entries parsed")
            }));
            assert!(
                report
                    .issues
                    .iter()
                    .any(|i| i.path == "cli/spec.md" && i.message.contains("No delta sections"))
            );
        }

        #[test]
        fn duplicate_and_conflicting_names_are_all_reported() {
            let tmp = tempfile::tempdir().unwrap();
            write_delta(
                tmp.path(),
                "api",
                "## ADDED Requirements\n### Requirement: A\nThe system SHALL a.\n\n#### Scenario: S\n- step\n\n### Requirement: A\nThe system SHALL a again.\n\n#### Scenario: S\n- step\n\n## REMOVED Requirements\n### Requirement: A\n",
            );

            let report = Validator::new(false).validate_change_dir(tmp.path());

            assert!(!report.valid);
            assert!(
                report
                    .issues
                    .iter()
                    .any(|i| i.message.contains("Duplicate requirement in ADDED"))
            );
            assert!(
                report
                    .issues
                    .iter()
                    .any(|i| i.message.contains("both ADDED and REMOVED"))
            );
        }

        #[test]
        fn added_block_without_scenario_is_reported() {
            let tmp = tempfile::tempdir().unwrap();
            write_delta(
                tmp.path(),
                "api",
                "## ADDED Requirements\n### Requirement: A\nThe system SHALL a.\n",
            );

            let report = Validator::new(false).validate_change_dir(tmp.path());

            assert!(!report.valid);
            assert!(
                report
                    .issues
                    .iter()
                    .any(|i| i.message.contains("at least one scenario"))
            );
        }

        #[test]
        fn valid_delta_documents_pass() {
            let tmp = tempfile::tempdir().unwrap();
            write_delta(
                tmp.path(),
                "api",
                "## ADDED Requirements\n### Requirement: A\nThe system SHALL a.\n\n#### Scenario: S\n- step\n",
            );
            write_delta(tmp.path(), "cli", "## REMOVED Requirements\n### Requirement: Old\n");

            let report = Validator::new(false).validate_change_dir(tmp.path());

            assert!(report.valid, "unexpected issues: {:?}", report.issues);
        }
    }
}
