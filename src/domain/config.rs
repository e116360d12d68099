//! Tool configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default worker count for bulk validation.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Configuration for specification change management.
///
/// Loaded from `.specdelta/config.toml` under the repository root when
/// present; every field has a default so the file is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Worker count for bulk validation runs.
    ///
    /// Overridable per invocation with `--concurrency` or the
    /// `SPECDELTA_CONCURRENCY` environment variable.
    concurrency: usize,

    /// Whether validation warnings are escalated to failures.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            strict: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Returns the configured worker count, falling back to the default when
    /// set to zero.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        }
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the
/// domain type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_concurrency")]
        concurrency: usize,

        #[serde(default)]
        strict: bool,
    },
}

const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                concurrency,
                strict,
            } => Self {
                concurrency,
                strict,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            concurrency: config.concurrency,
            strict: config.strict,
        }
    }
}
