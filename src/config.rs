//! Weave repository configuration (`.weave.toml`).
//!
//! Defines the typed configuration read from the repository root: merge
//! behaviour, project roots, and pattern-based model groups.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Configuration file name, looked up at the repository root.
pub const CONFIG_FILE: &str = ".weave.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level weave configuration.
///
/// Parsed from `.weave.toml`. Missing fields use sensible defaults.
/// Missing file → all defaults (no error).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[derive(Default)]
pub struct WeaveConfig {
    /// Merge behaviour settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Project layout settings.
    #[serde(default)]
    pub projects: ProjectsConfig,

    /// Pattern-based logical model groups.
    #[serde(default)]
    pub models: ModelsConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge behaviour settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Whether logical-model awareness is enabled at all (default: `true`).
    ///
    /// When disabled, every file merges individually.
    #[serde(default = "default_model_aware")]
    pub model_aware: bool,

    /// Additional model provider ids to exclude, beyond the built-in
    /// denylist.
    #[serde(default)]
    pub denied_providers: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            model_aware: default_model_aware(),
            denied_providers: Vec::new(),
        }
    }
}

const fn default_model_aware() -> bool {
    true
}

// ---------------------------------------------------------------------------
// ProjectsConfig
// ---------------------------------------------------------------------------

/// Project layout settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectsConfig {
    /// Repository-relative project root prefixes (default: `["."]`,
    /// mapping the whole repository into one project).
    ///
    /// Paths outside every root belong to no project and are exempt from
    /// model discovery.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
        }
    }
}

fn default_roots() -> Vec<String> {
    vec![".".to_owned()]
}

// ---------------------------------------------------------------------------
// ModelsConfig
// ---------------------------------------------------------------------------

/// Pattern-based logical model groups.
///
/// ```toml
/// [[models.groups]]
/// name = "diagram"
/// patterns = ["*.dia", "*.dia.layout", "*.dia.notation"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Groups of glob patterns; files whose names match patterns of one
    /// group with the same stem form one logical model.
    #[serde(default)]
    pub groups: Vec<ModelGroup>,
}

/// One named group of sibling patterns.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelGroup {
    /// Group name, used in provider ids and logs.
    pub name: String,
    /// Glob patterns naming the group's sibling files.
    pub patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a weave configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl WeaveConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse
    /// errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                // Calculate line number from byte offset.
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
