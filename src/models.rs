use serde::{Deserialize, Serialize};

/// Origin label for packages reported by the live environment listing.
pub const INSTALLED_ENVIRONMENT: &str = "installed-environment";

/// Constraint recorded for a dependency declared without a version operator.
pub const UNCONSTRAINED: &str = "*";

/// One place a dependency was declared or found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepSource {
    /// File (optionally with a `[group]` suffix) or logical location.
    pub origin: String,
    /// Raw constraint as written, `"*"` when none was given.
    pub constraint: String,
}

/// A dependency aggregated across every discovered source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Display name as first encountered.
    pub name: String,
    pub sources: Vec<DepSource>,
    /// Version pinned by the lockfile or the installed environment; empty if unknown.
    pub resolved_version: String,
}

impl Package {
    pub fn constraint_summary(&self) -> String {
        let mut seen: Vec<&str> = Vec::new();
        for source in &self.sources {
            if !seen.contains(&source.constraint.as_str()) {
                seen.push(&source.constraint);
            }
        }
        seen.join(" | ")
    }

    pub fn has_origin(&self, origin: &str) -> bool {
        self.sources.iter().any(|s| s.origin == origin)
    }
}

/// `(name, constraint, origin)` as produced by a source parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTriple {
    pub name: String,
    pub constraint: String,
    pub origin: String,
}

impl RawTriple {
    pub fn new(
        name: impl Into<String>,
        constraint: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            origin: origin.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Python,
    JavaScript,
    Go,
}

impl Ecosystem {
    /// Every supported ecosystem in detection priority order.
    pub const ALL: [Ecosystem; 3] = [Ecosystem::Python, Ecosystem::JavaScript, Ecosystem::Go];
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ecosystem::Python => write!(f, "Python"),
            Ecosystem::JavaScript => write!(f, "JavaScript"),
            Ecosystem::Go => write!(f, "Go"),
        }
    }
}

/// Toolchain and environment facts shown by `depdeck env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub language_name: String,
    pub language_version: String,
    pub tool_name: String,
    pub tool_version: String,
    pub env_label: String,
    pub env_exists: bool,
}

/// Search hit or metadata summary from a package registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPackageInfo {
    pub name: String,
    pub latest_version: String,
    pub description: String,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub author: Option<String>,
    pub requires: Option<String>,
}

/// Result of checking a package (and optional version) against its registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub error: Option<String>,
    /// Latest published version, when the registry knows the package.
    pub resolved_version: Option<String>,
}

impl Validation {
    pub fn ok(latest: Option<String>) -> Self {
        Self {
            valid: true,
            error: None,
            resolved_version: latest,
        }
    }

    pub fn invalid(error: impl Into<String>, latest: Option<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            resolved_version: latest,
        }
    }
}
