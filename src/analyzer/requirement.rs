//! Package identity and the `name[extras]<constraints>` dependency-string grammar.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::UNCONSTRAINED;

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").expect("valid regex"));

static DEP_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)",
        r"(?:\[.*?\])?",
        r"\s*(?P<spec>(?:[><=!~]+\s*[A-Za-z0-9.*+!_-]+\s*,?\s*)*)",
    ))
    .expect("valid regex")
});

/// Canonical comparison key: lowercase, every run of `-`, `_`, `.` collapsed to `-`.
pub fn normalize(name: &str) -> String {
    SEPARATOR_RUN.replace_all(name, "-").to_lowercase()
}

/// Split a dependency string into `(name, constraint)`.
///
/// Extras are dropped, a comma-separated constraint run is kept verbatim,
/// and a bare name yields `"*"`. Markers after `;` and trailing comments are
/// ignored because the constraint run stops at the first token it cannot
/// match.
pub fn parse_dep_string(raw: &str) -> Option<(String, String)> {
    let caps = DEP_STRING.captures(raw)?;
    let name = caps.name("name")?.as_str().to_string();
    let spec = caps
        .name("spec")
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNCONSTRAINED)
        .to_string();
    Some((name, spec))
}
