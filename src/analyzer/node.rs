use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use super::{fail_open, fail_open_map, group_label, normalize};
use crate::models::{RawTriple, INSTALLED_ENVIRONMENT, UNCONSTRAINED};

pub const PACKAGE_JSON: &str = "package.json";
pub const PACKAGE_LOCK: &str = "package-lock.json";

/// `package.json` objects that hold name → range maps. The first one is the
/// primary group and gets no `[group]` suffix.
pub const DEPENDENCY_GROUPS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Analyzer for JavaScript projects: `package.json` declarations resolved
/// against `package-lock.json`.
pub struct NodeAnalyzer;

impl NodeAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for NodeAnalyzer {
    fn collect(&self, path: &Path) -> Vec<RawTriple> {
        parse_package_json(&path.join(PACKAGE_JSON))
    }

    fn resolve(&self, path: &Path) -> HashMap<String, String> {
        parse_package_lock_json(&path.join(PACKAGE_LOCK))
    }
}

/// Parse the dependency groups of `package.json`.
pub fn parse_package_json(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_package_json(path))
}

fn try_parse_package_json(path: &Path) -> Result<Vec<RawTriple>> {
    let content = std::fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&content)?;
    let mut raw = Vec::new();

    for (i, section) in DEPENDENCY_GROUPS.iter().enumerate() {
        let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) else {
            continue;
        };
        let origin = if i == 0 {
            PACKAGE_JSON.to_string()
        } else {
            group_label(PACKAGE_JSON, section)
        };
        for (name, range) in pkgs {
            let constraint = range.as_str().unwrap_or(UNCONSTRAINED);
            raw.push(RawTriple::new(name.as_str(), constraint, origin.as_str()));
        }
    }

    Ok(raw)
}

/// Parse `package-lock.json` into `{normalized_name: version}`.
///
/// Lockfile v2/v3 keys packages by install path (`node_modules/a/node_modules/b`);
/// the hoisted `node_modules/<name>` record wins over nested copies. v1
/// lockfiles carry a flat `dependencies` map instead.
pub fn parse_package_lock_json(path: &Path) -> HashMap<String, String> {
    if !path.is_file() {
        return HashMap::new();
    }
    fail_open_map(path, try_parse_package_lock_json(path))
}

fn try_parse_package_lock_json(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&content)?;
    let mut resolved = HashMap::new();

    if let Some(packages) = json.get("packages").and_then(|v| v.as_object()) {
        for (pkg_path, info) in packages {
            // Root entry (empty key) is the project itself.
            if pkg_path.is_empty() {
                continue;
            }
            let Some(version) = info.get("version").and_then(|v| v.as_str()) else {
                continue;
            };
            // "node_modules/@scope/foo" → "@scope/foo"
            let Some((_, name)) = pkg_path.rsplit_once("node_modules/") else {
                continue;
            };
            let hoisted = pkg_path == &format!("node_modules/{}", name);
            let key = normalize(name);
            if hoisted || !resolved.contains_key(&key) {
                resolved.insert(key, version.to_string());
            }
        }
    } else if let Some(deps) = json.get("dependencies").and_then(|v| v.as_object()) {
        for (name, info) in deps {
            if let Some(version) = info.get("version").and_then(|v| v.as_str()) {
                resolved.insert(normalize(name), version.to_string());
            }
        }
    }

    Ok(resolved)
}

/// Turn `npm ls --json --depth=0` output into installed-environment triples.
pub fn parse_npm_ls_json(output: &str) -> Vec<RawTriple> {
    let json: Value = match serde_json::from_str(output) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("Unreadable npm ls output: {e}");
            return Vec::new();
        }
    };
    let Some(deps) = json.get("dependencies").and_then(|v| v.as_object()) else {
        return Vec::new();
    };
    deps.iter()
        .filter_map(|(name, info)| {
            let version = info.get("version").and_then(|v| v.as_str())?;
            Some(RawTriple::new(
                name.as_str(),
                format!("=={}", version),
                INSTALLED_ENVIRONMENT,
            ))
        })
        .collect()
}
