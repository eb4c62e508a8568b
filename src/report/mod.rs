//! Renderers for scan results.
//!
//! - [`terminal`]: colored tables for packages, search hits, metadata and environment info.
//! - [`to_json`]: the package list with latest versions, for scripting.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use crate::models::Package;

pub mod terminal;

/// Latest registry version per display name, as returned by `fetch_latest_versions`.
pub type LatestVersions = HashMap<String, Option<String>>;

#[derive(Serialize)]
struct ListedPackage<'a> {
    #[serde(flatten)]
    package: &'a Package,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest_version: Option<&'a str>,
    outdated: bool,
}

/// `true` when a resolved version is known and differs from the registry's latest.
pub fn is_outdated(package: &Package, latest: Option<&LatestVersions>) -> bool {
    latest_for(package, latest)
        .is_some_and(|l| !package.resolved_version.is_empty() && l != package.resolved_version)
}

fn latest_for<'a>(package: &Package, latest: Option<&'a LatestVersions>) -> Option<&'a str> {
    latest?.get(&package.name)?.as_deref()
}

/// Distinct origins across all packages, in first-seen order.
pub fn origins(packages: &[Package]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for source in packages.iter().flat_map(|p| &p.sources) {
        if !seen.contains(&source.origin.as_str()) {
            seen.push(&source.origin);
        }
    }
    seen
}

pub fn to_json(packages: &[Package], latest: Option<&LatestVersions>) -> Result<String> {
    let listed: Vec<ListedPackage> = packages
        .iter()
        .map(|package| ListedPackage {
            package,
            latest_version: latest_for(package, latest),
            outdated: is_outdated(package, latest),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&listed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DepSource;

    fn package(name: &str, resolved: &str, origins: &[&str]) -> Package {
        Package {
            name: name.to_string(),
            sources: origins
                .iter()
                .map(|o| DepSource {
                    origin: o.to_string(),
                    constraint: "*".to_string(),
                })
                .collect(),
            resolved_version: resolved.to_string(),
        }
    }

    #[test]
    fn test_is_outdated() {
        let mut latest = LatestVersions::new();
        latest.insert("flask".to_string(), Some("3.0.3".to_string()));
        latest.insert("rich".to_string(), None);

        assert!(is_outdated(&package("flask", "2.3.0", &[]), Some(&latest)));
        assert!(!is_outdated(&package("flask", "3.0.3", &[]), Some(&latest)));
        assert!(!is_outdated(&package("flask", "", &[]), Some(&latest)));
        assert!(!is_outdated(&package("rich", "13.0", &[]), Some(&latest)));
        assert!(!is_outdated(&package("flask", "2.3.0", &[]), None));
    }

    #[test]
    fn test_origins_first_seen_order() {
        let packages = vec![
            package("a", "", &["pyproject.toml", "requirements.txt"]),
            package("b", "", &["requirements.txt", "setup.cfg"]),
        ];
        assert_eq!(
            origins(&packages),
            vec!["pyproject.toml", "requirements.txt", "setup.cfg"]
        );
    }

    #[test]
    fn test_json_flattens_package() {
        let mut latest = LatestVersions::new();
        latest.insert("flask".to_string(), Some("3.0.3".to_string()));
        let json = to_json(&[package("flask", "2.3.0", &["Pipfile"])], Some(&latest)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "flask");
        assert_eq!(value[0]["sources"][0]["origin"], "Pipfile");
        assert_eq!(value[0]["latest_version"], "3.0.3");
        assert_eq!(value[0]["outdated"], true);
    }
}
