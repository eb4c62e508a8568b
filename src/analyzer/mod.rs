//! Manifest scanning and merging.
//!
//! Each ecosystem analyzer runs its source parsers in a fixed priority
//! order, producing flat [`RawTriple`]s, and reads its lock source into a
//! `normalized name -> version` map. [`merge`] folds both into the sorted
//! [`Package`] list shown to the user.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::models::{DepSource, Package, RawTriple, INSTALLED_ENVIRONMENT};

pub mod go;
pub mod ini;
pub mod node;
pub mod python;
pub mod requirement;
pub mod setup_py;

pub use requirement::{normalize, parse_dep_string};

pub trait Analyzer {
    /// Every declaration found in the project's manifests, in parser priority order.
    fn collect(&self, path: &Path) -> Vec<RawTriple>;

    /// Resolved versions keyed by normalized name.
    fn resolve(&self, path: &Path) -> HashMap<String, String>;

    /// Scan `path` and merge with the pre-fetched `installed` listing.
    fn analyze(&self, path: &Path, installed: &[RawTriple]) -> Vec<Package> {
        let mut raw = self.collect(path);
        raw.extend_from_slice(installed);
        let lock = self.resolve(path);
        merge(raw, &lock)
    }
}

/// Merge raw triples by normalized name.
///
/// The first occurrence of a name fixes the display name and takes its
/// resolved version from `lock`. Identical `(origin, constraint)` pairs are
/// recorded once. A package the lockfile does not know picks up its version
/// from the first `==<version>` installed-environment triple.
pub fn merge(raw: Vec<RawTriple>, lock: &HashMap<String, String>) -> Vec<Package> {
    let mut merged: HashMap<String, Package> = HashMap::new();

    for triple in raw {
        let key = normalize(&triple.name);
        let pkg = merged.entry(key).or_insert_with_key(|key| Package {
            name: triple.name.clone(),
            sources: Vec::new(),
            resolved_version: lock.get(key).cloned().unwrap_or_default(),
        });

        let duplicate = pkg
            .sources
            .iter()
            .any(|s| s.origin == triple.origin && s.constraint == triple.constraint);
        if !duplicate {
            pkg.sources.push(DepSource {
                origin: triple.origin.clone(),
                constraint: triple.constraint.clone(),
            });
        }

        if triple.origin == INSTALLED_ENVIRONMENT && pkg.resolved_version.is_empty() {
            if let Some(version) = triple.constraint.strip_prefix("==") {
                pkg.resolved_version = version.to_string();
            }
        }
    }

    let mut packages: Vec<Package> = merged.into_values().collect();
    packages.sort_by_cached_key(|p| p.name.to_lowercase());
    packages
}

/// Unwrap a parser result, logging and discarding failures.
pub(crate) fn fail_open<T>(path: &Path, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            log::debug!("Skipping {}: {e:#}", path.display());
            Vec::new()
        }
    }
}

/// Same as [`fail_open`] for map-shaped resolver output.
pub(crate) fn fail_open_map(
    path: &Path,
    result: Result<HashMap<String, String>>,
) -> HashMap<String, String> {
    match result {
        Ok(map) => map,
        Err(e) => {
            log::debug!("Ignoring lock data in {}: {e:#}", path.display());
            HashMap::new()
        }
    }
}

/// Read `path` as text, replacing invalid UTF-8 so one bad byte does not
/// hide the rest of the file.
pub(crate) fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Name of the file at `path`, used as an origin label.
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Origin label for a named group inside `file`.
pub fn group_label(file: &str, group: &str) -> String {
    format!("{} [{}]", file, group)
}

/// Split `"<file> [<group>]"` into `(file, Some(group))`.
pub fn split_group_label(origin: &str) -> (&str, Option<&str>) {
    match origin.split_once(" [") {
        Some((file, rest)) => match rest.strip_suffix(']') {
            Some(group) => (file, Some(group.trim())),
            None => (origin, None),
        },
        None => (origin, None),
    }
}
