use std::path::Path;

use crate::analyzer::go::GO_MOD;
use crate::analyzer::node::PACKAGE_JSON;
use crate::analyzer::python::{requirement_files, PIPFILE, PYPROJECT, SETUP_CFG, SETUP_PY};
use crate::models::Ecosystem;

/// Whether `path` contains a manifest this ecosystem can read.
pub fn has_manifest(ecosystem: Ecosystem, path: &Path) -> bool {
    match ecosystem {
        Ecosystem::Python => {
            [PYPROJECT, SETUP_PY, SETUP_CFG, PIPFILE]
                .iter()
                .any(|f| path.join(f).exists())
                || !requirement_files(path).is_empty()
        }
        Ecosystem::JavaScript => path.join(PACKAGE_JSON).exists(),
        Ecosystem::Go => path.join(GO_MOD).exists(),
    }
}

/// Auto-detect supported ecosystems by scanning for known manifest files,
/// in priority order, skipping `excluded` ones.
pub fn detect_ecosystems(path: &Path, excluded: &[Ecosystem]) -> Vec<Ecosystem> {
    Ecosystem::ALL
        .into_iter()
        .filter(|e| !excluded.contains(e))
        .filter(|e| has_manifest(*e, path))
        .collect()
}
