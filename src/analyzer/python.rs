use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{
    fail_open, fail_open_map, file_label, group_label, ini, normalize, parse_dep_string, read_lossy,
};
use crate::models::{RawTriple, INSTALLED_ENVIRONMENT, UNCONSTRAINED};

pub const PYPROJECT: &str = "pyproject.toml";
pub const SETUP_PY: &str = "setup.py";
pub const SETUP_CFG: &str = "setup.cfg";
pub const PIPFILE: &str = "Pipfile";
pub const UV_LOCK: &str = "uv.lock";

/// Pipfile tables that map package names to versions.
pub const PIPFILE_SECTIONS: [&str; 2] = ["packages", "dev-packages"];

/// Analyzer for Python projects.
///
/// Sources are read in priority order: `pyproject.toml` →
/// `requirements*.txt` (sorted) → `setup.py` → `setup.cfg` → `Pipfile`.
/// Resolved versions come from `uv.lock`.
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for PythonAnalyzer {
    fn collect(&self, path: &Path) -> Vec<RawTriple> {
        let mut raw = Vec::new();
        raw.extend(parse_pyproject(&path.join(PYPROJECT)));
        for req in requirement_files(path) {
            raw.extend(parse_requirements(&req));
        }
        raw.extend(parse_setup_py(&path.join(SETUP_PY)));
        raw.extend(parse_setup_cfg(&path.join(SETUP_CFG)));
        raw.extend(parse_pipfile(&path.join(PIPFILE)));
        raw
    }

    fn resolve(&self, path: &Path) -> HashMap<String, String> {
        parse_uv_lock(&path.join(UV_LOCK))
    }
}

/// `true` for `requirements.txt`, `requirements-dev.txt` and similar names.
pub fn is_requirements_name(name: &str) -> bool {
    name.starts_with("requirements") && name.ends_with(".txt")
}

/// Every `requirements*.txt` directly inside `dir`, sorted by file name.
pub fn requirement_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_requirements_name)
        })
        .collect();
    files.sort();
    files
}

/// `true` for a requirements line that declares nothing (blank, comment, option flag).
pub fn is_requirements_noise(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#') || line.starts_with('-')
}

/// Parse a `requirements.txt`-style file line by line.
pub fn parse_requirements(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_requirements(path))
}

fn try_parse_requirements(path: &Path) -> Result<Vec<RawTriple>> {
    let content = read_lossy(path)?;
    let label = file_label(path);
    Ok(content
        .lines()
        .filter(|line| !is_requirements_noise(line))
        .filter_map(|line| parse_dep_string(line.trim()))
        .map(|(name, spec)| RawTriple::new(name, spec, label.clone()))
        .collect())
}

#[derive(Debug, Deserialize)]
struct Pyproject {
    project: Option<PyprojectProject>,
    #[serde(default, rename = "dependency-groups")]
    dependency_groups: toml::Table,
}

#[derive(Debug, Deserialize)]
struct PyprojectProject {
    #[serde(default)]
    dependencies: Vec<toml::Value>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: toml::Table,
}

/// Parse `[project].dependencies`, `[project.optional-dependencies]` and `[dependency-groups]`.
pub fn parse_pyproject(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_pyproject(path))
}

fn try_parse_pyproject(path: &Path) -> Result<Vec<RawTriple>> {
    let content = std::fs::read_to_string(path)?;
    let pyproject: Pyproject = toml::from_str(&content)?;
    let label = file_label(path);
    let mut raw = Vec::new();

    let Pyproject {
        project,
        dependency_groups,
    } = pyproject;

    if let Some(project) = project {
        push_dep_strings(&mut raw, &project.dependencies, &label);
        push_groups(&mut raw, &project.optional_dependencies, &label);
    }
    push_groups(&mut raw, &dependency_groups, &label);

    Ok(raw)
}

fn push_groups(raw: &mut Vec<RawTriple>, groups: &toml::Table, label: &str) {
    for (group, deps) in groups {
        if let Some(deps) = deps.as_array() {
            push_dep_strings(raw, deps, &group_label(label, group));
        }
    }
}

/// Non-string entries (`{include-group = "..."}`) are skipped.
fn push_dep_strings(raw: &mut Vec<RawTriple>, deps: &[toml::Value], origin: &str) {
    for dep in deps.iter().filter_map(|d| d.as_str()) {
        if let Some((name, spec)) = parse_dep_string(dep) {
            raw.push(RawTriple::new(name, spec, origin));
        }
    }
}

/// Best-effort `install_requires` extraction from `setup.py`.
pub fn parse_setup_py(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_setup_py(path))
}

fn try_parse_setup_py(path: &Path) -> Result<Vec<RawTriple>> {
    let source = read_lossy(path)?;
    let reqs = super::setup_py::extract_install_requires(&source)?;
    Ok(reqs
        .iter()
        .filter_map(|r| parse_dep_string(r))
        .map(|(name, spec)| RawTriple::new(name, spec, SETUP_PY))
        .collect())
}

/// Parse `[options].install_requires` from `setup.cfg`.
pub fn parse_setup_cfg(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_setup_cfg(path))
}

fn try_parse_setup_cfg(path: &Path) -> Result<Vec<RawTriple>> {
    let content = read_lossy(path)?;
    let Some(lines) = ini::find_value(&content, "options", "install_requires") else {
        return Ok(Vec::new());
    };
    Ok(lines
        .iter()
        .filter_map(|l| parse_dep_string(&l.text))
        .map(|(name, spec)| RawTriple::new(name, spec, SETUP_CFG))
        .collect())
}

/// Parse `[packages]` and `[dev-packages]` from a `Pipfile`.
pub fn parse_pipfile(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_pipfile(path))
}

fn try_parse_pipfile(path: &Path) -> Result<Vec<RawTriple>> {
    let content = read_lossy(path)?;
    let doc: toml::Table = toml::from_str(&content)?;
    let mut raw = Vec::new();

    for section in PIPFILE_SECTIONS {
        let Some(pkgs) = doc.get(section).and_then(|v| v.as_table()) else {
            continue;
        };
        for (name, value) in pkgs {
            let spec = match value {
                toml::Value::String(s) => s.as_str(),
                toml::Value::Table(t) => t
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or(UNCONSTRAINED),
                _ => UNCONSTRAINED,
            };
            raw.push(RawTriple::new(name.as_str(), spec, PIPFILE));
        }
    }

    Ok(raw)
}

#[derive(Debug, Deserialize)]
struct UvLock {
    #[serde(default)]
    package: Vec<UvLockPackage>,
}

#[derive(Debug, Deserialize)]
struct UvLockPackage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

/// Parse `uv.lock` into a `{normalized_name: version}` map.
pub fn parse_uv_lock(path: &Path) -> HashMap<String, String> {
    if !path.is_file() {
        return HashMap::new();
    }
    fail_open_map(path, try_parse_uv_lock(path))
}

fn try_parse_uv_lock(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let lock: UvLock = toml::from_str(&content).context("Failed to parse uv.lock file")?;
    Ok(lock
        .package
        .into_iter()
        .filter(|p| !p.name.is_empty() && !p.version.is_empty())
        .map(|p| (normalize(&p.name), p.version))
        .collect())
}

#[derive(Debug, Deserialize)]
struct PipListEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

/// Turn `uv pip list --format json` output into installed-environment triples.
pub fn parse_pip_list_json(output: &str) -> Vec<RawTriple> {
    let entries: Vec<PipListEntry> = match serde_json::from_str(output) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Unreadable pip list output: {e}");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter(|e| !e.name.is_empty() && !e.version.is_empty())
        .map(|e| RawTriple::new(e.name, format!("=={}", e.version), INSTALLED_ENVIRONMENT))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    const PYPROJECT_TOML: &str = r#"
[project]
name = "demo"
dependencies = ["requests>=2.31", "httpx"]

[project.optional-dependencies]
dev = ["pytest>=7.0"]

[dependency-groups]
lint = ["ruff", { include-group = "dev" }]
"#;

    const UV_LOCK_TOML: &str = r#"
version = 1

[[package]]
name = "requests"
version = "2.32.3"

[[package]]
name = "Typing_Extensions"
version = "4.12.2"

[[package]]
name = "broken"
"#;

    #[test]
    fn test_parse_pyproject_groups() {
        let dir = project(&[(PYPROJECT, PYPROJECT_TOML)]);
        let raw = parse_pyproject(&dir.path().join(PYPROJECT));
        assert_eq!(
            raw,
            vec![
                RawTriple::new("requests", ">=2.31", "pyproject.toml"),
                RawTriple::new("httpx", "*", "pyproject.toml"),
                RawTriple::new("pytest", ">=7.0", "pyproject.toml [dev]"),
                RawTriple::new("ruff", "*", "pyproject.toml [lint]"),
            ]
        );
    }

    #[test]
    fn test_parse_pyproject_malformed_is_empty() {
        let dir = project(&[(PYPROJECT, "[project\ndependencies = [")]);
        assert!(parse_pyproject(&dir.path().join(PYPROJECT)).is_empty());
        assert!(parse_pyproject(&dir.path().join("missing.toml")).is_empty());
    }

    #[test]
    fn test_parse_requirements_skips_noise() {
        let dir = project(&[(
            "requirements.txt",
            "# comment\n\n-r other.txt\n--index-url https://example.org\nflask\n",
        )]);
        let raw = parse_requirements(&dir.path().join("requirements.txt"));
        assert_eq!(raw, vec![RawTriple::new("flask", "*", "requirements.txt")]);
    }

    #[test]
    fn test_latin1_bytes_do_not_hide_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("requirements.txt"),
            b"# caf\xe9 deps\nflask\nrequests>=2\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(SETUP_CFG),
            b"[metadata]\nauthor = Jos\xe9\n\n[options]\ninstall_requires =\n    click\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(SETUP_PY),
            b"# \xa9 2024\nsetup(install_requires=['attrs'])\n",
        )
        .unwrap();

        let raw = parse_requirements(&dir.path().join("requirements.txt"));
        assert_eq!(
            raw,
            vec![
                RawTriple::new("flask", "*", "requirements.txt"),
                RawTriple::new("requests", ">=2", "requirements.txt"),
            ]
        );
        let pkgs = PythonAnalyzer::new().analyze(dir.path(), &[]);
        let names: Vec<&str> = pkgs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["attrs", "click", "flask", "requests"]);
    }

    #[test]
    fn test_requirement_files_are_sorted() {
        let dir = project(&[
            ("requirements-dev.txt", "pytest\n"),
            ("requirements.txt", "flask\n"),
            ("requirements.in", "flask\n"),
            ("dev-requirements.txt", "mypy\n"),
        ]);
        let names: Vec<String> = requirement_files(dir.path())
            .iter()
            .map(|p| file_label(p))
            .collect();
        assert_eq!(names, vec!["requirements-dev.txt", "requirements.txt"]);
    }

    #[test]
    fn test_parse_setup_cfg() {
        let dir = project(&[(
            SETUP_CFG,
            "[options]\ninstall_requires =\n    click>=8\n    rich\n",
        )]);
        let raw = parse_setup_cfg(&dir.path().join(SETUP_CFG));
        assert_eq!(
            raw,
            vec![
                RawTriple::new("click", ">=8", "setup.cfg"),
                RawTriple::new("rich", "*", "setup.cfg"),
            ]
        );
    }

    #[test]
    fn test_parse_setup_py() {
        let dir = project(&[(SETUP_PY, "setup(install_requires=['attrs>=23'])\n")]);
        let raw = parse_setup_py(&dir.path().join(SETUP_PY));
        assert_eq!(raw, vec![RawTriple::new("attrs", ">=23", "setup.py")]);
    }

    #[test]
    fn test_parse_pipfile_versions() {
        let dir = project(&[(
            PIPFILE,
            r#"
[[source]]
name = "pypi"
url = "https://pypi.org/simple"

[packages]
requests = "*"
django = { version = ">=4.2", extras = ["bcrypt"] }
local = { path = "." }

[dev-packages]
pytest = ">=7"
"#,
        )]);
        let raw = parse_pipfile(&dir.path().join(PIPFILE));
        assert_eq!(
            raw,
            vec![
                RawTriple::new("requests", "*", "Pipfile"),
                RawTriple::new("django", ">=4.2", "Pipfile"),
                RawTriple::new("local", "*", "Pipfile"),
                RawTriple::new("pytest", ">=7", "Pipfile"),
            ]
        );
    }

    #[test]
    fn test_parse_uv_lock() {
        let dir = project(&[(UV_LOCK, UV_LOCK_TOML)]);
        let lock = parse_uv_lock(&dir.path().join(UV_LOCK));
        assert_eq!(lock.len(), 2);
        assert_eq!(lock["requests"], "2.32.3");
        assert_eq!(lock["typing-extensions"], "4.12.2");
    }

    #[test]
    fn test_parse_uv_lock_garbage_is_empty() {
        let dir = project(&[(UV_LOCK, "not = [valid")]);
        assert!(parse_uv_lock(&dir.path().join(UV_LOCK)).is_empty());
    }

    #[test]
    fn test_parse_pip_list_json() {
        let raw = parse_pip_list_json(r#"[{"name": "certifi", "version": "2024.2.2"}, {"name": ""}]"#);
        assert_eq!(
            raw,
            vec![RawTriple::new("certifi", "==2024.2.2", INSTALLED_ENVIRONMENT)]
        );
        assert!(parse_pip_list_json("warning: no venv").is_empty());
    }

    #[test]
    fn test_analyze_manifest_with_lock() {
        let dir = project(&[(PYPROJECT, PYPROJECT_TOML), (UV_LOCK, UV_LOCK_TOML)]);
        let pkgs = PythonAnalyzer::new().analyze(dir.path(), &[]);
        let names: Vec<&str> = pkgs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["httpx", "pytest", "requests", "ruff"]);

        let requests = &pkgs[2];
        assert_eq!(requests.resolved_version, "2.32.3");
        assert_eq!(requests.sources.len(), 1);
        assert_eq!(requests.sources[0].origin, "pyproject.toml");
        assert_eq!(requests.sources[0].constraint, ">=2.31");

        let pytest = &pkgs[1];
        assert_eq!(pytest.sources[0].origin, "pyproject.toml [dev]");
        assert_eq!(pytest.sources[0].constraint, ">=7.0");
        assert_eq!(pytest.resolved_version, "");
    }

    #[test]
    fn test_analyze_merges_across_files() {
        let dir = project(&[
            (PYPROJECT, "[project]\ndependencies = [\"requests>=2.31\"]\n"),
            ("requirements.txt", "requests>=2.0\nrequests>=2.0\n"),
            (SETUP_CFG, "[options]\ninstall_requires = Requests\n"),
        ]);
        let pkgs = PythonAnalyzer::new().analyze(dir.path(), &[]);
        assert_eq!(pkgs.len(), 1);
        let origins: Vec<(&str, &str)> = pkgs[0]
            .sources
            .iter()
            .map(|s| (s.origin.as_str(), s.constraint.as_str()))
            .collect();
        assert_eq!(
            origins,
            vec![
                ("pyproject.toml", ">=2.31"),
                ("requirements.txt", ">=2.0"),
                ("setup.cfg", "*"),
            ]
        );
    }

    #[test]
    fn test_analyze_with_installed_environment() {
        let dir = project(&[]);
        let installed = vec![RawTriple::new("certifi", "==2024.2.2", INSTALLED_ENVIRONMENT)];
        let pkgs = PythonAnalyzer::new().analyze(dir.path(), &installed);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].resolved_version, "2024.2.2");
        assert_eq!(pkgs[0].sources.len(), 1);
        assert_eq!(pkgs[0].sources[0].origin, INSTALLED_ENVIRONMENT);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let dir = project(&[
            (PYPROJECT, PYPROJECT_TOML),
            (UV_LOCK, UV_LOCK_TOML),
            ("requirements-dev.txt", "pytest>=8\nblack\n"),
            (PIPFILE, "[packages]\nhttpx = \"*\"\n"),
        ]);
        let first = PythonAnalyzer::new().analyze(dir.path(), &[]);
        let second = PythonAnalyzer::new().analyze(dir.path(), &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_broken_source_does_not_hide_others() {
        let dir = project(&[
            (PYPROJECT, "this is not toml ["),
            (SETUP_PY, "setup(install_requires=[\n"),
            ("requirements.txt", "flask\n"),
        ]);
        let pkgs = PythonAnalyzer::new().analyze(dir.path(), &[]);
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "flask");
    }
}
