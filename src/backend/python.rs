use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{
    execute_route, query_version, AddRequest, Backend, BackendContext, RemovalRoute,
};
use crate::analyzer::python::{
    is_requirements_name, parse_pip_list_json, PythonAnalyzer, PIPFILE, PYPROJECT, SETUP_CFG,
    SETUP_PY,
};
use crate::analyzer::{split_group_label, Analyzer};
use crate::detector;
use crate::editor;
use crate::error::RemovalError;
use crate::models::{
    Ecosystem, EnvInfo, Package, RawTriple, RegistryPackageInfo, Validation,
    INSTALLED_ENVIRONMENT,
};
use crate::package_manager::{CommandOutcome, PackageManager};
use crate::registry::{self, index_cache::IndexCache, pypi};

/// File name of the PyPI project-name index inside the user cache dir.
pub const PYPI_INDEX_CACHE: &str = "pypi-index.json";

/// Group name that means "the main dependency list" when adding.
const MAIN_GROUP: &str = "main";

const VENV_DIR: &str = ".venv";

/// Python projects managed through `uv`.
pub struct PythonBackend {
    ctx: BackendContext,
    uv: Arc<dyn PackageManager>,
    python: Arc<dyn PackageManager>,
    index_cache: Option<IndexCache>,
}

impl PythonBackend {
    pub fn new(
        ctx: BackendContext,
        uv: Arc<dyn PackageManager>,
        python: Arc<dyn PackageManager>,
        index_cache: Option<IndexCache>,
    ) -> Self {
        Self {
            ctx,
            uv,
            python,
            index_cache,
        }
    }

    async fn installed(&self) -> Vec<RawTriple> {
        if !self.ctx.scan_installed {
            return Vec::new();
        }
        let outcome = self.uv.run(&["pip", "list", "--format", "json"]).await;
        if !outcome.success {
            log::debug!("uv pip list failed: {}", outcome.output);
            return Vec::new();
        }
        parse_pip_list_json(&outcome.output)
    }
}

/// Decide how to remove `package` from the source labelled `origin`.
pub fn removal_route(
    project_dir: &Path,
    package: &str,
    origin: &str,
) -> Result<RemovalRoute, RemovalError> {
    let delegate = |args: &[&str]| {
        RemovalRoute::Delegate(args.iter().map(|a| a.to_string()).collect())
    };

    if origin == INSTALLED_ENVIRONMENT {
        return Ok(delegate(&["pip", "uninstall", package]));
    }
    if origin == SETUP_PY {
        return Err(RemovalError::Unsupported {
            package: package.to_string(),
            file: SETUP_PY.to_string(),
        });
    }

    match split_group_label(origin) {
        (PYPROJECT, None) => Ok(delegate(&["remove", package])),
        (PYPROJECT, Some(group)) => Ok(delegate(&["remove", "--group", group, package])),
        (SETUP_CFG, None) => Ok(RemovalRoute::LocalEdit {
            file: project_dir.join(SETUP_CFG),
            edit: editor::setup_cfg::remove,
        }),
        (PIPFILE, None) => Ok(RemovalRoute::LocalEdit {
            file: project_dir.join(PIPFILE),
            edit: editor::pipfile::remove,
        }),
        (file, None) if is_requirements_name(file) => Ok(RemovalRoute::LocalEdit {
            file: project_dir.join(file),
            edit: editor::requirements::remove,
        }),
        _ => Err(RemovalError::UnknownOrigin {
            origin: origin.to_string(),
        }),
    }
}

/// Arguments for `uv add`; the `main` group means no `--group` flag.
pub fn add_args(request: &AddRequest) -> Vec<String> {
    let mut args = vec!["add".to_string()];
    if let Some(group) = request.group.as_deref().filter(|g| *g != MAIN_GROUP) {
        args.push("--group".to_string());
        args.push(group.to_string());
    }
    args.push(request.label());
    args
}

/// Package names from the `Requires:` line of `uv pip show` output.
pub fn parse_requires(show_output: &str) -> Vec<String> {
    show_output
        .lines()
        .find_map(|line| line.strip_prefix("Requires:"))
        .map(|reqs| {
            reqs.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Backend for PythonBackend {
    fn kind(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn detect(&self, path: &Path) -> bool {
        detector::has_manifest(Ecosystem::Python, path)
    }

    async fn load_dependencies(&self) -> Vec<Package> {
        let installed = self.installed().await;
        PythonAnalyzer::new().analyze(&self.ctx.project_dir, &installed)
    }

    async fn init_project(&self) -> CommandOutcome {
        self.uv.run(&["init", "--bare"]).await
    }

    async fn add(&self, request: &AddRequest) -> CommandOutcome {
        let args = add_args(request);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.uv.run(&args).await
    }

    async fn remove(&self, package: &str, origin: &str) -> Result<String, RemovalError> {
        let route = removal_route(&self.ctx.project_dir, package, origin)?;
        execute_route(self.uv.as_ref(), package, origin, route).await
    }

    async fn sync(&self) -> CommandOutcome {
        self.uv.run(&["sync"]).await
    }

    async fn lock(&self) -> CommandOutcome {
        self.uv.run(&["lock"]).await
    }

    async fn create_env(&self) -> CommandOutcome {
        self.uv.run(&["venv"]).await
    }

    async fn validate_package(&self, name: &str, version: Option<&str>) -> Result<Validation> {
        pypi::validate(&self.ctx.client, name, version).await
    }

    async fn fetch_latest_versions(&self, names: &[String]) -> HashMap<String, Option<String>> {
        let client = &self.ctx.client;
        registry::fetch_latest_batched(names, self.ctx.batch_size, |name| async move {
            pypi::fetch_latest(client, &name).await
        })
        .await
    }

    async fn search_registry(&self, query: &str) -> Result<Vec<RegistryPackageInfo>> {
        pypi::search(&self.ctx.client, self.index_cache.as_ref(), query).await
    }

    async fn fetch_metadata(&self, name: &str) -> Result<BTreeMap<String, String>> {
        pypi::fetch_metadata(&self.ctx.client, name).await
    }

    async fn get_requires(&self, name: &str) -> Vec<String> {
        let outcome = self.uv.run(&["pip", "show", name]).await;
        if outcome.success {
            parse_requires(&outcome.output)
        } else {
            Vec::new()
        }
    }

    async fn get_env_info(&self) -> EnvInfo {
        EnvInfo {
            language_name: "Python".to_string(),
            language_version: query_version(self.python.as_ref(), &["--version"], 1).await,
            tool_name: self.uv.program().to_string(),
            tool_version: query_version(self.uv.as_ref(), &["--version"], 1).await,
            env_label: VENV_DIR.to_string(),
            env_exists: self.ctx.project_dir.join(VENV_DIR).is_dir(),
        }
    }

    fn docs_url(&self, name: &str) -> String {
        format!("https://pypi.org/project/{}/", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_manager::fake::FakePackageManager;
    use std::fs;
    use tempfile::TempDir;

    fn backend(dir: &Path, uv: Arc<FakePackageManager>, scan_installed: bool) -> PythonBackend {
        let ctx = BackendContext {
            project_dir: dir.to_path_buf(),
            client: reqwest::Client::new(),
            batch_size: 10,
            scan_installed,
        };
        PythonBackend::new(ctx, uv, Arc::new(FakePackageManager::new("python3")), None)
    }

    fn delegate_args(route: RemovalRoute) -> Vec<String> {
        match route {
            RemovalRoute::Delegate(args) => args,
            other => panic!("expected a delegated removal, got {:?}", other),
        }
    }

    #[test]
    fn test_route_pyproject_groups() {
        let dir = Path::new("/project");
        assert_eq!(
            delegate_args(removal_route(dir, "flask", "pyproject.toml").unwrap()),
            vec!["remove", "flask"]
        );
        assert_eq!(
            delegate_args(removal_route(dir, "pytest", "pyproject.toml [dev]").unwrap()),
            vec!["remove", "--group", "dev", "pytest"]
        );
        assert_eq!(
            delegate_args(removal_route(dir, "rich", INSTALLED_ENVIRONMENT).unwrap()),
            vec!["pip", "uninstall", "rich"]
        );
    }

    #[test]
    fn test_route_local_files() {
        let dir = Path::new("/project");
        match removal_route(dir, "flask", "requirements-dev.txt").unwrap() {
            RemovalRoute::LocalEdit { file, .. } => {
                assert_eq!(file, dir.join("requirements-dev.txt"))
            }
            other => panic!("unexpected route {:?}", other),
        }
        assert!(matches!(
            removal_route(dir, "flask", "Pipfile").unwrap(),
            RemovalRoute::LocalEdit { .. }
        ));
        assert!(matches!(
            removal_route(dir, "flask", "setup.cfg").unwrap(),
            RemovalRoute::LocalEdit { .. }
        ));
    }

    #[test]
    fn test_route_refusals() {
        let dir = Path::new("/project");
        let err = removal_route(dir, "flask", "setup.py").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot auto-edit setup.py: please remove the dependency 'flask' manually"
        );
        assert!(!err.is_retriable());

        let err = removal_route(dir, "flask", "poetry.lock").unwrap_err();
        assert_eq!(
            err,
            RemovalError::UnknownOrigin {
                origin: "poetry.lock".to_string()
            }
        );
    }

    #[test]
    fn test_add_args() {
        assert_eq!(add_args(&AddRequest::new("flask")), vec!["add", "flask"]);
        assert_eq!(
            add_args(
                &AddRequest::new("pytest")
                    .with_version("8.0")
                    .with_constraint(">=")
                    .with_group("dev")
            ),
            vec!["add", "--group", "dev", "pytest>=8.0"]
        );
        assert_eq!(
            add_args(&AddRequest::new("flask").with_group("main")),
            vec!["add", "flask"]
        );
    }

    #[test]
    fn test_parse_requires() {
        let output = "Name: flask\nVersion: 3.0.3\nRequires: blinker, click, itsdangerous\nRequired-by:\n";
        assert_eq!(parse_requires(output), vec!["blinker", "click", "itsdangerous"]);
        assert!(parse_requires("Name: six\nRequires:\n").is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_requirements_edits_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        let uv = Arc::new(FakePackageManager::new("uv"));
        let backend = backend(dir.path(), uv.clone(), false);

        let message = backend.remove("Flask", "requirements.txt").await.unwrap();
        assert_eq!(message, "Removed 'Flask' from requirements.txt");
        assert_eq!(
            fs::read_to_string(dir.path().join("requirements.txt")).unwrap(),
            "requests\n"
        );
        assert!(uv.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_from_group_delegates() {
        let dir = TempDir::new().unwrap();
        let uv = Arc::new(FakePackageManager::new("uv"));
        let backend = backend(dir.path(), uv.clone(), false);

        backend.remove("pytest", "pyproject.toml [dev]").await.unwrap();
        assert_eq!(uv.calls(), vec!["remove --group dev pytest"]);
    }

    #[tokio::test]
    async fn test_load_dependencies_merges_installed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests>=2.0\n").unwrap();
        let uv = Arc::new(FakePackageManager::new("uv").with_outcome(CommandOutcome::ok(
            r#"[{"name": "requests", "version": "2.32.3"}, {"name": "idna", "version": "3.7"}]"#,
        )));
        let backend = backend(dir.path(), uv.clone(), true);

        let packages = backend.load_dependencies().await;
        assert_eq!(uv.calls(), vec!["pip list --format json"]);
        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["idna", "requests"]);
        assert_eq!(packages[1].resolved_version, "2.32.3");
        assert_eq!(packages[1].sources.len(), 2);
    }

    #[tokio::test]
    async fn test_load_dependencies_without_installed_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests\n").unwrap();
        let uv = Arc::new(FakePackageManager::new("uv"));
        let backend = backend(dir.path(), uv.clone(), false);

        let packages = backend.load_dependencies().await;
        assert_eq!(packages.len(), 1);
        assert!(uv.calls().is_empty());
    }

    fn locked(name: &str, resolved: &str) -> Package {
        Package {
            name: name.to_string(),
            sources: vec![crate::models::DepSource {
                origin: "pyproject.toml".to_string(),
                constraint: "*".to_string(),
            }],
            resolved_version: resolved.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upgrade_outdated_pins_latest() {
        let dir = TempDir::new().unwrap();
        let uv = Arc::new(
            FakePackageManager::new("uv")
                .with_outcome(CommandOutcome::ok("Resolved 12 packages"))
                .with_outcome(CommandOutcome::failed("error: no solution found")),
        );
        let backend = backend(dir.path(), uv.clone(), false);

        let packages = vec![
            locked("flask", "2.3.0"),
            locked("httpx", ""),
            locked("requests", "2.32.3"),
            locked("rich", "13.0.0"),
            locked("ghost", "1.0"),
        ];
        let latest = HashMap::from([
            ("flask".to_string(), Some("3.0.3".to_string())),
            ("httpx".to_string(), Some("0.28.1".to_string())),
            ("requests".to_string(), Some("2.32.3".to_string())),
            ("rich".to_string(), Some("13.7.1".to_string())),
            ("ghost".to_string(), None),
        ]);

        let report = crate::backend::upgrade_outdated(&backend, &packages, &latest).await;
        assert_eq!(uv.calls(), vec!["add flask==3.0.3", "add rich==13.7.1"]);
        assert_eq!(report.updated, vec!["flask==3.0.3"]);
        assert_eq!(report.failed, vec!["rich"]);
        assert_eq!(report.summary(), "Updated 1/2 packages. Failed: rich");
    }

    #[tokio::test]
    async fn test_env_info() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".venv")).unwrap();
        let uv = Arc::new(
            FakePackageManager::new("uv").with_outcome(CommandOutcome::ok("uv 0.4.18")),
        );
        let backend = backend(dir.path(), uv, false);

        let info = backend.get_env_info().await;
        assert_eq!(info.tool_name, "uv");
        assert_eq!(info.tool_version, "0.4.18");
        // the fake python reports an empty version line
        assert_eq!(info.language_version, "unknown");
        assert!(info.env_exists);
    }
}
