//! Per-ecosystem capabilities behind one trait.
//!
//! A [`Backend`] ties together an ecosystem's analyzer, its removal routing,
//! its package-manager delegate and its registry client. The CLI only talks
//! to `Box<dyn Backend>` values built by [`create`].

pub mod go;
pub mod node;
pub mod python;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::analyzer::normalize;
use crate::config::Config;
use crate::error::RemovalError;
use crate::models::{Ecosystem, EnvInfo, Package, RegistryPackageInfo, Validation};
use crate::package_manager::{CliPackageManager, CommandOutcome, PackageManager};
use crate::registry::index_cache::IndexCache;
use crate::report::{is_outdated, LatestVersions};

/// Constraint operator used when the caller does not pick one.
pub const DEFAULT_CONSTRAINT: &str = "==";

/// A package to add or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub name: String,
    pub version: Option<String>,
    pub constraint: String,
    pub group: Option<String>,
}

impl AddRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            constraint: DEFAULT_CONSTRAINT.to_string(),
            group: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// `name`, or `name<constraint><version>` when a version is pinned.
    pub fn label(&self) -> String {
        match &self.version {
            Some(v) => format!("{}{}{}", self.name, self.constraint, v),
            None => self.name.clone(),
        }
    }
}

/// Where a removal is carried out.
pub enum RemovalRoute {
    /// Run the package manager with these arguments.
    Delegate(Vec<String>),
    /// Edit a local file in place.
    LocalEdit { file: PathBuf, edit: EditFn },
}

pub type EditFn = fn(&Path, &str) -> Result<String, RemovalError>;

impl fmt::Debug for RemovalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalRoute::Delegate(args) => f.debug_tuple("Delegate").field(args).finish(),
            RemovalRoute::LocalEdit { file, .. } => f
                .debug_struct("LocalEdit")
                .field("file", file)
                .finish_non_exhaustive(),
        }
    }
}

/// State every backend needs: where the project is and how to reach the outside world.
pub struct BackendContext {
    pub project_dir: PathBuf,
    pub client: Client,
    pub batch_size: usize,
    pub scan_installed: bool,
}

impl BackendContext {
    pub fn new(project_dir: &Path, client: Client, config: &Config) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            client,
            batch_size: config.registry.batch_size,
            scan_installed: config.scan.installed,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> Ecosystem;

    /// Whether `path` holds a project of this ecosystem.
    fn detect(&self, path: &Path) -> bool;

    /// Scan the project's manifests and merge them into the package list.
    async fn load_dependencies(&self) -> Vec<Package>;

    async fn init_project(&self) -> CommandOutcome;

    async fn add(&self, request: &AddRequest) -> CommandOutcome;

    /// Remove `package` from the single source labelled `origin`.
    async fn remove(&self, package: &str, origin: &str) -> Result<String, RemovalError>;

    async fn sync(&self) -> CommandOutcome;

    async fn lock(&self) -> CommandOutcome;

    async fn create_env(&self) -> CommandOutcome;

    async fn validate_package(&self, name: &str, version: Option<&str>) -> Result<Validation>;

    async fn fetch_latest_versions(&self, names: &[String]) -> HashMap<String, Option<String>>;

    async fn search_registry(&self, query: &str) -> Result<Vec<RegistryPackageInfo>>;

    async fn fetch_metadata(&self, name: &str) -> Result<BTreeMap<String, String>>;

    /// Direct dependencies of `name`; empty when unknown.
    async fn get_requires(&self, name: &str) -> Vec<String>;

    async fn get_env_info(&self) -> EnvInfo;

    fn docs_url(&self, name: &str) -> String;
}

/// Build the backend for `ecosystem`, wired to the real package-manager binaries.
pub fn create(ecosystem: Ecosystem, ctx: BackendContext, config: &Config) -> Box<dyn Backend> {
    let dir = ctx.project_dir.clone();
    match ecosystem {
        Ecosystem::Python => Box::new(python::PythonBackend::new(
            ctx,
            Arc::new(CliPackageManager::new(&config.tools.uv, &dir)),
            Arc::new(CliPackageManager::new(&config.tools.python, &dir)),
            IndexCache::in_user_cache(python::PYPI_INDEX_CACHE, config.registry.index_ttl()),
        )),
        Ecosystem::JavaScript => Box::new(node::NodeBackend::new(
            ctx,
            Arc::new(CliPackageManager::new(&config.tools.npm, &dir)),
            Arc::new(CliPackageManager::new(&config.tools.node, &dir)),
        )),
        Ecosystem::Go => Box::new(go::GoBackend::new(
            ctx,
            Arc::new(CliPackageManager::new(&config.tools.go, &dir)),
        )),
    }
}

/// The package whose normalized name matches `name`.
pub fn find_package<'a>(packages: &'a [Package], name: &str) -> Option<&'a Package> {
    let key = normalize(name);
    packages.iter().find(|p| normalize(&p.name) == key)
}

/// Pick the source to remove `package` from.
///
/// Without `requested` the package must have exactly one source; otherwise
/// the caller has to choose and the error lists the candidates.
pub fn select_origin(package: &Package, requested: Option<&str>) -> Result<String> {
    let listing = || {
        package
            .sources
            .iter()
            .map(|s| format!("  {}", s.origin))
            .collect::<Vec<_>>()
            .join("\n")
    };

    match requested {
        Some(origin) if package.has_origin(origin) => Ok(origin.to_string()),
        Some(origin) => bail!(
            "'{}' is not declared in {}. Its sources are:\n{}",
            package.name,
            origin,
            listing()
        ),
        None => match package.sources.as_slice() {
            [only] => Ok(only.origin.clone()),
            _ => bail!(
                "'{}' is declared in several sources; pick one with --source:\n{}",
                package.name,
                listing()
            ),
        },
    }
}

/// Carry out a removal route with `pm`.
pub(crate) async fn execute_route(
    pm: &dyn PackageManager,
    package: &str,
    origin: &str,
    route: RemovalRoute,
) -> Result<String, RemovalError> {
    match route {
        RemovalRoute::Delegate(args) => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let outcome = pm.run(&args).await;
            if outcome.success {
                Ok(format!("Removed {} from {}", package, origin))
            } else {
                Err(RemovalError::delegate_failed(package, &outcome.output))
            }
        }
        RemovalRoute::LocalEdit { file, edit } => edit(&file, package),
    }
}

/// Result of upgrading every outdated package.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpgradeReport {
    /// `name==version` labels of the packages that were updated.
    pub updated: Vec<String>,
    /// Names whose update failed.
    pub failed: Vec<String>,
}

impl UpgradeReport {
    pub fn total(&self) -> usize {
        self.updated.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        let total = self.total();
        if total == 0 {
            "All packages are up to date.".to_string()
        } else if self.failed.is_empty() {
            let plural = if total == 1 { "" } else { "s" };
            format!("Updated all {} package{} to latest.", total, plural)
        } else {
            format!(
                "Updated {}/{} packages. Failed: {}",
                self.updated.len(),
                total,
                self.failed.join(", ")
            )
        }
    }
}

/// Pin every package whose resolved version differs from `latest` to that
/// latest version, one `add` at a time.
pub async fn upgrade_outdated(
    backend: &dyn Backend,
    packages: &[Package],
    latest: &LatestVersions,
) -> UpgradeReport {
    let mut report = UpgradeReport::default();

    for package in packages.iter().filter(|p| is_outdated(p, Some(latest))) {
        let Some(version) = latest.get(&package.name).cloned().flatten() else {
            continue;
        };
        let request = AddRequest::new(package.name.as_str()).with_version(version);
        let outcome = backend.add(&request).await;
        if outcome.success {
            report.updated.push(request.label());
        } else {
            log::debug!("Updating {} failed: {}", package.name, outcome.output);
            report.failed.push(package.name.clone());
        }
    }

    report
}

/// Version token from a `<tool> --version` line, e.g. `uv 0.4.18 (...)` → `0.4.18`.
pub(crate) fn version_token(output: &str, index: usize) -> String {
    let line = output.lines().next().unwrap_or_default().trim();
    let mut tokens = line.split_whitespace();
    match tokens.clone().nth(index) {
        Some(token) => token.to_string(),
        None => tokens.next().unwrap_or("unknown").to_string(),
    }
}

/// Run `<program> <args>` and pull a version token out of its output.
pub(crate) async fn query_version(pm: &dyn PackageManager, args: &[&str], index: usize) -> String {
    let outcome = pm.run(args).await;
    if outcome.success {
        version_token(&outcome.output, index)
    } else {
        "unknown".to_string()
    }
}
