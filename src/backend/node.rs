use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{execute_route, query_version, AddRequest, Backend, BackendContext, RemovalRoute};
use crate::analyzer::node::{parse_npm_ls_json, NodeAnalyzer, PACKAGE_JSON};
use crate::analyzer::{split_group_label, Analyzer};
use crate::detector;
use crate::error::RemovalError;
use crate::models::{
    Ecosystem, EnvInfo, Package, RawTriple, RegistryPackageInfo, Validation,
    INSTALLED_ENVIRONMENT,
};
use crate::package_manager::{CommandOutcome, PackageManager};
use crate::registry::{self, npm};

const NODE_MODULES: &str = "node_modules";
const SEARCH_SIZE: usize = 20;

/// `npm` save flag for each non-primary `package.json` dependency group.
const SAVE_FLAGS: [(&str, &str); 3] = [
    ("devDependencies", "--save-dev"),
    ("peerDependencies", "--save-peer"),
    ("optionalDependencies", "--save-optional"),
];

/// JavaScript projects managed through `npm`.
pub struct NodeBackend {
    ctx: BackendContext,
    npm: Arc<dyn PackageManager>,
    node: Arc<dyn PackageManager>,
}

impl NodeBackend {
    pub fn new(
        ctx: BackendContext,
        npm: Arc<dyn PackageManager>,
        node: Arc<dyn PackageManager>,
    ) -> Self {
        Self { ctx, npm, node }
    }

    async fn installed(&self) -> Vec<RawTriple> {
        if !self.ctx.scan_installed {
            return Vec::new();
        }
        // npm ls exits non-zero on extraneous or missing packages but still prints the tree
        let outcome = self.npm.run(&["ls", "--json", "--depth=0"]).await;
        parse_npm_ls_json(&outcome.output)
    }
}

/// Save flag for a dependency group, accepting both `dev` and `devDependencies`.
/// `Ok(None)` means the primary `dependencies` table.
fn save_flag(group: &str) -> Result<Option<&'static str>, String> {
    if matches!(group, "main" | "dependencies" | "prod") {
        return Ok(None);
    }
    SAVE_FLAGS
        .iter()
        .find(|(table, _)| *table == group || table.strip_suffix("Dependencies") == Some(group))
        .map(|(_, flag)| Some(*flag))
        .ok_or_else(|| format!("Unknown npm dependency group '{}'", group))
}

/// `name`, `name@1.2.3` for an exact pin, `name@^1.2.3` for any other operator.
pub fn install_spec(request: &AddRequest) -> String {
    match &request.version {
        None => request.name.clone(),
        Some(v) if request.constraint == "==" || request.constraint == "=" => {
            format!("{}@{}", request.name, v)
        }
        Some(v) => format!("{}@{}{}", request.name, request.constraint, v),
    }
}

pub fn add_args(request: &AddRequest) -> Result<Vec<String>, String> {
    let mut args = vec!["install".to_string()];
    if let Some(group) = request.group.as_deref() {
        if let Some(flag) = save_flag(group)? {
            args.push(flag.to_string());
        }
    }
    args.push(install_spec(request));
    Ok(args)
}

pub fn removal_route(package: &str, origin: &str) -> Result<RemovalRoute, RemovalError> {
    let delegate = |args: &[&str]| {
        RemovalRoute::Delegate(args.iter().map(|a| a.to_string()).collect())
    };
    let unknown = || RemovalError::UnknownOrigin {
        origin: origin.to_string(),
    };

    if origin == INSTALLED_ENVIRONMENT {
        return Ok(delegate(&["uninstall", "--no-save", package]));
    }
    match split_group_label(origin) {
        (PACKAGE_JSON, None) => Ok(delegate(&["uninstall", package])),
        (PACKAGE_JSON, Some(group)) => {
            let (_, flag) = SAVE_FLAGS
                .iter()
                .find(|(table, _)| *table == group)
                .ok_or_else(unknown)?;
            Ok(delegate(&["uninstall", *flag, package]))
        }
        _ => Err(unknown()),
    }
}

#[async_trait]
impl Backend for NodeBackend {
    fn kind(&self) -> Ecosystem {
        Ecosystem::JavaScript
    }

    fn detect(&self, path: &Path) -> bool {
        detector::has_manifest(Ecosystem::JavaScript, path)
    }

    async fn load_dependencies(&self) -> Vec<Package> {
        let installed = self.installed().await;
        NodeAnalyzer::new().analyze(&self.ctx.project_dir, &installed)
    }

    async fn init_project(&self) -> CommandOutcome {
        self.npm.run(&["init", "-y"]).await
    }

    async fn add(&self, request: &AddRequest) -> CommandOutcome {
        let args = match add_args(request) {
            Ok(args) => args,
            Err(message) => return CommandOutcome::failed(message),
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.npm.run(&args).await
    }

    async fn remove(&self, package: &str, origin: &str) -> Result<String, RemovalError> {
        let route = removal_route(package, origin)?;
        execute_route(self.npm.as_ref(), package, origin, route).await
    }

    async fn sync(&self) -> CommandOutcome {
        self.npm.run(&["ci"]).await
    }

    async fn lock(&self) -> CommandOutcome {
        self.npm.run(&["install", "--package-lock-only"]).await
    }

    async fn create_env(&self) -> CommandOutcome {
        self.npm.run(&["install"]).await
    }

    async fn validate_package(&self, name: &str, version: Option<&str>) -> Result<Validation> {
        npm::validate(&self.ctx.client, name, version).await
    }

    async fn fetch_latest_versions(&self, names: &[String]) -> HashMap<String, Option<String>> {
        let client = &self.ctx.client;
        registry::fetch_latest_batched(names, self.ctx.batch_size, |name| async move {
            npm::fetch_latest(client, &name).await
        })
        .await
    }

    async fn search_registry(&self, query: &str) -> Result<Vec<RegistryPackageInfo>> {
        npm::search(&self.ctx.client, query, SEARCH_SIZE).await
    }

    async fn fetch_metadata(&self, name: &str) -> Result<BTreeMap<String, String>> {
        npm::fetch_metadata(&self.ctx.client, name).await
    }

    async fn get_requires(&self, name: &str) -> Vec<String> {
        match npm::fetch_requires(&self.ctx.client, name).await {
            Ok(requires) => requires,
            Err(e) => {
                log::warn!("Could not fetch dependencies of {}: {e:#}", name);
                Vec::new()
            }
        }
    }

    async fn get_env_info(&self) -> EnvInfo {
        let node_version = query_version(self.node.as_ref(), &["--version"], 1).await;
        EnvInfo {
            language_name: "Node.js".to_string(),
            language_version: node_version.trim_start_matches('v').to_string(),
            tool_name: self.npm.program().to_string(),
            tool_version: query_version(self.npm.as_ref(), &["--version"], 1).await,
            env_label: NODE_MODULES.to_string(),
            env_exists: self.ctx.project_dir.join(NODE_MODULES).is_dir(),
        }
    }

    fn docs_url(&self, name: &str) -> String {
        format!("https://www.npmjs.com/package/{}", name)
    }
}
