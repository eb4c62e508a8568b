use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{execute_route, AddRequest, Backend, BackendContext, RemovalRoute};
use crate::analyzer::go::{GoAnalyzer, GO_MOD};
use crate::analyzer::{file_label, Analyzer};
use crate::detector;
use crate::error::RemovalError;
use crate::models::{Ecosystem, EnvInfo, Package, RegistryPackageInfo, Validation};
use crate::package_manager::{CommandOutcome, PackageManager};
use crate::registry::{self, goproxy};

/// Go modules managed through the `go` command.
///
/// There is no installed-environment listing: the module cache is shared
/// and `go.mod` already records the selected versions.
pub struct GoBackend {
    ctx: BackendContext,
    go: Arc<dyn PackageManager>,
}

impl GoBackend {
    pub fn new(ctx: BackendContext, go: Arc<dyn PackageManager>) -> Self {
        Self { ctx, go }
    }
}

pub fn removal_route(package: &str, origin: &str) -> Result<RemovalRoute, RemovalError> {
    if origin != GO_MOD {
        return Err(RemovalError::UnknownOrigin {
            origin: origin.to_string(),
        });
    }
    Ok(RemovalRoute::Delegate(vec![
        "mod".to_string(),
        "edit".to_string(),
        format!("-droprequire={}", package),
    ]))
}

/// `go get module@version`, or `@latest` when no version is pinned.
pub fn get_args(request: &AddRequest) -> Vec<String> {
    let version = request.version.as_deref().unwrap_or("latest");
    vec!["get".to_string(), format!("{}@{}", request.name, version)]
}

/// Direct requirements of `module` from `go mod graph` output.
///
/// Each line is `<from>[@version] <to>@version`; the main module has no version.
pub fn parse_mod_graph(output: &str, module: &str) -> Vec<String> {
    let mut requires = Vec::new();
    for line in output.lines() {
        let Some((from, to)) = line.split_once(' ') else {
            continue;
        };
        let from_module = from.split('@').next().unwrap_or(from);
        if from_module != module {
            continue;
        }
        let to_module = to.trim().split('@').next().unwrap_or(to).to_string();
        if !requires.contains(&to_module) {
            requires.push(to_module);
        }
    }
    requires
}

#[async_trait]
impl Backend for GoBackend {
    fn kind(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn detect(&self, path: &Path) -> bool {
        detector::has_manifest(Ecosystem::Go, path)
    }

    async fn load_dependencies(&self) -> Vec<Package> {
        GoAnalyzer::new().analyze(&self.ctx.project_dir, &[])
    }

    async fn init_project(&self) -> CommandOutcome {
        let module = file_label(&self.ctx.project_dir);
        self.go.run(&["mod", "init", module.as_str()]).await
    }

    async fn add(&self, request: &AddRequest) -> CommandOutcome {
        if let Some(group) = &request.group {
            log::debug!("Go modules have no dependency groups; ignoring '{}'", group);
        }
        let args = get_args(request);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.go.run(&args).await
    }

    async fn remove(&self, package: &str, origin: &str) -> Result<String, RemovalError> {
        let route = removal_route(package, origin)?;
        execute_route(self.go.as_ref(), package, origin, route).await
    }

    async fn sync(&self) -> CommandOutcome {
        self.go.run(&["mod", "download"]).await
    }

    async fn lock(&self) -> CommandOutcome {
        self.go.run(&["mod", "tidy"]).await
    }

    async fn create_env(&self) -> CommandOutcome {
        CommandOutcome::ok("Go uses the shared module cache; there is no environment to create")
    }

    async fn validate_package(&self, name: &str, version: Option<&str>) -> Result<Validation> {
        goproxy::validate(&self.ctx.client, name, version).await
    }

    async fn fetch_latest_versions(&self, names: &[String]) -> HashMap<String, Option<String>> {
        let client = &self.ctx.client;
        registry::fetch_latest_batched(names, self.ctx.batch_size, |name| async move {
            goproxy::fetch_latest(client, &name).await
        })
        .await
    }

    async fn search_registry(&self, query: &str) -> Result<Vec<RegistryPackageInfo>> {
        log::debug!("The Go module proxy has no search API; no results for '{}'", query);
        Ok(Vec::new())
    }

    async fn fetch_metadata(&self, name: &str) -> Result<BTreeMap<String, String>> {
        goproxy::fetch_metadata(&self.ctx.client, name).await
    }

    async fn get_requires(&self, name: &str) -> Vec<String> {
        let outcome = self.go.run(&["mod", "graph"]).await;
        if outcome.success {
            parse_mod_graph(&outcome.output, name)
        } else {
            Vec::new()
        }
    }

    async fn get_env_info(&self) -> EnvInfo {
        // go version go1.22.4 linux/amd64
        let version = super::query_version(self.go.as_ref(), &["version"], 2).await;
        let version = version.trim_start_matches("go").to_string();

        let gopath = self.go.run(&["env", "GOPATH"]).await;
        let env_exists = gopath.success && Path::new(gopath.output.trim()).is_dir();

        EnvInfo {
            language_name: "Go".to_string(),
            language_version: version.clone(),
            tool_name: self.go.program().to_string(),
            tool_version: version,
            env_label: "GOPATH".to_string(),
            env_exists,
        }
    }

    fn docs_url(&self, name: &str) -> String {
        format!("https://pkg.go.dev/{}", name)
    }
}
