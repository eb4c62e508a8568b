//! `depdeck`: inspect and manage dependencies declared across a project's manifests.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and set up logging.
//! 2. Load config ([`config::load_config`]).
//! 3. Pick the ecosystem: `--lang`, else the first one detected ([`detector`]).
//! 4. Build its [`backend::Backend`] and run the subcommand against it.
//! 5. Exit `0`, or `1` when the action failed.

mod analyzer;
mod backend;
mod cli;
mod config;
mod detector;
mod editor;
mod error;
mod models;
mod package_manager;
mod registry;
mod report;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use backend::{AddRequest, Backend, BackendContext};
use cli::{Cli, Command, ReportFormat};
use config::load_config;
use detector::detect_ecosystems;
use models::Ecosystem;
use package_manager::CommandOutcome;

/// Longest slice of tool output shown after a failed action.
const MAX_FAILURE_OUTPUT: usize = 200;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let mut config = load_config(&path, cli.config.as_deref())?;
    if let Command::List {
        no_installed: true, ..
    } = cli.command
    {
        config.scan.installed = false;
    }

    let ecosystem = match select_ecosystem(&cli, &path, &config.scan.exclude) {
        Some(ecosystem) => ecosystem,
        None => {
            eprintln!(
                "No supported project manifests found in {}",
                path.display()
            );
            std::process::exit(1);
        }
    };
    log::debug!("Using the {} backend for {}", ecosystem, path.display());

    let client = registry::client(config.registry.timeout())?;
    let backend = backend::create(
        ecosystem,
        BackendContext::new(&path, client, &config),
        &config,
    );

    if !backend.detect(&path) && !matches!(cli.command, Command::Init) {
        log::warn!("No {} manifests found in {}", ecosystem, path.display());
    }

    if !run(cli.command, backend.as_ref(), &path).await? {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

/// `--lang` wins; otherwise the first detected ecosystem. `init` falls back
/// to Python so an empty directory can be bootstrapped.
fn select_ecosystem(cli: &Cli, path: &Path, excluded: &[Ecosystem]) -> Option<Ecosystem> {
    if let Some(lang) = cli.lang {
        return Some(lang.into());
    }
    let detected = detect_ecosystems(path, excluded).into_iter().next();
    match (&cli.command, detected) {
        (_, Some(ecosystem)) => Some(ecosystem),
        (Command::Init, None) => Some(Ecosystem::Python),
        _ => None,
    }
}

/// Run one subcommand. `Ok(false)` means the action itself failed.
async fn run(command: Command, backend: &dyn Backend, path: &Path) -> Result<bool> {
    match command {
        Command::List {
            report, outdated, ..
        } => {
            let packages = backend.load_dependencies().await;
            let latest = if outdated {
                let names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
                Some(fetch_latest(backend, &names, report == ReportFormat::Terminal).await)
            } else {
                None
            };
            match report {
                ReportFormat::Terminal => {
                    report::terminal::render_packages(&packages, path, backend.kind(), latest.as_ref())
                }
                ReportFormat::Json => {
                    println!("{}", report::to_json(&packages, latest.as_ref())?)
                }
            }
            Ok(true)
        }

        Command::Add {
            name,
            version,
            constraint,
            group,
        } => {
            let mut request = AddRequest::new(name).with_constraint(constraint);
            if let Some(version) = version {
                request = request.with_version(version);
            }
            if let Some(group) = group {
                request = request.with_group(group);
            }
            let target = match &request.group {
                Some(group) => format!(" to group '{}'", group),
                None => String::new(),
            };
            let outcome = backend.add(&request).await;
            Ok(report_outcome(
                &format!("Added {}{}", request.label(), target),
                &format!("Failed to add {}", request.name),
                &outcome,
            ))
        }

        Command::Update {
            name,
            version,
            constraint,
        } => {
            let validation = backend.validate_package(&name, version.as_deref()).await?;
            if !validation.valid {
                let reason = validation.error.unwrap_or_else(|| "invalid package".to_string());
                eprintln!("{} {}", "✗".red(), reason);
                return Ok(false);
            }
            let mut request = AddRequest::new(name).with_constraint(constraint);
            if let Some(version) = version.or(validation.resolved_version) {
                request = request.with_version(version);
            }
            let outcome = backend.add(&request).await;
            Ok(report_outcome(
                &format!("Updated {}", request.label()),
                &format!("Failed to update {}", request.name),
                &outcome,
            ))
        }

        Command::Upgrade => {
            let packages = backend.load_dependencies().await;
            let names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
            let latest = fetch_latest(backend, &names, true).await;
            let report = backend::upgrade_outdated(backend, &packages, &latest).await;
            if report.failed.is_empty() {
                println!("{} {}", "✓".green(), report.summary());
            } else {
                eprintln!("{} {}", "✗".red(), report.summary());
            }
            Ok(report.failed.is_empty())
        }

        Command::Remove { name, source } => {
            let packages = backend.load_dependencies().await;
            let Some(package) = backend::find_package(&packages, &name) else {
                bail!("'{}' is not a dependency of this project", name);
            };
            let origin = backend::select_origin(package, source.as_deref())?;
            match backend.remove(&package.name, &origin).await {
                Ok(message) => {
                    println!("{} {}", "✓".green(), message);
                    Ok(true)
                }
                Err(e) => {
                    let mark = if e.is_retriable() { "✗".red() } else { "⚠".yellow() };
                    eprintln!("{} {}", mark, e);
                    Ok(false)
                }
            }
        }

        Command::Sync => Ok(report_outcome(
            "Environment synced",
            "Sync failed",
            &backend.sync().await,
        )),
        Command::Lock => Ok(report_outcome(
            "Lockfile updated",
            "Lock failed",
            &backend.lock().await,
        )),
        Command::Venv => Ok(report_outcome(
            "Environment created",
            "Failed to create the environment",
            &backend.create_env().await,
        )),
        Command::Init => Ok(report_outcome(
            "Project initialized",
            "Init failed",
            &backend.init_project().await,
        )),

        Command::Search { query } => {
            let results = backend.search_registry(&query).await?;
            report::terminal::render_search(&results, &query);
            Ok(true)
        }

        Command::Info { name } => {
            let metadata = backend.fetch_metadata(&name).await?;
            let requires = backend.get_requires(&name).await;
            report::terminal::render_info(&name, &metadata, &requires, &backend.docs_url(&name));
            Ok(true)
        }

        Command::Env => {
            report::terminal::render_env(&backend.get_env_info().await);
            Ok(true)
        }
    }
}

/// Print a one-line result for a delegated action and return whether it succeeded.
fn report_outcome(success: &str, failure: &str, outcome: &CommandOutcome) -> bool {
    if outcome.success {
        println!("{} {}", "✓".green(), success);
        if !outcome.output.is_empty() {
            log::debug!("{}", outcome.output);
        }
    } else {
        eprintln!(
            "{} {}: {}",
            "✗".red(),
            failure,
            error::truncate(&outcome.output, MAX_FAILURE_OUTPUT)
        );
    }
    outcome.success
}

/// Latest registry versions, with a spinner on the terminal.
async fn fetch_latest(
    backend: &dyn Backend,
    names: &[String],
    show_progress: bool,
) -> report::LatestVersions {
    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Checking {} packages for updates...", names.len()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let latest = backend.fetch_latest_versions(names).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    latest
}
