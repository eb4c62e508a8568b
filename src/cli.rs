use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::backend::DEFAULT_CONSTRAINT;
use crate::models::Ecosystem;

#[derive(Parser, Debug)]
#[command(
    name = "depdeck",
    about = "Inspect and manage project dependencies across every manifest they are declared in",
    version
)]
pub struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    pub path: PathBuf,

    /// Config file [default: ./.depdeck/config.toml, fallback ~/.config/depdeck/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ecosystem to operate on [default: first one detected]
    #[arg(long, value_name = "LANG", global = true)]
    pub lang: Option<EcosystemArg>,

    /// Debug logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every dependency with its sources and resolved version
    List {
        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,

        /// Look up the latest registry version of each package
        #[arg(long)]
        outdated: bool,

        /// Skip the installed-environment listing
        #[arg(long)]
        no_installed: bool,
    },

    /// Add a dependency
    Add {
        name: String,

        #[arg(long)]
        version: Option<String>,

        /// Version operator, e.g. ==, >=, ~=, ^
        #[arg(long, default_value = DEFAULT_CONSTRAINT)]
        constraint: String,

        /// Dependency group (e.g. dev)
        #[arg(long)]
        group: Option<String>,
    },

    /// Change the version of an existing dependency after checking the registry
    Update {
        name: String,

        #[arg(long)]
        version: Option<String>,

        #[arg(long, default_value = DEFAULT_CONSTRAINT)]
        constraint: String,
    },

    /// Update every outdated package to its latest registry version
    Upgrade,

    /// Remove a dependency from one of its sources
    Remove {
        name: String,

        /// Source to remove from, as shown by `list` (e.g. "pyproject.toml [dev]")
        #[arg(long, value_name = "ORIGIN")]
        source: Option<String>,
    },

    /// Install exactly what the lockfile records
    Sync,

    /// Refresh the lockfile
    Lock,

    /// Create the project environment
    Venv,

    /// Create a minimal project manifest
    Init,

    /// Search the package registry
    Search { query: String },

    /// Show registry metadata and direct requirements of a package
    Info { name: String },

    /// Show language, tool and environment versions
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EcosystemArg {
    Python,
    #[value(aliases = ["js", "node"])]
    Javascript,
    Go,
}

impl From<EcosystemArg> for Ecosystem {
    fn from(arg: EcosystemArg) -> Self {
        match arg {
            EcosystemArg::Python => Ecosystem::Python,
            EcosystemArg::Javascript => Ecosystem::JavaScript,
            EcosystemArg::Go => Ecosystem::Go,
        }
    }
}
