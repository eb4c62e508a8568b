//! Subprocess delegate for the ecosystem's own package manager (`uv`, `npm`, `go`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// What a delegated command reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// Combined stdout and stderr, trimmed.
    pub output: String,
}

impl CommandOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Executable name, for messages.
    fn program(&self) -> &str;

    async fn run(&self, args: &[&str]) -> CommandOutcome;
}

/// Runs the package manager binary inside the project directory.
pub struct CliPackageManager {
    program: String,
    project_dir: PathBuf,
}

impl CliPackageManager {
    pub fn new(program: impl Into<String>, project_dir: &Path) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl PackageManager for CliPackageManager {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[&str]) -> CommandOutcome {
        log::debug!("Running {} {}", self.program, args.join(" "));

        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .current_dir(&self.project_dir)
            .stdin(std::process::Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                CommandOutcome {
                    success: out.status.success(),
                    output: text.trim().to_string(),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CommandOutcome::failed(format!(
                "'{}' is not installed or not on your PATH",
                self.program
            )),
            Err(e) => CommandOutcome::failed(format!("Failed to run {}: {}", self.program, e)),
        }
    }
}
