use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{fail_open, normalize, read_lossy};
use crate::models::RawTriple;

pub const GO_MOD: &str = "go.mod";

// module/path version [// indirect]
static BLOCK_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^\s()]+)\s+(v[^\s]+)(?:\s*//.*)?$").expect("valid regex")
});
static SINGLE_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*require\s+([^\s()]+)\s+(v[^\s]+)(?:\s*//.*)?$").expect("valid regex")
});

/// Analyzer for Go modules.
///
/// `go.mod` is both the declaration and the resolution source: minimal
/// version selection records the selected version in each `require`.
pub struct GoAnalyzer;

impl GoAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for GoAnalyzer {
    fn collect(&self, path: &Path) -> Vec<RawTriple> {
        parse_go_mod(&path.join(GO_MOD))
    }

    fn resolve(&self, path: &Path) -> HashMap<String, String> {
        parse_go_mod(&path.join(GO_MOD))
            .into_iter()
            .map(|t| (normalize(&t.name), t.constraint))
            .collect()
    }
}

/// Parse single-line and block `require` directives of a `go.mod`.
pub fn parse_go_mod(path: &Path) -> Vec<RawTriple> {
    if !path.is_file() {
        return Vec::new();
    }
    fail_open(path, try_parse_go_mod(path))
}

fn try_parse_go_mod(path: &Path) -> Result<Vec<RawTriple>> {
    let content = read_lossy(path)?;
    let mut raw = Vec::new();
    let mut in_require_block = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if in_require_block {
            if line == ")" {
                in_require_block = false;
            } else if let Some(caps) = BLOCK_REQUIRE.captures(line) {
                raw.push(RawTriple::new(&caps[1], &caps[2], GO_MOD));
            }
            continue;
        }

        if is_require_block_start(line) {
            in_require_block = true;
        } else if let Some(caps) = SINGLE_REQUIRE.captures(line) {
            raw.push(RawTriple::new(&caps[1], &caps[2], GO_MOD));
        }
    }

    Ok(raw)
}

fn is_require_block_start(line: &str) -> bool {
    line.strip_prefix("require")
        .map(|rest| rest.trim() == "(")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use tempfile::TempDir;

    const GO_MOD_CONTENT: &str = "\
module example.com/app

go 1.21

require github.com/spf13/cobra v1.8.0

require (
\tgithub.com/stretchr/testify v1.8.4 // indirect
\t// pinned for CVE
\tgolang.org/x/net v0.20.0
)

replace golang.org/x/net => ../net
";

    fn write_go_mod(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(GO_MOD), content).unwrap();
        dir
    }

    #[test]
    fn test_parse_go_mod() {
        let dir = write_go_mod(GO_MOD_CONTENT);
        let raw = parse_go_mod(&dir.path().join(GO_MOD));
        assert_eq!(
            raw,
            vec![
                RawTriple::new("github.com/spf13/cobra", "v1.8.0", "go.mod"),
                RawTriple::new("github.com/stretchr/testify", "v1.8.4", "go.mod"),
                RawTriple::new("golang.org/x/net", "v0.20.0", "go.mod"),
            ]
        );
    }

    #[test]
    fn test_analyze_uses_required_versions() {
        let dir = write_go_mod(GO_MOD_CONTENT);
        let pkgs = GoAnalyzer::new().analyze(dir.path(), &[]);
        assert_eq!(pkgs.len(), 3);
        assert_eq!(pkgs[0].name, "github.com/spf13/cobra");
        assert_eq!(pkgs[0].resolved_version, "v1.8.0");
    }

    #[test]
    fn test_missing_go_mod() {
        let dir = TempDir::new().unwrap();
        assert!(GoAnalyzer::new().analyze(dir.path(), &[]).is_empty());
    }
}
