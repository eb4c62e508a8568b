use std::collections::BTreeMap;
use std::path::Path;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use super::{is_outdated, origins, LatestVersions};
use crate::models::{Ecosystem, EnvInfo, Package, RegistryPackageInfo, INSTALLED_ENVIRONMENT};

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Render the package list. `latest` adds a Latest column.
pub fn render_packages(
    packages: &[Package],
    path: &Path,
    ecosystem: Ecosystem,
    latest: Option<&LatestVersions>,
) {
    println!("\n {} v{}", "depdeck".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Scanning: {} ({})\n", path.display(), ecosystem);

    if packages.is_empty() {
        println!(" No dependencies found.");
        return;
    }

    println!("{}", package_table(packages, latest));

    let outdated = packages
        .iter()
        .filter(|p| is_outdated(p, latest))
        .count();
    let mut summary = format!(
        " Packages: {}  │  Sources: {}",
        packages.len().to_string().cyan(),
        origins(packages).len().to_string().cyan()
    );
    if latest.is_some() {
        summary.push_str(&format!("  │  Outdated: {}", outdated.to_string().yellow()));
    }
    println!("{}\n", summary);
}

fn package_table(packages: &[Package], latest: Option<&LatestVersions>) -> Table {
    let mut table = new_table();
    let mut header = vec![
        header_cell("Name"),
        header_cell("Constraint"),
        header_cell("Sources"),
        header_cell("Resolved"),
    ];
    if latest.is_some() {
        header.push(header_cell("Latest"));
    }
    table.set_header(header);

    for pkg in packages {
        let sources: Vec<&str> = pkg.sources.iter().map(|s| s.origin.as_str()).collect();
        let only_installed = sources.iter().all(|s| *s == INSTALLED_ENVIRONMENT);
        let name = if only_installed {
            Cell::new(&pkg.name).fg(Color::DarkGrey)
        } else {
            Cell::new(&pkg.name)
        };
        let resolved = if pkg.resolved_version.is_empty() {
            Cell::new("-").fg(Color::DarkGrey)
        } else {
            Cell::new(&pkg.resolved_version)
        };

        let mut row = vec![
            name,
            Cell::new(pkg.constraint_summary()),
            Cell::new(sources.join("\n")),
            resolved,
        ];
        if let Some(latest) = latest {
            let version = latest
                .get(&pkg.name)
                .and_then(|v| v.as_deref())
                .unwrap_or("?");
            let color = if is_outdated(pkg, Some(latest)) {
                Color::Yellow
            } else {
                Color::Green
            };
            row.push(Cell::new(version).fg(color));
        }
        table.add_row(row);
    }

    table
}

pub fn render_search(results: &[RegistryPackageInfo], query: &str) {
    if results.is_empty() {
        println!(" No packages matching '{}'.", query);
        return;
    }
    let mut table = new_table();
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Latest"),
        header_cell("Description"),
    ]);
    for hit in results {
        table.add_row(vec![
            Cell::new(&hit.name).fg(Color::Cyan),
            Cell::new(&hit.latest_version),
            Cell::new(&hit.description),
        ]);
    }
    println!("{}", table);
}

pub fn render_info(
    name: &str,
    metadata: &BTreeMap<String, String>,
    requires: &[String],
    docs_url: &str,
) {
    println!("\n {}\n", name.bold());
    if metadata.is_empty() {
        println!(" {} No registry metadata found.", "⚠".yellow());
    } else {
        let mut table = new_table();
        for (key, value) in metadata {
            table.add_row(vec![Cell::new(key).fg(Color::DarkGrey), Cell::new(value)]);
        }
        println!("{}", table);
    }
    if !requires.is_empty() {
        println!(" Requires: {}", requires.join(", "));
    }
    println!(" Docs:     {}\n", docs_url.underline());
}

pub fn render_env(info: &EnvInfo) {
    let env_state = if info.env_exists {
        format!("{} {}", "✓".green(), info.env_label.green())
    } else {
        format!("{} No {}", "✗".red(), info.env_label.red())
    };
    println!(
        " {} {}  │  {} {}",
        info.language_name.dimmed(),
        info.language_version,
        info.tool_name.dimmed(),
        info.tool_version
    );
    println!(" env:  {}", env_state);
}
