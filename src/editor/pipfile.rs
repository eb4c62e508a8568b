use std::ops::Range;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{not_found, read_source, removed_message, write_without};
use crate::analyzer::normalize;
use crate::analyzer::python::PIPFILE_SECTIONS;
use crate::error::RemovalError;

static KEY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*["']?([A-Za-z0-9][A-Za-z0-9._-]*)["']?\s*="#).expect("valid regex")
});

/// What a table header line opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table<'a> {
    /// `[packages]` or `[dev-packages]`.
    Packages,
    /// `[packages.<name>]`: a single dependency written as a sub-table.
    Entry(&'a str),
    Other,
}

/// Classify `line` if it is a table header. Trailing comments are ignored.
fn table_header(line: &str) -> Option<Table<'_>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    let header = trimmed.split('#').next().unwrap_or(trimmed).trim();
    let header = header.trim_start_matches('[').trim_end_matches(']').trim();

    if PIPFILE_SECTIONS.contains(&header) {
        return Some(Table::Packages);
    }
    let entry = header.split_once('.').and_then(|(section, name)| {
        PIPFILE_SECTIONS
            .contains(&section.trim())
            .then(|| name.trim().trim_matches(['"', '\'']))
    });
    Some(entry.map_or(Table::Other, Table::Entry))
}

/// Lines of the table opened at `start`, up to the next header with
/// trailing blank lines left in place.
fn table_span(lines: &[String], start: usize) -> Range<usize> {
    let mut end = lines[start + 1..]
        .iter()
        .position(|line| table_header(line).is_some())
        .map_or(lines.len(), |offset| start + 1 + offset);
    while end > start + 1 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    start..end
}

/// Remove `package` from `[packages]` or `[dev-packages]`.
///
/// Handles both the `name = ...` key form and the `[packages.name]`
/// sub-table form; the latter is removed header and body together.
pub fn remove(path: &Path, package: &str) -> Result<String, RemovalError> {
    let source = read_source(path)?;
    let target = normalize(package);

    let mut in_packages = false;
    let mut span = None;

    for (i, line) in source.lines.iter().enumerate() {
        if let Some(table) = table_header(line) {
            if let Table::Entry(name) = table {
                if normalize(name) == target {
                    span = Some(table_span(&source.lines, i));
                    break;
                }
            }
            in_packages = table == Table::Packages;
            continue;
        }
        if !in_packages {
            continue;
        }
        let matches = KEY_LINE
            .captures(line)
            .is_some_and(|caps| normalize(&caps[1]) == target);
        if matches {
            span = Some(i..i + 1);
            break;
        }
    }

    let Some(span) = span else {
        return Err(not_found(path, package));
    };

    write_without(path, &source, span, None)?;
    Ok(removed_message(path, package))
}
