use std::path::Path;

use super::{not_found, read_source, removed_message, write_without};
use crate::analyzer::{ini, normalize, parse_dep_string};
use crate::error::RemovalError;

/// Remove `package` from `[options] install_requires` in `setup.cfg`.
///
/// Continuation lines are dropped outright. A match on the key line itself
/// (`install_requires = pkg`) clears the inline value and keeps the key so
/// the remaining continuation lines stay attached to it.
pub fn remove(path: &Path, package: &str) -> Result<String, RemovalError> {
    let source = read_source(path)?;
    let target = normalize(package);

    let value_lines =
        ini::find_value(&source.text(), "options", "install_requires").unwrap_or_default();
    let matched = value_lines.iter().find(|line| {
        parse_dep_string(&line.text).is_some_and(|(name, _)| normalize(&name) == target)
    });
    let Some(matched) = matched else {
        return Err(not_found(path, package));
    };

    let key_line = if matched.inline {
        let line = source.lines[matched.index].as_str();
        Some(ini::key_prefix(line).unwrap_or(line))
    } else {
        None
    };
    write_without(path, &source, matched.index..matched.index + 1, key_line)?;
    Ok(removed_message(path, package))
}
