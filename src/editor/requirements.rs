use std::path::Path;

use super::{not_found, read_source, removed_message, write_without};
use crate::analyzer::python::is_requirements_noise;
use crate::analyzer::{normalize, parse_dep_string};
use crate::error::RemovalError;

/// Remove the first line declaring `package` from a `requirements*.txt` file.
pub fn remove(path: &Path, package: &str) -> Result<String, RemovalError> {
    let source = read_source(path)?;
    let target = normalize(package);

    let position = source.lines.iter().position(|line| {
        !is_requirements_noise(line)
            && parse_dep_string(line.trim()).is_some_and(|(name, _)| normalize(&name) == target)
    });
    let Some(position) = position else {
        return Err(not_found(path, package));
    };

    write_without(path, &source, position..position + 1, None)?;
    Ok(removed_message(path, package))
}
