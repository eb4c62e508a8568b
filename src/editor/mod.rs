//! In-place removal of a single dependency from a local source file.
//!
//! Every editor finds the first structural unit (a line, a key entry or a
//! table) whose package name normalizes to the requested one, drops it and
//! writes the whole file back. When nothing matches the file is left
//! untouched.
//!
//! Matching runs on lossily decoded text, but the rewrite copies the
//! original bytes of every kept line, so a stray Latin-1 byte in a comment
//! survives the edit.

use std::ops::Range;
use std::path::Path;

use crate::analyzer::file_label;
use crate::error::RemovalError;

pub mod pipfile;
pub mod requirements;
pub mod setup_cfg;

/// A source file split into lines.
struct SourceFile {
    raw: Vec<Vec<u8>>,
    /// Lossy text of each line, same indices as `raw`.
    lines: Vec<String>,
}

impl SourceFile {
    fn from_bytes(bytes: &[u8]) -> Self {
        let raw: Vec<Vec<u8>> = split_lines(bytes).into_iter().map(<[u8]>::to_vec).collect();
        let lines = raw
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();
        Self { raw, lines }
    }

    /// The decoded lines joined by `\n`, for parsers that want the whole text.
    fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Split like [`str::lines`]: `\n` separated, `\r` stripped, no empty tail.
fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    body.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

/// Read `path`, mapping absence to [`RemovalError::MissingFile`].
fn read_source(path: &Path) -> Result<SourceFile, RemovalError> {
    if !path.is_file() {
        return Err(RemovalError::MissingFile {
            file: file_label(path),
        });
    }
    let bytes = std::fs::read(path).map_err(|e| RemovalError::Read {
        file: file_label(path),
        details: e.to_string(),
    })?;
    Ok(SourceFile::from_bytes(&bytes))
}

/// Rewrite `path` without the lines in `drop`, putting `replacement` (if any)
/// in their place. Lines are joined by `\n` with one trailing newline.
fn write_without(
    path: &Path,
    source: &SourceFile,
    drop: Range<usize>,
    replacement: Option<&str>,
) -> Result<(), RemovalError> {
    let mut content = Vec::new();
    for (i, line) in source.raw.iter().enumerate() {
        if i == drop.start {
            if let Some(replacement) = replacement {
                content.extend_from_slice(replacement.as_bytes());
                content.push(b'\n');
            }
        }
        if drop.contains(&i) {
            continue;
        }
        content.extend_from_slice(line);
        content.push(b'\n');
    }
    std::fs::write(path, content).map_err(|e| RemovalError::Write {
        file: file_label(path),
        details: e.to_string(),
    })
}

fn not_found(path: &Path, package: &str) -> RemovalError {
    RemovalError::NotFound {
        package: package.to_string(),
        file: file_label(path),
    }
}

fn removed_message(path: &Path, package: &str) -> String {
    format!("Removed '{}' from {}", package, file_label(path))
}
