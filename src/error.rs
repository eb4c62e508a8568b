use thiserror::Error;

/// Longest slice of delegate output kept in an error message.
const MAX_OUTPUT_CHARS: usize = 200;

/// Why removing a dependency from one of its sources did not happen.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemovalError {
    #[error("'{package}' not found in {file}")]
    NotFound { package: String, file: String },

    #[error("{file} not found")]
    MissingFile { file: String },

    #[error("Cannot auto-edit {file}: please remove the dependency '{package}' manually")]
    Unsupported { package: String, file: String },

    #[error("Unknown source: {origin}")]
    UnknownOrigin { origin: String },

    #[error("Failed to remove {package}: {output}")]
    DelegateFailed { package: String, output: String },

    #[error("Failed to read {file}: {details}")]
    Read { file: String, details: String },

    #[error("Failed to write {file}: {details}")]
    Write { file: String, details: String },
}

impl RemovalError {
    pub fn delegate_failed(package: &str, output: &str) -> Self {
        RemovalError::DelegateFailed {
            package: package.to_string(),
            output: truncate(output, MAX_OUTPUT_CHARS),
        }
    }

    /// `false` for failures that will repeat no matter how often they are retried.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            RemovalError::Unsupported { .. } | RemovalError::UnknownOrigin { .. }
        )
    }
}

/// Cut `text` to at most `max` characters without splitting a code point.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
