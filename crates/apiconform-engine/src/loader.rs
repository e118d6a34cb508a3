//! Contract file parsing and load-time errors

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Parse a contract file from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then
/// fall back to content sniffing (leading `{` → JSON, otherwise YAML).
pub(crate) fn parse_document(path: &Path, content: &str) -> Result<Value, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parse_err = |message: String| LoadError::Parse {
        file: path.display().to_string(),
        message,
    };

    match ext.as_str() {
        "yaml" | "yml" => {
            serde_yml::from_str(content).map_err(|e| parse_err(format!("Invalid YAML: {e}")))
        }
        "json" => {
            serde_json::from_str(content).map_err(|e| parse_err(format!("Invalid JSON: {e}")))
        }
        _ => parse_str(content).map_err(parse_err),
    }
}

/// Parse contract text of unknown origin by content sniffing.
pub(crate) fn parse_str(content: &str) -> Result<Value, String> {
    if content.trim_start().starts_with('{') {
        serde_json::from_str(content).map_err(|e| format!("Invalid JSON: {e}"))
    } else {
        serde_yml::from_str(content).map_err(|e| format!("Invalid YAML: {e}"))
    }
}

/// Errors raised while loading and resolving a contract.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("File {missing} referenced from {referenced_from} does not exist")]
    FileNotFound {
        referenced_from: String,
        missing: PathBuf,
    },

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Pointer `{pointer}` not found in {file}")]
    PointerNotFound { file: String, pointer: String },

    #[error("Reference loop through `{pointer}` in {file}")]
    ReferenceLoop { file: String, pointer: String },

    #[error("Document has no `paths` object")]
    MissingPaths,

    #[error("Unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid schema at `{pointer}` in {file}: {message}")]
    InvalidSchema {
        file: String,
        pointer: String,
        message: String,
    },
}
