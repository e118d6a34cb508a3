//! Project configuration for contract validation and coverage

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::failure::ErrorFormat;

/// Project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenAPI document path (local file)
    pub document: PathBuf,

    /// Shape of rendered client error bodies
    pub error_format: ErrorFormat,

    /// `check_request` returns `Err` on failure instead of an invalid result
    pub raise_request_errors: bool,

    /// `check_response` returns `Err` on failure instead of an invalid result
    pub raise_response_errors: bool,

    /// Tighten path captures with the parameter's declared `pattern`
    pub path_parameter_patterns: bool,

    /// Coverage tracking and gating
    pub coverage: CoverageConfig,
}

/// Coverage settings.
///
/// ```toml
/// [coverage]
/// minimum = 80
/// event_log = ".apiconform/coverage-events.jsonl"
/// skip_responses = ["4XX", "500"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Required mean coverage percentage (optional, no gate by default)
    pub minimum: Option<u8>,

    /// Event log shared by worker processes
    pub event_log: Option<PathBuf>,

    /// Response status keys or ranges excluded from plans
    pub skip_responses: Vec<String>,

    /// Directory for persisted coverage summaries (default: ".apiconform/reports")
    pub report_dir: Option<PathBuf>,
}

impl CoverageConfig {
    /// Whether response tasks declared under `status` are excluded.
    ///
    /// `"4XX"` skips the range key itself and every concrete `4xx` status;
    /// other entries match the status key exactly.
    #[must_use]
    pub fn skips_response(&self, status: &str) -> bool {
        self.skip_responses.iter().any(|skip| {
            if skip.eq_ignore_ascii_case(status) {
                return true;
            }
            let skip = skip.as_bytes();
            skip.len() == 3
                && skip[1..].eq_ignore_ascii_case(b"xx")
                && status.len() == 3
                && status.as_bytes()[0] == skip[0]
        })
    }

    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".apiconform/reports"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document: PathBuf::from("openapi.yaml"),
            error_format: ErrorFormat::Default,
            raise_request_errors: false,
            raise_response_errors: true,
            path_parameter_patterns: false,
            coverage: CoverageConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.apiconform.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load the first config candidate found in `dir`, or defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".apiconform.toml", ".apiconform.json", "apiconform.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Create example config file
    #[must_use]
    pub const fn example() -> &'static str {
        r#"# apiconform configuration

# OpenAPI document (local file path)
document = "openapi.yaml"

# Rendered client error shape: "default" or "jsonapi"
error_format = "default"

# Whether check_request / check_response return an error instead of an
# invalid result
raise_request_errors = false
raise_response_errors = true

# Tighten path parameter matching with each parameter's `pattern`
path_parameter_patterns = false

[coverage]
# Fail the coverage gate below this percentage (disabled by default)
# minimum = 80

# Event log written by worker processes and replayed by `apiconform coverage`
# event_log = ".apiconform/coverage-events.jsonl"

# Response statuses or ranges excluded from the plan
# skip_responses = ["4XX", "500"]

# Directory for persisted coverage summaries
# report_dir = ".apiconform/reports"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
