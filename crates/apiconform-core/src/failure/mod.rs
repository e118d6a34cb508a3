//! Failure model - typed non-conformance outcomes and their wire rendering

mod kind;
mod render;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use kind::FailureKind;
pub use render::{ErrorFormat, ErrorResponse, render};

/// One violation reported by the schema validation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaError {
    /// JSON pointer into the validated value (`/items/0/name`).
    ///
    /// For `required` violations this points at the missing property.
    pub pointer: String,
    /// JSON pointer into the compiled schema
    pub schema_pointer: String,
    /// Schema rule that failed: `required`, `pattern`, `enum`, ...
    pub code: String,
    /// Human-readable message from the validation engine
    pub message: String,
}

impl SchemaError {
    #[must_use]
    pub fn new(
        pointer: impl Into<String>,
        schema_pointer: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            pointer: pointer.into(),
            schema_pointer: schema_pointer.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// First segment of the instance pointer, unescaped.
    ///
    /// Parameter groups are validated as one object keyed by parameter name,
    /// so this is the offending parameter.
    #[must_use]
    pub fn parameter_name(&self) -> Option<String> {
        let first = self.pointer.strip_prefix('/')?.split('/').next()?;
        if first.is_empty() {
            return None;
        }
        Some(first.replace("~1", "/").replace("~0", "~"))
    }
}

/// A typed validation outcome explaining non-conformance.
///
/// Immutable once built; the builder methods consume and return `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Failure {
    /// What went wrong
    pub kind: FailureKind,
    /// Optional specific message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Underlying schema violations, if the failure came from schema validation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SchemaError>,
}

impl Failure {
    #[must_use]
    pub const fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: None,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<SchemaError>) -> Self {
        self.errors = errors;
        self
    }

    /// Best available explanation: explicit message, then the schema errors,
    /// then the kind's description.
    #[must_use]
    pub fn message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        if !self.errors.is_empty() {
            return self
                .errors
                .iter()
                .map(|e| {
                    if e.pointer.is_empty() {
                        e.message.clone()
                    } else {
                        format!("value at `{}` {}", e.pointer, e.message)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
        }
        self.kind.description().to_string()
    }

    /// Default HTTP status for rendering this failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.default_status()
    }

    #[must_use]
    pub const fn is_response_side(&self) -> bool {
        self.kind.is_response_side()
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message())
    }
}

impl std::error::Error for Failure {}
