//! Failure → wire error body

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Failure, SchemaError};

/// Shape of rendered client error bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// `{title, status, errors: [...]}` problem document
    #[default]
    Default,
    /// JSON:API error document `{errors: [...]}`
    JsonApi,
}

impl ErrorFormat {
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Default => "application/problem+json",
            Self::JsonApi => "application/vnd.api+json",
        }
    }
}

/// A rendered error ready to be written by a host adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Value,
}

/// Render a failure in the given format.
#[must_use]
pub fn render(failure: &Failure, format: ErrorFormat) -> ErrorResponse {
    let status = failure.status();
    let title = failure.kind.title();

    let body = match format {
        ErrorFormat::Default => {
            let errors: Vec<Value> = if failure.errors.is_empty() {
                vec![json!({
                    "title": title,
                    "status": status,
                    "message": failure.message(),
                })]
            } else {
                failure
                    .errors
                    .iter()
                    .map(|e| {
                        let mut entry = Map::new();
                        entry.insert("title".into(), json!(title));
                        entry.insert("status".into(), json!(status));
                        entry.insert("message".into(), json!(e.message));
                        entry.insert("code".into(), json!(e.code));
                        entry.insert("source".into(), source_of(failure, e));
                        Value::Object(entry)
                    })
                    .collect()
            };
            json!({ "title": title, "status": status, "errors": errors })
        }
        ErrorFormat::JsonApi => {
            let status = status.to_string();
            let errors: Vec<Value> = if failure.errors.is_empty() {
                vec![json!({
                    "status": status,
                    "title": title,
                    "detail": failure.message(),
                })]
            } else {
                failure
                    .errors
                    .iter()
                    .map(|e| {
                        json!({
                            "status": status,
                            "title": title,
                            "detail": e.message,
                            "code": e.code,
                            "source": source_of(failure, e),
                        })
                    })
                    .collect()
            };
            json!({ "errors": errors })
        }
    };

    ErrorResponse {
        status,
        content_type: format.content_type(),
        body,
    }
}

/// Parameter failures point at the parameter name, body failures at the
/// offending JSON pointer.
fn source_of(failure: &Failure, error: &SchemaError) -> Value {
    if failure.kind.parameter_location().is_some() {
        match error.parameter_name() {
            Some(name) => json!({ "parameter": name }),
            None => json!({ "parameter": "" }),
        }
    } else {
        json!({ "pointer": error.pointer })
    }
}
