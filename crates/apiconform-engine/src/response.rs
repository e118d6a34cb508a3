//! Response validation pipeline and its result

use apiconform_core::{Failure, FailureKind, TaskKey};
use bytes::Bytes;
use http::{Request, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::body;
use crate::codec::ParameterCodec;
use crate::content;
use crate::document::{Operation, ResponseVariant};
use crate::hooks::Hooks;
use crate::request::header_text;

/// Values decoded from a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedResponse {
    /// Keys are lower-case header names
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
}

/// A response checked against the contract of the request's operation.
#[derive(Debug, Clone)]
pub struct ValidatedResponse<'a> {
    request: &'a Request<Bytes>,
    response: &'a Response<Bytes>,
    operation: Option<&'a Operation>,
    variant: Option<ResponseVariant<'a>>,
    parsed: ParsedResponse,
    error: Option<Failure>,
}

impl<'a> ValidatedResponse<'a> {
    /// The request this response answered.
    #[must_use]
    pub const fn request(&self) -> &'a Request<Bytes> {
        self.request
    }

    #[must_use]
    pub const fn response(&self) -> &'a Response<Bytes> {
        self.response
    }

    #[must_use]
    pub const fn operation(&self) -> Option<&'a Operation> {
        self.operation
    }

    /// Matched status and content type, `None` when either is undeclared.
    #[must_use]
    pub const fn variant(&self) -> Option<ResponseVariant<'a>> {
        self.variant
    }

    #[must_use]
    pub const fn parsed(&self) -> &ParsedResponse {
        &self.parsed
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.parsed.body.as_ref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn task_key(&self) -> Option<TaskKey> {
        self.variant.map(|v| v.task_key())
    }

    /// # Errors
    ///
    /// Returns the failure if the response does not conform.
    pub fn into_result(self) -> Result<Self, Failure> {
        match self.error {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}

/// Validate a response against the operation its request routed to.
///
/// Order: status, content type, headers, body.
pub(crate) fn validate<'a>(
    operation: Result<&'a Operation, Failure>,
    codec: &dyn ParameterCodec,
    hooks: &Hooks,
    request: &'a Request<Bytes>,
    response: &'a Response<Bytes>,
) -> ValidatedResponse<'a> {
    let mut validated = ValidatedResponse {
        request,
        response,
        operation: None,
        variant: None,
        parsed: ParsedResponse::default(),
        error: None,
    };
    if let Err(failure) = run(&mut validated, operation, codec, hooks) {
        tracing::debug!(
            method = %request.method(),
            path = request.uri().path(),
            status = response.status().as_u16(),
            kind = %failure.kind,
            "response does not conform"
        );
        validated.error = Some(failure);
    }
    validated
}

fn run<'a>(
    validated: &mut ValidatedResponse<'a>,
    operation: Result<&'a Operation, Failure>,
    codec: &dyn ParameterCodec,
    hooks: &Hooks,
) -> Result<(), Failure> {
    let operation = operation?;
    validated.operation = Some(operation);

    let response = validated.response;
    let status = response.status().as_u16();
    let declared = operation.find_response(status).ok_or_else(|| {
        Failure::new(FailureKind::ResponseNotFound).with_message(format!(
            "Response status {status} is not defined for {}",
            operation.label()
        ))
    })?;

    let content_type = header_text(response.headers());
    let media = match &declared.content {
        Some(content) if !content.is_empty() => {
            let keys: Vec<&str> = content.keys().map(String::as_str).collect();
            let key = content::select(&keys, content_type.as_deref()).ok_or_else(|| {
                Failure::new(FailureKind::ResponseNotFound).with_message(format!(
                    "Response content type {} is not defined for status {} of {}",
                    content_type.as_deref().unwrap_or("(none)"),
                    declared.status,
                    operation.label()
                ))
            })?;
            content.get(key)
        }
        _ => None,
    };
    validated.variant = Some(ResponseVariant {
        operation,
        response: declared,
        media,
    });

    let parsed = &mut validated.parsed;
    parsed.headers = codec.decode_headers(&declared.headers, response.headers());
    if let Some(schema) = declared.headers.schema() {
        let mut instance = Value::Object(std::mem::take(&mut parsed.headers));
        let result = schema.validate(&instance);
        if let Value::Object(map) = instance.take() {
            parsed.headers = map;
        }
        result.map_err(|errors| Failure::new(FailureKind::InvalidResponseHeader).with_errors(errors))?;
    }

    let Some(schema) = media.and_then(|m| m.schema.as_ref()) else {
        return Ok(());
    };
    let body = response.body();
    if body.is_empty() {
        return Err(Failure::new(FailureKind::InvalidResponseBody).with_message("Response body is empty"));
    }
    let value = body::parse(content_type.as_deref(), body, Some(schema))
        .map_err(|message| Failure::new(FailureKind::InvalidResponseBody).with_message(message))?;
    let value = parsed.body.insert(value);
    schema
        .validate(value)
        .map_err(|errors| Failure::new(FailureKind::InvalidResponseBody).with_errors(errors))?;
    hooks.response_body_validated(schema, value);
    Ok(())
}
