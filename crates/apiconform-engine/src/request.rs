//! Request validation pipeline and its result

use apiconform_core::{Failure, FailureKind, TaskKey};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap};
use http::Request;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::body;
use crate::codec::ParameterCodec;
use crate::content;
use crate::document::{Operation, ParameterCollection, RequestVariant};
use crate::hooks::Hooks;
use crate::router::Router;

/// Values decoded from a request, keyed by parameter name per location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedRequest {
    pub path: Map<String, Value>,
    pub query: Map<String, Value>,
    /// Keys are lower-case header names
    pub headers: Map<String, Value>,
    pub cookies: Map<String, Value>,
    /// `None` when the request carried no body or the operation declares none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A request checked against the contract.
///
/// Always carries whatever could be decoded; `error` is set when the request
/// does not conform.
#[derive(Debug, Clone)]
pub struct ValidatedRequest<'a> {
    request: &'a Request<Bytes>,
    operation: Option<&'a Operation>,
    variant: Option<RequestVariant<'a>>,
    parsed: ParsedRequest,
    error: Option<Failure>,
}

impl<'a> ValidatedRequest<'a> {
    /// The original request, untouched.
    #[must_use]
    pub const fn request(&self) -> &'a Request<Bytes> {
        self.request
    }

    /// Matched operation, `None` when routing failed.
    #[must_use]
    pub const fn operation(&self) -> Option<&'a Operation> {
        self.operation
    }

    #[must_use]
    pub fn operation_id(&self) -> Option<&'a str> {
        self.operation?.operation_id.as_deref()
    }

    /// Matched request variant, `None` when routing or content negotiation failed.
    ///
    /// An empty body on an operation whose body is optional always matches the
    /// no-body variant, whatever `Content-Type` the request declares.
    #[must_use]
    pub const fn variant(&self) -> Option<RequestVariant<'a>> {
        self.variant
    }

    #[must_use]
    pub const fn parsed(&self) -> &ParsedRequest {
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

    /// Coverage identity of the matched variant.
    #[must_use]
    pub fn task_key(&self) -> Option<TaskKey> {
        self.variant.map(|v| v.task_key())
    }

    /// `Ok(self)` when valid, the failure otherwise.
    ///
    /// # Errors
    ///
    /// Returns the failure if the request does not conform.
    pub fn into_result(self) -> Result<Self, Failure> {
        match self.error {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}

/// Route, decode and validate a request.
///
/// Order: path and method, content type, then query, path, header and cookie
/// parameters, then the body. The first failure stops the pipeline.
pub(crate) fn validate<'a>(
    router: &'a Router,
    codec: &dyn ParameterCodec,
    hooks: &Hooks,
    request: &'a Request<Bytes>,
) -> ValidatedRequest<'a> {
    let mut validated = ValidatedRequest {
        request,
        operation: None,
        variant: None,
        parsed: ParsedRequest::default(),
        error: None,
    };
    if let Err(failure) = run(&mut validated, router, codec, hooks) {
        tracing::debug!(
            method = %request.method(),
            path = request.uri().path(),
            kind = %failure.kind,
            "request does not conform"
        );
        validated.error = Some(failure);
    }
    validated
}

fn run<'a>(
    validated: &mut ValidatedRequest<'a>,
    router: &'a Router,
    codec: &dyn ParameterCodec,
    hooks: &Hooks,
) -> Result<(), Failure> {
    let request = validated.request;
    let (operation, captures) = router.match_operation(request.method(), request.uri().path())?;
    validated.operation = Some(operation);

    let body = request.body();
    let content_type = header_text(request.headers());
    // an empty optional body negotiates as the no-body variant
    let negotiated = if body.is_empty() && !operation.body_required() {
        None
    } else {
        content_type.as_deref()
    };
    let variant = Router::select_variant(operation, negotiated)?;
    validated.variant = Some(variant);

    let parameters = &operation.parameters;
    let parsed = &mut validated.parsed;
    parsed.path = codec.decode_path(&parameters.path, &captures);
    parsed.query = codec.decode_query(&parameters.query, request.uri().query());
    parsed.headers = codec.decode_headers(&parameters.header, request.headers());
    parsed.cookies = codec.decode_cookies(&parameters.cookie, request.headers());

    let schema = variant.media.and_then(|m| m.schema.as_ref());
    if variant.media.is_some() && !body.is_empty() {
        let value = body::parse(content_type.as_deref(), body, schema)
            .map_err(|message| Failure::new(FailureKind::InvalidBody).with_message(message))?;
        parsed.body = Some(value);
    }

    validate_parameters(&parameters.query, &mut parsed.query, FailureKind::InvalidQuery, hooks)?;
    validate_parameters(&parameters.path, &mut parsed.path, FailureKind::InvalidPath, hooks)?;
    validate_parameters(&parameters.header, &mut parsed.headers, FailureKind::InvalidHeader, hooks)?;
    validate_parameters(&parameters.cookie, &mut parsed.cookies, FailureKind::InvalidCookie, hooks)?;

    if variant.media.is_none() {
        return Ok(());
    }
    let Some(value) = parsed.body.as_mut() else {
        if variant.body_required() {
            return Err(Failure::new(FailureKind::InvalidBody).with_message("Request body is required"));
        }
        return Ok(());
    };
    let Some(schema) = schema else {
        return Ok(());
    };
    if content_type.as_deref().is_some_and(content::is_multipart) {
        body::materialize_uploads(schema, value);
    }
    schema
        .validate(value)
        .map_err(|errors| Failure::new(FailureKind::InvalidBody).with_errors(errors))?;
    hooks.request_body_validated(schema, value);
    Ok(())
}

fn validate_parameters(
    collection: &ParameterCollection,
    values: &mut Map<String, Value>,
    kind: FailureKind,
    hooks: &Hooks,
) -> Result<(), Failure> {
    let Some(schema) = collection.schema() else {
        return Ok(());
    };
    let mut instance = Value::Object(std::mem::take(values));
    let result = schema.validate(&instance);
    if result.is_ok() {
        hooks.request_parameters_validated(collection.location(), schema, &mut instance);
    }
    if let Value::Object(map) = instance {
        *values = map;
    }
    result.map_err(|errors| Failure::new(kind).with_errors(errors))
}

/// `Content-Type` as text, if present and readable.
pub(crate) fn header_text(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
        .filter(|v| !v.is_empty())
}
