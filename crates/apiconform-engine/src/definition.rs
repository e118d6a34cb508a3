//! Loaded contract plus the validation entry points a host application calls

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use apiconform_core::{Config, ErrorResponse, Failure, Plan, Tracker, render};
use bytes::Bytes;
use http::{Request, Response};

use crate::codec::{DefaultCodec, ParameterCodec};
use crate::coverage;
use crate::document::Document;
use crate::hooks::Hooks;
use crate::loader::LoadError;
use crate::request::{self, ValidatedRequest};
use crate::response::{self, ValidatedResponse};
use crate::router::Router;

/// A contract ready to validate traffic.
///
/// Immutable after setup and safe to share across threads behind an `Arc`.
pub struct Definition {
    router: Router,
    config: Config,
    codec: Box<dyn ParameterCodec>,
    hooks: Hooks,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("document", &self.router.document().id())
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Definition {
    /// Load `config.document` and configure validation from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be loaded.
    pub fn load(config: Config) -> Result<Self, LoadError> {
        let document = Document::load(&config.document)?;
        Ok(Self::new(document, config))
    }

    /// Load a document with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be loaded.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let config = Config {
            document: path.to_path_buf(),
            ..Config::default()
        };
        Self::load(config)
    }

    #[must_use]
    pub fn new(document: Document, config: Config) -> Self {
        Self::from_shared(Arc::new(document), config)
    }

    /// Validate against a document shared with other definitions.
    #[must_use]
    pub fn from_shared(document: Arc<Document>, config: Config) -> Self {
        let router = Router::new(document, config.path_parameter_patterns);
        Self {
            router,
            config,
            codec: Box::new(DefaultCodec),
            hooks: Hooks::default(),
        }
    }

    /// Replace the parameter codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl ParameterCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Track coverage of this document's variants through `tracker`.
    pub fn track_coverage(&mut self, tracker: Arc<dyn Tracker>) {
        let id = self.router.document().id().to_string();
        coverage::install(&mut self.hooks, id, tracker);
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        self.router.document()
    }

    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Coverage plan for this document under the configured skips.
    #[must_use]
    pub fn plan(&self) -> Plan {
        coverage::plan(self.document(), &self.config.coverage)
    }

    /// Validate a request. Never fails; inspect [`ValidatedRequest::error`].
    pub fn validate_request<'a>(&'a self, request: &'a Request<Bytes>) -> ValidatedRequest<'a> {
        let validated = request::validate(&self.router, self.codec.as_ref(), &self.hooks, request);
        self.hooks.request_validated(&validated);
        validated
    }

    /// Validate a request, returning the failure as an error.
    ///
    /// # Errors
    ///
    /// Returns the failure if the request does not conform.
    pub fn validate_request_or_raise<'a>(
        &'a self,
        request: &'a Request<Bytes>,
    ) -> Result<ValidatedRequest<'a>, Failure> {
        self.validate_request(request).into_result()
    }

    /// Validate a request, raising only when `raise_request_errors` is set.
    ///
    /// # Errors
    ///
    /// Returns the failure if the request does not conform and raising is
    /// configured.
    pub fn check_request<'a>(
        &'a self,
        request: &'a Request<Bytes>,
    ) -> Result<ValidatedRequest<'a>, Failure> {
        let validated = self.validate_request(request);
        if self.config.raise_request_errors {
            validated.into_result()
        } else {
            Ok(validated)
        }
    }

    /// Validate a response against the operation `request` routes to.
    pub fn validate_response<'a>(
        &'a self,
        request: &'a Request<Bytes>,
        response: &'a Response<Bytes>,
    ) -> ValidatedResponse<'a> {
        let operation = self
            .router
            .match_operation(request.method(), request.uri().path())
            .map(|(operation, _)| operation);
        let validated = response::validate(operation, self.codec.as_ref(), &self.hooks, request, response);
        self.hooks.response_validated(&validated);
        validated
    }

    /// # Errors
    ///
    /// Returns the failure if the response does not conform.
    pub fn validate_response_or_raise<'a>(
        &'a self,
        request: &'a Request<Bytes>,
        response: &'a Response<Bytes>,
    ) -> Result<ValidatedResponse<'a>, Failure> {
        self.validate_response(request, response).into_result()
    }

    /// Validate a response, raising only when `raise_response_errors` is set.
    ///
    /// # Errors
    ///
    /// Returns the failure if the response does not conform and raising is
    /// configured.
    pub fn check_response<'a>(
        &'a self,
        request: &'a Request<Bytes>,
        response: &'a Response<Bytes>,
    ) -> Result<ValidatedResponse<'a>, Failure> {
        let validated = self.validate_response(request, response);
        if self.config.raise_response_errors {
            validated.into_result()
        } else {
            Ok(validated)
        }
    }

    /// Render a failure in the configured error format.
    #[must_use]
    pub fn render_error(&self, failure: &Failure) -> ErrorResponse {
        render(failure, self.config.error_format)
    }
}
