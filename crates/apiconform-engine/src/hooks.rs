//! Observation points around validation
//!
//! Hooks run synchronously on the validating thread. Whole-request and
//! whole-response hooks see every outcome, valid or not. Property hooks run
//! only after their schema validated successfully and may rewrite the value
//! in place, parent properties before children.

use std::fmt;

use serde_json::Value;

use crate::document::ParameterLocation;
use crate::request::ValidatedRequest;
use crate::response::ValidatedResponse;
use crate::schema::{CompiledSchema, PropertyRef};

type RequestHook = Box<dyn Fn(&ValidatedRequest<'_>) + Send + Sync>;
type ResponseHook = Box<dyn Fn(&ValidatedResponse<'_>) + Send + Sync>;
type ParameterPropertyHook = Box<dyn Fn(ParameterLocation, &PropertyRef<'_>, &mut Value) + Send + Sync>;
type BodyPropertyHook = Box<dyn Fn(&PropertyRef<'_>, &mut Value) + Send + Sync>;

/// Registered hooks, called in registration order.
#[derive(Default)]
pub struct Hooks {
    after_request_validation: Vec<RequestHook>,
    after_response_validation: Vec<ResponseHook>,
    after_request_parameter_property_validation: Vec<ParameterPropertyHook>,
    after_request_body_property_validation: Vec<BodyPropertyHook>,
    after_response_body_property_validation: Vec<BodyPropertyHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("after_request_validation", &self.after_request_validation.len())
            .field("after_response_validation", &self.after_response_validation.len())
            .field(
                "after_request_parameter_property_validation",
                &self.after_request_parameter_property_validation.len(),
            )
            .field(
                "after_request_body_property_validation",
                &self.after_request_body_property_validation.len(),
            )
            .field(
                "after_response_body_property_validation",
                &self.after_response_body_property_validation.len(),
            )
            .finish()
    }
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with every validated request.
    pub fn after_request_validation(
        &mut self,
        hook: impl Fn(&ValidatedRequest<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_request_validation.push(Box::new(hook));
        self
    }

    /// Called with every validated response.
    pub fn after_response_validation(
        &mut self,
        hook: impl Fn(&ValidatedResponse<'_>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_response_validation.push(Box::new(hook));
        self
    }

    /// Called for each declared parameter of a valid parameter group.
    pub fn after_request_parameter_property_validation(
        &mut self,
        hook: impl Fn(ParameterLocation, &PropertyRef<'_>, &mut Value) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_request_parameter_property_validation.push(Box::new(hook));
        self
    }

    /// Called for each declared property of a valid request body.
    pub fn after_request_body_property_validation(
        &mut self,
        hook: impl Fn(&PropertyRef<'_>, &mut Value) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_request_body_property_validation.push(Box::new(hook));
        self
    }

    /// Called for each declared property of a valid response body.
    pub fn after_response_body_property_validation(
        &mut self,
        hook: impl Fn(&PropertyRef<'_>, &mut Value) + Send + Sync + 'static,
    ) -> &mut Self {
        self.after_response_body_property_validation.push(Box::new(hook));
        self
    }

    pub(crate) fn request_validated(&self, request: &ValidatedRequest<'_>) {
        for hook in &self.after_request_validation {
            hook(request);
        }
    }

    pub(crate) fn response_validated(&self, response: &ValidatedResponse<'_>) {
        for hook in &self.after_response_validation {
            hook(response);
        }
    }

    pub(crate) fn request_parameters_validated(
        &self,
        location: ParameterLocation,
        schema: &CompiledSchema,
        values: &mut Value,
    ) {
        if self.after_request_parameter_property_validation.is_empty() {
            return;
        }
        schema.visit_properties(values, &mut |property: &PropertyRef<'_>, value: &mut Value| {
            for hook in &self.after_request_parameter_property_validation {
                hook(location, property, value);
            }
        });
    }

    pub(crate) fn request_body_validated(&self, schema: &CompiledSchema, body: &mut Value) {
        visit_body(&self.after_request_body_property_validation, schema, body);
    }

    pub(crate) fn response_body_validated(&self, schema: &CompiledSchema, body: &mut Value) {
        visit_body(&self.after_response_body_property_validation, schema, body);
    }
}

fn visit_body(hooks: &[BodyPropertyHook], schema: &CompiledSchema, body: &mut Value) {
    if hooks.is_empty() {
        return;
    }
    schema.visit_properties(body, &mut |property: &PropertyRef<'_>, value: &mut Value| {
        for hook in hooks {
            hook(property, value);
        }
    });
}
