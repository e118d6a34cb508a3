//! apiconform-engine: OpenAPI contract loading and traffic validation
//!
//! Loads OpenAPI 3.0/3.1 documents (JSON or YAML, split across files),
//! routes concrete HTTP requests to declared operations, and validates
//! requests and responses against the compiled schemas. Coverage of the
//! declared variants is tracked through validation hooks.

mod body;
mod codec;
mod content;
mod coverage;
mod definition;
mod document;
mod handler;
mod hooks;
mod loader;
mod path_template;
mod request;
mod resolver;
mod response;
mod router;
mod schema;

pub use codec::{DefaultCodec, ParameterCodec};
pub use content::{essence, select as select_content_type};
pub use coverage::{install as install_coverage, plan as coverage_plan};
pub use definition::Definition;
pub use document::{
    Document, MediaType, OpenApiVersion, Operation, Parameter, ParameterCollection, ParameterLocation,
    Parameters, RequestBody, RequestVariant, ResponseDef, ResponseVariant,
};
pub use handler::HandlerTable;
pub use hooks::Hooks;
pub use loader::LoadError;
pub use path_template::PathTemplate;
pub use request::{ParsedRequest, ValidatedRequest};
pub use resolver::{escape_token, unescape_token};
pub use response::{ParsedResponse, ValidatedResponse};
pub use router::{RouteMatch, Router};
pub use schema::{AccessMode, CompiledSchema, PropertyRef};
