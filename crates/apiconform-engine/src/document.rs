//! Resolved contract model - operations, parameters, bodies, responses
//!
//! A [`Document`] is built once from the resolver and is immutable afterward:
//! every schema is compiled during load, so the document can be shared across
//! threads without locks.

use std::path::{Path, PathBuf};

use apiconform_core::{SchemaError, TaskKey};
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;

use crate::loader::{LoadError, parse_document, parse_str};
use crate::resolver::{Node, Resolver, SourceFile};
use crate::schema::{AccessMode, CompiledSchema, SchemaCompiler, deref};

/// HTTP methods an OpenAPI path item may declare, in declaration order.
const METHODS: [(&str, Method); 8] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
    ("patch", Method::PATCH),
    ("trace", Method::TRACE),
];

/// Header parameters that OpenAPI says must be ignored.
const IGNORED_HEADERS: [&str; 3] = ["accept", "content-type", "authorization"];

/// Supported contract dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiVersion {
    /// OpenAPI 3.0.x, JSON Schema Draft 4 with `nullable`
    V30,
    /// OpenAPI 3.1.x, JSON Schema Draft 2020-12
    V31,
}

impl OpenApiVersion {
    fn detect(root: &Value) -> Result<Self, LoadError> {
        let field = |key: &str| match root.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(version) = field("openapi") {
            if version.starts_with("3.0") {
                return Ok(Self::V30);
            }
            if version.starts_with("3.1") {
                return Ok(Self::V31);
            }
            return Err(LoadError::UnsupportedVersion(version));
        }
        match field("swagger") {
            Some(version) => Err(LoadError::UnsupportedVersion(format!("swagger {version}"))),
            None => Err(LoadError::UnsupportedVersion(
                "no `openapi` version field".to_string(),
            )),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V30 => "3.0",
            Self::V31 => "3.1",
        }
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Declared name; header names are lower-cased
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: Option<String>,
    pub explode: Option<bool>,
    /// Media type when declared with `content` instead of `schema`
    pub content_type: Option<String>,
    /// `pattern` of the parameter's schema, used to tighten path captures
    pub pattern: Option<String>,
}

impl Parameter {
    /// Effective serialization style with the OpenAPI defaults.
    #[must_use]
    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or(match self.location {
            ParameterLocation::Query | ParameterLocation::Cookie => "form",
            ParameterLocation::Path | ParameterLocation::Header => "simple",
        })
    }

    /// Effective `explode`: true only for `form` by default.
    #[must_use]
    pub fn explode(&self) -> bool {
        self.explode.unwrap_or_else(|| self.style() == "form")
    }
}

/// Parameters sharing a location on one operation, validated as one object.
#[derive(Debug, Clone)]
pub struct ParameterCollection {
    location: ParameterLocation,
    parameters: Vec<Parameter>,
    schema: Option<CompiledSchema>,
}

impl ParameterCollection {
    fn empty(location: ParameterLocation) -> Self {
        Self {
            location,
            parameters: Vec::new(),
            schema: None,
        }
    }

    #[must_use]
    pub const fn location(&self) -> ParameterLocation {
        self.location
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Composite object schema, `None` when no parameter is declared.
    #[must_use]
    pub const fn schema(&self) -> Option<&CompiledSchema> {
        self.schema.as_ref()
    }

    /// Schema of one parameter inside the composite, local references followed.
    #[must_use]
    pub fn property_schema(&self, name: &str) -> Option<&Value> {
        let root = self.schema.as_ref()?.schema();
        let property = root.get("properties")?.get(name)?;
        Some(deref(root, property))
    }

    /// Follow local references inside the composite schema.
    #[must_use]
    pub fn resolve_local<'a>(&'a self, schema: &'a Value) -> &'a Value {
        match &self.schema {
            Some(compiled) => deref(compiled.schema(), schema),
            None => schema,
        }
    }

    /// Validate decoded values.
    ///
    /// # Errors
    ///
    /// Returns the schema violations if the values do not conform.
    pub fn validate(&self, values: &Value) -> Result<(), Vec<SchemaError>> {
        match &self.schema {
            Some(schema) => schema.validate(values),
            None => Ok(()),
        }
    }
}

/// Parameters of an operation partitioned by location.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub query: ParameterCollection,
    pub path: ParameterCollection,
    pub header: ParameterCollection,
    pub cookie: ParameterCollection,
}

impl Parameters {
    #[must_use]
    pub const fn get(&self, location: ParameterLocation) -> &ParameterCollection {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Path => &self.path,
            ParameterLocation::Header => &self.header,
            ParameterLocation::Cookie => &self.cookie,
        }
    }
}

/// One declared content type with its schema.
#[derive(Debug, Clone)]
pub struct MediaType {
    /// Declared content-type key, as written
    pub content_type: String,
    pub schema: Option<CompiledSchema>,
}

#[derive(Debug, Clone)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

/// One declared response status.
#[derive(Debug, Clone)]
pub struct ResponseDef {
    /// Declared status key: `200`, `4XX`, `default`
    pub status: String,
    pub headers: ParameterCollection,
    /// `None` when the response declares no `content`
    pub content: Option<IndexMap<String, MediaType>>,
}

/// One (path, method) of the contract.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Path template as declared
    pub path: String,
    pub method: Method,
    pub operation_id: Option<String>,
    pub parameters: Parameters,
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, ResponseDef>,
}

impl Operation {
    /// `METHOD path` label used in messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    #[must_use]
    pub fn body_required(&self) -> bool {
        self.request_body.as_ref().is_some_and(|b| b.required)
    }

    /// Every request shape: one per declared content type, plus the no-body
    /// variant unless the body is required.
    #[must_use]
    pub fn request_variants(&self) -> Vec<RequestVariant<'_>> {
        let mut variants: Vec<RequestVariant<'_>> = self
            .request_body
            .iter()
            .flat_map(|body| body.content.values())
            .map(|media| RequestVariant {
                operation: self,
                media: Some(media),
            })
            .collect();
        if !self.body_required() {
            variants.push(RequestVariant::no_body(self));
        }
        variants
    }

    /// Every response shape: one per status × declared content type, or the
    /// no-content variant for a response without `content`.
    #[must_use]
    pub fn response_variants(&self) -> Vec<ResponseVariant<'_>> {
        let mut variants = Vec::new();
        for response in self.responses.values() {
            match &response.content {
                Some(content) if !content.is_empty() => {
                    variants.extend(content.values().map(|media| ResponseVariant {
                        operation: self,
                        response,
                        media: Some(media),
                    }));
                }
                _ => variants.push(ResponseVariant {
                    operation: self,
                    response,
                    media: None,
                }),
            }
        }
        variants
    }

    /// Declared response for a concrete status: exact key, then range key
    /// (`2XX`), then `default`.
    #[must_use]
    pub fn find_response(&self, status: u16) -> Option<&ResponseDef> {
        let exact = status.to_string();
        if let Some(response) = self.responses.get(&exact) {
            return Some(response);
        }
        let range = format!("{}XX", status / 100);
        self.responses
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&range))
            .map(|(_, response)| response)
            .or_else(|| self.responses.get("default"))
    }
}

/// One operation × one request content type, or the no-body variant.
#[derive(Debug, Clone, Copy)]
pub struct RequestVariant<'d> {
    pub operation: &'d Operation,
    /// `None` for the no-body variant
    pub media: Option<&'d MediaType>,
}

impl<'d> RequestVariant<'d> {
    #[must_use]
    pub const fn no_body(operation: &'d Operation) -> Self {
        Self {
            operation,
            media: None,
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&'d str> {
        self.media.map(|m| m.content_type.as_str())
    }

    #[must_use]
    pub fn body_required(&self) -> bool {
        self.operation.body_required()
    }

    /// Coverage identity of this variant.
    #[must_use]
    pub fn task_key(&self) -> TaskKey {
        TaskKey::request(
            self.operation.path.clone(),
            self.operation.method.as_str(),
            self.content_type(),
        )
    }
}

/// One operation × status × response content type, or the no-content variant.
#[derive(Debug, Clone, Copy)]
pub struct ResponseVariant<'d> {
    pub operation: &'d Operation,
    pub response: &'d ResponseDef,
    /// `None` for the no-content variant
    pub media: Option<&'d MediaType>,
}

impl<'d> ResponseVariant<'d> {
    #[must_use]
    pub fn content_type(&self) -> Option<&'d str> {
        self.media.map(|m| m.content_type.as_str())
    }

    #[must_use]
    pub fn status(&self) -> &'d str {
        &self.response.status
    }

    #[must_use]
    pub fn task_key(&self) -> TaskKey {
        TaskKey::response(
            self.operation.path.clone(),
            self.operation.method.as_str(),
            self.response.status.clone(),
            self.content_type(),
        )
    }
}

/// A fully resolved contract.
#[derive(Debug)]
pub struct Document {
    id: String,
    version: OpenApiVersion,
    operations: Vec<Operation>,
    files: Vec<PathBuf>,
}

impl Document {
    /// Load a contract file and everything it references.
    ///
    /// # Errors
    ///
    /// Returns error if the file or a referenced file cannot be read or
    /// parsed, a reference is broken, or the contract is not OpenAPI 3.x.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let io_err = |e: std::io::Error| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let content = std::fs::read_to_string(path).map_err(io_err)?;
        let canonical = path.canonicalize().map_err(io_err)?;
        let root = parse_document(path, &content)?;
        Self::build(path.display().to_string(), Some(canonical), root)
    }

    /// Parse contract text held in memory. Relative file references resolve
    /// against the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be parsed or the contract is invalid.
    pub fn parse(content: &str) -> Result<Self, LoadError> {
        let root = parse_str(content).map_err(|message| LoadError::Parse {
            file: "<inline>".to_string(),
            message,
        })?;
        Self::from_value(root)
    }

    /// Build from an already parsed contract.
    ///
    /// # Errors
    ///
    /// Returns error if a reference is broken or the contract is invalid.
    pub fn from_value(root: Value) -> Result<Self, LoadError> {
        Self::build("<inline>".to_string(), None, root)
    }

    fn build(id: String, path: Option<PathBuf>, root: Value) -> Result<Self, LoadError> {
        let version = OpenApiVersion::detect(&root)?;
        let resolver = Resolver::new(SourceFile { path, root });
        let compiler = SchemaCompiler::new(&resolver, version);

        let root = resolver.root()?;
        let paths = root
            .get("paths")?
            .filter(|p| p.value().is_object())
            .ok_or(LoadError::MissingPaths)?;

        let mut operations = Vec::new();
        for (path, item) in paths.entries()? {
            let shared = parse_parameters(item.get("parameters")?.as_ref())?;
            for (key, method) in &METHODS {
                let Some(node) = item.get(key)? else {
                    continue;
                };
                operations.push(build_operation(&compiler, &path, method.clone(), &node, &shared)?);
            }
        }

        let files = resolver.file_paths();
        tracing::debug!(
            document = %id,
            version = version.as_str(),
            operations = operations.len(),
            files = resolver.file_count(),
            "loaded document"
        );

        Ok(Self {
            id,
            version,
            operations,
            files,
        })
    }

    /// Identifier used for coverage: the path as given, or `<inline>`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn version(&self) -> OpenApiVersion {
        self.version
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Canonical paths of every file the contract was loaded from.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Operation by declared path template and method.
    #[must_use]
    pub fn operation(&self, method: &Method, path: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| &op.method == method && op.path == path)
    }

    #[must_use]
    pub fn operation_by_id(&self, operation_id: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.operation_id.as_deref() == Some(operation_id))
    }
}

/// A parameter before compilation: metadata plus its schema node.
struct RawParameter<'r> {
    parameter: Parameter,
    schema: Option<Node<'r>>,
}

fn parse_parameters<'r>(list: Option<&Node<'r>>) -> Result<Vec<RawParameter<'r>>, LoadError> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let mut parameters = Vec::new();
    for node in list.items()? {
        let (Some(name), Some(location)) = (node.str_field("name"), node.str_field("in")) else {
            tracing::warn!(pointer = node.pointer(), "parameter without name or location skipped");
            continue;
        };
        let Some(location) = ParameterLocation::parse(location) else {
            tracing::warn!(name, location, "unknown parameter location skipped");
            continue;
        };

        let (schema, content_type) = match node.child("schema") {
            Some(schema) => (Some(schema), None),
            None => match node.get("content")? {
                Some(content) => match content.entries()?.into_iter().next() {
                    Some((media, media_node)) => (media_node.child("schema"), Some(media)),
                    None => (None, None),
                },
                None => (None, None),
            },
        };
        let pattern = match &schema {
            Some(schema) => schema.resolve()?.str_field("pattern").map(str::to_string),
            None => None,
        };

        let name = match location {
            ParameterLocation::Header => name.to_ascii_lowercase(),
            _ => name.to_string(),
        };
        parameters.push(RawParameter {
            parameter: Parameter {
                name,
                location,
                required: location == ParameterLocation::Path || node.flag("required"),
                style: node.str_field("style").map(str::to_string),
                explode: node.value().get("explode").and_then(Value::as_bool),
                content_type,
                pattern,
            },
            schema,
        });
    }
    Ok(parameters)
}

fn compile_collection<'r>(
    compiler: &SchemaCompiler<'r>,
    location: ParameterLocation,
    parameters: Vec<RawParameter<'r>>,
    mode: AccessMode,
) -> Result<ParameterCollection, LoadError> {
    if parameters.is_empty() {
        return Ok(ParameterCollection::empty(location));
    }

    let properties: Vec<(String, Node<'r>)> = parameters
        .iter()
        .filter_map(|p| p.schema.clone().map(|s| (p.parameter.name.clone(), s)))
        .collect();
    let required: Vec<String> = parameters
        .iter()
        .filter(|p| p.parameter.required)
        .map(|p| p.parameter.name.clone())
        .collect();

    let schema = compiler.compile_object(&properties, &required, mode)?;
    Ok(ParameterCollection {
        location,
        parameters: parameters.into_iter().map(|p| p.parameter).collect(),
        schema: Some(schema),
    })
}

fn build_operation<'r>(
    compiler: &SchemaCompiler<'r>,
    path: &str,
    method: Method,
    node: &Node<'r>,
    shared: &[RawParameter<'r>],
) -> Result<Operation, LoadError> {
    let own = parse_parameters(node.get("parameters")?.as_ref())?;

    // operation-level parameters override path-item ones on (name, location)
    let mut merged: Vec<RawParameter<'r>> = shared
        .iter()
        .filter(|s| {
            !own.iter().any(|o| {
                o.parameter.name == s.parameter.name && o.parameter.location == s.parameter.location
            })
        })
        .map(|s| RawParameter {
            parameter: s.parameter.clone(),
            schema: s.schema.clone(),
        })
        .collect();
    merged.extend(own);

    let mut by_location: IndexMap<ParameterLocation, Vec<RawParameter<'r>>> = IndexMap::new();
    for raw in merged {
        if raw.parameter.location == ParameterLocation::Header
            && IGNORED_HEADERS.contains(&raw.parameter.name.as_str())
        {
            tracing::debug!(name = %raw.parameter.name, "ignoring reserved header parameter");
            continue;
        }
        by_location.entry(raw.parameter.location).or_default().push(raw);
    }
    let mut take = |location: ParameterLocation| {
        let raw = by_location.shift_remove(&location).unwrap_or_default();
        compile_collection(compiler, location, raw, AccessMode::Write)
    };
    let parameters = Parameters {
        query: take(ParameterLocation::Query)?,
        path: take(ParameterLocation::Path)?,
        header: take(ParameterLocation::Header)?,
        cookie: take(ParameterLocation::Cookie)?,
    };

    let request_body = match node.get("requestBody")? {
        Some(body) => Some(RequestBody {
            required: body.flag("required"),
            content: compile_content(compiler, body.get("content")?.as_ref(), AccessMode::Write)?,
        }),
        None => None,
    };

    let mut responses = IndexMap::new();
    if let Some(declared) = node.get("responses")? {
        for (status, response) in declared.entries()? {
            if !is_status_key(&status) {
                tracing::warn!(
                    operation = %format!("{method} {path}"),
                    status = %status,
                    "malformed response status key skipped"
                );
                continue;
            }
            let headers = compile_response_headers(compiler, response.get("headers")?.as_ref())?;
            let content = match response.get("content")? {
                Some(content) => Some(compile_content(compiler, Some(&content), AccessMode::Read)?),
                None => None,
            };
            responses.insert(
                status.clone(),
                ResponseDef {
                    status,
                    headers,
                    content,
                },
            );
        }
    }

    Ok(Operation {
        path: path.to_string(),
        method,
        operation_id: node.str_field("operationId").map(str::to_string),
        parameters,
        request_body,
        responses,
    })
}

fn compile_content<'r>(
    compiler: &SchemaCompiler<'r>,
    content: Option<&Node<'r>>,
    mode: AccessMode,
) -> Result<IndexMap<String, MediaType>, LoadError> {
    let mut out = IndexMap::new();
    let Some(content) = content else {
        return Ok(out);
    };
    for (content_type, media) in content.entries()? {
        let schema = match media.child("schema") {
            Some(schema) => Some(compiler.compile(&schema, mode)?),
            None => None,
        };
        out.insert(
            content_type.clone(),
            MediaType {
                content_type,
                schema,
            },
        );
    }
    Ok(out)
}

fn compile_response_headers<'r>(
    compiler: &SchemaCompiler<'r>,
    headers: Option<&Node<'r>>,
) -> Result<ParameterCollection, LoadError> {
    let Some(headers) = headers else {
        return Ok(ParameterCollection::empty(ParameterLocation::Header));
    };
    let mut raw = Vec::new();
    for (name, header) in headers.entries()? {
        let name = name.to_ascii_lowercase();
        if name == "content-type" {
            continue;
        }
        raw.push(RawParameter {
            parameter: Parameter {
                name,
                location: ParameterLocation::Header,
                required: header.flag("required"),
                style: header.str_field("style").map(str::to_string),
                explode: header.value().get("explode").and_then(Value::as_bool),
                content_type: None,
                pattern: None,
            },
            schema: header.child("schema"),
        });
    }
    compile_collection(compiler, ParameterLocation::Header, raw, AccessMode::Read)
}

/// `default`, a three-digit status, or a range like `4XX`.
fn is_status_key(key: &str) -> bool {
    if key == "default" {
        return true;
    }
    let bytes = key.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && (bytes[1..].iter().all(u8::is_ascii_digit) || bytes[1..].eq_ignore_ascii_case(b"xx"))
}
