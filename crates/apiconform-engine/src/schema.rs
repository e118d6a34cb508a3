//! Schema compilation - contract schemas → self-contained validators
//!
//! The compiler bundles each schema: every `$ref` target reachable from it is
//! copied once into a local definitions table and the reference is rewritten
//! to point there, so cycles survive as local references. While copying it
//! applies the access mode (`readOnly`/`writeOnly`) and, for OpenAPI 3.0,
//! turns `nullable` into a type union.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use apiconform_core::SchemaError;
use jsonschema::{Draft, Keyword, ValidationError, Validator};
use serde_json::{Map, Value, json};

use crate::document::OpenApiVersion;
use crate::loader::LoadError;
use crate::resolver::{FileId, Node, Resolver, escape_token, unescape_token};

/// Direction a schema is validated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Requests: `readOnly` properties are forbidden and never required
    Write,
    /// Responses: `writeOnly` properties are forbidden and never required
    Read,
}

impl AccessMode {
    const fn forbidden_keyword(self) -> &'static str {
        match self {
            Self::Write => "readOnly",
            Self::Read => "writeOnly",
        }
    }
}

/// A bundled schema with its validator.
#[derive(Clone)]
pub struct CompiledSchema {
    schema: Arc<Value>,
    validator: Arc<Validator>,
    mode: AccessMode,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Build a validator for an already self-contained schema.
    ///
    /// # Errors
    ///
    /// Returns the validation engine's message if the schema is invalid.
    pub fn build(schema: Value, version: OpenApiVersion, mode: AccessMode) -> Result<Self, String> {
        let draft = match version {
            OpenApiVersion::V30 => Draft::Draft4,
            OpenApiVersion::V31 => Draft::Draft202012,
        };
        let validator = jsonschema::options()
            .with_draft(draft)
            .should_validate_formats(true)
            .with_keyword("readOnly", move |_, value, _| {
                access_rule(value, mode == AccessMode::Write, "is read-only")
            })
            .with_keyword("writeOnly", move |_, value, _| {
                access_rule(value, mode == AccessMode::Read, "is write-only")
            })
            .build(&schema)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            schema: Arc::new(schema),
            validator: Arc::new(validator),
            mode,
        })
    }

    /// The bundled schema document.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    #[must_use]
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate an instance, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the violations if the instance does not conform.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<SchemaError>> {
        let errors: Vec<SchemaError> = self
            .validator
            .iter_errors(instance)
            .map(|e| schema_error(&e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Walk the properties of `instance` that the schema declares, parent
    /// before child, handing each to `visitor` for inspection or in-place
    /// replacement.
    pub fn visit_properties(
        &self,
        instance: &mut Value,
        visitor: &mut dyn FnMut(&PropertyRef<'_>, &mut Value),
    ) {
        visit(&self.schema, &self.schema, instance, "", visitor, 0);
    }
}

/// A declared property reached by [`CompiledSchema::visit_properties`].
#[derive(Debug, Clone, Copy)]
pub struct PropertyRef<'a> {
    /// Property name
    pub name: &'a str,
    /// Pointer of the parent object in the instance
    pub parent_pointer: &'a str,
    /// The property's schema, local references followed
    pub schema: &'a Value,
}

const MAX_VISIT_DEPTH: usize = 64;

pub(crate) fn deref<'a>(root: &'a Value, schema: &'a Value) -> &'a Value {
    let mut current = schema;
    for _ in 0..MAX_VISIT_DEPTH {
        match current.get("$ref").and_then(Value::as_str) {
            Some(reference) if reference.starts_with('#') => {
                match root.pointer(&reference[1..]) {
                    Some(target) => current = target,
                    None => return current,
                }
            }
            _ => return current,
        }
    }
    current
}

fn visit(
    root: &Value,
    schema: &Value,
    instance: &mut Value,
    pointer: &str,
    visitor: &mut dyn FnMut(&PropertyRef<'_>, &mut Value),
    depth: usize,
) {
    if depth > MAX_VISIT_DEPTH {
        return;
    }
    let schema = deref(root, schema);

    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(members) = schema.get(keyword).and_then(Value::as_array) {
            for member in members {
                visit(root, member, instance, pointer, visitor, depth + 1);
            }
        }
    }

    match instance {
        Value::Object(object) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (name, property_schema) in properties {
                let Some(value) = object.get_mut(name) else {
                    continue;
                };
                let property_schema = deref(root, property_schema);
                visitor(
                    &PropertyRef {
                        name,
                        parent_pointer: pointer,
                        schema: property_schema,
                    },
                    value,
                );
                let child_pointer = format!("{pointer}/{}", escape_token(name));
                visit(root, property_schema, value, &child_pointer, visitor, depth + 1);
            }
        }
        Value::Array(items) => {
            let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) else {
                return;
            };
            for (index, item) in items.iter_mut().enumerate() {
                let child_pointer = format!("{pointer}/{index}");
                visit(root, item_schema, item, &child_pointer, visitor, depth + 1);
            }
        }
        _ => {}
    }
}

/// Custom keyword enforcing `readOnly` / `writeOnly` for the current mode.
struct AccessRule {
    forbidden: bool,
    message: &'static str,
}

impl Keyword for AccessRule {
    fn validate<'i>(&self, _instance: &'i Value) -> Result<(), ValidationError<'i>> {
        if self.forbidden {
            Err(ValidationError::custom(self.message))
        } else {
            Ok(())
        }
    }

    fn is_valid(&self, _instance: &Value) -> bool {
        !self.forbidden
    }
}

fn access_rule<'a>(
    value: &'a Value,
    applies: bool,
    message: &'static str,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    Ok(Box::new(AccessRule {
        forbidden: applies && value.as_bool() == Some(true),
        message,
    }))
}

fn schema_error(error: &ValidationError<'_>) -> SchemaError {
    let mut pointer = error.instance_path().to_string();
    if let jsonschema::error::ValidationErrorKind::Required { property } = error.kind() {
        if let Some(name) = property.as_str() {
            pointer = format!("{pointer}/{}", escape_token(name));
        }
    }
    SchemaError::new(
        pointer,
        error.schema_path().to_string(),
        error.kind().keyword(),
        error.to_string(),
    )
}

/// Compiles contract schemas reached through the resolver.
pub struct SchemaCompiler<'r> {
    resolver: &'r Resolver,
    version: OpenApiVersion,
}

impl<'r> SchemaCompiler<'r> {
    #[must_use]
    pub const fn new(resolver: &'r Resolver, version: OpenApiVersion) -> Self {
        Self { resolver, version }
    }

    /// Compile the schema at `node`.
    ///
    /// # Errors
    ///
    /// Returns error on a broken reference or a schema the engine rejects.
    pub fn compile(&self, node: &Node<'r>, mode: AccessMode) -> Result<CompiledSchema, LoadError> {
        let mut bundle = Bundle::new(self.resolver, self.version, mode);
        let root = bundle.walk(node)?;
        let schema = bundle.finish(root)?;
        self.build(schema, node, mode)
    }

    /// Compile a synthesized object schema whose properties are contract
    /// schemas, e.g. one parameter group.
    ///
    /// # Errors
    ///
    /// Returns error on a broken reference or a schema the engine rejects.
    pub fn compile_object(
        &self,
        properties: &[(String, Node<'r>)],
        required: &[String],
        mode: AccessMode,
    ) -> Result<CompiledSchema, LoadError> {
        let mut bundle = Bundle::new(self.resolver, self.version, mode);
        let mut props = Map::new();
        for (name, node) in properties {
            props.insert(name.clone(), bundle.walk(node)?);
        }
        let mut object = json!({ "type": "object", "properties": props });
        if !required.is_empty() {
            object["required"] = json!(required);
        }
        let schema = bundle.finish(object)?;

        let context = properties.first().map(|(_, n)| n.clone());
        match context {
            Some(node) => self.build(schema, &node, mode),
            None => CompiledSchema::build(schema, self.version, mode).map_err(|message| {
                LoadError::InvalidSchema {
                    file: "<synthesized>".into(),
                    pointer: String::new(),
                    message,
                }
            }),
        }
    }

    fn build(&self, schema: Value, node: &Node<'r>, mode: AccessMode) -> Result<CompiledSchema, LoadError> {
        CompiledSchema::build(schema, self.version, mode).map_err(|message| LoadError::InvalidSchema {
            file: node.file_label(),
            pointer: node.pointer().to_string(),
            message,
        })
    }
}

/// Keywords whose value is a map of name → schema.
const SCHEMA_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
];

/// Keywords whose value is a single schema.
const SCHEMA_VALUES: &[&str] = &[
    "additionalProperties",
    "additionalItems",
    "not",
    "contains",
    "if",
    "then",
    "else",
    "propertyNames",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contentSchema",
];

/// Keywords whose value is a list of schemas.
const SCHEMA_LISTS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// One bundling pass.
struct Bundle<'r> {
    resolver: &'r Resolver,
    version: OpenApiVersion,
    mode: AccessMode,
    defs: Map<String, Value>,
    names: HashMap<(FileId, String), String>,
    taken: HashSet<String>,
    pending: Vec<(Node<'r>, String)>,
}

impl<'r> Bundle<'r> {
    fn new(resolver: &'r Resolver, version: OpenApiVersion, mode: AccessMode) -> Self {
        Self {
            resolver,
            version,
            mode,
            defs: Map::new(),
            names: HashMap::new(),
            taken: HashSet::new(),
            pending: Vec::new(),
        }
    }

    const fn defs_keyword(&self) -> &'static str {
        match self.version {
            OpenApiVersion::V30 => "definitions",
            OpenApiVersion::V31 => "$defs",
        }
    }

    /// Copy the schema at `node`, rewriting references to local definitions.
    fn walk(&mut self, node: &Node<'r>) -> Result<Value, LoadError> {
        let Value::Object(map) = node.value() else {
            return Ok(node.value().clone());
        };

        if node.reference().is_some() {
            let target = node.resolve()?;
            let name = self.definition_name(&target);
            return Ok(json!({ "$ref": format!("#/{}/{name}", self.defs_keyword()) }));
        }

        let mut out = Map::new();
        for (key, raw) in map {
            let Some(child) = node.child(key) else {
                continue;
            };
            let value = if SCHEMA_MAPS.contains(&key.as_str()) {
                self.walk_map(&child)?
            } else if SCHEMA_LISTS.contains(&key.as_str()) || (key == "items" && raw.is_array()) {
                self.walk_list(&child)?
            } else if SCHEMA_VALUES.contains(&key.as_str()) || key == "items" {
                self.walk(&child)?
            } else if key == "nullable" && self.version == OpenApiVersion::V30 {
                continue;
            } else {
                raw.clone()
            };
            out.insert(key.clone(), value);
        }

        self.strip_forbidden_required(node, &mut out)?;

        if self.version == OpenApiVersion::V30 && map.get("nullable") == Some(&Value::Bool(true)) {
            return Ok(make_nullable(out));
        }
        Ok(Value::Object(out))
    }

    fn walk_map(&mut self, node: &Node<'r>) -> Result<Value, LoadError> {
        let Some(map) = node.value().as_object() else {
            return Ok(node.value().clone());
        };
        let mut out = Map::new();
        for key in map.keys() {
            if let Some(child) = node.child(key) {
                out.insert(key.clone(), self.walk(&child)?);
            }
        }
        Ok(Value::Object(out))
    }

    fn walk_list(&mut self, node: &Node<'r>) -> Result<Value, LoadError> {
        let len = node.value().as_array().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(child) = node.child(&index.to_string()) {
                out.push(self.walk(&child)?);
            }
        }
        Ok(Value::Array(out))
    }

    /// Drop properties that are forbidden in this mode from `required`.
    fn strip_forbidden_required(&self, node: &Node<'r>, out: &mut Map<String, Value>) -> Result<(), LoadError> {
        let Some(required) = out.get("required").and_then(Value::as_array) else {
            return Ok(());
        };
        let Some(properties) = node.child("properties") else {
            return Ok(());
        };

        let keyword = self.mode.forbidden_keyword();
        let mut kept = Vec::with_capacity(required.len());
        for name in required {
            let forbidden = match name.as_str().and_then(|n| properties.child(n)) {
                Some(property) => property.resolve()?.flag(keyword),
                None => false,
            };
            if !forbidden {
                kept.push(name.clone());
            }
        }

        if kept.is_empty() {
            out.remove("required");
        } else {
            out.insert("required".into(), Value::Array(kept));
        }
        Ok(())
    }

    fn definition_name(&mut self, target: &Node<'r>) -> String {
        let location = target.location();
        if let Some(name) = self.names.get(&location) {
            return name.clone();
        }

        let base = definition_base(target);
        let mut name = base.clone();
        let mut n = 1;
        while self.taken.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }

        self.taken.insert(name.clone());
        self.names.insert(location, name.clone());
        self.pending.push((target.clone(), name.clone()));
        name
    }

    /// Copy every pending definition and attach the table to `root`.
    fn finish(mut self, root: Value) -> Result<Value, LoadError> {
        while let Some((node, name)) = self.pending.pop() {
            let value = self.walk(&node)?;
            self.defs.insert(name, value);
        }
        tracing::trace!(
            definitions = self.defs.len(),
            files = self.resolver.file_count(),
            "bundled schema"
        );
        if self.defs.is_empty() {
            return Ok(root);
        }

        let keyword = self.defs_keyword();
        match root {
            Value::Object(mut object) if !object.contains_key("$ref") && !object.contains_key(keyword) => {
                object.insert(keyword.to_string(), Value::Object(self.defs));
                Ok(Value::Object(object))
            }
            other => {
                let mut wrapper = Map::new();
                wrapper.insert("allOf".into(), Value::Array(vec![other]));
                wrapper.insert(keyword.to_string(), Value::Object(self.defs));
                Ok(Value::Object(wrapper))
            }
        }
    }
}

/// Readable, pointer-safe definition name derived from the target location.
fn definition_base(target: &Node<'_>) -> String {
    let token = target
        .pointer()
        .rsplit('/')
        .next()
        .filter(|t| !t.is_empty())
        .map(unescape_token)
        .unwrap_or_else(|| {
            let label = target.file_label();
            let file = label.rsplit(['/', '\\']).next().unwrap_or("schema");
            file.split('.').next().unwrap_or("schema").to_string()
        });
    let sanitized: String = token
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' | '.' => c,
            _ => '_',
        })
        .collect();
    if sanitized.is_empty() {
        "schema".to_string()
    } else {
        sanitized
    }
}

/// OpenAPI 3.0 `nullable: true` → explicit `null` alternative.
fn make_nullable(mut schema: Map<String, Value>) -> Value {
    if let Some(Value::Array(options)) = schema.get_mut("enum") {
        if !options.contains(&Value::Null) {
            options.push(Value::Null);
        }
    }
    match schema.get_mut("type") {
        Some(Value::String(single)) => {
            let single = std::mem::take(single);
            schema.insert("type".into(), json!([single, "null"]));
            Value::Object(schema)
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "null") {
                types.push(json!("null"));
            }
            Value::Object(schema)
        }
        _ => json!({ "anyOf": [{ "type": "null" }, Value::Object(schema)] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SourceFile;

    fn resolver(root: Value) -> Resolver {
        Resolver::new(SourceFile { path: None, root })
    }

    fn compile(root: Value, pointer: &str, version: OpenApiVersion, mode: AccessMode) -> CompiledSchema {
        let resolver = resolver(root);
        let compiler = SchemaCompiler::new(&resolver, version);
        let node = resolver.node(FileId::ROOT, pointer).unwrap();
        compiler.compile(&node, mode).unwrap()
    }

    fn pet_components() -> Value {
        json!({
            "components": {"schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["id", "name"],
                    "properties": {
                        "id": {"type": "integer", "readOnly": true},
                        "name": {"type": "string"},
                        "secret": {"type": "string", "writeOnly": true}
                    }
                }
            }},
            "body": {"$ref": "#/components/schemas/Pet"}
        })
    }

    #[test]
    fn references_are_bundled_into_definitions() {
        let schema = compile(pet_components(), "/body", OpenApiVersion::V30, AccessMode::Read);
        let bundled = schema.schema();
        assert_eq!(bundled["allOf"][0]["$ref"], "#/definitions/Pet");
        assert_eq!(bundled["definitions"]["Pet"]["type"], "object");
        assert!(schema.is_valid(&json!({"id": 1, "name": "rex"})));
    }

    #[test]
    fn draft_2020_uses_defs() {
        let schema = compile(pet_components(), "/body", OpenApiVersion::V31, AccessMode::Read);
        assert_eq!(schema.schema()["allOf"][0]["$ref"], "#/$defs/Pet");
        assert!(schema.schema()["$defs"]["Pet"].is_object());
    }

    #[test]
    fn write_mode_forbids_read_only() {
        let schema = compile(pet_components(), "/body", OpenApiVersion::V30, AccessMode::Write);
        // id is readOnly: no longer required when writing
        assert!(schema.is_valid(&json!({"name": "rex"})));
        let errors = schema.validate(&json!({"id": 1, "name": "rex"})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "readOnly");
        assert_eq!(errors[0].pointer, "/id");
        // writeOnly is allowed in requests
        assert!(schema.is_valid(&json!({"name": "rex", "secret": "s"})));
    }

    #[test]
    fn read_mode_forbids_write_only() {
        let schema = compile(pet_components(), "/body", OpenApiVersion::V30, AccessMode::Read);
        let errors = schema
            .validate(&json!({"id": 1, "name": "rex", "secret": "s"}))
            .unwrap_err();
        assert_eq!(errors[0].code, "writeOnly");
        assert_eq!(errors[0].pointer, "/secret");
    }

    #[test]
    fn required_violation_points_at_missing_property() {
        let schema = compile(pet_components(), "/body", OpenApiVersion::V30, AccessMode::Read);
        let errors = schema.validate(&json!({"id": 1})).unwrap_err();
        assert_eq!(errors[0].code, "required");
        assert_eq!(errors[0].pointer, "/name");
    }

    #[test]
    fn cyclic_schema_survives_compilation() {
        let root = json!({
            "components": {"schemas": {"Node": {
                "type": "object",
                "properties": {
                    "value": {"type": "integer"},
                    "next": {"$ref": "#/components/schemas/Node"}
                }
            }}},
            "body": {"$ref": "#/components/schemas/Node"}
        });
        let schema = compile(root, "/body", OpenApiVersion::V31, AccessMode::Read);
        assert_eq!(
            schema.schema()["$defs"]["Node"]["properties"]["next"]["$ref"],
            "#/$defs/Node"
        );
        assert!(schema.is_valid(&json!({"value": 1, "next": {"value": 2, "next": {"value": 3}}})));
        assert!(!schema.is_valid(&json!({"value": 1, "next": {"value": "two"}})));
    }

    #[test]
    fn nullable_becomes_type_union_in_3_0() {
        let root = json!({"s": {"type": "string", "nullable": true, "enum": ["a", "b"]}});
        let schema = compile(root, "/s", OpenApiVersion::V30, AccessMode::Read);
        assert_eq!(schema.schema()["type"], json!(["string", "null"]));
        assert!(schema.schema().get("nullable").is_none());
        assert!(schema.is_valid(&Value::Null));
        assert!(schema.is_valid(&json!("a")));
        assert!(!schema.is_valid(&json!("c")));
    }

    #[test]
    fn nullable_without_type_wraps_any_of() {
        let root = json!({
            "X": {"type": "object"},
            "s": {"allOf": [{"$ref": "#/X"}], "nullable": true}
        });
        let schema = compile(root, "/s", OpenApiVersion::V30, AccessMode::Read);
        assert!(schema.is_valid(&Value::Null));
        assert!(schema.is_valid(&json!({})));
        assert!(!schema.is_valid(&json!(1)));
    }

    #[test]
    fn data_keywords_are_copied_verbatim() {
        let root = json!({"s": {
            "type": "object",
            "example": {"$ref": "not-a-reference"},
            "properties": {"nullable": {"type": "boolean"}}
        }});
        let schema = compile(root, "/s", OpenApiVersion::V30, AccessMode::Read);
        assert_eq!(schema.schema()["example"]["$ref"], "not-a-reference");
        // a property named like a keyword is still a property
        assert_eq!(schema.schema()["properties"]["nullable"]["type"], "boolean");
    }

    #[test]
    fn compile_object_for_parameter_group() {
        let resolver = resolver(json!({
            "limit": {"type": "integer", "maximum": 100},
            "q": {"type": "string"}
        }));
        let compiler = SchemaCompiler::new(&resolver, OpenApiVersion::V31);
        let props = vec![
            ("limit".to_string(), resolver.node(FileId::ROOT, "/limit").unwrap()),
            ("q".to_string(), resolver.node(FileId::ROOT, "/q").unwrap()),
        ];
        let schema = compiler
            .compile_object(&props, &["q".to_string()], AccessMode::Write)
            .unwrap();
        assert!(schema.is_valid(&json!({"q": "x", "limit": 5})));
        let errors = schema.validate(&json!({"q": "x", "limit": 101})).unwrap_err();
        assert_eq!(errors[0].pointer, "/limit");
        assert_eq!(errors[0].code, "maximum");
        let errors = schema.validate(&json!({})).unwrap_err();
        assert_eq!(errors[0].pointer, "/q");
    }

    #[test]
    fn colliding_definition_names_get_suffixes() {
        let root = json!({
            "a": {"Item": {"type": "string"}},
            "b": {"Item": {"type": "integer"}},
            "s": {"type": "object", "properties": {
                "x": {"$ref": "#/a/Item"},
                "y": {"$ref": "#/b/Item"}
            }}
        });
        let schema = compile(root, "/s", OpenApiVersion::V31, AccessMode::Read);
        let defs = schema.schema()["$defs"].as_object().unwrap();
        assert_eq!(defs.len(), 2);
        assert!(defs.contains_key("Item"));
        assert!(defs.contains_key("Item_1"));
        assert!(schema.is_valid(&json!({"x": "s", "y": 1})));
        assert!(!schema.is_valid(&json!({"x": 1})));
    }

    #[test]
    fn visit_properties_parent_before_child() {
        let root = json!({"s": {
            "type": "object",
            "properties": {
                "owner": {"type": "object", "properties": {"name": {"type": "string"}}},
                "tags": {"type": "array", "items": {"type": "object", "properties": {"v": {"type": "string"}}}}
            }
        }});
        let schema = compile(root, "/s", OpenApiVersion::V31, AccessMode::Read);
        let mut instance = json!({"owner": {"name": "a"}, "tags": [{"v": "x"}], "extra": 1});
        let mut seen = Vec::new();
        schema.visit_properties(&mut instance, &mut |property, value| {
            seen.push(format!("{}/{}", property.parent_pointer, property.name));
            if property.name == "v" {
                *value = json!("replaced");
            }
        });
        assert_eq!(seen, vec!["/owner", "/owner/name", "/tags", "/tags/0/v"]);
        assert_eq!(instance["tags"][0]["v"], "replaced");
    }
}
