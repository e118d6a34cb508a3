//! Decoding raw parameter strings into typed JSON values
//!
//! Path captures, query strings, headers and cookies arrive as text. The codec
//! turns each declared parameter into the JSON value its schema expects,
//! honoring the OpenAPI `style`/`explode` serialization rules. Values that do
//! not coerce stay strings so schema validation can report them.

use http::HeaderMap;
use http::header::COOKIE;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Number, Value};

use crate::content;
use crate::document::{Parameter, ParameterCollection};
use crate::schema::{CompiledSchema, deref};

static NULL: Value = Value::Null;

const MAX_ALL_OF_DEPTH: usize = 16;

/// Turns raw request text into per-location parameter objects.
pub trait ParameterCodec: Send + Sync {
    /// Decode already percent-decoded path captures.
    fn decode_path(&self, collection: &ParameterCollection, captures: &[(String, String)]) -> Map<String, Value>;

    /// Decode the raw query string (without `?`).
    fn decode_query(&self, collection: &ParameterCollection, query: Option<&str>) -> Map<String, Value>;

    /// Decode header parameters; keys are lower-case.
    fn decode_headers(&self, collection: &ParameterCollection, headers: &HeaderMap) -> Map<String, Value>;

    /// Decode parameters carried in the `Cookie` header.
    fn decode_cookies(&self, collection: &ParameterCollection, headers: &HeaderMap) -> Map<String, Value>;
}

/// OpenAPI serialization rules with schema-driven type coercion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl ParameterCodec for DefaultCodec {
    fn decode_path(&self, collection: &ParameterCollection, captures: &[(String, String)]) -> Map<String, Value> {
        let scope = Scope::of(collection.schema());
        let mut out = Map::new();
        for parameter in collection.parameters() {
            let Some((_, raw)) = captures.iter().find(|(name, _)| *name == parameter.name) else {
                continue;
            };
            let schema = scope.property(&parameter.name);
            let raw = match parameter.style() {
                "label" => raw.strip_prefix('.').unwrap_or(raw),
                "matrix" => {
                    let prefix = format!(";{}=", parameter.name);
                    raw.strip_prefix(prefix.as_str()).unwrap_or(raw)
                }
                _ => raw.as_str(),
            };
            let separator = match (parameter.style(), parameter.explode()) {
                ("label", true) => '.',
                ("matrix", true) => ';',
                _ => ',',
            };
            out.insert(parameter.name.clone(), decode_delimited(&scope, parameter, schema, raw, separator));
        }
        out
    }

    fn decode_query(&self, collection: &ParameterCollection, query: Option<&str>) -> Map<String, Value> {
        let pairs = query.map(parse_pairs).unwrap_or_default();
        let scope = Scope::of(collection.schema());
        let mut out = Map::new();

        for parameter in collection.parameters() {
            let name = parameter.name.as_str();
            let schema = scope.property(name);
            let values = || {
                let bracketed = format!("{name}[]");
                pairs
                    .iter()
                    .filter(move |(key, _)| key == name || *key == bracketed)
                    .map(|(_, value)| value.as_str())
            };

            if let Some(content_type) = &parameter.content_type {
                if let Some(raw) = values().next() {
                    out.insert(name.to_string(), decode_content(content_type, raw));
                }
                continue;
            }

            let decoded = match primary_type(schema) {
                Some("array") => {
                    let all: Vec<&str> = values().collect();
                    if all.is_empty() {
                        continue;
                    }
                    let separator = match parameter.style() {
                        "spaceDelimited" => Some(' '),
                        "pipeDelimited" => Some('|'),
                        _ if !parameter.explode() => Some(','),
                        _ => None,
                    };
                    let items = schema.and_then(|s| scope.items(s));
                    let parts: Vec<&str> = match separator {
                        Some(separator) if all.len() == 1 => all[0].split(separator).collect(),
                        _ => all,
                    };
                    Value::Array(parts.into_iter().map(|p| coerce(p, items)).collect())
                }
                Some("object") if parameter.style() == "deepObject" => {
                    let prefix = format!("{name}[");
                    let object: Map<String, Value> = pairs
                        .iter()
                        .filter_map(|(key, value)| {
                            let property = key.strip_prefix(prefix.as_str())?.strip_suffix(']')?;
                            let property_schema = schema.and_then(|s| scope.nested(s, property));
                            Some((property.to_string(), coerce(value, property_schema)))
                        })
                        .collect();
                    if object.is_empty() {
                        continue;
                    }
                    Value::Object(object)
                }
                Some("object") if parameter.explode() => {
                    let object: Map<String, Value> = pairs
                        .iter()
                        .filter_map(|(key, value)| {
                            let property_schema = scope.nested(schema?, key)?;
                            Some((key.clone(), coerce(value, Some(property_schema))))
                        })
                        .collect();
                    if object.is_empty() {
                        continue;
                    }
                    Value::Object(object)
                }
                _ => {
                    let Some(raw) = values().next() else {
                        continue;
                    };
                    decode_delimited(&scope, parameter, schema, raw, ',')
                }
            };
            out.insert(name.to_string(), decoded);
        }
        out
    }

    fn decode_headers(&self, collection: &ParameterCollection, headers: &HeaderMap) -> Map<String, Value> {
        let scope = Scope::of(collection.schema());
        let mut out = Map::new();
        for parameter in collection.parameters() {
            let values: Vec<String> = headers
                .get_all(parameter.name.as_str())
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
                .collect();
            if values.is_empty() {
                continue;
            }
            let raw = values.join(",");
            let decoded = match &parameter.content_type {
                Some(content_type) => decode_content(content_type, &raw),
                None => {
                    decode_delimited(&scope, parameter, scope.property(&parameter.name), &raw, ',')
                }
            };
            out.insert(parameter.name.clone(), decoded);
        }
        out
    }

    fn decode_cookies(&self, collection: &ParameterCollection, headers: &HeaderMap) -> Map<String, Value> {
        let cookies: Vec<(String, String)> = headers
            .get_all(COOKIE)
            .iter()
            .flat_map(|v| {
                String::from_utf8_lossy(v.as_bytes())
                    .split(';')
                    .filter_map(|pair| {
                        let (name, value) = pair.split_once('=')?;
                        Some((
                            name.trim().to_string(),
                            percent_decode_str(value.trim()).decode_utf8_lossy().into_owned(),
                        ))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let scope = Scope::of(collection.schema());
        let mut out = Map::new();
        for parameter in collection.parameters() {
            let Some((_, raw)) = cookies.iter().find(|(name, _)| *name == parameter.name) else {
                continue;
            };
            let decoded = match &parameter.content_type {
                Some(content_type) => decode_content(content_type, raw),
                None => decode_delimited(&scope, parameter, scope.property(&parameter.name), raw, ','),
            };
            out.insert(parameter.name.clone(), decoded);
        }
        out
    }
}

/// Decode one value serialized as a delimited string: arrays split on
/// `separator`, objects as `k,v,k,v` (or `k=v,k=v` when exploded).
fn decode_delimited(
    scope: &Scope<'_>,
    parameter: &Parameter,
    schema: Option<&Value>,
    raw: &str,
    separator: char,
) -> Value {
    match primary_type(schema) {
        Some("array") => {
            if raw.is_empty() {
                return Value::Array(Vec::new());
            }
            let items = schema.and_then(|s| scope.items(s));
            Value::Array(raw.split(separator).map(|p| coerce(p.trim(), items)).collect())
        }
        Some("object") => {
            let mut object = Map::new();
            if parameter.explode() {
                for pair in raw.split(separator) {
                    if let Some((key, value)) = pair.split_once('=') {
                        let property_schema = schema.and_then(|s| scope.nested(s, key));
                        object.insert(key.to_string(), coerce(value, property_schema));
                    }
                }
            } else {
                let parts: Vec<&str> = raw.split(separator).collect();
                for chunk in parts.chunks(2) {
                    if let [key, value] = chunk {
                        let property_schema = schema.and_then(|s| scope.nested(s, key));
                        object.insert((*key).to_string(), coerce(value, property_schema));
                    }
                }
            }
            Value::Object(object)
        }
        _ => coerce(raw, schema),
    }
}

/// Parameter declared with `content`: JSON is parsed, anything else is text.
fn decode_content(content_type: &str, raw: &str) -> Value {
    if content::is_json(content_type) {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

/// `a=1&b=2` pairs with `+` and percent escapes decoded.
pub(crate) fn parse_pairs(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(query).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "undecodable query string, decoding lossily");
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let decode = |s: &str| percent_decode_str(&s.replace('+', " ")).decode_utf8_lossy().into_owned();
                (decode(key), decode(value))
            })
            .collect()
    })
}

/// Group form pairs into an object, coercing each field by the body schema.
/// Repeated keys and array-typed fields become arrays.
pub(crate) fn form_object(pairs: Vec<(String, Value)>, schema: Option<&CompiledSchema>) -> Value {
    let scope = Scope::of(schema);
    let mut grouped: Map<String, Value> = Map::new();
    for (key, value) in pairs {
        let key = key.strip_suffix("[]").map(str::to_string).unwrap_or(key);
        let property = scope.property(&key);
        let is_array = primary_type(property) == Some("array");
        let value = match value {
            Value::String(raw) => {
                let target = if is_array { property.and_then(|s| scope.items(s)) } else { property };
                coerce(&raw, target)
            }
            other => other,
        };
        match grouped.get_mut(&key) {
            Some(Value::Array(items)) if is_array || items.len() > 1 => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if is_array => {
                grouped.insert(key, Value::Array(vec![value]));
            }
            None => {
                grouped.insert(key, value);
            }
        }
    }
    Value::Object(grouped)
}

/// Coerce text to the first primitive type the schema allows that parses.
pub(crate) fn coerce(raw: &str, schema: Option<&Value>) -> Value {
    let types = schema_types(schema);
    let allows = |wanted: &str| types.iter().any(|t| *t == wanted);

    if allows("integer") || allows("number") {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Number(i.into());
        }
    }
    if allows("number") {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    if allows("boolean") {
        match raw {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
    }
    if allows("null") && raw.is_empty() && !allows("string") {
        return Value::Null;
    }
    Value::String(raw.to_string())
}

fn schema_types(schema: Option<&Value>) -> Vec<&str> {
    match schema.and_then(|s| s.get("type")) {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// The schema's type ignoring `null`, when it names exactly one.
fn primary_type(schema: Option<&Value>) -> Option<&str> {
    let mut types = schema_types(schema).into_iter().filter(|t| *t != "null");
    let first = types.next()?;
    types.next().is_none().then_some(first)
}

/// Lookups inside one compiled schema, local references followed.
#[derive(Clone, Copy)]
struct Scope<'a> {
    root: &'a Value,
}

impl<'a> Scope<'a> {
    fn of(schema: Option<&'a CompiledSchema>) -> Self {
        Self {
            root: schema.map_or(&NULL, CompiledSchema::schema),
        }
    }

    fn property(&self, name: &str) -> Option<&'a Value> {
        self.nested(self.root, name)
    }

    /// Schema of `name` under `schema`, searching `allOf` members too.
    fn nested(&self, schema: &'a Value, name: &str) -> Option<&'a Value> {
        self.nested_at(schema, name, 0)
    }

    fn nested_at(&self, schema: &'a Value, name: &str, depth: usize) -> Option<&'a Value> {
        if depth > MAX_ALL_OF_DEPTH {
            return None;
        }
        let schema = deref(self.root, schema);
        if let Some(property) = schema.get("properties").and_then(|p| p.get(name)) {
            return Some(deref(self.root, property));
        }
        schema
            .get("allOf")
            .and_then(Value::as_array)?
            .iter()
            .find_map(|member| self.nested_at(member, name, depth + 1))
    }

    fn items(&self, schema: &'a Value) -> Option<&'a Value> {
        let items = deref(self.root, schema).get("items")?;
        Some(deref(self.root, items))
    }
}
