//! Request and response body parsing by media type

use std::io;

use bytes::Bytes;
use serde_json::{Value, json};

use crate::codec::{form_object, parse_pairs};
use crate::content;
use crate::schema::{CompiledSchema, PropertyRef};

/// Keys of the object standing in for an uploaded file part.
const UPLOAD_KEYS: [&str; 3] = ["filename", "content_type", "content"];

/// Parse a non-empty body.
///
/// JSON media types are decoded as JSON, form and multipart bodies become
/// objects with fields coerced by `schema`, anything else is passed through
/// as a string.
pub(crate) fn parse(
    content_type: Option<&str>,
    body: &Bytes,
    schema: Option<&CompiledSchema>,
) -> Result<Value, String> {
    let Some(content_type) = content_type else {
        return Ok(raw(body));
    };
    if content::is_json(content_type) {
        return serde_json::from_slice(body).map_err(|e| format!("Failed to parse body as JSON: {e}"));
    }
    if content::is_form(content_type) {
        let text = String::from_utf8_lossy(body);
        let pairs = parse_pairs(&text)
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        return Ok(form_object(pairs, schema));
    }
    if content::is_multipart(content_type) {
        return parse_multipart(content_type, body.clone(), schema);
    }
    Ok(raw(body))
}

fn raw(body: &Bytes) -> Value {
    Value::String(String::from_utf8_lossy(body).into_owned())
}

fn parse_multipart(
    content_type: &str,
    body: Bytes,
    schema: Option<&CompiledSchema>,
) -> Result<Value, String> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| "Missing or invalid boundary in multipart Content-Type".to_string())?;
    let stream = futures::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let fields = futures::executor::block_on(async {
        let mut fields = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("Failed to parse multipart body: {e}"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let part_type = field.content_type().map(ToString::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| format!("Failed to read multipart field `{name}`: {e}"))?;
            let text = String::from_utf8_lossy(&data).into_owned();
            let value = match file_name {
                Some(file_name) => json!({
                    "filename": file_name,
                    "content_type": part_type,
                    "content": text,
                }),
                None => Value::String(text),
            };
            fields.push((name, value));
        }
        Ok::<_, String>(fields)
    })?;

    Ok(form_object(fields, schema))
}

fn is_upload(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.len() == UPLOAD_KEYS.len() && UPLOAD_KEYS.iter().all(|k| o.contains_key(*k)))
}

fn expects_text(schema: &Value) -> bool {
    match schema.get("type") {
        Some(Value::String(t)) => t == "string",
        Some(Value::Array(ts)) => ts.iter().any(|t| t == "string"),
        None => schema.get("format").is_some_and(|f| f == "binary"),
        _ => false,
    }
}

/// Replace upload placeholders with their content wherever the declared
/// property is a string, so `type: string, format: binary` validates.
pub(crate) fn materialize_uploads(schema: &CompiledSchema, body: &mut Value) {
    schema.visit_properties(body, &mut |property: &PropertyRef<'_>, value: &mut Value| {
        if is_upload(value) && expects_text(property.schema) {
            if let Some(content) = value.get_mut("content").map(Value::take) {
                *value = content;
            }
            return;
        }
        let item_schema = property.schema.get("items");
        if let (Value::Array(items), Some(item_schema)) = (value, item_schema) {
            if expects_text(item_schema) {
                for item in items.iter_mut().filter(|i| is_upload(i)) {
                    if let Some(content) = item.get_mut("content").map(Value::take) {
                        *item = content;
                    }
                }
            }
        }
    });
}
