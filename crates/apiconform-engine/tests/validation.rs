//! End-to-end request and response validation against a petstore contract
//!
//! Run with: cargo test -p apiconform-engine --test validation

use std::sync::{Arc, Mutex};

use apiconform_core::{Config, ErrorFormat, FailureKind};
use apiconform_engine::{Definition, Document, ParameterLocation};
use bytes::Bytes;
use http::{Method, Request, Response};
use serde_json::{Value, json};

const PETSTORE: &str = r##"
openapi: 3.0.3
info:
  title: Petstore
  version: "1.0"
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          schema: {type: integer, minimum: 1, maximum: 100}
        - name: tags
          in: query
          style: form
          explode: false
          schema: {type: array, items: {type: string}}
        - name: X-Request-Id
          in: header
          required: true
          schema: {type: string, format: uuid}
      responses:
        "200":
          description: A page of pets
          headers:
            X-Rate-Limit:
              schema: {type: integer}
          content:
            application/json:
              schema:
                type: array
                items: {$ref: "#/components/schemas/Pet"}
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: "#/components/schemas/Pet"}
          application/x-www-form-urlencoded:
            schema: {$ref: "#/components/schemas/Pet"}
      responses:
        "201":
          description: Created
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Pet"}
        4XX:
          description: Client error
  /pets/{petId}:
    parameters:
      - name: petId
        in: path
        required: true
        schema: {type: integer}
    get:
      operationId: showPet
      parameters:
        - name: session
          in: cookie
          schema: {type: string, minLength: 3}
      responses:
        "200":
          description: A pet
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Pet"}
        default:
          description: Error
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Error"}
  /pets/{petId}/photo:
    post:
      operationId: uploadPhoto
      parameters:
        - name: petId
          in: path
          required: true
          schema: {type: integer}
      requestBody:
        required: true
        content:
          multipart/form-data:
            schema:
              type: object
              required: [photo]
              properties:
                photo: {type: string, format: binary}
                caption: {type: string, maxLength: 20}
      responses:
        "204":
          description: Stored
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id: {type: integer, readOnly: true}
        name: {type: string, minLength: 1}
        tag: {type: string, nullable: true}
        age: {type: integer}
    Error:
      type: object
      required: [message]
      properties:
        message: {type: string}
"##;

const REQUEST_ID: &str = "5b0e3d4c-9a51-4a8e-9a59-2f7d6b2c1e10";

fn definition() -> Definition {
    Definition::new(Document::parse(PETSTORE).unwrap(), Config::default())
}

fn get(uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("x-request-id", REQUEST_ID)
        .body(Bytes::new())
        .unwrap()
}

fn post(uri: &str, content_type: &str, body: &str) -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

fn json_response(status: u16, body: &Value) -> Response<Bytes> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

#[test]
fn query_and_header_parameters_decode_and_validate() {
    let definition = definition();
    let request = get("/pets?limit=10&tags=cat,dog");
    let validated = definition.validate_request(&request);

    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.operation_id(), Some("listPets"));
    assert_eq!(validated.parsed().query["limit"], json!(10));
    assert_eq!(validated.parsed().query["tags"], json!(["cat", "dog"]));
    assert_eq!(validated.parsed().headers["x-request-id"], json!(REQUEST_ID));
    assert!(validated.body().is_none());
}

#[test]
fn out_of_range_query_parameter() {
    let definition = definition();
    let request = get("/pets?limit=500");
    let failure = definition.validate_request(&request).error().cloned().unwrap();

    assert_eq!(failure.kind, FailureKind::InvalidQuery);
    assert_eq!(failure.errors[0].code, "maximum");
    assert_eq!(failure.errors[0].parameter_name().as_deref(), Some("limit"));

    let rendered = definition.render_error(&failure);
    assert_eq!(rendered.status, 400);
    assert_eq!(rendered.body["errors"][0]["source"], json!({"parameter": "limit"}));
}

#[test]
fn missing_required_header() {
    let definition = definition();
    let request = Request::builder()
        .uri("/pets")
        .body(Bytes::new())
        .unwrap();
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidHeader);
    assert_eq!(failure.errors[0].code, "required");
}

#[test]
fn path_and_cookie_parameters() {
    let definition = definition();
    let request = Request::builder()
        .uri("/pets/42")
        .header("cookie", "session=abcdef; theme=dark")
        .body(Bytes::new())
        .unwrap();
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.parsed().path["petId"], json!(42));
    assert_eq!(validated.parsed().cookies["session"], json!("abcdef"));

    let request = Request::builder()
        .uri("/pets/rex")
        .body(Bytes::new())
        .unwrap();
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidPath);

    let request = Request::builder()
        .uri("/pets/1")
        .header("cookie", "session=ab")
        .body(Bytes::new())
        .unwrap();
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidCookie);
}

#[test]
fn routing_failures() {
    let definition = definition();

    let failure = definition
        .validate_request(&get("/owners"))
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::NotFound);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/pets")
        .body(Bytes::new())
        .unwrap();
    let validated = definition.validate_request(&request);
    assert!(validated.operation().is_none());
    assert_eq!(validated.error().unwrap().kind, FailureKind::MethodNotAllowed);

    let request = post("/pets", "application/xml", "<pet/>");
    let validated = definition.validate_request(&request);
    assert_eq!(validated.operation_id(), Some("createPet"));
    assert!(validated.variant().is_none());
    assert_eq!(validated.error().unwrap().kind, FailureKind::UnsupportedMediaType);
}

#[test]
fn json_body_validates_in_write_mode() {
    let definition = definition();

    // `id` is readOnly, so it is neither required nor allowed in requests
    let request = post("/pets", "application/json", r#"{"name": "Rex", "tag": null}"#);
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.body(), Some(&json!({"name": "Rex", "tag": null})));
    assert_eq!(
        validated.variant().unwrap().content_type(),
        Some("application/json")
    );

    let request = post("/pets", "application/json", r#"{"id": 7, "name": "Rex"}"#);
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidBody);
    assert_eq!(failure.errors[0].code, "readOnly");
    assert_eq!(failure.errors[0].pointer, "/id");
}

#[test]
fn invalid_json_bodies() {
    let definition = definition();

    let failure = definition
        .validate_request(&post("/pets", "application/json", "{not json"))
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidBody);
    assert!(failure.message().starts_with("Failed to parse body as JSON"));

    let failure = definition
        .validate_request(&post("/pets", "application/json", r#"{"age": 3}"#))
        .into_result()
        .unwrap_err();
    assert_eq!(failure.errors[0].code, "required");
    assert_eq!(failure.errors[0].pointer, "/name");

    let failure = definition
        .validate_request(&post("/pets", "application/json", ""))
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidBody);
    assert_eq!(failure.message(), "Request body is required");
}

#[test]
fn form_bodies_are_coerced_by_schema() {
    let definition = definition();
    let request = post(
        "/pets",
        "application/x-www-form-urlencoded",
        "name=Rex&age=3",
    );
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.body(), Some(&json!({"name": "Rex", "age": 3})));
}

#[test]
fn multipart_upload() {
    let definition = definition();
    let body = "--b0undary\r\n\
Content-Disposition: form-data; name=\"photo\"; filename=\"rex.png\"\r\n\
Content-Type: image/png\r\n\
\r\n\
PNGDATA\r\n\
--b0undary\r\n\
Content-Disposition: form-data; name=\"caption\"\r\n\
\r\n\
Rex at the beach\r\n\
--b0undary--\r\n";
    let request = post(
        "/pets/3/photo",
        "multipart/form-data; boundary=b0undary",
        body,
    );
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(
        validated.body(),
        Some(&json!({"photo": "PNGDATA", "caption": "Rex at the beach"}))
    );
    assert_eq!(
        validated.variant().unwrap().content_type(),
        Some("multipart/form-data")
    );
}

#[test]
fn responses_validate_in_read_mode() {
    let definition = definition();
    let request = get("/pets");

    let response = Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("x-rate-limit", "100")
        .body(Bytes::from(json!([{"id": 1, "name": "Rex"}]).to_string()))
        .unwrap();
    let validated = definition.validate_response(&request, &response);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.parsed().headers["x-rate-limit"], json!(100));
    assert_eq!(validated.variant().unwrap().status(), "200");

    // `id` is required when reading
    let response = json_response(200, &json!([{"name": "Rex"}]));
    let failure = definition
        .validate_response(&request, &response)
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidResponseBody);
    assert_eq!(failure.errors[0].pointer, "/0/id");
}

#[test]
fn response_status_and_header_failures() {
    let definition = definition();
    let request = get("/pets");

    let response = json_response(418, &json!([]));
    let failure = definition
        .validate_response(&request, &response)
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::ResponseNotFound);
    assert_eq!(definition.render_error(&failure).status, 500);

    let response = Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("x-rate-limit", "lots")
        .body(Bytes::from_static(b"[]"))
        .unwrap();
    let failure = definition
        .validate_response(&request, &response)
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidResponseHeader);

    let response = Response::builder()
        .status(200)
        .header("content-type", "text/html")
        .body(Bytes::from_static(b"<p>"))
        .unwrap();
    let failure = definition
        .validate_response(&request, &response)
        .into_result()
        .unwrap_err();
    assert_eq!(failure.kind, FailureKind::ResponseNotFound);
}

#[test]
fn response_ranges_and_default() {
    let definition = definition();

    let request = post("/pets", "application/json", r#"{"name": "Rex"}"#);
    let response = Response::builder().status(409).body(Bytes::new()).unwrap();
    let validated = definition.validate_response(&request, &response);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.variant().unwrap().status(), "4XX");

    let request = get("/pets/9");
    let response = json_response(503, &json!({"message": "down"}));
    let validated = definition.validate_response(&request, &response);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.variant().unwrap().status(), "default");
}

#[test]
fn raise_modes_follow_config() {
    let document = Arc::new(Document::parse(PETSTORE).unwrap());
    let lenient = Definition::from_shared(Arc::clone(&document), Config::default());
    let strict = Definition::from_shared(
        document,
        Config {
            raise_request_errors: true,
            raise_response_errors: false,
            ..Config::default()
        },
    );

    let request = get("/pets?limit=0");
    assert!(lenient.check_request(&request).is_ok());
    assert_eq!(
        strict.check_request(&request).unwrap_err().kind,
        FailureKind::InvalidQuery
    );

    let request = get("/pets");
    let response = json_response(418, &json!([]));
    assert!(lenient.check_response(&request, &response).is_err());
    let validated = strict.check_response(&request, &response).unwrap();
    assert!(!validated.is_valid());
}

#[test]
fn hooks_observe_and_rewrite_properties() {
    let mut definition = definition();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    definition
        .hooks_mut()
        .after_request_body_property_validation(move |property, value| {
            sink.lock().unwrap().push(property.name.to_string());
            if property.name == "name" {
                if let Some(name) = value.as_str() {
                    *value = Value::String(name.to_uppercase());
                }
            }
        })
        .after_request_parameter_property_validation(|location, property, value| {
            if location == ParameterLocation::Query && property.name == "limit" {
                *value = json!(value.as_i64().unwrap_or(0) * 2);
            }
        });

    let request = post("/pets", "application/json", r#"{"name": "rex", "age": 2}"#);
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.body().unwrap()["name"], "REX");
    assert_eq!(*seen.lock().unwrap(), vec!["name", "age"]);

    let request = get("/pets?limit=4");
    let validated = definition.validate_request(&request);
    assert_eq!(validated.parsed().query["limit"], json!(8));
}

#[test]
fn rendered_method_not_allowed() {
    let definition = definition();
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/pets/1")
        .body(Bytes::new())
        .unwrap();
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    let rendered = definition.render_error(&failure);

    assert_eq!(rendered.content_type, "application/problem+json");
    insta::assert_snapshot!(serde_json::to_string_pretty(&rendered.body).unwrap(), @r#"
    {
      "title": "Method Not Allowed",
      "status": 405,
      "errors": [
        {
          "title": "Method Not Allowed",
          "status": 405,
          "message": "Request method PATCH is not defined for /pets/{petId} (allowed: GET)"
        }
      ]
    }
    "#);
}

#[test]
fn jsonapi_error_format() {
    let config = Config {
        error_format: ErrorFormat::JsonApi,
        ..Config::default()
    };
    let definition = Definition::new(Document::parse(PETSTORE).unwrap(), config);
    let failure = definition
        .validate_request(&post("/pets", "application/json", r#"{"name": ""}"#))
        .into_result()
        .unwrap_err();
    let rendered = definition.render_error(&failure);

    assert_eq!(rendered.content_type, "application/vnd.api+json");
    let error = &rendered.body["errors"][0];
    assert_eq!(error["status"], "400");
    assert_eq!(error["code"], "minLength");
    assert_eq!(error["source"], json!({"pointer": "/name"}));
}

const PROFILE: &str = r#"
openapi: 3.1.0
paths:
  /profile:
    put:
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: {type: string}
      responses:
        "204":
          description: Saved
"#;

fn put_profile(content_type: Option<&str>, body: &'static str) -> Request<Bytes> {
    let mut builder = Request::builder().method(Method::PUT).uri("/profile");
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Bytes::from_static(body.as_bytes())).unwrap()
}

#[test]
fn optional_body_may_be_omitted() {
    let definition = Definition::new(Document::parse(PROFILE).unwrap(), Config::default());

    let request = put_profile(None, "");
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert!(validated.body().is_none());
    assert_eq!(validated.variant().unwrap().content_type(), None);

    // a declared content type does not make an empty body a JSON document
    let request = put_profile(Some("application/json"), "");
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert!(validated.body().is_none());
    assert_eq!(validated.variant().unwrap().content_type(), None);

    let request = put_profile(Some("application/json"), r#"{"name": "Ann"}"#);
    let validated = definition.validate_request(&request);
    assert!(validated.is_valid(), "{:?}", validated.error());
    assert_eq!(validated.body(), Some(&json!({"name": "Ann"})));
    assert_eq!(
        validated.variant().unwrap().content_type(),
        Some("application/json")
    );

    let request = put_profile(Some("application/json"), "{}");
    let failure = definition.validate_request(&request).into_result().unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidBody);
}

#[test]
fn every_response_variant_is_reachable() {
    let definition = definition();
    for operation in definition.document().operations() {
        let path = operation.path.replace("{petId}", "1");
        let request = Request::builder()
            .method(operation.method.clone())
            .uri(path.as_str())
            .body(Bytes::new())
            .unwrap();
        for variant in operation.response_variants() {
            let status = (100..=599)
                .find(|&status| {
                    operation
                        .find_response(status)
                        .is_some_and(|declared| declared.status == variant.status())
                })
                .unwrap();
            let mut builder = Response::builder().status(status);
            if let Some(content_type) = variant.content_type() {
                builder = builder.header("content-type", content_type);
            }
            let response = builder.body(Bytes::new()).unwrap();

            let validated = definition.validate_response(&request, &response);
            assert_eq!(
                validated.task_key(),
                Some(variant.task_key()),
                "{} {}",
                operation.label(),
                variant.status()
            );
        }
    }
}
