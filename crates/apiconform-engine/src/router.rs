//! Matching concrete requests to declared operations and request variants

use std::collections::HashMap;
use std::sync::Arc;

use apiconform_core::{Failure, FailureKind};
use http::Method;
use indexmap::IndexMap;

use crate::content;
use crate::document::{Document, Operation, RequestVariant};
use crate::path_template::PathTemplate;

/// One declared path and the operations under it.
#[derive(Debug)]
struct Route {
    template: PathTemplate,
    /// Method to index into the document's operations
    methods: IndexMap<Method, usize>,
}

/// A request routed to an operation and one of its request variants.
#[derive(Debug, Clone)]
pub struct RouteMatch<'d> {
    pub operation: &'d Operation,
    pub variant: RequestVariant<'d>,
    /// Percent-decoded path captures, by variable name
    pub path_params: Vec<(String, String)>,
}

/// Static paths by exact lookup, templated paths by first match in
/// declaration order.
#[derive(Debug)]
pub struct Router {
    document: Arc<Document>,
    routes: Vec<Route>,
    static_paths: HashMap<String, usize>,
}

impl Router {
    /// Build the route table. With `use_patterns`, path variable captures are
    /// tightened by their schema `pattern`.
    #[must_use]
    pub fn new(document: Arc<Document>, use_patterns: bool) -> Self {
        let mut routes: Vec<Route> = Vec::new();
        let mut by_path: HashMap<String, usize> = HashMap::new();

        for (index, operation) in document.operations().iter().enumerate() {
            let route = match by_path.get(&operation.path) {
                Some(&route) => route,
                None => {
                    routes.push(Route {
                        template: PathTemplate::new(&operation.path),
                        methods: IndexMap::new(),
                    });
                    by_path.insert(operation.path.clone(), routes.len() - 1);
                    routes.len() - 1
                }
            };
            routes[route].methods.insert(operation.method.clone(), index);
        }

        if use_patterns {
            for route in &mut routes {
                if !route.template.is_dynamic() {
                    continue;
                }
                let mut patterns = HashMap::new();
                for &index in route.methods.values() {
                    for parameter in document.operations()[index].parameters.path.parameters() {
                        if let Some(pattern) = &parameter.pattern {
                            patterns
                                .entry(parameter.name.clone())
                                .or_insert_with(|| pattern.clone());
                        }
                    }
                }
                if !patterns.is_empty() {
                    route.template = PathTemplate::with_patterns(route.template.as_str(), &patterns);
                }
            }
        }

        let static_paths: HashMap<String, usize> = routes
            .iter()
            .enumerate()
            .filter(|(_, route)| !route.template.is_dynamic())
            .map(|(i, route)| (route.template.as_str().to_string(), i))
            .collect();

        tracing::debug!(
            static_paths = static_paths.len(),
            dynamic_paths = routes.len() - static_paths.len(),
            use_patterns,
            "built router"
        );
        Self {
            document,
            routes,
            static_paths,
        }
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn shared_document(&self) -> Arc<Document> {
        Arc::clone(&self.document)
    }

    /// Route a request to its operation and request variant.
    ///
    /// # Errors
    ///
    /// `not_found` when no path matches, `method_not_allowed` when the path
    /// matches but the method is not declared, `unsupported_media_type` when
    /// no declared content type fits.
    pub fn route(
        &self,
        method: &Method,
        path: &str,
        content_type: Option<&str>,
    ) -> Result<RouteMatch<'_>, Failure> {
        let (operation, path_params) = self.match_operation(method, path)?;
        let variant = Self::select_variant(operation, content_type)?;
        Ok(RouteMatch {
            operation,
            variant,
            path_params,
        })
    }

    /// Match path and method only.
    ///
    /// # Errors
    ///
    /// `not_found` or `method_not_allowed`.
    pub fn match_operation(
        &self,
        method: &Method,
        path: &str,
    ) -> Result<(&Operation, Vec<(String, String)>), Failure> {
        let (route, captures) = self.find_route(path).ok_or_else(|| {
            Failure::new(FailureKind::NotFound)
                .with_message(format!("Request path {path} is not defined in the API description"))
        })?;

        let Some(&index) = route.methods.get(method) else {
            let allowed: Vec<&str> = route.methods.keys().map(Method::as_str).collect();
            return Err(Failure::new(FailureKind::MethodNotAllowed).with_message(format!(
                "Request method {method} is not defined for {} (allowed: {})",
                route.template.as_str(),
                allowed.join(", ")
            )));
        };
        Ok((&self.document.operations()[index], captures))
    }

    fn find_route(&self, path: &str) -> Option<(&Route, Vec<(String, String)>)> {
        if let Some(&index) = self.static_paths.get(path) {
            return Some((&self.routes[index], Vec::new()));
        }
        self.routes
            .iter()
            .filter(|route| route.template.is_dynamic())
            .find_map(|route| route.template.matches(path).map(|captures| (route, captures)))
    }

    /// Pick the request variant for a concrete content type.
    ///
    /// Operations without a request body always resolve to the no-body
    /// variant. Without a content type, an optional body falls back to the
    /// no-body variant.
    ///
    /// # Errors
    ///
    /// `unsupported_media_type` when no declared content type fits.
    pub fn select_variant<'d>(
        operation: &'d Operation,
        content_type: Option<&str>,
    ) -> Result<RequestVariant<'d>, Failure> {
        let Some(body) = &operation.request_body else {
            return Ok(RequestVariant::no_body(operation));
        };
        let concrete = content_type.map(str::trim).filter(|c| !c.is_empty());
        let declared: Vec<&str> = body.content.keys().map(String::as_str).collect();

        match content::select(&declared, concrete) {
            Some(key) => Ok(RequestVariant {
                operation,
                media: body.content.get(key),
            }),
            None if concrete.is_none() && !body.required => Ok(RequestVariant::no_body(operation)),
            None => Err(Failure::new(FailureKind::UnsupportedMediaType).with_message(format!(
                "Request content type {} is not defined for {}",
                concrete.unwrap_or("(none)"),
                operation.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router(use_patterns: bool) -> Router {
        let document = Document::from_value(json!({
            "openapi": "3.0.3",
            "paths": {
                "/pets": {
                    "get": {"responses": {"200": {"description": "ok"}}},
                    "post": {
                        "requestBody": {"required": true, "content": {
                            "application/json": {"schema": {"type": "object"}},
                            "text/*": {}
                        }},
                        "responses": {"201": {"description": "ok"}}
                    }
                },
                "/pets/mine": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/pets/{id}": {
                    "parameters": [{"name": "id", "in": "path", "schema": {"type": "integer", "pattern": "^[0-9]+$"}}],
                    "get": {"responses": {"200": {"description": "ok"}}},
                    "put": {
                        "requestBody": {"content": {"application/json": {}}},
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "/pets/{name}/photo": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        }))
        .unwrap();
        Router::new(Arc::new(document), use_patterns)
    }

    #[test]
    fn static_paths_win_over_templates() {
        let router = router(false);
        let matched = router.route(&Method::GET, "/pets/mine", None).unwrap();
        assert_eq!(matched.operation.path, "/pets/mine");
        assert!(matched.path_params.is_empty());
    }

    #[test]
    fn templated_paths_capture_variables() {
        let router = router(false);
        let matched = router.route(&Method::GET, "/pets/42", None).unwrap();
        assert_eq!(matched.operation.path, "/pets/{id}");
        assert_eq!(matched.path_params, vec![("id".to_string(), "42".to_string())]);

        let matched = router.route(&Method::GET, "/pets/a%20b/photo", None).unwrap();
        assert_eq!(matched.path_params[0].1, "a b");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = router(false);
        let err = router.route(&Method::GET, "/owners", None).unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn known_path_wrong_method() {
        let router = router(false);
        let err = router.route(&Method::DELETE, "/pets", None).unwrap_err();
        assert_eq!(err.kind, FailureKind::MethodNotAllowed);
        assert!(err.message().contains("allowed: GET, POST"));
    }

    #[test]
    fn first_template_match_decides_method() {
        let router = router(false);
        // `/pets/{id}` is declared first and has no DELETE
        let err = router.route(&Method::DELETE, "/pets/7", None).unwrap_err();
        assert_eq!(err.kind, FailureKind::MethodNotAllowed);
    }

    #[test]
    fn content_type_selects_variant() {
        let router = router(false);
        let matched = router
            .route(&Method::POST, "/pets", Some("application/json; charset=utf-8"))
            .unwrap();
        assert_eq!(matched.variant.content_type(), Some("application/json"));

        let matched = router.route(&Method::POST, "/pets", Some("text/csv")).unwrap();
        assert_eq!(matched.variant.content_type(), Some("text/*"));

        let err = router.route(&Method::POST, "/pets", Some("image/png")).unwrap_err();
        assert_eq!(err.kind, FailureKind::UnsupportedMediaType);
    }

    #[test]
    fn missing_content_type_against_required_body() {
        let router = router(false);
        let err = router.route(&Method::POST, "/pets", None).unwrap_err();
        assert_eq!(err.kind, FailureKind::UnsupportedMediaType);
    }

    #[test]
    fn missing_content_type_against_optional_body() {
        let router = router(false);
        let matched = router.route(&Method::PUT, "/pets/1", None).unwrap();
        assert!(matched.variant.media.is_none());
    }

    #[test]
    fn bodiless_operation_ignores_content_type() {
        let router = router(false);
        let matched = router.route(&Method::GET, "/pets", Some("application/json")).unwrap();
        assert!(matched.variant.media.is_none());
    }

    #[test]
    fn patterns_tighten_matching() {
        let loose = router(false);
        let strict = router(true);
        assert_eq!(
            loose.route(&Method::GET, "/pets/rex", None).unwrap().operation.path,
            "/pets/{id}"
        );
        let err = strict.route(&Method::GET, "/pets/rex", None).unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
        assert!(strict.route(&Method::GET, "/pets/12", None).is_ok());
    }

    #[test]
    fn every_variant_routes_to_itself() {
        let router = router(false);
        for operation in router.document().operations() {
            let path = operation.path.replace("{id}", "1").replace("{name}", "n");
            for variant in operation.request_variants() {
                let matched = router
                    .route(&operation.method, &path, variant.content_type())
                    .unwrap();
                assert_eq!(matched.operation.label(), operation.label());
                assert_eq!(matched.variant.content_type(), variant.content_type());
            }
        }
    }
}
