//! Dispatching validated requests to application handlers by operation id

use std::collections::HashMap;

use crate::document::Document;
use crate::request::ValidatedRequest;

/// Handlers keyed by `operationId`.
#[derive(Debug, Clone)]
pub struct HandlerTable<H> {
    handlers: HashMap<String, H>,
}

impl<H> Default for HandlerTable<H> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<H> HandlerTable<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning the one it replaced.
    pub fn register(&mut self, operation_id: impl Into<String>, handler: H) -> Option<H> {
        self.handlers.insert(operation_id.into(), handler)
    }

    #[must_use]
    pub fn get(&self, operation_id: &str) -> Option<&H> {
        self.handlers.get(operation_id)
    }

    /// Handler for the operation a request routed to.
    #[must_use]
    pub fn for_request(&self, request: &ValidatedRequest<'_>) -> Option<&H> {
        self.get(request.operation_id()?)
    }

    /// Operation ids declared in `document` with no registered handler.
    #[must_use]
    pub fn missing<'d>(&self, document: &'d Document) -> Vec<&'d str> {
        document
            .operations()
            .iter()
            .filter_map(|op| op.operation_id.as_deref())
            .filter(|id| !self.handlers.contains_key(*id))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_lists_unhandled_operations() {
        let document = Document::from_value(json!({
            "openapi": "3.0.0",
            "paths": {"/a": {
                "get": {"operationId": "getA", "responses": {}},
                "put": {"operationId": "putA", "responses": {}},
                "delete": {"responses": {}}
            }}
        }))
        .unwrap();

        let mut table: HandlerTable<fn() -> u16> = HandlerTable::new();
        assert!(table.register("getA", || 200).is_none());
        assert_eq!(table.missing(&document), vec!["putA"]);
        assert_eq!(table.get("getA").map(|h| h()), Some(200));
        assert_eq!(table.len(), 1);
    }
}
