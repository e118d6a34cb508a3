//! Coverage plans derived from a document, and tracking wired through hooks

use std::sync::Arc;

use apiconform_core::{CoverageConfig, Plan, TaskKey, Tracker};

use crate::document::Document;
use crate::hooks::Hooks;

/// Every request and response variant of `document` as a coverage task,
/// minus the response statuses the config skips.
#[must_use]
pub fn plan(document: &Document, config: &CoverageConfig) -> Plan {
    let mut keys: Vec<TaskKey> = Vec::new();
    for operation in document.operations() {
        keys.extend(operation.request_variants().iter().map(|v| v.task_key()));
        keys.extend(
            operation
                .response_variants()
                .iter()
                .filter(|v| !config.skips_response(v.status()))
                .map(|v| v.task_key()),
        );
    }
    tracing::debug!(document = document.id(), tasks = keys.len(), "planned coverage");
    Plan::new(document.id(), keys)
}

/// Report every validated request and response of `document` to `tracker`.
///
/// Outcomes that never matched a variant (unknown route, undeclared content
/// type or status) are not tracked.
pub fn install(hooks: &mut Hooks, document: impl Into<String>, tracker: Arc<dyn Tracker>) {
    let document: Arc<str> = Arc::from(document.into());

    let request_document = Arc::clone(&document);
    let request_tracker = Arc::clone(&tracker);
    hooks.after_request_validation(move |validated| {
        if let Some(key) = validated.task_key() {
            request_tracker.track_request(&request_document, &key, validated.is_valid());
        }
    });

    hooks.after_response_validation(move |validated| {
        if let Some(key) = validated.task_key() {
            tracker.track_response(&document, &key, validated.is_valid());
        }
    });
}
