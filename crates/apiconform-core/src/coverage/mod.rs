//! Coverage tracking - which declared request/response shapes were exercised
//!
//! A [`Plan`] enumerates every declared variant of one document as a [`Task`].
//! Tasks only ever move forward: once seen, always seen; once validated
//! successfully, always covered. Updates are lock-free so a plan can be shared
//! by every worker thread of the application under test.

mod event;
mod policy;
mod report;
mod tracker;

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use event::{CoverageEvent, EventKind, EventLog, EventLogError, EventLogTracker, ReplayStats, replay};
pub use policy::{CoveragePolicy, Verdict, VerdictStatus};
pub use report::{CoverageReport, DocumentReport, RouteReport, TaskReport, TaskStatus};
pub use tracker::{LocalTracker, Tracker};

/// Stable identity of one declared variant.
///
/// Requests have no `status`; responses always do. A `None` content type is the
/// no-body request variant or the no-content response variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct TaskKey {
    /// Path template as declared, e.g. `/pets/{id}`
    pub path: String,
    /// Upper-case HTTP method
    pub method: String,
    /// Declared status key (`200`, `4XX`, `default`) for response tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Declared content-type key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl TaskKey {
    #[must_use]
    pub fn request(
        path: impl Into<String>,
        method: impl AsRef<str>,
        content_type: Option<&str>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
            status: None,
            content_type: content_type.map(str::to_string),
        }
    }

    #[must_use]
    pub fn response(
        path: impl Into<String>,
        method: impl AsRef<str>,
        status: impl Into<String>,
        content_type: Option<&str>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
            status: Some(status.into()),
            content_type: content_type.map(str::to_string),
        }
    }

    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.status.is_none()
    }

    /// Label of the route this task belongs to, e.g. `GET /pets`.
    #[must_use]
    pub fn route_label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Label of the task within its route, e.g. `200 (application/json)`.
    #[must_use]
    pub fn variant_label(&self) -> String {
        match (&self.status, &self.content_type) {
            (None, Some(ct)) => format!("Request ({ct})"),
            (None, None) => "Request (no body)".to_string(),
            (Some(status), Some(ct)) => format!("{status} ({ct})"),
            (Some(status), None) => format!("{status} (no content)"),
        }
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.route_label(), self.variant_label())
    }
}

/// One declared variant plus its monotonic exercise state.
#[derive(Debug)]
pub struct Task {
    key: TaskKey,
    seen: AtomicBool,
    any_valid: AtomicBool,
}

impl Task {
    #[must_use]
    pub const fn new(key: TaskKey) -> Self {
        Self {
            key,
            seen: AtomicBool::new(false),
            any_valid: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Record one outcome. Never clears a flag.
    pub fn track(&self, valid: bool) {
        self.seen.store(true, Ordering::SeqCst);
        if valid {
            self.any_valid.store(true, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn seen(&self) -> bool {
        self.seen.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn any_valid(&self) -> bool {
        self.any_valid.load(Ordering::SeqCst)
    }

    /// Seen at least once with an error-free outcome.
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.seen() && self.any_valid()
    }
}

/// Every declared variant of one document, in declaration order.
#[derive(Debug)]
pub struct Plan {
    document: String,
    tasks: IndexMap<TaskKey, Task>,
}

impl Plan {
    /// Build a plan. Duplicate keys collapse into one task.
    #[must_use]
    pub fn new(document: impl Into<String>, keys: impl IntoIterator<Item = TaskKey>) -> Self {
        let tasks = keys
            .into_iter()
            .map(|key| (key.clone(), Task::new(key)))
            .collect();
        Self {
            document: document.into(),
            tasks,
        }
    }

    /// Identifier of the document this plan was built from.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Track a request outcome. Returns `false` if the key is not a planned
    /// request task.
    pub fn track_request(&self, key: &TaskKey, valid: bool) -> bool {
        key.is_request() && self.track(key, valid)
    }

    /// Track a response outcome. Returns `false` if the key is not a planned
    /// response task.
    pub fn track_response(&self, key: &TaskKey, valid: bool) -> bool {
        !key.is_request() && self.track(key, valid)
    }

    fn track(&self, key: &TaskKey, valid: bool) -> bool {
        match self.tasks.get(key) {
            Some(task) => {
                task.track(valid);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn task(&self, key: &TaskKey) -> Option<&Task> {
        self.tasks.get(key)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.tasks.values().filter(|t| t.is_covered()).count()
    }

    /// `round(100 × covered / total)`, or `None` for an empty plan.
    #[must_use]
    pub fn coverage(&self) -> Option<u8> {
        percentage(self.covered_count(), self.len())
    }

    /// Tasks grouped by route (`METHOD path`), preserving declaration order.
    #[must_use]
    pub fn routes(&self) -> Vec<(String, Vec<&Task>)> {
        let mut routes: IndexMap<String, Vec<&Task>> = IndexMap::new();
        for task in self.tasks.values() {
            routes.entry(task.key.route_label()).or_default().push(task);
        }
        routes.into_iter().collect()
    }
}

/// Rounded integer percentage, half up.
fn percentage(part: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let rounded = (200 * part + total) / (2 * total);
    Some(u8::try_from(rounded.min(100)).unwrap_or(100))
}

/// Mean of per-plan percentages, ignoring empty plans.
#[must_use]
pub fn mean_coverage<'a>(plans: impl IntoIterator<Item = &'a Plan>) -> Option<f64> {
    let values: Vec<f64> = plans
        .into_iter()
        .filter_map(Plan::coverage)
        .map(f64::from)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
