//! Tracker abstraction and the in-process implementation

use std::sync::Arc;

use indexmap::IndexMap;

use super::{CoverageEvent, EventKind, Plan, TaskKey, mean_coverage};

/// Receives validation outcomes for coverage.
///
/// Implementations must be shareable across threads; the validation pipeline
/// calls these from whichever thread handled the request.
pub trait Tracker: Send + Sync {
    fn track_request(&self, document: &str, key: &TaskKey, valid: bool);
    fn track_response(&self, document: &str, key: &TaskKey, valid: bool);
}

/// Tracks directly into in-memory plans, one per registered document.
///
/// Cloning is cheap and every clone updates the same plans.
#[derive(Debug, Clone, Default)]
pub struct LocalTracker {
    plans: Arc<IndexMap<String, Plan>>,
}

impl LocalTracker {
    #[must_use]
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        let plans = plans
            .into_iter()
            .map(|plan| (plan.document().to_string(), plan))
            .collect();
        Self {
            plans: Arc::new(plans),
        }
    }

    #[must_use]
    pub fn plan(&self, document: &str) -> Option<&Plan> {
        self.plans.get(document)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    /// Mean of per-document percentages; `None` when nothing is planned.
    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        mean_coverage(self.plans.values())
    }

    /// Apply one recorded event. Returns `false` if it matches no planned task.
    pub fn apply(&self, event: &CoverageEvent) -> bool {
        let Some(plan) = self.plans.get(&event.document) else {
            return false;
        };
        match event.kind {
            EventKind::Request => plan.track_request(&event.key, event.valid),
            EventKind::Response => plan.track_response(&event.key, event.valid),
        }
    }
}

impl Tracker for LocalTracker {
    fn track_request(&self, document: &str, key: &TaskKey, valid: bool) {
        let tracked = self
            .plans
            .get(document)
            .is_some_and(|plan| plan.track_request(key, valid));
        if !tracked {
            tracing::debug!(document, task = %key, "request outside coverage plan");
        }
    }

    fn track_response(&self, document: &str, key: &TaskKey, valid: bool) {
        let tracked = self
            .plans
            .get(document)
            .is_some_and(|plan| plan.track_response(key, valid));
        if !tracked {
            tracing::debug!(document, task = %key, "response outside coverage plan");
        }
    }
}
