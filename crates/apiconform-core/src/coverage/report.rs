//! Coverage report - snapshot of plan state for display and persistence

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{LocalTracker, Plan, Task, TaskKey, mean_coverage};

/// State of one task at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Seen with at least one valid outcome
    Covered,
    /// Seen, but every outcome failed validation
    Invalid,
    /// Never seen
    Missing,
}

impl TaskStatus {
    fn of(task: &Task) -> Self {
        if task.is_covered() {
            Self::Covered
        } else if task.seen() {
            Self::Invalid
        } else {
            Self::Missing
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Covered => "OK",
            Self::Invalid => "INVALID",
            Self::Missing => "MISSING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskReport {
    pub key: TaskKey,
    pub status: TaskStatus,
}

/// Tasks of one `METHOD path` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteReport {
    /// e.g. `GET /pets/{id}`
    pub route: String,
    pub covered: usize,
    pub tasks: Vec<TaskReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentReport {
    pub document: String,
    /// Rounded percentage; `None` when the document declares no tasks
    pub coverage: Option<u8>,
    pub total: usize,
    pub covered: usize,
    pub routes: Vec<RouteReport>,
}

/// Coverage across every tracked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageReport {
    /// Mean of per-document percentages
    pub coverage: Option<f64>,
    pub documents: Vec<DocumentReport>,
}

impl DocumentReport {
    #[must_use]
    pub fn from_plan(plan: &Plan) -> Self {
        let routes = plan
            .routes()
            .into_iter()
            .map(|(route, tasks)| {
                let tasks: Vec<TaskReport> = tasks
                    .into_iter()
                    .map(|task| TaskReport {
                        key: task.key().clone(),
                        status: TaskStatus::of(task),
                    })
                    .collect();
                RouteReport {
                    route,
                    covered: tasks
                        .iter()
                        .filter(|t| t.status == TaskStatus::Covered)
                        .count(),
                    tasks,
                }
            })
            .collect();

        Self {
            document: plan.document().to_string(),
            coverage: plan.coverage(),
            total: plan.len(),
            covered: plan.covered_count(),
            routes,
        }
    }
}

impl CoverageReport {
    #[must_use]
    pub fn from_plans<'a>(plans: impl IntoIterator<Item = &'a Plan> + Clone) -> Self {
        Self {
            coverage: mean_coverage(plans.clone()),
            documents: plans.into_iter().map(DocumentReport::from_plan).collect(),
        }
    }

    #[must_use]
    pub fn from_tracker(tracker: &LocalTracker) -> Self {
        Self::from_plans(tracker.plans().collect::<Vec<_>>())
    }

    /// Tasks that are not covered, across all documents.
    pub fn uncovered(&self) -> impl Iterator<Item = &TaskReport> {
        self.documents
            .iter()
            .flat_map(|d| &d.routes)
            .flat_map(|r| &r.tasks)
            .filter(|t| t.status != TaskStatus::Covered)
    }

    /// Human-readable summary. Without `verbose`, fully covered routes are
    /// collapsed to their header line.
    #[must_use]
    pub fn to_terminal(&self, verbose: bool) -> String {
        let mut lines = Vec::new();

        match self.coverage {
            Some(c) => lines.push(format!("API coverage: {c:.1}%")),
            None => lines.push("API coverage: n/a (nothing planned)".to_string()),
        }

        for doc in &self.documents {
            lines.push(String::new());
            match doc.coverage {
                Some(c) => lines.push(format!(
                    "{}: {c}% ({}/{} tasks)",
                    doc.document, doc.covered, doc.total
                )),
                None => {
                    lines.push(format!("{}: no tasks planned", doc.document));
                    continue;
                }
            }

            for route in &doc.routes {
                lines.push(format!(
                    "  {} [{}/{}]",
                    route.route,
                    route.covered,
                    route.tasks.len()
                ));
                let complete = route.covered == route.tasks.len();
                if complete && !verbose {
                    continue;
                }
                for task in &route.tasks {
                    if task.status == TaskStatus::Covered && !verbose {
                        continue;
                    }
                    lines.push(format!(
                        "    [{}] {}",
                        task.status.label(),
                        task.key.variant_label()
                    ));
                }
            }
        }

        lines.join("\n")
    }
}
