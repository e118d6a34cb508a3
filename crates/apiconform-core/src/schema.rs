//! JSON Schema for the interchange formats
//!
//! Worker processes and external tooling exchange coverage events (one per
//! JSONL line) and the final coverage report with the coordinator; host
//! adapters may also pass serialized failures around. All three are described
//! here so non-Rust producers can validate their output.

use crate::coverage::{CoverageEvent, CoverageReport};
use crate::failure::Failure;

/// Which interchange document to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTarget {
    /// One line of the coverage event log
    Event,
    /// Persisted coverage report
    Report,
    /// Serialized validation failure
    Failure,
}

impl SchemaTarget {
    pub const ALL: [Self; 3] = [Self::Event, Self::Report, Self::Failure];

    /// File name used when writing the schema next to a workspace.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Event => "coverage-event.schema.json",
            Self::Report => "coverage-report.schema.json",
            Self::Failure => "failure.schema.json",
        }
    }
}

/// Generate JSON Schema for an interchange format.
///
/// # Panics
///
/// Never in practice: a derived schema always serializes.
#[must_use]
pub fn generate_schema(target: SchemaTarget) -> String {
    let schema = match target {
        SchemaTarget::Event => schemars::schema_for!(CoverageEvent),
        SchemaTarget::Report => schemars::schema_for!(CoverageReport),
        SchemaTarget::Failure => schemars::schema_for!(Failure),
    };
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
