//! apiconform-core: Core types for OpenAPI contract conformance
//!
//! This crate provides the failure model and its wire rendering, the coverage
//! plan with its trackers, event log and report, and project configuration.
//! It has no knowledge of OpenAPI documents; see `apiconform-engine`.

pub mod config;
pub mod coverage;
pub mod failure;
pub mod schema;

pub use config::{Config, ConfigError, CoverageConfig};
pub use coverage::{
    CoverageEvent, CoveragePolicy, CoverageReport, EventLog, EventLogError, EventLogTracker,
    LocalTracker, Plan, Task, TaskKey, Tracker, Verdict, VerdictStatus,
};
pub use failure::{ErrorFormat, ErrorResponse, Failure, FailureKind, SchemaError, render};
