//! apiconform CLI - OpenAPI contract routing, validation, and coverage gating

mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use http::Method;
use tracing_subscriber::EnvFilter;

use apiconform_core::coverage::{ReplayStats, replay};
use apiconform_core::schema::{SchemaTarget, generate_schema};
use apiconform_core::{Config, CoveragePolicy, CoverageReport, EventLog, LocalTracker, Plan};
use apiconform_engine::{Definition, Document, Operation};

#[derive(Parser)]
#[command(name = "apiconform")]
#[command(about = "OpenAPI contract conformance: routing, validation, and coverage gating")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Config file (default: .apiconform.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and summarize its operations and variants
    Check {
        /// OpenAPI document (default: `document` from config)
        document: Option<PathBuf>,
    },

    /// Show which operation and request variant a request routes to
    Route {
        /// HTTP method, e.g. GET
        method: String,

        /// Concrete request path, e.g. /pets/42
        path: String,

        /// OpenAPI document (default: `document` from config)
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Request Content-Type
        #[arg(long)]
        content_type: Option<String>,
    },

    /// List the coverage tasks a document declares
    Plan {
        /// OpenAPI document (default: `document` from config)
        document: Option<PathBuf>,
    },

    /// Replay a coverage event log, report, and gate on a minimum
    Coverage {
        /// OpenAPI document (default: `document` from config)
        document: Option<PathBuf>,

        /// Event log (default: `coverage.event_log` from config)
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Required coverage percentage (overrides config)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        minimum: Option<u8>,

        /// Document identifier the workers recorded (default: the document path)
        #[arg(long)]
        document_id: Option<String>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for an interchange format
    Schema {
        #[arg(short, long, default_value = "report")]
        target: SchemaArg,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    Event,
    Report,
    Failure,
}

impl From<SchemaArg> for SchemaTarget {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Event => Self::Event,
            SchemaArg::Report => Self::Report,
            SchemaArg::Failure => Self::Failure,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

/// Config with `document` overridden by the command line, if given.
fn config_for(cli_config: Option<&Path>, document: Option<PathBuf>) -> Result<Config> {
    let mut config = load_config(cli_config)?;
    if let Some(document) = document {
        config.document = document;
    }
    Ok(config)
}

fn load_definition(config: Config) -> Result<Definition> {
    let path = config.document.clone();
    Definition::load(config).with_context(|| format!("failed to load {}", path.display()))
}

fn run(cli: Cli) -> Result<i32> {
    let output = cli.output;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Check { document } => {
            let definition = load_definition(config_for(config_path, document)?)?;
            print_check(definition.document(), output)?;
            Ok(0)
        }

        Commands::Route {
            method,
            path,
            document,
            content_type,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method: {method}"))?;
            let definition = load_definition(config_for(config_path, document)?)?;
            print_route(&definition, &method, &path, content_type.as_deref(), output)
        }

        Commands::Plan { document } => {
            let definition = load_definition(config_for(config_path, document)?)?;
            let plan = definition.plan();
            match output {
                OutputFormat::Terminal => print!("{}", plan_to_terminal(&plan)),
                OutputFormat::Json => {
                    let keys: Vec<_> = plan.tasks().map(|t| t.key()).collect();
                    let json = serde_json::json!({
                        "document": plan.document(),
                        "total": plan.len(),
                        "tasks": keys,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Coverage {
            document,
            events,
            minimum,
            document_id,
        } => {
            let config = config_for(config_path, document)?;
            let Some(events_path) = events.or_else(|| config.coverage.event_log.clone()) else {
                bail!("no event log given; pass --events or set coverage.event_log");
            };
            let definition = load_definition(config.clone())?;

            let plan = definition.plan();
            let plan = match document_id {
                Some(id) => Plan::new(id, plan.tasks().map(|t| t.key().clone())),
                None => plan,
            };
            let tracker = LocalTracker::new([plan]);
            let events = EventLog::read(&events_path)
                .with_context(|| format!("failed to read {}", events_path.display()))?;
            let stats = replay(&events, &tracker);
            tracing::info!(
                events = events.len(),
                applied = stats.applied,
                unmatched = stats.unmatched,
                "replayed coverage events"
            );

            let report = CoverageReport::from_tracker(&tracker);
            let policy = match minimum.or(config.coverage.minimum) {
                Some(minimum) => CoveragePolicy::with_minimum(minimum),
                None => CoveragePolicy::default(),
            };
            let verdict = policy.verdict(&report);

            match output {
                OutputFormat::Terminal => {
                    print!("{}", report.to_terminal(cli.verbose));
                    println!("\n{}: {}", verdict.status, verdict.reason);
                    print_replay_stats(&stats);
                    println!("  Exit code: {}", verdict.exit_code);
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "verdict": {
                            "status": verdict.status.to_string(),
                            "exit_code": verdict.exit_code,
                            "reason": verdict.reason,
                        },
                        "events": {
                            "applied": stats.applied,
                            "unmatched": stats.unmatched,
                        },
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Silent => {}
            }

            let summary = storage::CoverageSummary {
                config: &config,
                report: &report,
                verdict: &verdict,
                events: stats,
                event_log: &events_path,
            };
            match storage::save_summary(&summary) {
                Ok(path) => {
                    if output != OutputFormat::Silent {
                        eprintln!("Report saved: {}", path.display());
                    }
                }
                Err(e) => eprintln!("Warning: failed to save report: {e}"),
            }

            Ok(verdict.exit_code)
        }

        Commands::Init => {
            let config_path = ".apiconform.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - document: path to your OpenAPI document");
            println!("  - error_format: shape of rendered client errors");
            println!("  - coverage: minimum, event log, skipped responses");
            Ok(0)
        }

        Commands::Schema { target } => {
            println!("{}", generate_schema(target.into()));
            Ok(0)
        }
    }
}

fn print_check(document: &Document, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Terminal => {
            println!(
                "{} (OpenAPI {}, {} file(s))",
                document.id(),
                document.version().as_str(),
                document.files().len()
            );
            println!("  Operations: {}", document.operations().len());
            for operation in document.operations() {
                print_operation(operation);
            }
        }
        OutputFormat::Json => {
            let operations: Vec<_> = document.operations().iter().map(operation_json).collect();
            let json = serde_json::json!({
                "document": document.id(),
                "openapi": document.version().as_str(),
                "files": document.files(),
                "operations": operations,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Silent => {}
    }
    Ok(())
}

fn print_operation(operation: &Operation) {
    match &operation.operation_id {
        Some(id) => println!("\n  {} ({id})", operation.label()),
        None => println!("\n  {}", operation.label()),
    }
    let requests: Vec<&str> = operation
        .request_variants()
        .iter()
        .map(|v| v.content_type().unwrap_or("(no body)"))
        .collect();
    println!("    request:   {}", requests.join(", "));
    let responses: Vec<String> = operation
        .response_variants()
        .iter()
        .map(|v| match v.content_type() {
            Some(content_type) => format!("{} {content_type}", v.status()),
            None => v.status().to_string(),
        })
        .collect();
    println!("    responses: {}", responses.join(", "));
}

fn operation_json(operation: &Operation) -> serde_json::Value {
    let requests: Vec<Option<&str>> = operation
        .request_variants()
        .iter()
        .map(|v| v.content_type())
        .collect();
    let responses: Vec<serde_json::Value> = operation
        .response_variants()
        .iter()
        .map(|v| serde_json::json!({"status": v.status(), "content_type": v.content_type()}))
        .collect();
    serde_json::json!({
        "method": operation.method.as_str(),
        "path": operation.path,
        "operation_id": operation.operation_id,
        "requests": requests,
        "responses": responses,
    })
}

fn print_route(
    definition: &Definition,
    method: &Method,
    path: &str,
    content_type: Option<&str>,
    output: OutputFormat,
) -> Result<i32> {
    let matched = definition.router().route(method, path, content_type);

    match (&matched, output) {
        (_, OutputFormat::Silent) => {}
        (Ok(route), OutputFormat::Terminal) => {
            println!("{}", route.operation.label());
            if let Some(id) = &route.operation.operation_id {
                println!("  operation_id: {id}");
            }
            println!(
                "  variant:      {}",
                route.variant.content_type().unwrap_or("(no body)")
            );
            for (name, value) in &route.path_params {
                println!("  {name} = {value}");
            }
        }
        (Ok(route), OutputFormat::Json) => {
            let params: serde_json::Map<String, serde_json::Value> = route
                .path_params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            let json = serde_json::json!({
                "operation": route.operation.label(),
                "operation_id": route.operation.operation_id,
                "content_type": route.variant.content_type(),
                "path_params": params,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        (Err(failure), OutputFormat::Terminal) => {
            println!("{} ({}): {}", failure.kind, failure.status(), failure.message());
        }
        (Err(failure), OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(failure)?);
        }
    }

    Ok(if matched.is_ok() { 0 } else { 1 })
}

fn plan_to_terminal(plan: &Plan) -> String {
    let mut lines = vec![format!("{}: {} task(s)", plan.document(), plan.len())];
    for (route, tasks) in plan.routes() {
        lines.push(format!("  {route}"));
        for task in tasks {
            lines.push(format!("    - {}", task.key().variant_label()));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

fn print_replay_stats(stats: &ReplayStats) {
    println!("  Events: {} applied", stats.applied);
    if stats.unmatched > 0 {
        println!(
            "  WARNING: {} event(s) did not match the plan (check --document-id)",
            stats.unmatched
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Document {
        Document::from_value(json!({
            "openapi": "3.1.0",
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": {"content": {"application/json": {}}},
                        "responses": {
                            "201": {"description": "ok", "content": {"application/json": {}}},
                            "400": {"description": "bad"}
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "apiconform",
            "coverage",
            "api.yaml",
            "--events",
            "events.jsonl",
            "--minimum",
            "80",
            "--output",
            "json",
        ])
        .unwrap();
        assert!(cli.output == OutputFormat::Json);
        match cli.command {
            Commands::Coverage {
                document, minimum, ..
            } => {
                assert_eq!(document, Some(PathBuf::from("api.yaml")));
                assert_eq!(minimum, Some(80));
            }
            _ => panic!("expected coverage command"),
        }
    }

    #[test]
    fn minimum_above_hundred_is_rejected() {
        let result = Cli::try_parse_from(["apiconform", "coverage", "--minimum", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn operation_json_lists_variants() {
        let document = document();
        let json = operation_json(&document.operations()[0]);
        assert_eq!(json["operation_id"], "createPet");
        assert_eq!(json["requests"], json!(["application/json", null]));
        assert_eq!(
            json["responses"],
            json!([
                {"status": "201", "content_type": "application/json"},
                {"status": "400", "content_type": null}
            ])
        );
    }

    #[test]
    fn plan_listing_groups_tasks_by_route() {
        let document = document();
        let plan = apiconform_engine::coverage_plan(&document, &Default::default());
        let text = plan_to_terminal(&plan);
        assert!(text.starts_with("<inline>: 4 task(s)"));
        assert!(text.contains("  POST /pets\n"));
    }
}
