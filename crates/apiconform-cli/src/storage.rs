//! Persistent coverage summaries - `coverage.report_dir` (default `.apiconform/reports/`)
//!
//! Every `apiconform coverage` run is saved regardless of `--output` mode.
//! Directory layout: `{document}_{timestamp}/`

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use apiconform_core::coverage::ReplayStats;
use apiconform_core::{Config, CoverageReport, Verdict};

/// Everything needed to persist a coverage run.
pub struct CoverageSummary<'a> {
    pub config: &'a Config,
    pub report: &'a CoverageReport,
    pub verdict: &'a Verdict,
    pub events: ReplayStats,
    pub event_log: &'a Path,
}

/// Save a coverage run under `{report_dir}/{document}_{timestamp}/`.
///
/// Returns the run directory on success.
pub fn save_summary(data: &CoverageSummary) -> Result<PathBuf, std::io::Error> {
    let dir = data
        .config
        .coverage
        .report_dir()
        .join(build_dir_name(&data.config.document, &timestamp_compact()));
    std::fs::create_dir_all(&dir)?;

    // config.toml: the configuration the run was judged under
    let config_toml =
        toml::to_string_pretty(data.config).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join("config.toml"), config_toml)?;

    let report =
        serde_json::to_string_pretty(data.report).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join("report.json"), report)?;

    let summary = serde_json::json!({
        "verdict": {
            "status": data.verdict.status.to_string(),
            "exit_code": data.verdict.exit_code,
            "reason": data.verdict.reason,
        },
        "coverage": data.report.coverage,
        "events": {
            "log": data.event_log.display().to_string(),
            "applied": data.events.applied,
            "unmatched": data.events.unmatched,
        },
        "meta": {
            "timestamp": timestamp_iso(),
            "document": data.config.document.display().to_string(),
        },
    });
    let summary =
        serde_json::to_string_pretty(&summary).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(dir.join("summary.json"), summary)?;

    Ok(dir)
}

/// `{stem}_{timestamp}` e.g. `petstore_20261018T093000`
fn build_dir_name(document: &Path, timestamp: &str) -> String {
    let stem = document
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}_{timestamp}")
}

/// `"20261018T093000"`
fn timestamp_compact() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}{mo:02}{d:02}T{h:02}{mi:02}{s:02}")
}

/// `"2026-10-18T09:30:00Z"`
fn timestamp_iso() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

fn utc_now() -> (i32, u32, u32, u32, u32, u32) {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    split_epoch(secs)
}

/// Epoch seconds to UTC `(year, month, day, hour, minute, second)`.
fn split_epoch(secs: u64) -> (i32, u32, u32, u32, u32, u32) {
    let days = i64::try_from(secs / 86_400).unwrap_or(i64::MAX / 2);
    let tod = u32::try_from(secs % 86_400).unwrap_or(0);
    let (y, m, d) = civil_from_days(days);
    (y, m, d, tod / 3600, (tod % 3600) / 60, tod % 60)
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
///
/// Reference: <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = i64::from(yoe) + era * 400 + i64::from(month <= 2);
    (year as i32, month, day)
}
