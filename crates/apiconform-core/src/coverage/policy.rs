//! Coverage policy - turns a report into a pass/fail verdict

use super::CoverageReport;

/// Gate applied to a finished coverage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoveragePolicy {
    /// Required mean coverage in percent; `None` reports without gating
    pub minimum: Option<u8>,
}

impl CoveragePolicy {
    #[must_use]
    pub const fn with_minimum(minimum: u8) -> Self {
        Self {
            minimum: Some(minimum),
        }
    }

    /// Judge a report.
    ///
    /// Exit codes: 0 pass, 1 below minimum, 3 nothing was planned.
    #[must_use]
    pub fn verdict(&self, report: &CoverageReport) -> Verdict {
        let Some(coverage) = report.coverage else {
            return Verdict {
                status: VerdictStatus::Fail,
                exit_code: 3,
                reason: "No coverage tasks were planned".to_string(),
            };
        };

        match self.minimum {
            Some(minimum) if coverage < f64::from(minimum) => Verdict {
                status: VerdictStatus::Fail,
                exit_code: 1,
                reason: format!("Coverage {coverage:.1}% is below the required {minimum}%"),
            },
            Some(minimum) => Verdict {
                status: VerdictStatus::Pass,
                exit_code: 0,
                reason: format!("Coverage {coverage:.1}% meets the required {minimum}%"),
            },
            None => Verdict {
                status: VerdictStatus::Pass,
                exit_code: 0,
                reason: format!("Coverage {coverage:.1}% (no minimum configured)"),
            },
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(coverage: Option<f64>) -> CoverageReport {
        CoverageReport {
            coverage,
            documents: vec![],
        }
    }

    #[test]
    fn no_minimum_always_passes() {
        let v = CoveragePolicy::default().verdict(&report(Some(10.0)));
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.exit_code, 0);
        assert!(v.reason.contains("no minimum"));
    }

    #[test]
    fn below_minimum_fails() {
        let v = CoveragePolicy::with_minimum(80).verdict(&report(Some(79.5)));
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 1);
        assert_eq!(v.reason, "Coverage 79.5% is below the required 80%");
    }

    #[test]
    fn exact_minimum_passes() {
        let v = CoveragePolicy::with_minimum(80).verdict(&report(Some(80.0)));
        assert_eq!(v.status, VerdictStatus::Pass);
    }

    #[test]
    fn nothing_planned_is_tool_error() {
        let v = CoveragePolicy::with_minimum(0).verdict(&report(None));
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 3);
        assert_eq!(v.status.to_string(), "FAIL");
    }
}
