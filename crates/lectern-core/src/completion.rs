//! Completion evaluator -- valid coverage against the required watch time.
//!
//! A lecture counts as complete when
//! `valid_secs > required_total_secs - grace_secs`. The grace exists
//! because the last few seconds of a video are rarely reported before the
//! player ends. Invalid coverage never counts.

use crate::interval::Coverage;
use crate::resolver::CoverageReport;
use serde::{Deserialize, Serialize};

/// Default grace for the unreported final segment, in seconds.
pub const DEFAULT_GRACE_SECS: f64 = 5.0;

/// Completion threshold for one lecture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionPolicy {
    /// Seconds of valid coverage the lecture requires.
    pub required_total_secs: f64,
    /// Shortfall tolerated at the end, in seconds.
    pub grace_secs: f64,
}

impl CompletionPolicy {
    pub fn new(required_total_secs: f64) -> Self {
        CompletionPolicy {
            required_total_secs,
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }

    pub fn with_grace(mut self, grace_secs: f64) -> Self {
        self.grace_secs = grace_secs;
        self
    }

    /// Valid seconds that must be strictly exceeded.
    pub fn threshold_secs(&self) -> f64 {
        self.required_total_secs - self.grace_secs
    }

    /// Whether `valid` coverage satisfies the policy.
    pub fn is_satisfied_by(&self, valid: &Coverage) -> bool {
        valid.total_duration() > self.threshold_secs()
    }

    /// Evaluate a full report.
    pub fn evaluate(&self, report: &CoverageReport) -> Verdict {
        let valid_secs = report.valid_secs();
        Verdict {
            valid_secs,
            invalid_secs: report.invalid_secs(),
            required_secs: self.required_total_secs,
            complete: valid_secs > self.threshold_secs(),
        }
    }
}

/// Completion outcome for a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Total valid coverage in seconds.
    pub valid_secs: f64,
    /// Total invalid coverage in seconds (informational).
    pub invalid_secs: f64,
    /// Required total in seconds.
    pub required_secs: f64,
    /// True once valid coverage crosses the threshold.
    pub complete: bool,
}

/// `is_complete` with the default grace.
pub fn is_complete(valid: &Coverage, required_total_secs: f64) -> bool {
    CompletionPolicy::new(required_total_secs).is_satisfied_by(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    fn valid_of(secs: f64) -> Coverage {
        Coverage::merge([Interval::new(0.0, secs)])
    }

    #[test]
    fn exactly_at_threshold_is_not_complete() {
        assert!(!is_complete(&valid_of(95.0), 100.0));
    }

    #[test]
    fn just_past_threshold_is_complete() {
        assert!(is_complete(&valid_of(95.01), 100.0));
    }

    #[test]
    fn empty_coverage_is_not_complete() {
        assert!(!is_complete(&Coverage::new(), 100.0));
    }

    #[test]
    fn tiny_requirement_completes_on_any_coverage() {
        // threshold = 3 - 5 = -2; zero coverage already exceeds it.
        assert!(is_complete(&Coverage::new(), 3.0));
    }

    #[test]
    fn disjoint_valid_spans_are_summed() {
        let valid = Coverage::merge([
            Interval::new(0.0, 50.0),
            Interval::new(60.0, 80.0),
            Interval::new(90.0, 116.0),
        ]);
        assert!(is_complete(&valid, 100.0));
        assert!(!is_complete(&valid, 101.0));
    }

    #[test]
    fn invalid_coverage_never_counts() {
        let report = CoverageReport {
            valid: valid_of(10.0),
            invalid: Coverage::merge([Interval::new(10.0, 1000.0)]),
        };
        let verdict = CompletionPolicy::new(100.0).evaluate(&report);
        assert!(!verdict.complete);
        assert_eq!(verdict.valid_secs, 10.0);
        assert_eq!(verdict.invalid_secs, 990.0);
        assert_eq!(verdict.required_secs, 100.0);
    }

    #[test]
    fn custom_grace() {
        let policy = CompletionPolicy::new(100.0).with_grace(0.0);
        assert_eq!(policy.threshold_secs(), 100.0);
        assert!(!policy.is_satisfied_by(&valid_of(99.0)));
        assert!(policy.is_satisfied_by(&valid_of(100.5)));
    }

    #[test]
    fn verdict_serializes_with_stable_keys() {
        let verdict = CompletionPolicy::new(10.0).evaluate(&CoverageReport::default());
        let json = serde_json::to_string(&verdict).unwrap();
        assert_eq!(
            json,
            r#"{"valid_secs":0.0,"invalid_secs":0.0,"required_secs":10.0,"complete":false}"#
        );
    }
}
