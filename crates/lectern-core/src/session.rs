//! Per-lecture session: append, resolve, evaluate.
//!
//! A [`LectureSession`] owns the telemetry log for one video. Each
//! [`LectureSession::submit`] runs, in order:
//!
//! 1. Check the report targets this session's video.
//! 2. Stamp it with the server arrival time and append it durably.
//! 3. Resolve coverage over the full timeline (borrowed from the log).
//! 4. Evaluate completion.
//!
//! `submit` takes `&mut self`, so one session handles one submission at a
//! time and the log's append order is the order the resolver sees. Across
//! sessions the log's writer lock does the same job: a second session on
//! the same video waits in [`LectureSession::open`] until the first is
//! dropped, then replays everything the first one appended.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::completion::{CompletionPolicy, Verdict};
use crate::config::{LectureConfig, ResolverParams};
use crate::error::{LecternError, Result};
use crate::event::TelemetryReport;
use crate::eventlog::TelemetryLog;
use crate::resolver::{resolve, CoverageReport};

/// Result of one accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// `seq` assigned to the appended event.
    pub seq: u64,
    /// Coverage over the full timeline including the new event.
    pub coverage: CoverageReport,
    /// Completion verdict for that coverage.
    pub verdict: Verdict,
}

/// Telemetry session for one lecture video.
pub struct LectureSession {
    config: LectureConfig,
    params: ResolverParams,
    policy: CompletionPolicy,
    log: TelemetryLog,
    /// Completion state after the last evaluation, for transition logging.
    completed: bool,
}

impl LectureSession {
    /// Build a session around an already-open log.
    pub fn new(config: LectureConfig, params: ResolverParams, log: TelemetryLog) -> Result<Self> {
        params.validate()?;
        let policy = params.completion_policy(&config);
        let mut session = LectureSession {
            config,
            params,
            policy,
            log,
            completed: false,
        };
        session.completed = session.evaluate(&session.resolve_now()).complete;
        Ok(session)
    }

    /// Open (or create) the log for `config.video_id` under `log_dir`.
    pub fn open(config: LectureConfig, params: ResolverParams, log_dir: &Path) -> Result<Self> {
        let log = TelemetryLog::open_for_video(log_dir, &config.video_id)?;
        Self::new(config, params, log)
    }

    /// Accept one telemetry report for `video_id`, arriving at `timestamp`.
    pub fn submit(
        &mut self,
        video_id: &str,
        report: TelemetryReport,
        timestamp: f64,
    ) -> Result<SubmitOutcome> {
        if video_id != self.config.video_id {
            return Err(LecternError::VideoMismatch {
                expected: self.config.video_id.clone(),
                actual: video_id.to_string(),
            });
        }
        report.validate()?;

        let seq = self
            .log
            .append(report.stamp(video_id, timestamp))
            .map_err(LecternError::Storage)?
            .seq;

        let coverage = self.resolve_now();
        let verdict = self.evaluate(&coverage);
        if verdict.complete && !self.completed {
            info!(
                video_id = %self.config.video_id,
                seq,
                valid_secs = verdict.valid_secs,
                required_secs = verdict.required_secs,
                "lecture completed"
            );
        }
        self.completed = verdict.complete;

        Ok(SubmitOutcome {
            seq,
            coverage,
            verdict,
        })
    }

    /// Coverage and verdict for the timeline as it stands, without appending.
    pub fn status(&self) -> (CoverageReport, Verdict) {
        let coverage = self.resolve_now();
        let verdict = self.evaluate(&coverage);
        (coverage, verdict)
    }

    pub fn config(&self) -> &LectureConfig {
        &self.config
    }

    pub fn params(&self) -> &ResolverParams {
        &self.params
    }

    /// The underlying log.
    pub fn log(&self) -> &TelemetryLog {
        &self.log
    }

    fn resolve_now(&self) -> CoverageReport {
        resolve(self.log.events(), &self.params.classifier)
    }

    fn evaluate(&self, coverage: &CoverageReport) -> Verdict {
        self.policy.evaluate(coverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::sample_report;
    use crate::interval::Interval;

    fn session_in(dir: &Path, required: f64) -> LectureSession {
        let config = LectureConfig::new("abc123", required).unwrap();
        LectureSession::open(config, ResolverParams::default(), dir).unwrap()
    }

    fn intervals(coverage: &crate::interval::Coverage) -> Vec<(f64, f64)> {
        coverage.intervals().iter().map(|&iv: &Interval| iv.into()).collect()
    }

    #[test]
    fn end_to_end_watch_then_seek() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 100.0);

        let first = session.submit("abc123", sample_report(0.0), 0.0).unwrap();
        assert_eq!(first.seq, 0);
        assert!(first.coverage.valid.is_empty());

        session.submit("abc123", sample_report(5.0), 5.0).unwrap();
        let outcome = session.submit("abc123", sample_report(20.0), 6.0).unwrap();

        assert_eq!(outcome.seq, 2);
        assert_eq!(intervals(&outcome.coverage.valid), vec![(0.0, 5.0)]);
        assert_eq!(intervals(&outcome.coverage.invalid), vec![(5.0, 20.0)]);
        assert!(!outcome.verdict.complete);
        assert_eq!(outcome.verdict.valid_secs, 5.0);
    }

    #[test]
    fn completes_after_honest_watch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 30.0);
        let mut last = None;
        for t in (0..=30).step_by(5) {
            last = Some(session.submit("abc123", sample_report(t as f64), t as f64).unwrap());
        }
        let verdict = last.unwrap().verdict;
        assert_eq!(verdict.valid_secs, 30.0);
        assert!(verdict.complete);
    }

    #[test]
    fn seeking_to_the_end_does_not_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 600.0);
        session.submit("abc123", sample_report(0.0), 0.0).unwrap();
        let outcome = session.submit("abc123", sample_report(600.0), 1.0).unwrap();
        assert!(!outcome.verdict.complete);
        assert_eq!(outcome.verdict.invalid_secs, 600.0);
    }

    #[test]
    fn wrong_video_is_rejected_without_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 100.0);
        let err = session.submit("other", sample_report(1.0), 1.0).unwrap_err();
        assert!(matches!(err, LecternError::VideoMismatch { .. }));
        assert!(session.log().is_empty());
    }

    #[test]
    fn invalid_report_is_rejected_without_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 100.0);
        let err = session
            .submit("abc123", sample_report(f64::NAN), 1.0)
            .unwrap_err();
        assert!(matches!(err, LecternError::MalformedEvent(_)));
        assert!(session.log().is_empty());
    }

    #[test]
    fn reopened_session_resumes_coverage() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut session = session_in(dir.path(), 100.0);
            session.submit("abc123", sample_report(0.0), 0.0).unwrap();
            session.submit("abc123", sample_report(10.0), 10.0).unwrap();
        }

        let mut session = session_in(dir.path(), 100.0);
        let (coverage, _) = session.status();
        assert_eq!(intervals(&coverage.valid), vec![(0.0, 10.0)]);

        let outcome = session.submit("abc123", sample_report(20.0), 20.0).unwrap();
        assert_eq!(outcome.seq, 2);
        assert_eq!(intervals(&outcome.coverage.valid), vec![(0.0, 20.0)]);
    }

    #[test]
    fn second_session_sees_events_of_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = session_in(dir.path(), 100.0);

        let log_dir = dir.path().to_path_buf();
        let second = std::thread::spawn(move || {
            let mut session = session_in(&log_dir, 100.0);
            session.submit("abc123", sample_report(10.0), 10.0).unwrap()
        });

        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(first.submit("abc123", sample_report(0.0), 0.0).unwrap().seq, 0);
        drop(first);

        let outcome = second.join().unwrap();
        assert_eq!(outcome.seq, 1);
        assert_eq!(intervals(&outcome.coverage.valid), vec![(0.0, 10.0)]);
    }

    #[test]
    fn status_does_not_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), 100.0);
        session.submit("abc123", sample_report(0.0), 0.0).unwrap();
        let (a, va) = session.status();
        let (b, vb) = session.status();
        assert_eq!(a, b);
        assert_eq!(va, vb);
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn invalid_params_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = LectureConfig::new("abc123", 10.0).unwrap();
        let mut params = ResolverParams::default();
        params.classifier.speed_factor = -1.0;
        assert!(matches!(
            LectureSession::open(config, params, dir.path()),
            Err(LecternError::InvalidConfig(_))
        ));
    }
}
