//! Coverage resolver -- event timeline to valid/invalid coverage.
//!
//! # Overview
//!
//! [`resolve`] is a pure function of the full ordered timeline:
//!
//! 1. Classify every adjacent pair ([`crate::classify`]).
//! 2. Partition spans into valid and invalid lists, dropping ignores.
//! 3. Merge each list into a disjoint set ([`Coverage::merge`]).
//! 4. Subtract valid from invalid so no second is reported as both.
//!
//! No state survives between calls. Re-resolving a timeline always yields
//! the same report, and the cost is linear in the number of events (plus
//! the sort inside merge).
//!
//! # Incremental mode
//!
//! [`CoverageTracker`] classifies only the trailing pair as each event
//! arrives and folds the span into cached merged sets. It is an
//! optimization with identical results: `tracker.report()` after observing
//! a prefix equals `resolve(prefix)`.
//!
//! # coverage_hash
//!
//! `coverage_hash = BLAKE3(RESOLVER_VERSION + valid + invalid)` over the
//! little-endian bit patterns of every endpoint, so two reports hash equal
//! exactly when they are bit-identical.

use crate::classify::{classify, ClassifierParams, SpanClass};
use crate::event::{PlaybackPoint, PlaybackSample};
use crate::interval::{Coverage, Interval};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Resolver logic version, mixed into [`coverage_hash`].
pub const RESOLVER_VERSION: &str = "resolver-v1";

/// Final valid and invalid coverage for a timeline.
///
/// Both sets are disjoint-sorted and never overlap each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Time watched at a believable rate.
    pub valid: Coverage,
    /// Time claimed but not credibly watched, minus anything valid.
    pub invalid: Coverage,
}

impl CoverageReport {
    /// Total valid seconds.
    pub fn valid_secs(&self) -> f64 {
        self.valid.total_duration()
    }

    /// Total invalid seconds.
    pub fn invalid_secs(&self) -> f64 {
        self.invalid.total_duration()
    }

    fn from_merged(valid: Coverage, invalid_raw: &Coverage) -> Self {
        let invalid = invalid_raw.subtract(&valid);
        CoverageReport { valid, invalid }
    }
}

/// Resolve the full timeline into valid and invalid coverage.
///
/// Empty and single-event timelines resolve to two empty sets.
pub fn resolve<S: PlaybackSample>(timeline: &[S], params: &ClassifierParams) -> CoverageReport {
    let mut valid_spans: Vec<Interval> = Vec::new();
    let mut invalid_spans: Vec<Interval> = Vec::new();
    let mut ignored = 0usize;

    for pair in timeline.windows(2) {
        match classify(&pair[0], &pair[1], params) {
            SpanClass::Valid(span) => valid_spans.push(span),
            SpanClass::Invalid(span) => invalid_spans.push(span),
            SpanClass::Ignore => ignored += 1,
        }
    }

    debug!(
        events = timeline.len(),
        valid_spans = valid_spans.len(),
        invalid_spans = invalid_spans.len(),
        ignored,
        "classified timeline"
    );

    let valid = Coverage::merge(valid_spans);
    let invalid_raw = Coverage::merge(invalid_spans);
    CoverageReport::from_merged(valid, &invalid_raw)
}

/// Hash a coverage report: `BLAKE3(RESOLVER_VERSION + valid + invalid)`.
pub fn coverage_hash(report: &CoverageReport) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(RESOLVER_VERSION.as_bytes());
    for (tag, coverage) in [("valid", &report.valid), ("invalid", &report.invalid)] {
        hasher.update(tag.as_bytes());
        hasher.update(&(coverage.len() as u64).to_le_bytes());
        for iv in coverage.intervals() {
            hasher.update(&iv.start.to_bits().to_le_bytes());
            hasher.update(&iv.end.to_bits().to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Incremental tracker
// ---------------------------------------------------------------------------

/// Incremental equivalent of [`resolve`].
///
/// Keeps the merged valid set and the merged, not yet subtracted, invalid
/// set. Subtraction happens on [`CoverageTracker::report`], because a later
/// valid span can still cut into earlier invalid coverage.
#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    params: ClassifierParams,
    last: Option<PlaybackPoint>,
    valid: Coverage,
    invalid_raw: Coverage,
    observed: u64,
}

impl CoverageTracker {
    pub fn new(params: ClassifierParams) -> Self {
        CoverageTracker {
            params,
            ..Default::default()
        }
    }

    /// Build a tracker that has already observed `timeline`.
    pub fn from_timeline<S: PlaybackSample>(timeline: &[S], params: ClassifierParams) -> Self {
        let mut tracker = CoverageTracker::new(params);
        for sample in timeline {
            tracker.observe(sample);
        }
        tracker
    }

    /// Fold the next event in and return how its pair was classified.
    ///
    /// The first event has no predecessor and always returns `Ignore`.
    pub fn observe<S: PlaybackSample + ?Sized>(&mut self, sample: &S) -> SpanClass {
        let point = PlaybackPoint::new(sample.player_time(), sample.wall_timestamp());
        let class = match &self.last {
            Some(prev) => classify(prev, &point, &self.params),
            None => SpanClass::Ignore,
        };
        match class {
            SpanClass::Valid(span) => self.valid.insert(span),
            SpanClass::Invalid(span) => self.invalid_raw.insert(span),
            SpanClass::Ignore => {}
        }
        self.last = Some(point);
        self.observed += 1;
        class
    }

    /// Number of events observed so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Merged valid coverage so far.
    pub fn valid(&self) -> &Coverage {
        &self.valid
    }

    /// Current report, identical to `resolve` over the observed prefix.
    pub fn report(&self) -> CoverageReport {
        CoverageReport::from_merged(self.valid.clone(), &self.invalid_raw)
    }
}
