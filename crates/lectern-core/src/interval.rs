//! Playback-time intervals and disjoint coverage sets.
//!
//! # Representation
//!
//! An [`Interval`] is a `(start, end)` pair of playback positions with
//! `start <= end`. On the wire it is a two-element JSON array
//! `[start, end]`.
//!
//! A [`Coverage`] is a set of intervals kept **sorted by start and
//! disjoint with a strict gap**: for consecutive `(a, b)`, `(c, d)` it
//! always holds that `b < c`. Touching intervals are merged, so a chain of
//! reports ending exactly where the next begins never leaves a micro-gap.
//!
//! # Operations
//!
//! - [`Coverage::merge`]: sort-and-sweep coalescing of raw spans.
//! - [`Coverage::subtract`]: carve one coverage out of another. Both
//!   inputs are already disjoint-sorted, so this is a linear two-pointer
//!   sweep.
//! - [`Coverage::insert`]: merge one span into an existing set.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A contiguous span of the video timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    /// Build an interval, swapping the endpoints if given out of order.
    pub fn new(start: f64, end: f64) -> Self {
        if end < start {
            Interval {
                start: end,
                end: start,
            }
        } else {
            Interval { start, end }
        }
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True if the open interiors of `self` and `other` intersect.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl From<(f64, f64)> for Interval {
    fn from((start, end): (f64, f64)) -> Self {
        Interval::new(start, end)
    }
}

impl From<Interval> for (f64, f64) {
    fn from(interval: Interval) -> Self {
        (interval.start, interval.end)
    }
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// Sorted, disjoint set of intervals for one classification.
///
/// Every constructor upholds the invariant. Deserialization goes through
/// [`Coverage::merge`], so a hand-edited list cannot smuggle in overlaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct Coverage(Vec<Interval>);

impl Coverage {
    /// An empty coverage set.
    pub fn new() -> Self {
        Coverage(Vec::new())
    }

    /// Coalesce `spans` into a minimal sorted disjoint set.
    ///
    /// Spans that overlap or touch (`next.start <= current.end`) merge.
    pub fn merge<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = Interval>,
    {
        let mut spans: Vec<Interval> = spans.into_iter().collect();
        spans.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<Interval> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(current) if span.start <= current.end => {
                    current.end = current.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }
        Coverage(merged)
    }

    /// Remove every part of `self` that overlaps `remove`.
    ///
    /// Each interval of `self` yields zero, one, or several surviving
    /// pieces depending on how many cuts fall inside it. Shared endpoints
    /// are not overlap: `[0, 5]` minus `[5, 9]` is `[0, 5]`.
    pub fn subtract(&self, remove: &Coverage) -> Coverage {
        let cuts = remove.intervals();
        let mut result = Vec::with_capacity(self.0.len());
        // Cuts ending at or before a base start cannot touch that base or
        // any later one, so `first` only moves forward.
        let mut first = 0;

        for base in &self.0 {
            while first < cuts.len() && cuts[first].end <= base.start {
                first += 1;
            }

            let mut cursor = base.start;
            for cut in &cuts[first..] {
                if cut.start >= base.end {
                    break;
                }
                if cut.start > cursor {
                    result.push(Interval {
                        start: cursor,
                        end: cut.start,
                    });
                }
                cursor = cursor.max(cut.end);
                if cursor >= base.end {
                    break;
                }
            }
            if cursor < base.end {
                result.push(Interval {
                    start: cursor,
                    end: base.end,
                });
            }
        }

        Coverage(result)
    }

    /// Merge a single span into this set, keeping it disjoint-sorted.
    pub fn insert(&mut self, span: Interval) {
        // First interval whose end reaches the span; everything before it
        // lies strictly to the left.
        let lo = self.0.partition_point(|iv| iv.end < span.start);
        // First interval starting strictly after the span's end.
        let hi = self.0.partition_point(|iv| iv.start <= span.end);

        if lo >= hi {
            self.0.insert(lo, span);
            return;
        }
        let start = span.start.min(self.0[lo].start);
        let end = span.end.max(self.0[hi - 1].end);
        self.0.splice(lo..hi, std::iter::once(Interval { start, end }));
    }

    /// Sum of interval durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.0.iter().map(Interval::duration).sum()
    }

    /// The intervals, sorted by start.
    pub fn intervals(&self) -> &[Interval] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if some interval of `self` overlaps some interval of `other`.
    pub fn overlaps(&self, other: &Coverage) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a, b) = (&self.0[i], &other.0[j]);
            if a.overlaps(b) {
                return true;
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Check the sorted, strictly-gapped invariant.
    pub fn is_disjoint_sorted(&self) -> bool {
        self.0.iter().all(|iv| iv.start <= iv.end)
            && self.0.windows(2).all(|w| w[0].end < w[1].start)
    }
}

impl From<Vec<Interval>> for Coverage {
    fn from(spans: Vec<Interval>) -> Self {
        Coverage::merge(spans)
    }
}

impl From<Coverage> for Vec<Interval> {
    fn from(coverage: Coverage) -> Self {
        coverage.0
    }
}

impl FromIterator<Interval> for Coverage {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        Coverage::merge(iter)
    }
}
