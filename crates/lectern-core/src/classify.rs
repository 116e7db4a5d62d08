//! Pairwise timing-consistency classifier.
//!
//! Given two adjacent events, compare how far the player advanced with how
//! much wall time passed between their arrivals:
//!
//! ```text
//! elapsed_play = curr.player_time - prev.player_time
//! elapsed_wall = curr.wall_timestamp - prev.wall_timestamp
//!
//! elapsed_play <= 0                                   → Ignore
//! elapsed_play <  speed_factor * elapsed_wall + slack → Valid(prev, curr)
//! otherwise                                           → Invalid(prev, curr)
//! ```
//!
//! A backward wall clock shrinks the valid bound, below zero once the
//! regression exceeds `slack / speed_factor`, so forward play across it
//! classifies as invalid. That is defined behavior, not an error path.

use crate::event::PlaybackSample;
use crate::interval::Interval;
use serde::{Deserialize, Serialize};

/// Default playback speed tolerance (2x real time).
pub const DEFAULT_SPEED_FACTOR: f64 = 2.0;

/// Default fixed jitter allowance in seconds.
pub const DEFAULT_SLACK_SECS: f64 = 2.0;

/// Tolerances for the valid-window test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Maximum ratio of playback advance to wall time.
    pub speed_factor: f64,
    /// Fixed allowance for network and report jitter, in seconds.
    pub slack_secs: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        ClassifierParams {
            speed_factor: DEFAULT_SPEED_FACTOR,
            slack_secs: DEFAULT_SLACK_SECS,
        }
    }
}

impl ClassifierParams {
    /// Exclusive upper bound on playback advance for a valid pair.
    pub fn valid_bound(&self, elapsed_wall: f64) -> f64 {
        self.speed_factor * elapsed_wall + self.slack_secs
    }
}

/// Outcome of classifying one adjacent event pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanClass {
    /// Playback advanced at a believable rate.
    Valid(Interval),
    /// Playback advanced faster than real time allows (seek or spoof).
    Invalid(Interval),
    /// Playback did not advance; contributes nothing.
    Ignore,
}

impl SpanClass {
    /// The span, if any.
    pub fn span(&self) -> Option<Interval> {
        match self {
            SpanClass::Valid(span) | SpanClass::Invalid(span) => Some(*span),
            SpanClass::Ignore => None,
        }
    }
}

/// Classify the playback span between two adjacent events.
pub fn classify<P, C>(prev: &P, curr: &C, params: &ClassifierParams) -> SpanClass
where
    P: PlaybackSample + ?Sized,
    C: PlaybackSample + ?Sized,
{
    let elapsed_play = curr.player_time() - prev.player_time();
    let elapsed_wall = curr.wall_timestamp() - prev.wall_timestamp();

    if elapsed_play.is_nan() || elapsed_play <= 0.0 {
        return SpanClass::Ignore;
    }

    let span = Interval {
        start: prev.player_time(),
        end: curr.player_time(),
    };
    if elapsed_play < params.valid_bound(elapsed_wall) {
        SpanClass::Valid(span)
    } else {
        SpanClass::Invalid(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlaybackPoint;

    fn run(prev: (f64, f64), curr: (f64, f64)) -> SpanClass {
        classify(
            &PlaybackPoint::new(prev.0, prev.1),
            &PlaybackPoint::new(curr.0, curr.1),
            &ClassifierParams::default(),
        )
    }

    #[test]
    fn real_time_playback_is_valid() {
        assert_eq!(run((0.0, 0.0), (5.0, 5.0)), SpanClass::Valid(Interval::new(0.0, 5.0)));
    }

    #[test]
    fn forward_jump_is_invalid() {
        assert_eq!(run((5.0, 5.0), (20.0, 6.0)), SpanClass::Invalid(Interval::new(5.0, 20.0)));
    }

    #[test]
    fn no_advance_is_ignored() {
        assert_eq!(run((10.0, 0.0), (10.0, 30.0)), SpanClass::Ignore);
    }

    #[test]
    fn rewind_is_ignored() {
        assert_eq!(run((50.0, 0.0), (10.0, 1.0)), SpanClass::Ignore);
    }

    #[test]
    fn bound_is_exclusive() {
        // elapsed_wall = 1 → bound = 4.
        assert_eq!(run((0.0, 0.0), (3.999, 1.0)), SpanClass::Valid(Interval::new(0.0, 3.999)));
        assert_eq!(run((0.0, 0.0), (4.0, 1.0)), SpanClass::Invalid(Interval::new(0.0, 4.0)));
    }

    #[test]
    fn slack_covers_burst_with_no_wall_time() {
        assert!(matches!(run((0.0, 3.0), (1.5, 3.0)), SpanClass::Valid(_)));
        assert!(matches!(run((0.0, 3.0), (2.0, 3.0)), SpanClass::Invalid(_)));
    }

    #[test]
    fn double_speed_is_tolerated() {
        assert!(matches!(run((0.0, 0.0), (20.0, 10.0)), SpanClass::Valid(_)));
        assert!(matches!(run((0.0, 0.0), (23.0, 10.0)), SpanClass::Invalid(_)));
    }

    #[test]
    fn backward_wall_clock_forces_invalid() {
        // elapsed_wall = -5 → bound = -8, any forward play is invalid.
        assert_eq!(run((0.0, 10.0), (1.0, 5.0)), SpanClass::Invalid(Interval::new(0.0, 1.0)));
    }

    #[test]
    fn nan_player_time_is_ignored() {
        assert_eq!(run((0.0, 0.0), (f64::NAN, 1.0)), SpanClass::Ignore);
    }

    #[test]
    fn custom_params_change_the_bound() {
        let strict = ClassifierParams {
            speed_factor: 1.0,
            slack_secs: 0.5,
        };
        let prev = PlaybackPoint::new(0.0, 0.0);
        assert!(matches!(
            classify(&prev, &PlaybackPoint::new(10.4, 10.0), &strict),
            SpanClass::Valid(_)
        ));
        assert!(matches!(
            classify(&prev, &PlaybackPoint::new(15.0, 10.0), &strict),
            SpanClass::Invalid(_)
        ));
    }

    #[test]
    fn span_accessor() {
        assert_eq!(SpanClass::Ignore.span(), None);
        assert_eq!(
            SpanClass::Invalid(Interval::new(1.0, 2.0)).span(),
            Some(Interval::new(1.0, 2.0))
        );
    }
}
