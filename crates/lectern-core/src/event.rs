//! Telemetry event schema -- what clients report and what the log stores.
//!
//! # Type hierarchy
//!
//! Ordering and wall time are owned by the server, so the schema uses three
//! types, each produced by exactly one party:
//!
//! - [`TelemetryReport`]: the client-submitted body. It carries no wall
//!   clock and no sequence number, so a client cannot choose either.
//! - [`PendingEvent`]: a report stamped by the server with the target
//!   `video_id` and the arrival `timestamp` via [`TelemetryReport::stamp`].
//! - [`TelemetryEvent`]: a pending event committed to the log with a
//!   writer-assigned `seq`. Only [`crate::eventlog::TelemetryLog`] creates
//!   these, via [`TelemetryEvent::commit`].
//!
//! # Canonical JSONL field order for [`TelemetryEvent`]
//!
//! ```text
//! seq, video_id, timestamp, reason, player, document
//! ```
//!
//! `serde` serializes struct fields in declaration order. Do not reorder
//! fields without updating tests.
//!
//! # What the resolver reads
//!
//! Only `player.time` and `timestamp` matter to coverage. Everything else is
//! passenger data kept for audit. The resolver sees events through the
//! [`PlaybackSample`] trait and nothing more.

use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client report
// ---------------------------------------------------------------------------

/// Player state as observed by the embedding page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Raw player state code (e.g. -1 unstarted, 1 playing, 2 paused).
    pub state: i32,
    /// Playback position in seconds.
    pub time: f64,
    /// Whether audio is muted.
    pub muted: bool,
    /// Volume, 0 to 100.
    pub volume: f64,
    /// Playback rate multiplier.
    pub rate: f64,
    /// Fraction of the video buffered.
    pub loaded: f64,
    /// Video duration in seconds, as reported by the player.
    pub duration: f64,
    /// Video URL loaded in the player.
    pub url: String,
}

/// Browser document state at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// `document.visibilityState`.
    pub visibility: String,
    /// Whether the player is fullscreen.
    pub fullscreen: bool,
    /// User agent string.
    pub agent: String,
}

/// A telemetry report as submitted by a client.
///
/// Every field is required. A report missing any of them is rejected at the
/// boundary with [`LecternError::MalformedEvent`] and never reaches the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    /// Why the client sent this report (e.g. "timeupdate", "pause").
    pub reason: String,
    /// Player snapshot.
    pub player: PlayerSnapshot,
    /// Document snapshot.
    pub document: DocumentSnapshot,
}

impl TelemetryReport {
    /// Parse and validate a report from its JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let report: TelemetryReport = serde_json::from_slice(body)
            .map_err(|e| LecternError::MalformedEvent(e.to_string()))?;
        report.validate()?;
        Ok(report)
    }

    /// Check the timing fields the resolver depends on.
    pub fn validate(&self) -> Result<()> {
        let time = self.player.time;
        if !time.is_finite() || time < 0.0 {
            return Err(LecternError::MalformedEvent(format!(
                "player.time must be a finite non-negative number, got {time}"
            )));
        }
        Ok(())
    }

    /// Stamp this report with its target video and server arrival time.
    pub fn stamp(self, video_id: impl Into<String>, timestamp: f64) -> PendingEvent {
        PendingEvent {
            video_id: video_id.into(),
            timestamp,
            report: self,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending event -- stamped, not yet committed
// ---------------------------------------------------------------------------

/// A report stamped by the server, awaiting a `seq` from the log writer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    /// Video the report was submitted for.
    pub video_id: String,
    /// Server arrival time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// The client report.
    pub report: TelemetryReport,
}

// ---------------------------------------------------------------------------
// Committed event -- what goes into the log
// ---------------------------------------------------------------------------

/// An event committed to the telemetry log.
///
/// `seq` is the canonical order: 0-based, +1 per append, assigned by the log
/// writer only. Append order is temporal order; nothing reorders events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Position in the log.
    pub seq: u64,
    /// Video the report was submitted for.
    pub video_id: String,
    /// Server arrival time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Why the client sent this report.
    pub reason: String,
    /// Player snapshot.
    pub player: PlayerSnapshot,
    /// Document snapshot.
    pub document: DocumentSnapshot,
}

impl TelemetryEvent {
    /// Commit a pending event at `seq`.
    pub fn commit(pending: PendingEvent, seq: u64) -> Self {
        TelemetryEvent {
            seq,
            video_id: pending.video_id,
            timestamp: pending.timestamp,
            reason: pending.report.reason,
            player: pending.report.player,
            document: pending.report.document,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver view
// ---------------------------------------------------------------------------

/// The two timing fields the resolver reads from an event.
pub trait PlaybackSample {
    /// Reported playback position, in seconds of video.
    fn player_time(&self) -> f64;
    /// Arrival time, in seconds.
    fn wall_timestamp(&self) -> f64;
}

impl PlaybackSample for TelemetryEvent {
    fn player_time(&self) -> f64 {
        self.player.time
    }

    fn wall_timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl<S: PlaybackSample + ?Sized> PlaybackSample for &S {
    fn player_time(&self) -> f64 {
        (**self).player_time()
    }

    fn wall_timestamp(&self) -> f64 {
        (**self).wall_timestamp()
    }
}

/// A bare `(player_time, wall_timestamp)` sample with no passenger data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPoint {
    /// Playback position in seconds.
    pub player_time: f64,
    /// Arrival time in seconds.
    pub wall_timestamp: f64,
}

impl PlaybackPoint {
    pub fn new(player_time: f64, wall_timestamp: f64) -> Self {
        PlaybackPoint {
            player_time,
            wall_timestamp,
        }
    }
}

impl PlaybackSample for PlaybackPoint {
    fn player_time(&self) -> f64 {
        self.player_time
    }

    fn wall_timestamp(&self) -> f64 {
        self.wall_timestamp
    }
}
