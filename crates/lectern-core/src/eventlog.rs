//! Append-only telemetry log -- the Event Store and sole assigner of `seq`.
//!
//! # Overview
//!
//! [`TelemetryLog`] owns one JSONL file per lecture video plus an in-memory
//! mirror of every committed event. It enforces:
//!
//! - **Monotonic `seq`:** starts at 0 for new files, +1 per append,
//!   assigned here and nowhere else.
//! - **JSONL format:** one JSON object per line, newline-terminated, no
//!   pretty printing.
//! - **Fsync per event:** an acknowledged append survives a restart.
//! - **Line size limit:** serialized events above
//!   [`TELEMETRY_MAX_LINE_BYTES`] are rejected.
//!
//! # Single writer
//!
//! A [`TelemetryLog`] holds an exclusive advisory lock on its file for as
//! long as it is alive. A second writer, in this process or another, waits
//! for the lock (up to a caller-chosen bound) and only then replays the
//! file, so it always resumes from every event the first writer committed.
//! Readers ([`read_timeline`]) do not take the lock.
//!
//! # Failure semantics
//!
//! The mirror is extended only after the line is durably written. If a
//! write or fsync fails, the file is truncated back to its last committed
//! length so the next append cannot land behind a half-written line. If
//! that truncation fails too, the writer is poisoned: every later append
//! fails until the log is reopened, which discards the torn tail.
//!
//! On open, a complete line that does not parse fails loudly: resuming from
//! a corrupted truth log would silently change coverage. A torn final line
//! (no trailing newline, unparseable) is the footprint of a crash mid-append
//! and is truncated away with a warning.
//!
//! # Clock regression
//!
//! Arrival timestamps that move backward are surfaced as a warning and
//! stored as observed, never corrected. The classifier treats them as
//! defined input.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, error, warn};

use crate::config::validate_video_id;
use crate::event::{PendingEvent, TelemetryEvent};

/// Maximum serialized event line size in bytes.
pub const TELEMETRY_MAX_LINE_BYTES: usize = 64 * 1024;

/// File extension for telemetry logs.
pub const TELEMETRY_LOG_EXTENSION: &str = "jsonl";

/// How long [`TelemetryLog::open_for_video`] waits for another writer.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Append-only telemetry log for one video.
///
/// Pass explicitly, not a global. Holding it by `&mut` serializes appends.
pub struct TelemetryLog {
    file: File,
    path: PathBuf,
    /// Every committed event, in append order.
    events: Vec<TelemetryEvent>,
    /// Next `seq` to assign.
    next_seq: u64,
    /// Byte length of the file covering exactly the committed lines.
    committed_len: u64,
    /// A failed append could not be rolled back; the file may hold a torn line.
    poisoned: bool,
}

struct ScannedLog {
    events: Vec<TelemetryEvent>,
    /// Length of the valid prefix to keep.
    keep_len: u64,
    /// Final event was complete JSON but lacked its newline.
    missing_newline: bool,
}

impl TelemetryLog {
    /// Open or create a telemetry log at `path`.
    ///
    /// Existing events are loaded into memory and `seq` resumes after the
    /// highest one found. Fails with `ErrorKind::WouldBlock` if another
    /// writer holds the log.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::open_waiting(path, Duration::ZERO)
    }

    /// Like [`TelemetryLog::open`], but wait up to `wait` for another writer
    /// to release the log.
    pub fn open_waiting(path: impl Into<PathBuf>, wait: Duration) -> io::Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        acquire_writer_lock(&file, &path, wait)?;

        // Replay only under the lock, so no committed event is missed.
        let scanned = Self::scan(&path)?;
        let mut committed_len = file.metadata()?.len();
        if scanned.keep_len < committed_len {
            warn!(
                path = %path.display(),
                dropped_bytes = committed_len - scanned.keep_len,
                "truncating torn trailing line in telemetry log"
            );
            file.set_len(scanned.keep_len)?;
            file.sync_all()?;
            committed_len = scanned.keep_len;
        }
        if scanned.missing_newline {
            file.write_all(b"\n")?;
            file.sync_all()?;
            committed_len += 1;
        }

        let next_seq = scanned
            .events
            .iter()
            .map(|e| e.seq)
            .max()
            .map_or(0, |highest| highest + 1);

        debug!(
            path = %path.display(),
            events = scanned.events.len(),
            next_seq,
            "opened telemetry log"
        );

        Ok(TelemetryLog {
            file,
            path,
            events: scanned.events,
            next_seq,
            committed_len,
            poisoned: false,
        })
    }

    /// Open the log for `video_id` inside `dir`, creating `dir` if needed.
    ///
    /// The file is [`log_path_for_video`]. Waits up to [`DEFAULT_LOCK_WAIT`]
    /// for another writer.
    pub fn open_for_video(dir: &Path, video_id: &str) -> crate::Result<Self> {
        Self::open_for_video_waiting(dir, video_id, DEFAULT_LOCK_WAIT)
    }

    /// [`TelemetryLog::open_for_video`] with an explicit lock wait.
    pub fn open_for_video_waiting(
        dir: &Path,
        video_id: &str,
        wait: Duration,
    ) -> crate::Result<Self> {
        validate_video_id(video_id)?;
        fs::create_dir_all(dir)?;
        Ok(Self::open_waiting(log_path_for_video(dir, video_id), wait)?)
    }

    /// Commit `pending` at the next `seq` and durably append it.
    ///
    /// Returns the committed event. On error nothing is committed.
    pub fn append(&mut self, pending: PendingEvent) -> io::Result<&TelemetryEvent> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "telemetry log {} must be reopened after a failed rollback",
                    self.path.display()
                ),
            ));
        }
        if !pending.timestamp.is_finite() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("event timestamp must be finite, got {}", pending.timestamp),
            ));
        }
        if let Some(previous) = self.events.last() {
            if pending.timestamp < previous.timestamp {
                warn!(
                    video_id = %pending.video_id,
                    previous = previous.timestamp,
                    actual = pending.timestamp,
                    "wall clock moved backward; storing event as observed"
                );
            }
        }

        let event = TelemetryEvent::commit(pending, self.next_seq);
        let mut line = serde_json::to_string(&event).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("event serialization failed: {e}"),
            )
        })?;

        // Line size check (before adding newline).
        if line.len() > TELEMETRY_MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "serialized event exceeds max line bytes ({} > {})",
                    line.len(),
                    TELEMETRY_MAX_LINE_BYTES
                ),
            ));
        }
        line.push('\n');

        if let Err(err) = self.write_durably(line.as_bytes()) {
            // Drop any partial line so later appends stay aligned.
            if let Err(rollback) = self.file.set_len(self.committed_len) {
                self.poisoned = true;
                error!(
                    path = %self.path.display(),
                    committed_len = self.committed_len,
                    %err,
                    %rollback,
                    "append rollback failed; log poisoned until reopened"
                );
                return Err(io::Error::new(
                    err.kind(),
                    format!(
                        "{err}; rollback to {} bytes also failed: {rollback}",
                        self.committed_len
                    ),
                ));
            }
            return Err(err);
        }

        self.committed_len += line.len() as u64;
        self.next_seq += 1;
        self.events.push(event);
        Ok(&self.events[self.events.len() - 1])
    }

    fn write_durably(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.sync_all()
    }

    /// All committed events, in append order.
    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The `seq` that will be assigned to the next appended event.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once a failed append could not be rolled back.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Parse an existing log, locating any torn trailing line.
    fn scan(path: &Path) -> io::Result<ScannedLog> {
        let bytes = fs::read(path)?;
        let complete_len = bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let (complete, tail) = bytes.split_at(complete_len);

        let complete = std::str::from_utf8(complete).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("telemetry log is not valid UTF-8: {e}"),
            )
        })?;

        let mut events = Vec::new();
        for (line_no, line) in complete.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Fail loudly on malformed lines to avoid silently resuming from
            // a corrupted truth log.
            let event = serde_json::from_str::<TelemetryEvent>(trimmed).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "failed to parse telemetry log line {} while opening: {e}",
                        line_no + 1
                    ),
                )
            })?;
            events.push(event);
        }

        let mut keep_len = complete_len as u64;
        let mut missing_newline = false;
        let tail_event = std::str::from_utf8(tail)
            .ok()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(serde_json::from_str::<TelemetryEvent>);
        match tail_event {
            Some(Ok(event)) => {
                events.push(event);
                keep_len = bytes.len() as u64;
                missing_newline = true;
            }
            // Torn tail: leave keep_len at the last complete line.
            Some(Err(_)) => {}
            // Empty or whitespace-only tail is harmless; keep it.
            None if std::str::from_utf8(tail).is_ok() => keep_len = bytes.len() as u64,
            None => {}
        }

        Ok(ScannedLog {
            events,
            keep_len,
            missing_newline,
        })
    }
}

/// Path of the telemetry log for `video_id` inside `dir`.
pub fn log_path_for_video(dir: &Path, video_id: &str) -> PathBuf {
    dir.join(format!("{video_id}.{TELEMETRY_LOG_EXTENSION}"))
}

fn acquire_writer_lock(file: &File, path: &Path, wait: Duration) -> io::Result<()> {
    let start = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if start.elapsed() >= wait {
                    return Err(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        format!(
                            "telemetry log {} is held by another writer",
                            path.display()
                        ),
                    ));
                }
                debug!(path = %path.display(), "waiting for telemetry log lock");
                thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read all committed events from a telemetry log file.
///
/// Read-only and strict: any malformed line, including a torn tail, is an
/// error. Returns events in file order.
pub fn read_timeline(path: &Path) -> io::Result<Vec<TelemetryEvent>> {
    let content = fs::read_to_string(path)?;
    let mut events = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: TelemetryEvent = serde_json::from_str(trimmed).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse telemetry log line {}: {e}", line_no + 1),
            )
        })?;
        events.push(event);
    }
    Ok(events)
}
