//! Lectern core -- tamper-resistant watch-time accounting for lecture videos.
//!
//! # Pipeline
//!
//! ```text
//! TelemetryReport → stamp → TelemetryLog (append-only JSONL)
//!                                │
//!                     resolve(&[TelemetryEvent])
//!                                │
//!                  CoverageReport { valid, invalid }
//!                                │
//!                    CompletionPolicy → Verdict
//! ```
//!
//! - [`event`]: client report schema and the committed event type.
//! - [`eventlog`]: the durable, append-only Event Store.
//! - [`classify`]: pairwise timing-consistency classification.
//! - [`interval`]: disjoint interval sets (merge and subtract).
//! - [`resolver`]: from-scratch and incremental coverage resolution.
//! - [`completion`]: the completion verdict.
//! - [`config`] and [`session`]: per-lecture wiring.
//!
//! # Invariants
//!
//! - The log is the only truth. Coverage is always re-derivable from it.
//! - Valid and invalid coverage never overlap.
//! - Only valid coverage counts toward completion.

pub mod classify;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod interval;
pub mod resolver;
pub mod session;

pub use error::{LecternError, Result};
