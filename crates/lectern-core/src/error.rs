//! Error type shared by the lectern crates.

use std::io;
use thiserror::Error;

/// Convenience alias for results produced by `lectern-core`.
pub type Result<T> = std::result::Result<T, LecternError>;

/// Failures surfaced to the caller of a lecture session.
///
/// Coverage computation itself is infallible; every variant here originates
/// at a boundary (report parsing, configuration, storage).
#[derive(Debug, Error)]
pub enum LecternError {
    /// A telemetry report was missing a required field or had the wrong type.
    #[error("malformed telemetry report: {0}")]
    MalformedEvent(String),

    /// The report targets a different video than the session tracks.
    #[error("incorrect video: expected {expected:?}, got {actual:?}")]
    VideoMismatch {
        /// Video the session is configured for.
        expected: String,
        /// Video named by the caller.
        actual: String,
    },

    /// Lecture or resolver configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The telemetry log could not be read or appended.
    #[error("telemetry storage failed: {0}")]
    Storage(#[from] io::Error),
}

impl LecternError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            LecternError::MalformedEvent(_) => "MALFORMED_EVENT",
            LecternError::VideoMismatch { .. } => "VIDEO_MISMATCH",
            LecternError::InvalidConfig(_) => "INVALID_CONFIG",
            LecternError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True when the caller's input was at fault rather than the system.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LecternError::MalformedEvent(_) | LecternError::VideoMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_wraps_io() {
        let err: LecternError = io::Error::new(io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn mismatch_is_rejection() {
        let err = LecternError::VideoMismatch {
            expected: "abc".into(),
            actual: "xyz".into(),
        };
        assert!(err.is_rejection());
        assert_eq!(
            err.to_string(),
            "incorrect video: expected \"abc\", got \"xyz\""
        );
    }
}
