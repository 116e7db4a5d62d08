//! Lecture and resolver configuration.
//!
//! A lecture is configured by a one-line file:
//!
//! ```text
//! <VIDEO_ID> <REQUIRED_TOTAL_SECONDS>
//! ```
//!
//! e.g. `dQw4w9WgXcQ 212`. Resolver tolerances default to a 2x speed
//! factor, 2 s of slack and 5 s of completion grace, and can be overridden
//! per invocation.

use crate::classify::ClassifierParams;
use crate::completion::{CompletionPolicy, DEFAULT_GRACE_SECS};
use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Identity and watch requirement of one lecture video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureConfig {
    /// Video identifier. Also names the telemetry log file.
    pub video_id: String,
    /// Seconds of valid coverage required for completion.
    pub required_total_secs: f64,
}

impl LectureConfig {
    pub fn new(video_id: impl Into<String>, required_total_secs: f64) -> Result<Self> {
        let config = LectureConfig {
            video_id: video_id.into(),
            required_total_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a lecture config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LecternError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        content.parse()
    }

    fn validate(&self) -> Result<()> {
        validate_video_id(&self.video_id)?;
        let total = self.required_total_secs;
        if !total.is_finite() || total < 0.0 {
            return Err(LecternError::InvalidConfig(format!(
                "required total must be a finite non-negative number of seconds, got {total}"
            )));
        }
        Ok(())
    }
}

impl FromStr for LectureConfig {
    type Err = LecternError;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        let (Some(video_id), Some(total), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(LecternError::InvalidConfig(format!(
                "expected `<VIDEO_ID> <TOTAL_SECONDS>`, got {:?}",
                s.trim()
            )));
        };
        let required_total_secs: f64 = total.parse().map_err(|_| {
            LecternError::InvalidConfig(format!("total seconds is not a number: {total:?}"))
        })?;
        LectureConfig::new(video_id, required_total_secs)
    }
}

/// Check that a video id is safe to use as a file name.
///
/// Accepts non-empty ASCII alphanumerics, `-` and `_`.
pub fn validate_video_id(video_id: &str) -> Result<()> {
    let ok = !video_id.is_empty()
        && video_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(LecternError::InvalidConfig(format!(
            "video id must be ASCII alphanumerics, '-' or '_': {video_id:?}"
        )))
    }
}

/// Tolerances applied by the resolver and completion evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverParams {
    pub classifier: ClassifierParams,
    /// Completion grace in seconds.
    pub grace_secs: f64,
}

impl Default for ResolverParams {
    fn default() -> Self {
        ResolverParams {
            classifier: ClassifierParams::default(),
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }
}

impl ResolverParams {
    /// Reject values that would make the valid-window test meaningless.
    pub fn validate(&self) -> Result<()> {
        let ClassifierParams {
            speed_factor,
            slack_secs,
        } = self.classifier;
        if !speed_factor.is_finite() || speed_factor <= 0.0 {
            return Err(LecternError::InvalidConfig(format!(
                "speed factor must be positive, got {speed_factor}"
            )));
        }
        for (name, value) in [("slack", slack_secs), ("grace", self.grace_secs)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LecternError::InvalidConfig(format!(
                    "{name} seconds must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Completion policy for a lecture under these tolerances.
    pub fn completion_policy(&self, lecture: &LectureConfig) -> CompletionPolicy {
        CompletionPolicy::new(lecture.required_total_secs).with_grace(self.grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_line() {
        let config: LectureConfig = "dQw4w9WgXcQ 212\n".parse().unwrap();
        assert_eq!(config.video_id, "dQw4w9WgXcQ");
        assert_eq!(config.required_total_secs, 212.0);
    }

    #[test]
    fn parse_fractional_total() {
        let config: LectureConfig = "  vid_1   90.5 ".parse().unwrap();
        assert_eq!(config.required_total_secs, 90.5);
    }

    #[test]
    fn parse_rejects_missing_total() {
        let err = "onlyid".parse::<LectureConfig>().unwrap_err();
        assert!(matches!(err, LecternError::InvalidConfig(_)));
    }

    #[test]
    fn parse_rejects_trailing_fields() {
        assert!("vid 10 extra".parse::<LectureConfig>().is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_total() {
        let err = "vid ten".parse::<LectureConfig>().unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn parse_rejects_negative_total() {
        assert!("vid -3".parse::<LectureConfig>().is_err());
    }

    #[test]
    fn video_id_must_be_file_safe() {
        assert!(validate_video_id("abc-DEF_123").is_ok());
        assert!(validate_video_id("").is_err());
        assert!(validate_video_id("../etc").is_err());
        assert!(validate_video_id("a/b").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config");
        std::fs::write(&path, "abc123 600\n").unwrap();
        let config = LectureConfig::load(&path).unwrap();
        assert_eq!(config, LectureConfig::new("abc123", 600.0).unwrap());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LectureConfig::load(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, LecternError::InvalidConfig(_)));
    }

    #[test]
    fn default_params_are_valid() {
        let params = ResolverParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.classifier.speed_factor, 2.0);
        assert_eq!(params.classifier.slack_secs, 2.0);
        assert_eq!(params.grace_secs, 5.0);
    }

    #[test]
    fn params_reject_bad_values() {
        let mut params = ResolverParams::default();
        params.classifier.speed_factor = 0.0;
        assert!(params.validate().is_err());

        let mut params = ResolverParams::default();
        params.classifier.slack_secs = f64::NAN;
        assert!(params.validate().is_err());

        let mut params = ResolverParams::default();
        params.grace_secs = -1.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn completion_policy_uses_grace() {
        let params = ResolverParams {
            grace_secs: 1.0,
            ..Default::default()
        };
        let lecture = LectureConfig::new("v", 30.0).unwrap();
        assert_eq!(params.completion_policy(&lecture).threshold_secs(), 29.0);
    }
}
