use clap::{Args, Parser, Subcommand};
use lectern_core::classify::{ClassifierParams, DEFAULT_SLACK_SECS, DEFAULT_SPEED_FACTOR};
use lectern_core::completion::DEFAULT_GRACE_SECS;
use lectern_core::config::ResolverParams;
use std::path::PathBuf;
use std::process::ExitCode;

/// Lectern: tamper-resistant watch-time accounting for lecture videos.
#[derive(Parser)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Emit machine-readable JSON output.
    #[arg(long, global = true, conflicts_with = "human")]
    pub(crate) json: bool,

    /// Force human-readable output (overrides auto JSON in piped mode).
    #[arg(long, global = true)]
    pub(crate) human: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Resolver tolerances shared by every command that computes coverage.
#[derive(Args, Clone, Copy, Debug)]
pub(crate) struct ToleranceArgs {
    /// Maximum playback-to-wall-time ratio still counted as real watching.
    #[arg(long, default_value_t = DEFAULT_SPEED_FACTOR)]
    pub(crate) speed_factor: f64,

    /// Fixed jitter allowance per report pair, in seconds.
    #[arg(long, default_value_t = DEFAULT_SLACK_SECS)]
    pub(crate) slack_secs: f64,

    /// Completion grace for the unreported final segment, in seconds.
    #[arg(long, default_value_t = DEFAULT_GRACE_SECS)]
    pub(crate) grace_secs: f64,
}

impl ToleranceArgs {
    pub(crate) fn params(&self) -> ResolverParams {
        ResolverParams {
            classifier: ClassifierParams {
                speed_factor: self.speed_factor,
                slack_secs: self.slack_secs,
            },
            grace_secs: self.grace_secs,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Append one telemetry report and print the resulting coverage.
    #[command(alias = "telemetry")]
    Report {
        /// Video the report is for.
        video_id: String,

        /// Lecture config file (`<VIDEO_ID> <TOTAL_SECONDS>`).
        #[arg(long)]
        config: PathBuf,

        /// Directory holding per-video telemetry logs.
        #[arg(long)]
        log_dir: PathBuf,

        /// Report JSON file (default: read from stdin).
        #[arg(long)]
        body: Option<PathBuf>,

        /// Override the arrival time, in seconds since the Unix epoch.
        ///
        /// For replaying recorded sessions and for tests only. Live callers
        /// must omit it so the arrival time is the server clock.
        #[arg(long)]
        timestamp: Option<f64>,

        #[command(flatten)]
        tolerances: ToleranceArgs,
    },

    /// Resolve coverage for an existing telemetry log without modifying it.
    #[command(alias = "coverage")]
    Resolve {
        /// Path to the telemetry log JSONL file.
        eventlog: PathBuf,

        /// Seconds of valid coverage required for completion.
        #[arg(long)]
        required_secs: f64,

        #[command(flatten)]
        tolerances: ToleranceArgs,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OutputMode {
    Human,
    Json,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AppExit {
    Success = 0,
    NotFound = 1,
    InvalidArgs = 2,
    Rejected = 3,
    RuntimeError = 4,
}

impl AppExit {
    pub(crate) fn code(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

pub(crate) const QUICK_HELP: &str = "\
lectern: tamper-resistant lecture watch-time accounting
Usage: lectern [--json|--human] <command> [args]
Commands:
  report <video_id> --config <file> --log-dir <dir> [--body <report.json>] [--timestamp <secs>]
  resolve <eventlog.jsonl> --required-secs <secs>
Tolerances (both commands):
  --speed-factor <x> --slack-secs <secs> --grace-secs <secs>
Tips:
  lectern --help
  lectern <command> --help";

pub(crate) const ROBOT_SCHEMA_VERSION: &str = "lectern-cli-robot-v1";

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn clap_alias_telemetry_maps_to_report() {
        let cli = Cli::try_parse_from([
            "lectern",
            "telemetry",
            "abc123",
            "--config",
            "c",
            "--log-dir",
            "logs",
        ])
        .expect("parse");
        assert!(matches!(cli.command, Commands::Report { .. }));
    }

    #[test]
    fn clap_alias_coverage_maps_to_resolve() {
        let cli = Cli::try_parse_from(["lectern", "coverage", "e.jsonl", "--required-secs", "60"])
            .expect("parse");
        assert!(matches!(cli.command, Commands::Resolve { .. }));
    }

    #[test]
    fn tolerances_default_to_resolver_defaults() {
        let cli = Cli::try_parse_from(["lectern", "resolve", "e.jsonl", "--required-secs", "1"])
            .expect("parse");
        let Commands::Resolve { tolerances, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(
            tolerances.params(),
            lectern_core::config::ResolverParams::default()
        );
    }

    #[test]
    fn tolerance_flags_override() {
        let cli = Cli::try_parse_from([
            "lectern",
            "resolve",
            "e.jsonl",
            "--required-secs",
            "1",
            "--speed-factor",
            "1.5",
            "--slack-secs",
            "0.5",
            "--grace-secs",
            "0",
        ])
        .expect("parse");
        let Commands::Resolve { tolerances, .. } = cli.command else {
            panic!("expected resolve");
        };
        let params = tolerances.params();
        assert_eq!(params.classifier.speed_factor, 1.5);
        assert_eq!(params.classifier.slack_secs, 0.5);
        assert_eq!(params.grace_secs, 0.0);
    }

    #[test]
    fn report_parses_timestamp_and_body() {
        let cli = Cli::try_parse_from([
            "lectern",
            "report",
            "abc123",
            "--config",
            "c",
            "--log-dir",
            "logs",
            "--body",
            "r.json",
            "--timestamp",
            "1700000000.5",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Report {
                timestamp: Some(t),
                body: Some(_),
                ..
            } if t == 1_700_000_000.5
        ));
    }

    #[test]
    fn timestamp_help_marks_override_as_replay_only() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        let report = cmd.find_subcommand("report").expect("report subcommand");
        let arg = report
            .get_arguments()
            .find(|a| a.get_id() == "timestamp")
            .expect("timestamp arg");
        let help = arg
            .get_long_help()
            .map(|h| h.to_string())
            .unwrap_or_default();
        assert!(help.contains("replaying recorded sessions"), "{help}");
        assert!(help.contains("must omit"), "{help}");
    }

    #[test]
    fn json_and_human_conflict() {
        assert!(Cli::try_parse_from([
            "lectern",
            "--json",
            "--human",
            "resolve",
            "e.jsonl",
            "--required-secs",
            "1"
        ])
        .is_err());
    }
}
