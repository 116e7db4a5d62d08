//! Lectern CLI entry point.
//!
//! Provides the `lectern` binary: `report` appends one telemetry report to a
//! lecture's log and prints the resulting coverage, `resolve` evaluates an
//! existing log read-only.
//!
//! Diagnostics go to stderr through `tracing`, filtered by `LECTERN_LOG`
//! (default `warn`). Stdout carries only command output.

mod cli_contract;
mod cli_handlers;
mod cli_normalize;

use clap::error::ErrorKind;
use clap::Parser;
use cli_contract::{AppExit, Cli, OutputMode, QUICK_HELP};
use cli_handlers::{emit_json_error, emit_json_success, handle_command};
use cli_normalize::{
    looks_like_human_requested, looks_like_json_requested, normalize_args, select_output_mode,
};
use serde_json::json;
use std::env;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "LECTERN_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    init_logging();

    let raw_args: Vec<String> = env::args().collect();
    let mode = select_output_mode(
        looks_like_json_requested(&raw_args),
        looks_like_human_requested(&raw_args),
        io::stdout().is_terminal(),
    );
    if raw_args.len() == 1 {
        if mode == OutputMode::Json {
            emit_json_success(
                "OK",
                "Quick help emitted.",
                Some("help"),
                AppExit::Success as u8,
                &[],
                json!({
                    "quick_help": QUICK_HELP,
                }),
            );
        } else {
            println!("{QUICK_HELP}");
        }
        return AppExit::Success.code();
    }

    let (args, repair_notes) = normalize_args(raw_args);

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                let _ = err.print();
                return AppExit::Success.code();
            }
            let (message, suggestions) = parse_error_guidance(err.kind());
            if mode == OutputMode::Json {
                emit_json_error(
                    "INVALID_ARGS",
                    message,
                    &suggestions,
                    &repair_notes,
                    AppExit::InvalidArgs as u8,
                );
            } else {
                for note in &repair_notes {
                    eprintln!("Note: {note}");
                }
                eprintln!("{err}");
                for (idx, suggestion) in suggestions.iter().enumerate() {
                    eprintln!("Hint {}: {}", idx + 1, suggestion);
                }
            }
            return AppExit::InvalidArgs.code();
        }
    };

    let mode = select_output_mode(cli.json, cli.human, io::stdout().is_terminal());
    handle_command(cli, mode, &repair_notes).code()
}

fn parse_error_guidance(kind: ErrorKind) -> (&'static str, Vec<String>) {
    match kind {
        ErrorKind::InvalidSubcommand => (
            "Unknown subcommand.",
            vec![
                "Use one of: `lectern report` or `lectern resolve`.".to_string(),
                "Run `lectern --help` for full command syntax.".to_string(),
            ],
        ),
        ErrorKind::UnknownArgument => (
            "Unknown flag or option.",
            vec![
                "Run `lectern --help` for global flags.".to_string(),
                "Run `lectern <command> --help` to inspect command-specific flags.".to_string(),
            ],
        ),
        ErrorKind::MissingRequiredArgument => (
            "Missing required argument.",
            vec![
                "Example: `lectern report <video_id> --config <file> --log-dir <dir> --body <report.json>`."
                    .to_string(),
                "Example: `lectern resolve <eventlog.jsonl> --required-secs <secs>`.".to_string(),
            ],
        ),
        ErrorKind::ArgumentConflict => (
            "Conflicting flags or arguments.",
            vec![
                "Use either `--json` or `--human`, but not both.".to_string(),
                "Run `lectern --help` to review valid flag combinations.".to_string(),
            ],
        ),
        ErrorKind::ValueValidation | ErrorKind::InvalidValue => (
            "Invalid flag value.",
            vec!["Numeric flags take plain decimal seconds, e.g. `--slack-secs 2`.".to_string()],
        ),
        _ => (
            "Invalid command syntax.",
            vec![
                "Run `lectern --help` for command syntax.".to_string(),
                "Run `lectern <command> --help` for command-specific args.".to_string(),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_error_guidance, ErrorKind, QUICK_HELP};

    #[test]
    fn quick_help_lists_every_command() {
        assert!(QUICK_HELP.contains("report <video_id>"));
        assert!(QUICK_HELP.contains("resolve <eventlog.jsonl>"));
    }

    #[test]
    fn parse_guidance_for_unknown_subcommand_names_commands() {
        let (message, suggestions) = parse_error_guidance(ErrorKind::InvalidSubcommand);
        assert_eq!(message, "Unknown subcommand.");
        assert!(suggestions[0].contains("lectern report"));
    }

    #[test]
    fn parse_guidance_always_has_suggestions() {
        for kind in [
            ErrorKind::UnknownArgument,
            ErrorKind::MissingRequiredArgument,
            ErrorKind::ArgumentConflict,
            ErrorKind::InvalidValue,
            ErrorKind::TooManyValues,
        ] {
            assert!(!parse_error_guidance(kind).1.is_empty());
        }
    }
}
