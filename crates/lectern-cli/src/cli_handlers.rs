use crate::cli_contract::{AppExit, Cli, Commands, OutputMode, ToleranceArgs, ROBOT_SCHEMA_VERSION};
use crate::cli_normalize::format_cli_failure;
use lectern_core::completion::{CompletionPolicy, Verdict};
use lectern_core::config::LectureConfig;
use lectern_core::event::TelemetryReport;
use lectern_core::eventlog::{log_path_for_video, read_timeline};
use lectern_core::interval::Coverage;
use lectern_core::resolver::{coverage_hash, resolve, CoverageReport, RESOLVER_VERSION};
use lectern_core::session::LectureSession;
use lectern_core::LecternError;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

fn emit_json(value: Value) {
    match serde_json::to_string(&value) {
        Ok(line) => println!("{line}"),
        Err(err) => {
            // Last-resort envelope to avoid panicking in robot mode.
            let fallback = json!({
                "schema_version": ROBOT_SCHEMA_VERSION,
                "ok": false,
                "code": "RUNTIME_ERROR",
                "message": format!("failed to serialize JSON response: {err}"),
                "suggestions": [],
                "exit_code": AppExit::RuntimeError as u8,
            });
            println!("{fallback}");
        }
    }
}

pub(crate) fn emit_json_success(
    code: &str,
    message: &str,
    command: Option<&str>,
    exit_code: u8,
    notes: &[String],
    mut data: Value,
) {
    if data.is_null() {
        data = json!({});
    }
    let mut obj = json!({
        "schema_version": ROBOT_SCHEMA_VERSION,
        "ok": true,
        "code": code,
        "message": message,
        "suggestions": [],
        "exit_code": exit_code,
        "data": data,
    });
    if let Some(command) = command {
        obj["command"] = json!(command);
    }
    if !notes.is_empty() {
        obj["notes"] = json!(notes);
    }
    emit_json(obj);
}

pub(crate) fn emit_json_error(
    code: &str,
    message: &str,
    suggestions: &[String],
    notes: &[String],
    exit_code: u8,
) {
    let mut obj = json!({
        "schema_version": ROBOT_SCHEMA_VERSION,
        "ok": false,
        "code": code,
        "message": message,
        "suggestions": suggestions,
        "exit_code": exit_code,
    });
    if !notes.is_empty() {
        obj["notes"] = json!(notes);
    }
    emit_json(obj);
}

/// A command failure, rendered once in the selected output mode.
struct Failure {
    exit: AppExit,
    code: &'static str,
    message: String,
    likely_cause: String,
    suggestions: Vec<String>,
    evidence: Vec<String>,
}

impl Failure {
    fn new(exit: AppExit, code: &'static str, message: impl Into<String>) -> Self {
        Failure {
            exit,
            code,
            message: message.into(),
            likely_cause: String::new(),
            suggestions: Vec::new(),
            evidence: Vec::new(),
        }
    }

    fn cause(mut self, cause: impl Into<String>) -> Self {
        self.likely_cause = cause.into();
        self
    }

    fn suggest(mut self, command: impl Into<String>) -> Self {
        self.suggestions.push(command.into());
        self
    }

    fn evidence(mut self, path: &Path) -> Self {
        self.evidence.push(path.display().to_string());
        self
    }

    fn emit(self, mode: OutputMode, notes: &[String]) -> AppExit {
        match mode {
            OutputMode::Json => emit_json_error(
                self.code,
                &self.message,
                &self.suggestions,
                notes,
                self.exit as u8,
            ),
            OutputMode::Human => {
                for note in notes {
                    eprintln!("Note: {note}");
                }
                eprintln!(
                    "{}",
                    format_cli_failure(
                        &self.message,
                        &self.likely_cause,
                        &self.suggestions,
                        &self.evidence,
                    )
                );
            }
        }
        self.exit
    }
}

impl From<LecternError> for Failure {
    fn from(err: LecternError) -> Self {
        let (exit, cause) = match &err {
            LecternError::MalformedEvent(_) => (
                AppExit::Rejected,
                "The report body is missing a required field or has a mistyped value.",
            ),
            LecternError::VideoMismatch { .. } => (
                AppExit::Rejected,
                "The report targets a different video than the lecture config.",
            ),
            LecternError::InvalidConfig(_) => (
                AppExit::InvalidArgs,
                "The lecture config or tolerance flags are invalid.",
            ),
            LecternError::Storage(_) => (
                AppExit::RuntimeError,
                "The telemetry log could not be read or written.",
            ),
        };
        Failure::new(exit, err.code(), err.to_string()).cause(cause)
    }
}

fn ensure_file_exists(path: &Path, label: &str) -> Result<(), Failure> {
    if path.exists() {
        Ok(())
    } else {
        Err(
            Failure::new(
                AppExit::NotFound,
                "NOT_FOUND",
                format!("{} not found: {}", label, path.display()),
            )
            .cause(format!("The {label} path does not exist."))
            .evidence(path),
        )
    }
}

fn now_secs() -> Result<f64, Failure> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .map_err(|e| {
            Failure::new(
                AppExit::RuntimeError,
                "CLOCK_ERROR",
                format!("system clock is before the Unix epoch: {e}"),
            )
        })
}

fn read_body(body: Option<&Path>) -> Result<Vec<u8>, Failure> {
    match body {
        Some(path) => {
            ensure_file_exists(path, "report body")?;
            fs::read(path).map_err(|e| {
                Failure::new(
                    AppExit::RuntimeError,
                    "READ_FAILED",
                    format!("failed to read {}: {e}", path.display()),
                )
                .evidence(path)
            })
        }
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).map_err(|e| {
                Failure::new(
                    AppExit::RuntimeError,
                    "READ_FAILED",
                    format!("failed to read report from stdin: {e}"),
                )
            })?;
            Ok(buf)
        }
    }
}

fn coverage_pairs(coverage: &Coverage) -> Vec<String> {
    coverage
        .intervals()
        .iter()
        .map(|iv| format!("[{}, {}]", iv.start, iv.end))
        .collect()
}

fn print_coverage_human(coverage: &CoverageReport, verdict: &Verdict) {
    let valid = coverage_pairs(&coverage.valid);
    let invalid = coverage_pairs(&coverage.invalid);
    println!("valid   ({:.3}s): {}", verdict.valid_secs, valid.join(" "));
    println!("invalid ({:.3}s): {}", verdict.invalid_secs, invalid.join(" "));
    println!(
        "completed: {} (required {:.3}s)",
        if verdict.complete { "yes" } else { "no" },
        verdict.required_secs
    );
}

struct ReportArgs<'a> {
    video_id: &'a str,
    config: &'a Path,
    log_dir: &'a Path,
    body: Option<&'a Path>,
    timestamp: Option<f64>,
    tolerances: ToleranceArgs,
}

fn run_report(args: ReportArgs<'_>, mode: OutputMode, notes: &[String]) -> Result<(), Failure> {
    ensure_file_exists(args.config, "lecture config")?;
    let config =
        LectureConfig::load(args.config).map_err(|e| Failure::from(e).evidence(args.config))?;

    let body = read_body(args.body)?;
    let report = TelemetryReport::from_json(&body).map_err(Failure::from)?;
    let timestamp = match args.timestamp {
        Some(t) => t,
        None => now_secs()?,
    };

    let mut session = LectureSession::open(config, args.tolerances.params(), args.log_dir)
        .map_err(|e| Failure::from(e).evidence(args.log_dir))?;
    let outcome = session
        .submit(args.video_id, report, timestamp)
        .map_err(|e| Failure::from(e).evidence(session.log().path()))?;

    debug!(
        video_id = args.video_id,
        seq = outcome.seq,
        complete = outcome.verdict.complete,
        "report accepted"
    );

    match mode {
        OutputMode::Json => emit_json_success(
            "OK",
            "Report accepted.",
            Some("report"),
            AppExit::Success as u8,
            notes,
            json!({
                "seq": outcome.seq,
                "coverage": outcome.coverage,
                "verdict": outcome.verdict,
                "completed": outcome.verdict.complete,
                "eventlog": session.log().path().display().to_string(),
            }),
        ),
        OutputMode::Human => {
            println!("Report accepted (seq {}).", outcome.seq);
            print_coverage_human(&outcome.coverage, &outcome.verdict);
        }
    }
    Ok(())
}

fn run_resolve(
    eventlog: &Path,
    required_secs: f64,
    tolerances: ToleranceArgs,
    mode: OutputMode,
    notes: &[String],
) -> Result<(), Failure> {
    ensure_file_exists(eventlog, "EventLog")?;
    let params = tolerances.params();
    params.validate().map_err(Failure::from)?;
    if !required_secs.is_finite() || required_secs < 0.0 {
        return Err(Failure::new(
            AppExit::InvalidArgs,
            "INVALID_ARGS",
            format!("--required-secs must be finite and non-negative, got {required_secs}"),
        ));
    }

    let timeline = read_timeline(eventlog).map_err(|e| {
        Failure::new(
            AppExit::RuntimeError,
            "READ_FAILED",
            format!("failed to read eventlog {}: {e}", eventlog.display()),
        )
        .cause("The telemetry log contains a malformed or truncated line.")
        .evidence(eventlog)
    })?;

    let coverage = resolve(&timeline, &params.classifier);
    let verdict = CompletionPolicy::new(required_secs)
        .with_grace(params.grace_secs)
        .evaluate(&coverage);
    let hash = coverage_hash(&coverage);

    match mode {
        OutputMode::Json => emit_json_success(
            "OK",
            "Coverage resolved.",
            Some("resolve"),
            AppExit::Success as u8,
            notes,
            json!({
                "event_count": timeline.len(),
                "coverage": coverage,
                "verdict": verdict,
                "completed": verdict.complete,
                "coverage_hash": hash,
                "resolver_version": RESOLVER_VERSION,
            }),
        ),
        OutputMode::Human => {
            println!("{} events in {}", timeline.len(), eventlog.display());
            print_coverage_human(&coverage, &verdict);
            println!("coverage_hash: {hash}");
        }
    }
    Ok(())
}

pub(crate) fn handle_command(cli: Cli, mode: OutputMode, notes: &[String]) -> AppExit {
    let result = match &cli.command {
        Commands::Report {
            video_id,
            config,
            log_dir,
            body,
            timestamp,
            tolerances,
        } => run_report(
            ReportArgs {
                video_id,
                config,
                log_dir,
                body: body.as_deref(),
                timestamp: *timestamp,
                tolerances: *tolerances,
            },
            mode,
            notes,
        )
        .map_err(|f| with_report_suggestions(f, video_id, config, log_dir)),
        Commands::Resolve {
            eventlog,
            required_secs,
            tolerances,
        } => run_resolve(eventlog, *required_secs, *tolerances, mode, notes),
    };

    match result {
        Ok(()) => AppExit::Success,
        Err(failure) => failure.emit(mode, notes),
    }
}

fn with_report_suggestions(
    failure: Failure,
    video_id: &str,
    config: &Path,
    log_dir: &Path,
) -> Failure {
    if failure.exit != AppExit::RuntimeError {
        return failure;
    }
    let log = log_path_for_video(log_dir, video_id);
    failure.suggest(format!(
        "lectern resolve {} --required-secs <secs>  # config: {}",
        log.display(),
        config.display()
    ))
}
