//! Pace CLI - Command-line interface for Pacekit
//!
//! Commands:
//! - track: Process streaming sensor events from stdin into engine updates
//! - export: Export archived history from a state file as CSV
//! - summary: Print rolling totals over archived history
//! - doctor: Diagnose state files and configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pacekit::engine::StepTrackingEngine;
use pacekit::history::HistoryAnalytics;
use pacekit::motion::MotionSample;
use pacekit::store::MetricsStore;
use pacekit::types::{local_day_epoch, TodayMetrics, UserProfile};
use pacekit::{PACEKIT_VERSION, PRODUCER_NAME};

/// Pace - On-device step tracking engine for daily activity metrics
#[derive(Parser)]
#[command(name = "pace")]
#[command(version = PACEKIT_VERSION)]
#[command(about = "Track steps and movement zones from raw sensor streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming sensor events from stdin (NDJSON, one event per line)
    Track {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// User profile JSON file (height, sex, stride scale, weight)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// UTC offset of the local calendar day, in minutes
        #[arg(long, default_value = "0")]
        utc_offset_minutes: i32,

        /// The device exposes a cumulative hardware step counter
        #[arg(long)]
        step_counter: bool,

        /// State file to resume from and persist to
        #[arg(long)]
        state: Option<PathBuf>,

        /// Flush output after each update
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Export archived history from a state file as CSV
    Export {
        /// State file path
        #[arg(long)]
        state: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Only include the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Print rolling totals over archived history
    Summary {
        /// State file path
        #[arg(long)]
        state: PathBuf,

        /// Number of days to summarize
        #[arg(long, default_value = "7")]
        days: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose state files and configuration
    Doctor {
        /// Check a state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// One sensor event on the track stream
#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SensorEvent {
    /// Cumulative hardware counter reading (total steps since boot)
    Counter { total_since_boot: f64, now_ms: i64 },
    /// Discrete step-detector event
    Step { timestamp_ms: i64, now_ms: i64 },
    /// Raw accelerometer sample in m/s² per axis
    Motion { x: f64, y: f64, z: f64, now_ms: i64 },
}

impl SensorEvent {
    fn now_ms(&self) -> i64 {
        match self {
            SensorEvent::Counter { now_ms, .. } => *now_ms,
            SensorEvent::Step { now_ms, .. } => *now_ms,
            SensorEvent::Motion { now_ms, .. } => *now_ms,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PaceCliError> {
    match cli.command {
        Commands::Track {
            input,
            profile,
            utc_offset_minutes,
            step_counter,
            state,
            flush,
        } => cmd_track(
            &input,
            profile.as_deref(),
            utc_offset_minutes,
            step_counter,
            state.as_deref(),
            flush,
        ),

        Commands::Export {
            state,
            output,
            days,
        } => cmd_export(&state, &output, days),

        Commands::Summary { state, days, json } => cmd_summary(&state, days, json),

        Commands::Doctor { state, json } => cmd_doctor(state.as_deref(), json),
    }
}

fn cmd_track(
    input: &Path,
    profile_path: Option<&Path>,
    utc_offset_minutes: i32,
    has_step_counter: bool,
    state_path: Option<&Path>,
    flush: bool,
) -> Result<(), PaceCliError> {
    let profile: UserProfile = match profile_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => UserProfile::default(),
    };

    let mut store = match state_path {
        Some(path) if path.exists() => MetricsStore::from_json(&fs::read_to_string(path)?)?,
        _ => MetricsStore::new(),
    };

    // Resume from the persisted snapshot when one exists; otherwise the
    // engine is created at the first event's wall-clock time.
    let mut engine: Option<StepTrackingEngine> = store.metrics().map(|metrics| {
        let baseline = store.step_counter_baseline(metrics.day_epoch);
        StepTrackingEngine::new(metrics.clone(), baseline, has_step_counter)
            .with_utc_offset_minutes(utc_offset_minutes)
    });

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_now_ms = 0i64;

    let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
        Box::new(stdin.lock())
    } else {
        Box::new(io::BufReader::new(fs::File::open(input)?))
    };

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: SensorEvent = serde_json::from_str(trimmed)
            .map_err(|e| PaceCliError::ParseError(format!("Failed to parse event: {}", e)))?;

        let now_ms = event.now_ms();
        last_now_ms = now_ms;

        let engine = engine.get_or_insert_with(|| {
            let day_epoch = local_day_epoch(now_ms, utc_offset_minutes);
            StepTrackingEngine::new(
                TodayMetrics::new(day_epoch, now_ms),
                None,
                has_step_counter,
            )
            .with_utc_offset_minutes(utc_offset_minutes)
        });

        let update = match event {
            SensorEvent::Counter {
                total_since_boot,
                now_ms,
            } => engine.on_counter_sample(total_since_boot, now_ms),
            SensorEvent::Step {
                timestamp_ms,
                now_ms,
            } => Some(engine.on_step_event(timestamp_ms, now_ms, &profile)),
            SensorEvent::Motion { x, y, z, now_ms } => {
                engine.on_motion_sample(MotionSample { x, y, z }, now_ms, &profile)
            }
        };

        if let Some(update) = update {
            store.apply_update(&update, now_ms);
            writeln!(stdout, "{}", serde_json::to_string(&update)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    store.flush(last_now_ms);
    if let Some(path) = state_path {
        fs::write(path, store.to_json()?)?;
    }

    Ok(())
}

fn cmd_export(state: &Path, output: &Path, days: Option<u32>) -> Result<(), PaceCliError> {
    let store = MetricsStore::from_json(&fs::read_to_string(state)?)?;

    let history = match days {
        Some(days) => {
            let today_epoch = current_day_epoch(&store);
            HistoryAnalytics::filter_by_last_days(store.history(), Some(days), today_epoch)
        }
        None => store.history().to_vec(),
    };

    let csv = HistoryAnalytics::to_csv(&history);

    if output.to_string_lossy() == "-" {
        print!("{}", csv);
    } else {
        fs::write(output, csv)?;
    }

    Ok(())
}

fn cmd_summary(state: &Path, days: u32, json: bool) -> Result<(), PaceCliError> {
    let store = MetricsStore::from_json(&fs::read_to_string(state)?)?;
    let today_epoch = current_day_epoch(&store);

    let title = format!("last {} days", days);
    let summary = HistoryAnalytics::summarize_last_days(store.history(), days, today_epoch, &title);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Summary ({})", summary.title);
        println!("=================");
        println!("Steps:    {}", summary.steps);
        println!("Distance: {:.1} m", summary.distance_meters);
        println!("Calories: {:.1} kcal", summary.calories_kcal);
        println!("Moving:   {} s", summary.moving_duration_ms / 1_000);
    }

    Ok(())
}

fn cmd_doctor(state: Option<&Path>, json: bool) -> Result<(), PaceCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pacekit_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pacekit version {}", PACEKIT_VERSION),
    });

    if let Some(state_path) = state {
        if state_path.exists() {
            match fs::read_to_string(state_path) {
                Ok(content) => match MetricsStore::from_json(&content) {
                    Ok(store) => {
                        checks.push(DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "State file valid ({} archived days)",
                                store.history().len()
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid state file: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "state".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read state file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            });
        }
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PACEKIT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pace Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PaceCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

/// Day epoch "today" for summary windows: the day after the newest archived
/// day when history exists, else the current UTC day.
fn current_day_epoch(store: &MetricsStore) -> i64 {
    match store.history().first() {
        Some(newest) => newest.day_epoch + 1,
        None => local_day_epoch(chrono::Utc::now().timestamp_millis(), 0),
    }
}

// Error types

#[derive(Debug)]
enum PaceCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Engine(pacekit::EngineError),
    ParseError(String),
    DoctorFailed,
}

impl From<io::Error> for PaceCliError {
    fn from(e: io::Error) -> Self {
        PaceCliError::Io(e)
    }
}

impl From<pacekit::EngineError> for PaceCliError {
    fn from(e: pacekit::EngineError) -> Self {
        PaceCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PaceCliError {
    fn from(e: serde_json::Error) -> Self {
        PaceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PaceCliError> for CliError {
    fn from(e: PaceCliError) -> Self {
        match e {
            PaceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PaceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PaceCliError::Engine(e) => CliError {
                code: "STATE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pace doctor --state <file>' for details".to_string()),
            },
            PaceCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Events need a \"type\" of counter, step, or motion".to_string(),
                ),
            },
            PaceCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
