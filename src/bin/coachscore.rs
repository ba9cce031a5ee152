//! Coach Score CLI - Command-line interface for the Coach Score engine
//!
//! Commands:
//! - test: Score a fitness-test measurement
//! - questionnaire: Score questionnaire answers
//! - index: Resolve the activity index from backend responses
//! - weekly / monthly: Activity-index series
//! - tables: Print or check the banding tables
//! - doctor: Diagnose configuration and tables

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, NaiveDate, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coachscore::feed::{FeedPayloadAdapter, SessionFeedAdapter};
use coachscore::questionnaire::QuestionnaireAnswers;
use coachscore::types::{TestSlug, TestSubmission};
use coachscore::{
    compute_questionnaire_score, BandingTable, EngineConfig, ScoreError, ScoreProcessor,
    ENGINE_VERSION, PRODUCER_NAME,
};

/// Coach Score - On-device scoring engine for a fitness-coaching app
#[derive(Parser)]
#[command(name = "coachscore")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score fitness tests, questionnaires and activity", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, env = "COACHSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Banding tables file (JSON); defaults to the built-in tables
    #[arg(long, global = true, env = "COACHSCORE_TABLES")]
    tables: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a fitness-test measurement
    Test {
        /// Test slug (equilibre, souplesse, force-bras, force-jambes, endurance)
        test: String,

        /// Raw measurement (seconds, repetitions, meters or flexibility level 1-5)
        #[arg(long)]
        value: f64,

        /// Age in years
        #[arg(long)]
        age: u32,

        /// Gender ("M" or "F")
        #[arg(long)]
        gender: String,

        /// Do not fail on a bad measurement or gender: fall back to score 1
        /// (or 0 for an unsupported gender). The test slug must still be valid.
        #[arg(long)]
        lenient: bool,
    },

    /// Score questionnaire answers (JSON object of question id to answer)
    Questionnaire {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Resolve the activity index; omit a response to simulate a failed fetch
    Index {
        /// Calendar sessions response body
        #[arg(long)]
        sessions: Option<PathBuf>,

        /// Latest questionnaire response body
        #[arg(long)]
        questionnaire: Option<PathBuf>,

        /// Evaluation time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<String>,

        /// Load processor state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save processor state to file after resolving
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Weekly activity-index series of a month
    Weekly {
        /// Calendar sessions response body (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: u32,
    },

    /// Monthly activity-index series of a year
    Monthly {
        /// Calendar sessions response body (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        year: i32,

        /// Current date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        today: Option<String>,
    },

    /// Print the banding tables in use
    Tables {
        /// Only check the tables, print nothing on success
        #[arg(long)]
        check: bool,
    },

    /// Diagnose configuration and banding tables
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
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

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("COACHSCORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), CoachCliError> {
    let Cli {
        config,
        tables,
        pretty,
        command,
    } = cli;

    if let Commands::Doctor { json } = command {
        return cmd_doctor(config.as_deref(), tables.as_deref(), json);
    }

    let config = load_config(config.as_deref())?;
    let table = load_tables(tables.as_deref())?;
    run_scoring(command, config, table, pretty)
}

fn run_scoring(
    command: Commands,
    config: EngineConfig,
    table: BandingTable,
    pretty: bool,
) -> Result<(), CoachCliError> {
    match command {
        Commands::Test {
            test,
            value,
            age,
            gender,
            lenient,
        } => {
            let submission = score_submission(&table, &test, value, age, &gender, lenient)?;
            print_json(&submission, pretty)
        }
        Commands::Questionnaire { input } => {
            let answers: QuestionnaireAnswers = serde_json::from_str(&read_input(&input)?)?;
            print_json(&compute_questionnaire_score(&answers), pretty)
        }
        Commands::Index {
            sessions,
            questionnaire,
            now,
            load_state,
            save_state,
        } => {
            let now = match now {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| CoachCliError::ParseError(format!("invalid --now {raw}: {e}")))?,
                None => Utc::now(),
            };
            let mut processor = ScoreProcessor::with_config(config, table)?;
            if let Some(path) = load_state {
                processor.load_state(&fs::read_to_string(path)?)?;
            }

            let sessions = sessions.map(|p| read_input(&p)).transpose()?;
            let questionnaire = questionnaire.map(|p| read_input(&p)).transpose()?;
            let outcome =
                processor.resolve_index_json(questionnaire.as_deref(), sessions.as_deref(), now)?;

            if let Some(path) = save_state {
                fs::write(path, processor.save_state()?)?;
            }
            print_json(&outcome, pretty)
        }
        Commands::Weekly { input, year, month } => {
            let processor = ScoreProcessor::with_config(config, table)?;
            let sessions = SessionFeedAdapter.parse(&read_input(&input)?)?;
            print_json(&processor.weekly_series(&sessions, year, month)?, pretty)
        }
        Commands::Monthly { input, year, today } => {
            let today = match today {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|e| CoachCliError::ParseError(format!("invalid --today {raw}: {e}")))?,
                None => Utc::now().date_naive(),
            };
            let processor = ScoreProcessor::with_config(config, table)?;
            let sessions = SessionFeedAdapter.parse(&read_input(&input)?)?;
            print_json(&processor.monthly_series(&sessions, year, today)?, pretty)
        }
        Commands::Tables { check } => {
            if !check {
                println!("{}", table.to_json()?);
            }
            Ok(())
        }
        Commands::Doctor { json } => cmd_doctor(None, None, json),
    }
}

/// Build the submission for one measurement.
///
/// The slug is always checked, since a submission cannot be stored without
/// its test; `lenient` only relaxes the measurement and gender.
fn score_submission(
    table: &BandingTable,
    test: &str,
    value: f64,
    age: u32,
    gender: &str,
    lenient: bool,
) -> Result<TestSubmission, CoachCliError> {
    let form = TestSlug::parse(test)?;
    let score = if lenient {
        table.score_or_fallback(test, value, age, gender)
    } else {
        table.score_raw(test, value, age, gender)?
    };
    Ok(TestSubmission { value, score, form })
}

fn read_input(path: &Path) -> Result<String, CoachCliError> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CoachCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_tables(path: Option<&Path>) -> Result<BandingTable, CoachCliError> {
    match path {
        Some(path) => Ok(BandingTable::from_json(&fs::read_to_string(path)?)?),
        None => Ok(BandingTable::standard()),
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), CoachCliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    tables: Option<&Path>,
    json: bool,
) -> Result<(), CoachCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Coach Score version {}", ENGINE_VERSION),
    });

    checks.push(match load_config(config) {
        Ok(cfg) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: match config {
                Some(path) => format!(
                    "{} valid (decay over {} days, questionnaire max {})",
                    path.display(),
                    cfg.decay_window_days,
                    cfg.questionnaire_max_score
                ),
                None => "Using default configuration".to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    });

    checks.push(match load_tables(tables) {
        Ok(table) if table != BandingTable::standard() => DoctorCheck {
            name: "tables".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "{} banding rows, differing from the built-in tables",
                table.rows().len()
            ),
        },
        Ok(table) => DoctorCheck {
            name: "tables".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} banding rows (built-in)", table.rows().len()),
        },
        Err(e) => DoctorCheck {
            name: "tables".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass input files explicitly)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (use -i - to read it)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Coach Score Doctor Report");
        println!("=========================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CoachCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CoachCliError {
    Io(io::Error),
    Score(ScoreError),
    Json(serde_json::Error),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for CoachCliError {
    fn from(e: io::Error) -> Self {
        CoachCliError::Io(e)
    }
}

impl From<ScoreError> for CoachCliError {
    fn from(e: ScoreError) -> Self {
        CoachCliError::Score(e)
    }
}

impl From<serde_json::Error> for CoachCliError {
    fn from(e: serde_json::Error) -> Self {
        CoachCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CoachCliError> for CliError {
    fn from(e: CoachCliError) -> Self {
        match e {
            CoachCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CoachCliError::Score(e) => {
                let hint = match &e {
                    ScoreError::UnknownTest(_) => Some(
                        "Use one of: equilibre, souplesse, force-bras, force-jambes, endurance",
                    ),
                    ScoreError::UnsupportedGender(_) => Some("Use M or F, or pass --lenient"),
                    ScoreError::InvalidSelection(_) => Some("Souplesse takes a level from 1 to 5"),
                    ScoreError::Configuration(_) => Some("Run 'coachscore doctor' for details"),
                    _ => None,
                };
                CliError {
                    code: "SCORE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            CoachCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CoachCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            CoachCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
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
