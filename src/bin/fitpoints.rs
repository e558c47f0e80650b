//! fitpoints CLI - Command-line interface for the fitpoints engine
//!
//! Commands:
//! - sync: Reconcile a Garmin export into the local store
//! - day: Show one stored day with its points
//! - week: Show a week summary
//! - month: Show a month grid
//! - doctor: Diagnose configuration and store health

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fitpoints::aggregate::{week_containing, Aggregator, DayPoints, MonthGrid, WeekSummary};
use fitpoints::{
    Config, DateRange, GarminExportProvider, LocalStore, Reconciler, RunSummary, SyncError,
    SyncRequest, FITPOINTS_VERSION, PRODUCER_NAME,
};

/// fitpoints - Turn fitness tracker history into daily activity points
#[derive(Parser)]
#[command(name = "fitpoints")]
#[command(version = FITPOINTS_VERSION)]
#[command(about = "Sync activity history and score it as points", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a Garmin export into the local store
    Sync {
        /// Garmin export JSON ({ "dailies": [...], "activities": [...] })
        #[arg(short, long)]
        export: PathBuf,

        /// First date to sync (default: configured sync start date)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to sync (default: yesterday)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Re-fetch dates that are already synced
        #[arg(long)]
        force: bool,
    },

    /// Show one stored day with its points
    Day {
        date: NaiveDate,
    },

    /// Show the week containing a date (default: today)
    Week {
        date: Option<NaiveDate>,
    },

    /// Show a calendar grid for a month
    Month {
        year: i32,
        month: u32,
    },

    /// Diagnose configuration and store health
    Doctor,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Sync {
            export,
            start,
            end,
            force,
        } => cmd_sync(&config, &export, start, end, force, today, cli.json),
        Commands::Day { date } => cmd_day(&config, date, cli.json),
        Commands::Week { date } => cmd_week(&config, date.unwrap_or(today), cli.json),
        Commands::Month { year, month } => cmd_month(&config, year, month, cli.json),
        Commands::Doctor => cmd_doctor(&config, cli.json),
    }
}

fn cmd_sync(
    config: &Config,
    export: &std::path::Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
    today: NaiveDate,
    json: bool,
) -> Result<(), CliFailure> {
    let provider = GarminExportProvider::from_path(export)?;
    let mut store = LocalStore::open(&config.database_path)?;

    let request = match (start, end) {
        (None, None) => match SyncRequest::catch_up(config, today) {
            Some(mut request) => {
                request.force |= force;
                request
            }
            None => {
                println!("Data is up to date.");
                return Ok(());
            }
        },
        (start, end) => SyncRequest::new(
            start.unwrap_or(config.sync_start_date),
            end.unwrap_or(today - chrono::Duration::days(1)),
            force || config.force_refresh,
        )?,
    };

    // Dates outside the export stay unsynced for a later export
    let Some(request) = clamp_to_export(request, provider.date_span()) else {
        println!("Export holds no data for the requested dates.");
        return Ok(());
    };

    let summary = Reconciler::new(provider, &mut store, config).run(&request, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_run_summary(&summary);
    }
    Ok(())
}

fn clamp_to_export(request: SyncRequest, span: Option<DateRange>) -> Option<SyncRequest> {
    let span = span?;
    let range = DateRange::new(
        request.range.start.max(span.start),
        request.range.end.min(span.end),
    )?;
    Some(SyncRequest { range, ..request })
}

fn cmd_day(config: &Config, date: NaiveDate, json: bool) -> Result<(), CliFailure> {
    let store = LocalStore::open(&config.database_path)?;
    let summary = store.get(date)?;
    let points = Aggregator::new(&store, config).day_points(date)?;

    if json {
        let value = serde_json::json!({ "summary": summary, "points": points });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", date);
    match &summary {
        Some(day) => {
            println!("  Steps: {}", day.step_count);
            for activity in &day.activities {
                println!(
                    "  - {} ({}): {:.0} min, HR {}",
                    activity.name.as_deref().unwrap_or("Activity"),
                    activity.activity_type.as_str(),
                    activity.duration_minutes,
                    activity
                        .avg_heart_rate
                        .map(|hr| hr.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        None => println!("  No data synced for this date"),
    }
    print_points(&points);
    Ok(())
}

fn cmd_week(config: &Config, date: NaiveDate, json: bool) -> Result<(), CliFailure> {
    let store = LocalStore::open(&config.database_path)?;
    let week = Aggregator::new(&store, config).week_summary(week_containing(date))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&week)?);
    } else {
        print_week(&week, config);
    }
    Ok(())
}

fn cmd_month(config: &Config, year: i32, month: u32, json: bool) -> Result<(), CliFailure> {
    let store = LocalStore::open(&config.database_path)?;
    let grid = Aggregator::new(&store, config).month_grid(year, month)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&grid)?);
    } else {
        print_month(&grid);
    }
    Ok(())
}

fn cmd_doctor(config: &Config, json: bool) -> Result<(), CliFailure> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "fitpoints_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("fitpoints version {}", FITPOINTS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "Sync start {}, {} step tiers, daily goal {}, weekly goal {}",
            config.sync_start_date,
            config.scoring.step_tiers.len(),
            config.goals.daily_points,
            config.goals.weekly_points
        ),
    });

    if config.database_path.exists() {
        match LocalStore::open(&config.database_path).and_then(|store| {
            Ok((store.len()?, store.latest_date()?, store.covered_range()?))
        }) {
            Ok((days, latest, coverage)) => checks.push(DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} days stored (latest {}), {} days covered in {} ranges",
                    days,
                    latest.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string()),
                    coverage.covered_days(),
                    coverage.ranges().len()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "database".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read {}: {}", config.database_path.display(), e),
            }),
        }
    } else {
        checks.push(DoctorCheck {
            name: "database".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "{} does not exist yet; run 'fitpoints sync' first",
                config.database_path.display()
            ),
        });
    }

    let stdout_check = if atty::is(atty::Stream::Stdout) {
        "stdout is a TTY (interactive mode)"
    } else {
        "stdout is a pipe (use --json for machine-readable output)"
    };
    checks.push(DoctorCheck {
        name: "stdout".to_string(),
        status: CheckStatus::Ok,
        message: stdout_check.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FITPOINTS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("fitpoints Doctor Report");
        println!("=======================");
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
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

// Output helpers

fn print_run_summary(summary: &RunSummary) {
    println!(
        "Sync {} ({} to {})",
        if summary.cancelled { "cancelled" } else { "complete" },
        summary.requested.start,
        summary.requested.end
    );
    println!("  Planned: {}", summary.planned);
    println!("  Synced:  {}", summary.synced);
    println!("  Skipped: {}", summary.skipped.len());
    println!("  Failed:  {}", summary.failed.len());
    for day in summary.skipped.iter().chain(&summary.failed) {
        println!("    {}: {}", day.date, day.reason);
    }
}

fn print_points(points: &DayPoints) {
    println!(
        "  Points: {:.1} (steps {}, activities {:.1}){}",
        points.breakdown.total,
        points.breakdown.step_points,
        points.breakdown.activity_points,
        if points.goal_met { " *" } else { "" }
    );
}

fn print_week(week: &WeekSummary, config: &Config) {
    println!("Week of {}", week.week_start);
    for day in &week.per_day {
        println!(
            "  {} {:>6.1}{}",
            day.date.format("%a %Y-%m-%d"),
            day.breakdown.total,
            if day.goal_met { " *" } else { "" }
        );
    }
    println!(
        "Total: {:.1} / {}{}",
        week.weekly_total,
        config.goals.weekly_points,
        if week.goal_met { " (goal met)" } else { "" }
    );
}

fn print_month(grid: &MonthGrid) {
    println!("{}-{:02}", grid.year, grid.month);
    println!("  Mon   Tue   Wed   Thu   Fri   Sat   Sun  | Week");
    for week in &grid.weeks {
        let cells: Vec<String> = week
            .days
            .iter()
            .map(|slot| match slot {
                Some(day) if day.goal_met => format!("{:>4.0}*", day.breakdown.total),
                Some(day) => format!("{:>4.0} ", day.breakdown.total),
                None => "     ".to_string(),
            })
            .collect();
        println!(
            "  {} | {:.0}{}",
            cells.join(" "),
            week.week_total,
            if week.goal_met { " *" } else { "" }
        );
    }
    println!("Month total: {:.1}", grid.month_total);
}

// Error types

#[derive(Debug)]
enum CliFailure {
    Sync(SyncError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<SyncError> for CliFailure {
    fn from(e: SyncError) -> Self {
        CliFailure::Sync(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Sync(e) => {
                let (code, hint) = match &e {
                    SyncError::Auth(_) => ("AUTH_ERROR", Some("Sign in to the remote account again")),
                    SyncError::Persistence(_) => ("STORE_ERROR", Some("Check the database path and permissions")),
                    SyncError::Transport(_) => ("TRANSPORT_ERROR", Some("Check the export file or network")),
                    SyncError::Config(_) => ("CONFIG_ERROR", Some("Run 'fitpoints doctor' to inspect configuration")),
                    SyncError::InvalidMonth { .. } => ("INVALID_MONTH", Some("Months are numbered 1-12")),
                    SyncError::Json(_) => ("JSON_ERROR", Some("Check JSON syntax")),
                    SyncError::Validation { .. } | SyncError::Score(_) => ("VALIDATION_ERROR", None),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CliFailure::DoctorFailed => CliError {
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
