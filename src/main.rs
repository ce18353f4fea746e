//! snowgate - ServiceNow report processor
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use snowgate::cli::{
    EvaluateCommand, EvaluateOptions, ProcessCommand, ProcessOptions, ValidateCommand,
    ValidateOptions,
};
use snowgate::config::{crash_log_path, Settings};
use snowgate::error::exit_codes;
use snowgate::processor::ReportProcessor;
use snowgate::report::RunReport;
use snowgate::transport::ServiceNowClient;
use snowgate::util::read_stdin;

// =============================================================================
// CLI Definition
// =============================================================================

/// snowgate - turn configuration run reports into ServiceNow incidents and events
#[derive(Parser)]
#[command(name = "snowgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to $SNOWGATE_SETTINGS, then ~/.snowgate/servicenow_reporting.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which conditions a report satisfies, without contacting ServiceNow
    Evaluate {
        /// Run report JSON file (reads stdin when omitted or "-")
        #[arg(long, short)]
        report: Option<PathBuf>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Process a report and create the incident or event it calls for
    Process {
        /// Run report JSON file (reads stdin when omitted or "-")
        #[arg(long, short)]
        report: Option<PathBuf>,
        /// Build the request but do not send it
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Check the console URL and ServiceNow credentials
    Validate {
        /// Table read to check credentials; pass "" to skip
        #[arg(long, default_value = snowgate::cli::validate::DEFAULT_VALIDATION_TABLE)]
        table: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("snowgate error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Log to stderr so stdout stays reserved for command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SNOWGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Set up the global panic handler.
///
/// On panic, appends to `<snowgate home>/crash.log` and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("snowgate panic: {}", info);

        if let Some(crash_log) = crash_log_path() {
            if let Some(parent) = crash_log.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            report,
            json,
            quiet,
        } => run_evaluate(settings, report.as_deref(), json, quiet),
        Commands::Process {
            report,
            dry_run,
            json,
            quiet,
        } => run_process(settings, report.as_deref(), dry_run, json, quiet),
        Commands::Validate { table, json, quiet } => run_validate(settings, table, json, quiet),
    }
}

fn load_report(path: Option<&Path>) -> snowgate::Result<RunReport> {
    match path {
        Some(path) if path != Path::new("-") => RunReport::load(path),
        _ => RunReport::from_json(&read_stdin()?),
    }
}

fn print(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
        if !formatted.ends_with('\n') {
            println!();
        }
    }
}

fn run_evaluate(
    settings: Settings,
    report: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let report = load_report(report)?;
    let cmd = EvaluateCommand::new(settings);
    let options = EvaluateOptions { json, quiet };

    let output = cmd.run(&report);
    print(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_process(
    settings: Settings,
    report: Option<&Path>,
    dry_run: bool,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let report = load_report(report)?;
    let client = ServiceNowClient::from_settings(&settings)?;
    let processor = ReportProcessor::new(client, settings).with_dry_run(dry_run);
    let cmd = ProcessCommand::new(processor);
    let options = ProcessOptions {
        json,
        quiet,
        dry_run,
    };

    let outcome = cmd.run(&report);
    print(&cmd.format_output(&outcome, &options));

    Ok(ExitCode::from(outcome.exit_code() as u8))
}

fn run_validate(
    settings: Settings,
    table: String,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client = ServiceNowClient::from_settings(&settings)?;
    let cmd = ValidateCommand::new(ReportProcessor::new(client, settings));
    let options = ValidateOptions { json, quiet, table };

    let output = cmd.run(&options);
    print(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}
