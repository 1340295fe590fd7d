mod fixture;
mod logging;
mod settings;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use fixture::{Fixture, Script, apply_edit};
use logging::init_logging;
use schemagraph_core::{
    Error as CoreError, EventLog, Schema, build_fk_graph_report, validate_schema,
};
use serde::Serialize;
use settings::load_settings;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),
    #[error("schema has {0} validation error(s)")]
    Invalid(usize),
    #[error("foreign key cycle: {0}")]
    Cycle(String),
}

#[derive(Parser, Debug)]
#[command(name = "schemagraph", version, about = "Schemagraph CLI")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    /// Engine settings file (TOML).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a fixture, apply its edits and print the resulting snapshot.
    Apply(ApplyArgs),
    /// Load a fixture and report validation issues and the foreign key graph.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Fixture file (TOML).
    fixture: PathBuf,
    /// Additional edit script applied after the fixture's own edits.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Write the snapshot here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print every notification raised by the edits as a JSON line.
    #[arg(long, default_value_t = false)]
    events: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Fixture file (TOML).
    fixture: PathBuf,
    /// Fail when the foreign key graph has a cycle.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Serialize)]
struct CheckOutput {
    validation: schemagraph_core::ValidationReport,
    fk_graph: schemagraph_core::FkGraphReport,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    match cli.command {
        Command::Apply(args) => run_apply(args, cli.settings.as_deref()),
        Command::Check(args) => run_check(args, cli.settings.as_deref()),
    }
}

fn load_fixture(path: &Path, settings: Option<&Path>) -> Result<(Fixture, Schema), CliError> {
    let fixture = Fixture::from_toml(&fs::read_to_string(path)?)?;
    let settings = match &fixture.settings {
        Some(settings) => settings.clone(),
        None => load_settings(settings)?,
    };
    let mut schema = Schema::with_settings(settings);
    fixture.load(&mut schema)?;
    Ok((fixture, schema))
}

fn run_apply(args: ApplyArgs, settings: Option<&Path>) -> Result<(), CliError> {
    let (fixture, mut schema) = load_fixture(&args.fixture, settings)?;
    let mut edits = fixture.edits;
    if let Some(path) = &args.script {
        edits.extend(Script::from_toml(&fs::read_to_string(path)?)?.edits);
    }

    let log = EventLog::new();
    schema.subscribe(Box::new(log.clone()));
    for edit in &edits {
        apply_edit(&mut schema, edit)?;
    }
    info!(edits = edits.len(), notifications = log.len(), "edits applied");

    let report = validate_schema(&schema);
    for issue in &report.warnings {
        warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
    }
    if !report.is_ok() {
        for issue in &report.errors {
            warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
        }
        return Err(CliError::Invalid(report.errors.len()));
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.events {
        for notification in log.notifications() {
            serde_json::to_writer(&mut out, &notification)?;
            writeln!(out)?;
        }
    }

    let snapshot = serde_json::to_string_pretty(&schema.snapshot())?;
    match &args.out {
        Some(path) => {
            fs::write(path, format!("{snapshot}\n"))?;
            info!(path = %path.display(), "snapshot written");
        }
        None => writeln!(out, "{snapshot}")?,
    }
    Ok(())
}

fn run_check(args: CheckArgs, settings: Option<&Path>) -> Result<(), CliError> {
    let (_, schema) = load_fixture(&args.fixture, settings)?;
    let output = CheckOutput {
        validation: validate_schema(&schema),
        fk_graph: build_fk_graph_report(&schema),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !output.validation.is_ok() {
        return Err(CliError::Invalid(output.validation.errors.len()));
    }
    if args.strict {
        if let Some(cycle) = &output.fk_graph.cycle {
            return Err(CliError::Cycle(cycle.join(" -> ")));
        }
    }
    Ok(())
}
