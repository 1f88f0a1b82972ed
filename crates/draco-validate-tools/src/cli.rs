//! Argument parsing and command dispatch.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use draco_validate::comparator::{DEFAULT_QUANTIZATION_BITS, DEFAULT_TOLERANCE_MULTIPLIER};
use draco_validate::report::{self, ReportFormat};
use draco_validate::{load_file, validate, ComparisonOptions, ParsedFile, Side, ValidateError};
use thiserror::Error;
use tracing::{debug, info};

/// Exit status when the input could not be loaded or parsed.
pub const EXIT_INPUT_ERROR: i32 = 2;

/// Exit status when the report could not be rendered or written.
pub const EXIT_OUTPUT_ERROR: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "draco-validate", version, about = "Validate Draco round trips of GLB assets")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare vertex positions of an original and a round-tripped GLB
    Compare(CompareArgs),
    /// Print the meshes and positions found in one GLB
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Reference GLB file
    pub original: PathBuf,

    /// GLB file produced by the round trip
    pub candidate: PathBuf,

    /// Position quantization bits used by the encoder
    #[arg(short = 'q', long, default_value_t = DEFAULT_QUANTIZATION_BITS,
          value_parser = clap::value_parser!(u8).range(1..=30))]
    pub quantization_bits: u8,

    /// Multiple of the quantization step that is tolerated
    #[arg(short = 't', long, default_value_t = DEFAULT_TOLERANCE_MULTIPLIER,
          value_parser = parse_multiplier)]
    pub tolerance_multiplier: f64,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Treat meshes that could not be decoded as failures
    #[arg(long)]
    pub fail_on_undecodable: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// GLB file to inspect
    pub file: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => ReportFormat::Text,
            Format::Json => ReportFormat::Json,
        }
    }
}

fn parse_multiplier(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("tolerance multiplier must be a positive number, got {}", s))
    }
}

/// Errors that stop a command before a verdict exists.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Input(#[from] ValidateError),

    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) => EXIT_INPUT_ERROR,
            CliError::Report(_) | CliError::Output(_) => EXIT_OUTPUT_ERROR,
        }
    }
}

impl Cli {
    /// Log level selected by `-v`.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Run the selected command, writing its report to `out`.
///
/// Returns the process exit status for completed commands.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<i32, CliError> {
    match &cli.command {
        Command::Compare(args) => compare(args, out),
        Command::Inspect(args) => inspect(args, out),
    }
}

fn load(path: &Path, side: Side) -> Result<Vec<u8>, ValidateError> {
    load_file(path).map_err(|e| e.for_side(side))
}

fn compare<W: Write>(args: &CompareArgs, out: &mut W) -> Result<i32, CliError> {
    let options = ComparisonOptions::new()
        .with_quantization_bits(args.quantization_bits)
        .with_tolerance_multiplier(args.tolerance_multiplier);

    info!(
        original = %args.original.display(),
        candidate = %args.candidate.display(),
        bits = options.quantization_bits,
        multiplier = options.tolerance_multiplier,
        "comparing"
    );

    let original = load(&args.original, Side::Original)?;
    let candidate = load(&args.candidate, Side::Candidate)?;
    let run = validate(&original, &candidate, &options, None)?;

    let rendered = report::render_run(&run, args.format.into())?;
    out.write_all(rendered.as_bytes())?;
    if args.format == Format::Json {
        writeln!(out)?;
    }

    let mut code = run.exit_code();
    if code == 0 && args.fail_on_undecodable && run.verdict.has_undecodable() {
        debug!("undecodable meshes present, failing");
        code = 1;
    }
    Ok(code)
}

fn inspect<W: Write>(args: &InspectArgs, out: &mut W) -> Result<i32, CliError> {
    let file = ParsedFile::open(&args.file)?;
    let extraction = file.extract(None);
    let label = args.file.display().to_string();

    let rendered =
        report::render_inspection(&label, file.scene(), &extraction, args.format.into())?;
    out.write_all(rendered.as_bytes())?;
    if args.format == Format::Json {
        writeln!(out)?;
    }
    Ok(0)
}
