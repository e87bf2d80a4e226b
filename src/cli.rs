use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Map tabular batches onto tool schemas", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a file's structure: canonical columns and sample rows
    Probe(ProbeArgs),
    /// List the target schemas available in a registry file
    Targets(TargetsArgs),
    /// Validate a mapping spec against a file and a target schema
    Validate(ValidateArgs),
    /// Run a batch: map every row and emit records as JSON Lines
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input delimited file to inspect ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of sample rows to display
    #[arg(long = "sample-rows", default_value_t = 5)]
    pub sample_rows: usize,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TargetsArgs {
    /// Schema registry file (JSON or YAML)
    #[arg(short = 'r', long = "registry")]
    pub registry: PathBuf,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Input delimited file the spec should apply to ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping specification file (JSON or YAML)
    #[arg(short = 's', long = "spec")]
    pub spec: PathBuf,
    /// Schema registry file (JSON or YAML)
    #[arg(short = 'r', long = "registry")]
    pub registry: PathBuf,
    /// Target identifier to resolve in the registry
    #[arg(short = 't', long = "target")]
    pub target: String,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input delimited file to map ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping specification file (JSON or YAML)
    #[arg(short = 's', long = "spec")]
    pub spec: PathBuf,
    /// Schema registry file (JSON or YAML)
    #[arg(short = 'r', long = "registry")]
    pub registry: PathBuf,
    /// Target identifier to resolve in the registry
    #[arg(short = 't', long = "target")]
    pub target: String,
    /// Output file for mapped records as JSON Lines (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write a JSON failure report (counts + per-row failures) to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// Pad short rows with absent cells instead of failing them
    #[arg(long = "pad-ragged-rows")]
    pub pad_ragged_rows: bool,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
