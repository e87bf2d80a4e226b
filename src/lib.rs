pub mod analyze;
pub mod cli;
pub mod error;
pub mod io_utils;
pub mod mapping;
pub mod registry;
pub mod runner;
pub mod table;
pub mod transform;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    analyze::{AnalyzeOptions, RaggedPolicy},
    cli::{Cli, Commands},
    error::BatchError,
    mapping::MappingSpec,
    registry::{FileRegistry, SchemaResolver},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("batchmap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Targets(args) => handle_targets(&args),
        Commands::Validate(args) => handle_validate(&args),
        Commands::Run(args) => runner::execute(&args),
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );

    // Padding keeps ragged samples visible instead of erroring them away.
    let options = AnalyzeOptions {
        delimiter,
        ragged: RaggedPolicy::Pad,
    };
    let input = io_utils::open_input(&args.input)?;
    let (columns, rows) = analyze::analyze(input, encoding, &options)
        .with_context(|| format!("Analyzing structure of {:?}", args.input))?;

    let headers: Vec<String> = columns.names().to_vec();
    let samples: Vec<Vec<String>> = rows
        .take(args.sample_rows)
        .filter_map(|row| row.ok())
        .map(|row| {
            (0..columns.len())
                .map(|idx| row.cell(idx).unwrap_or_default().to_string())
                .collect()
        })
        .collect();
    table::print_table(&headers, &samples);
    info!(
        "Found {} column(s); showed {} sample row(s)",
        columns.len(),
        samples.len()
    );
    Ok(())
}

fn handle_targets(args: &cli::TargetsArgs) -> Result<()> {
    let registry = FileRegistry::load(&args.registry)?;
    let headers = vec![
        "target".to_string(),
        "fields".to_string(),
        "required".to_string(),
    ];
    let rows: Vec<Vec<String>> = registry
        .targets
        .iter()
        .map(|(id, schema)| {
            vec![
                id.clone(),
                schema.fields.len().to_string(),
                schema.required_fields().count().to_string(),
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
    info!("Listed {} target(s) from {:?}", rows.len(), args.registry);
    Ok(())
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let options = AnalyzeOptions {
        delimiter,
        ..AnalyzeOptions::default()
    };

    let input = io_utils::open_input(&args.input)?;
    let (columns, _rows) = analyze::analyze(input, encoding, &options)
        .with_context(|| format!("Analyzing structure of {:?}", args.input))?;

    let registry = FileRegistry::load(&args.registry)?;
    let resolver = SchemaResolver::new(&registry);
    let schema = resolver.resolve(&args.target)?;
    let spec = MappingSpec::load(&args.spec)?;

    match validate::validate(&spec, &columns, &schema) {
        Ok(validated) => {
            info!(
                "Mapping specification is valid for target '{}' ({} field rule(s))",
                args.target,
                validated.spec().fields.len()
            );
            Ok(())
        }
        Err(report) => Err(BatchError::InvalidSpec(report).into()),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
