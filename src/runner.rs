//! Batch execution: an ordered fold of the transformation engine over the
//! row stream.
//!
//! Validation happens exactly once, before the first row. Thereafter each
//! row is independently transformed and its outcome appended in source
//! order; a row-level failure is recorded, never thrown past this boundary.
//! The caller always receives a complete [`BatchResult`] unless a fatal
//! pre-run error aborts the run with zero rows processed.

use std::{fs::File, io::{BufWriter, Write}, path::Path};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    analyze::{AnalyzeOptions, ColumnSet, RaggedPolicy, Row},
    cli::RunArgs,
    error::{BatchError, RowMappingError},
    io_utils,
    mapping::MappingSpec,
    registry::{FileRegistry, SchemaResolver, TargetSchema},
    validate,
};

/// Terminal state of one row: `pending → mapped | failed`, no row moves
/// backward and none is processed twice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Mapped(crate::transform::MappedRecord),
    Failed(RowMappingError),
}

impl RowOutcome {
    pub fn is_mapped(&self) -> bool {
        matches!(self, RowOutcome::Mapped(_))
    }
}

/// Ordered per-row outcomes for one batch: one entry per data row, in
/// source order.
#[derive(Debug, Default)]
pub struct BatchResult {
    outcomes: Vec<RowOutcome>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[RowOutcome] {
        &self.outcomes
    }

    pub fn records(&self) -> impl Iterator<Item = &crate::transform::MappedRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Mapped(record) => Some(record),
            RowOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowMappingError> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Failed(err) => Some(err),
            RowOutcome::Mapped(_) => None,
        })
    }

    pub fn summary(&self) -> BatchSummary {
        let failures: Vec<RowMappingError> = self.failures().cloned().collect();
        BatchSummary {
            total: self.outcomes.len(),
            mapped: self.outcomes.len() - failures.len(),
            failed: failures.len(),
            failures,
        }
    }
}

/// Counts plus the full ordered failure list, suitable for logging or
/// surfacing to an operator.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub mapped: usize,
    pub failed: usize,
    pub failures: Vec<RowMappingError>,
}

/// Runs one batch: validates the spec once, then folds the transformation
/// over `rows` in order.
///
/// Row-level errors from the stream itself (unreadable or ragged rows) are
/// captured as failed outcomes for their index. Stopping the iteration
/// early leaves a valid ordered prefix.
pub fn run<I>(
    spec: &MappingSpec,
    columns: &ColumnSet,
    rows: I,
    schema: &TargetSchema,
) -> Result<BatchResult, BatchError>
where
    I: IntoIterator<Item = std::result::Result<Row, RowMappingError>>,
{
    let validated = validate::validate(spec, columns, schema).map_err(BatchError::InvalidSpec)?;

    let mut outcomes = Vec::new();
    for item in rows {
        let outcome = match item {
            Ok(row) => match validated.apply(&row) {
                Ok(record) => {
                    debug!("Row {} mapped", record.row_index);
                    RowOutcome::Mapped(record)
                }
                Err(err) => {
                    warn!("Row {} failed: {}", err.row_index, err.reason);
                    RowOutcome::Failed(err)
                }
            },
            Err(err) => {
                warn!("Row {} unreadable: {}", err.row_index, err.reason);
                RowOutcome::Failed(err)
            }
        };
        outcomes.push(outcome);
    }
    Ok(BatchResult { outcomes })
}

/// CLI entry point for the `run` subcommand.
pub fn execute(args: &RunArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let options = AnalyzeOptions {
        delimiter,
        ragged: if args.pad_ragged_rows {
            RaggedPolicy::Pad
        } else {
            RaggedPolicy::Error
        },
    };

    info!(
        "Running batch '{}' against target '{}' (delimiter '{}')",
        args.input.display(),
        args.target,
        crate::printable_delimiter(delimiter)
    );

    let input = io_utils::open_input(&args.input)?;
    let (columns, rows) = crate::analyze::analyze(input, encoding, &options)
        .with_context(|| format!("Analyzing structure of {:?}", args.input))?;

    let registry = FileRegistry::load(&args.registry)?;
    let resolver = SchemaResolver::new(&registry);
    let schema = resolver.resolve(&args.target)?;

    let spec = MappingSpec::load(&args.spec)?;

    let result = run(&spec, &columns, rows, &schema)?;
    write_records(args.output.as_deref(), &result)?;

    let summary = result.summary();
    for failure in &summary.failures {
        let field = failure.field.as_deref().unwrap_or("-");
        info!(
            "  failed row {} (field {field}): {}",
            failure.row_index, failure.reason
        );
    }
    info!(
        "Batch complete: {} row(s), {} mapped, {} failed",
        summary.total, summary.mapped, summary.failed
    );

    if let Some(report_path) = &args.report {
        write_summary(report_path, &summary)?;
        info!("Failure report written to {report_path:?}");
    }
    Ok(())
}

/// Writes mapped records as JSON Lines, one record per row, in source
/// order. Failed rows are omitted here and enumerated in the summary.
fn write_records(path: Option<&Path>, result: &BatchResult) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !io_utils::is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    for record in result.records() {
        serde_json::to_writer(&mut writer, record).context("Writing record JSON")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(path: &Path, summary: &BatchSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary).context("Writing report JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mapping::MappingRule,
        registry::{FieldType, SchemaField},
    };

    fn schema() -> TargetSchema {
        TargetSchema {
            target_id: "lookup".to_string(),
            fields: vec![SchemaField {
                name: "name".to_string(),
                required: true,
                field_type: FieldType::String,
                description: None,
            }],
        }
    }

    fn spec() -> MappingSpec {
        let mut spec = MappingSpec::default();
        spec.fields.insert(
            "name".to_string(),
            MappingRule::Direct {
                column: "name".to_string(),
            },
        );
        spec
    }

    fn ok_row(index: usize, name: &str) -> std::result::Result<Row, RowMappingError> {
        Ok(Row::new(index, vec![Some(name.to_string())]))
    }

    #[test]
    fn outcomes_preserve_source_order_and_length() {
        let columns = ColumnSet::from_headers(["name"]).unwrap();
        let rows = vec![
            ok_row(0, "ada"),
            Err(RowMappingError::new(1, "expected 1 field(s), found 3")),
            ok_row(2, "grace"),
        ];

        let result = run(&spec(), &columns, rows, &schema()).expect("no fatal error");
        assert_eq!(result.len(), 3);
        assert!(result.outcomes()[0].is_mapped());
        assert!(!result.outcomes()[1].is_mapped());
        assert!(result.outcomes()[2].is_mapped());

        let summary = result.summary();
        assert_eq!((summary.total, summary.mapped, summary.failed), (3, 2, 1));
        assert_eq!(summary.failures[0].row_index, 1);
    }

    #[test]
    fn invalid_spec_aborts_before_any_row_is_processed() {
        let columns = ColumnSet::from_headers(["nickname"]).unwrap();
        let rows = vec![ok_row(0, "ada")];

        let err = run(&spec(), &columns, rows, &schema()).unwrap_err();
        match err {
            BatchError::InvalidSpec(report) => assert!(!report.is_empty()),
            other => panic!("expected invalid spec, got {other:?}"),
        }
    }

    #[test]
    fn early_termination_yields_a_valid_prefix() {
        let columns = ColumnSet::from_headers(["name"]).unwrap();
        let rows: Vec<_> = (0..10).map(|i| ok_row(i, "ada")).collect();

        let result = run(&spec(), &columns, rows.into_iter().take(4), &schema()).unwrap();
        assert_eq!(result.len(), 4);
        assert!(result.outcomes().iter().all(RowOutcome::is_mapped));
    }
}
