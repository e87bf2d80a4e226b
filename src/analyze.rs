//! Structure analysis: canonical columns and the lazy row stream.
//!
//! This module owns [`ColumnSet`] (the canonical representation of a file's
//! header) and [`RowStream`] (a pull-style, forward-only iterator over data
//! rows). Analysis reads the header eagerly and nothing else; rows are
//! yielded one at a time, so memory stays O(1) beyond a single row.
//!
//! ## Responsibilities
//!
//! - BOM-aware decoding (delegated to [`io_utils::decoded_reader`])
//! - Header normalization: surrounding whitespace and control characters
//!   are stripped, internal spacing and case are preserved
//! - Case-insensitive column lookup with original casing kept for display
//! - Duplicate-header detection (fatal, ambiguous column reference)
//! - Ragged-row policy: fail the row or pad short rows with absent cells

use std::{collections::HashMap, io::Read};

use encoding_rs::Encoding;
use log::debug;

use crate::{
    error::{RowMappingError, StructuralError},
    io_utils,
};

/// What to do with a data row whose field count differs from the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RaggedPolicy {
    /// The row fails with a [`RowMappingError`].
    #[default]
    Error,
    /// Short rows are padded with absent cells. Rows with more fields than
    /// the header still fail: there is nothing to pad and truncation would
    /// drop data.
    Pad,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub delimiter: u8,
    pub ragged: RaggedPolicy,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            ragged: RaggedPolicy::default(),
        }
    }
}

/// Ordered, immutable set of canonical column names for one file.
///
/// Lookup is case-insensitive; the original (trimmed) casing is retained
/// for display.
#[derive(Debug, Clone)]
pub struct ColumnSet {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl ColumnSet {
    pub fn from_headers<I, S>(headers: I) -> Result<Self, StructuralError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = headers
            .into_iter()
            .map(|raw| canonical_name(raw.as_ref()))
            .collect();
        if names.is_empty() {
            return Err(StructuralError::EmptyInput);
        }
        let mut lookup = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if let Some(first) = lookup.insert(name.to_lowercase(), idx) {
                return Err(StructuralError::DuplicateColumn {
                    name: name.clone(),
                    first,
                    second: idx,
                });
            }
        }
        Ok(Self { names, lookup })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(&name.trim().to_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }
}

/// Strips surrounding whitespace and any control or zero-width format
/// characters that encoding artifacts leave behind.
fn canonical_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && *c != '\u{feff}')
        .collect::<String>()
        .trim()
        .to_string()
}

/// One data row, aligned with its file's [`ColumnSet`].
///
/// `None` is an absent cell (ragged row under the pad policy); `Some("")`
/// is present-but-empty. The two are deliberately distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    cells: Vec<Option<String>>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<Option<String>>) -> Self {
        Self { index, cells }
    }

    pub fn cell(&self, column_index: usize) -> Option<&str> {
        self.cells.get(column_index).and_then(|c| c.as_deref())
    }

    pub fn value<'a>(&'a self, columns: &ColumnSet, name: &str) -> Option<&'a str> {
        columns.index_of(name).and_then(|idx| self.cell(idx))
    }
}

/// Forward-only lazy sequence of rows.
///
/// Yields `Err` for rows that cannot be materialized (unreadable bytes,
/// ragged under the error policy) without ending the stream; the caller may
/// stop pulling at any point and what it has consumed stays valid.
pub struct RowStream {
    reader: csv::Reader<Box<dyn Read>>,
    record: csv::ByteRecord,
    width: usize,
    ragged: RaggedPolicy,
    next_index: usize,
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("width", &self.width)
            .field("ragged", &self.ragged)
            .field("next_index", &self.next_index)
            .finish_non_exhaustive()
    }
}

impl Iterator for RowStream {
    type Item = Result<Row, RowMappingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next_index;
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                self.next_index += 1;
                Some(self.materialize(index))
            }
            Err(err) => {
                self.next_index += 1;
                Some(Err(RowMappingError::new(
                    index,
                    format!("unreadable row: {err}"),
                )))
            }
        }
    }
}

impl RowStream {
    fn materialize(&self, index: usize) -> Result<Row, RowMappingError> {
        let found = self.record.len();
        if found > self.width {
            return Err(RowMappingError::new(
                index,
                format!("expected {} field(s), found {found}", self.width),
            ));
        }
        if found < self.width && self.ragged == RaggedPolicy::Error {
            return Err(RowMappingError::new(
                index,
                format!("expected {} field(s), found {found}", self.width),
            ));
        }
        let mut cells = Vec::with_capacity(self.width);
        for field in self.record.iter() {
            let text = io_utils::decode_cell(field)
                .map_err(|reason| RowMappingError::new(index, reason))?;
            cells.push(Some(text));
        }
        cells.resize(self.width, None);
        Ok(Row::new(index, cells))
    }
}

/// Analyzes a raw byte stream: decodes it, reads the header, and returns the
/// canonical columns together with the lazy row sequence.
///
/// Fatal structural defects (empty input, undecodable header, duplicate
/// columns) are detected here, before any row is yielded.
pub fn analyze<R>(
    input: R,
    encoding: &'static Encoding,
    options: &AnalyzeOptions,
) -> Result<(ColumnSet, RowStream), StructuralError>
where
    R: Read + 'static,
{
    let decoded: Box<dyn Read> = Box::new(io_utils::decoded_reader(input, encoding));
    let mut reader = io_utils::open_csv_reader(decoded, options.delimiter);

    let mut header = csv::ByteRecord::new();
    if !reader.read_byte_record(&mut header)? {
        return Err(StructuralError::EmptyInput);
    }
    let raw_names = io_utils::decode_record(&header).map_err(StructuralError::HeaderDecode)?;
    let columns = ColumnSet::from_headers(&raw_names)?;
    debug!("Analyzed header: {} column(s)", columns.len());

    let width = columns.len();
    Ok((
        columns,
        RowStream {
            reader,
            record: csv::ByteRecord::new(),
            width,
            ragged: options.ragged,
            next_index: 0,
        },
    ))
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;

    use super::*;

    fn analyze_str(input: &'static str, options: &AnalyzeOptions) -> (ColumnSet, RowStream) {
        analyze(input.as_bytes(), UTF_8, options).expect("analyze")
    }

    #[test]
    fn canonical_name_trims_and_strips_artifacts() {
        assert_eq!(canonical_name("  First Name "), "First Name");
        assert_eq!(canonical_name("\u{feff}id"), "id");
        assert_eq!(canonical_name("na\u{0}me"), "name");
    }

    #[test]
    fn column_lookup_is_case_insensitive_but_preserves_display_casing() {
        let columns = ColumnSet::from_headers(["Full Name", "Postcode"]).unwrap();
        assert_eq!(columns.index_of("full name"), Some(0));
        assert_eq!(columns.index_of(" POSTCODE "), Some(1));
        assert_eq!(columns.names(), ["Full Name", "Postcode"]);
    }

    #[test]
    fn duplicate_headers_are_fatal() {
        let err = ColumnSet::from_headers(["id", "Name", "name"]).unwrap_err();
        match err {
            StructuralError::DuplicateColumn { name, first, second } => {
                assert_eq!(name, "name");
                assert_eq!((first, second), (1, 2));
            }
            other => panic!("expected duplicate column error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_fatal() {
        let result = analyze("".as_bytes(), UTF_8, &AnalyzeOptions::default());
        assert!(matches!(result, Err(StructuralError::EmptyInput)));
    }

    #[test]
    fn bom_does_not_change_the_first_column_name() {
        let options = AnalyzeOptions::default();
        let (with_bom, _) = analyze_str("\u{feff}name,age\nada,36\n", &options);
        let (without_bom, _) = analyze_str("name,age\nada,36\n", &options);
        assert_eq!(with_bom.names(), without_bom.names());
        assert_eq!(with_bom.names()[0], "name");
    }

    #[test]
    fn quoted_fields_may_contain_delimiters_and_newlines() {
        let (columns, mut rows) = analyze_str(
            "address,postcode\n\"1 Church View,\nCrofton\",DN12 1RH\n",
            &AnalyzeOptions::default(),
        );
        let row = rows.next().unwrap().unwrap();
        assert_eq!(
            row.value(&columns, "address"),
            Some("1 Church View,\nCrofton")
        );
        assert_eq!(row.value(&columns, "postcode"), Some("DN12 1RH"));
    }

    #[test]
    fn empty_cell_is_present_not_absent() {
        let (columns, mut rows) =
            analyze_str("a,b\n,x\n", &AnalyzeOptions::default());
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.value(&columns, "a"), Some(""));
    }

    #[test]
    fn ragged_row_fails_under_error_policy() {
        let (_, mut rows) = analyze_str("a,b,c\n1,2\n", &AnalyzeOptions::default());
        let err = rows.next().unwrap().unwrap_err();
        assert_eq!(err.row_index, 0);
        assert!(err.reason.contains("expected 3 field(s), found 2"));
    }

    #[test]
    fn ragged_row_is_padded_with_absent_cells_under_pad_policy() {
        let options = AnalyzeOptions {
            ragged: RaggedPolicy::Pad,
            ..AnalyzeOptions::default()
        };
        let (columns, mut rows) = analyze_str("a,b,c\n1,2\n", &options);
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.value(&columns, "a"), Some("1"));
        assert_eq!(row.value(&columns, "c"), None);
    }

    #[test]
    fn overlong_row_fails_even_under_pad_policy() {
        let options = AnalyzeOptions {
            ragged: RaggedPolicy::Pad,
            ..AnalyzeOptions::default()
        };
        let (_, mut rows) = analyze_str("a,b\n1,2,3\n", &options);
        assert!(rows.next().unwrap().is_err());
    }

    #[test]
    fn stream_continues_after_a_failed_row() {
        let (_, rows) = analyze_str("a,b\n1\n2,3\n", &AnalyzeOptions::default());
        let outcomes: Vec<_> = rows.collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_err());
        assert!(outcomes[1].is_ok());
    }
}
