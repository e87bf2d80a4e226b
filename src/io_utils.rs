//! Input plumbing: delimiter resolution, character decoding, and CSV reader
//! construction.
//!
//! All byte-level concerns live here so the analyzer sees one canonical
//! stream: UTF-8 text with no byte-order mark, regardless of the source
//! encoding. Nothing else in the crate touches `encoding_rs`; a component
//! decoding the same bytes differently would be a contract violation.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Wraps a raw byte stream in a BOM-aware decoder producing UTF-8.
///
/// A leading byte-order mark is sniffed and stripped before any bytes reach
/// the CSV parser. With `utf8_passthru`, UTF-8 input is not re-decoded, so a
/// malformed sequence survives to the cell decoder and surfaces as an error
/// instead of being silently replaced.
pub fn decoded_reader<R>(reader: R, encoding: &'static Encoding) -> DecodeReaderBytes<R, Vec<u8>>
where
    R: Read,
{
    DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_sniffing(true)
        .strip_bom(true)
        .utf8_passthru(true)
        .build(reader)
}

/// Builds a CSV reader over an already-decoded UTF-8 stream.
///
/// Headers are read manually by the analyzer, and flexible mode is on:
/// ragged rows are a policy decision, not a parse error.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        )))
    }
}

pub fn decode_cell(bytes: &[u8]) -> Result<String, String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(err) => Err(format!("invalid UTF-8 at byte {}", err.valid_up_to())),
    }
}

pub fn decode_record(record: &csv::ByteRecord) -> Result<Vec<String>, String> {
    record.iter().map(decode_cell).collect()
}
