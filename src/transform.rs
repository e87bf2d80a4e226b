//! Row transformation: applying a validated spec to one row.
//!
//! [`ValidatedSpec::apply`] is a pure function of (spec, row): no shared
//! mutable state between rows, so any row can be retried or reprocessed
//! independently. Failure is per-row: a bad row yields a
//! [`RowMappingError`], never an abort of the batch.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    analyze::Row,
    error::RowMappingError,
    mapping::{CaptureGroup, FieldValue, MappingRule},
    registry::FieldType,
    validate::ValidatedSpec,
};

/// Separator used when folding unmapped columns into the free-text field.
const PASSTHROUGH_SEPARATOR: &str = "; ";

/// One schema-conformant record, tagged with the originating row index for
/// traceability. Absent optional fields are omitted from `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRecord {
    pub row_index: usize,
    pub values: BTreeMap<String, FieldValue>,
}

impl MappedRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}

impl ValidatedSpec<'_> {
    /// Resolves every target field for `row` and verifies the required-field
    /// contract.
    ///
    /// Evaluation is deterministic: fields resolve in name order, and after
    /// all rules run a final pass re-checks that no required field is
    /// absent. A row failing that check is dropped and reported, never
    /// emitted under-filled.
    pub fn apply(&self, row: &Row) -> Result<MappedRecord, RowMappingError> {
        let mut values = BTreeMap::new();
        for (field, rule) in &self.spec.fields {
            let Some(resolved) = self.resolve(field, rule, row) else {
                continue;
            };
            // Post-validation every mapped field exists in the schema.
            let Some(schema_field) = self.schema.field(field) else {
                continue;
            };
            match coerce(resolved, schema_field.field_type) {
                Ok(Some(value)) => {
                    values.insert(field.clone(), value);
                }
                Ok(None) => {}
                Err(reason) => {
                    return Err(RowMappingError::for_field(row.index, field, reason));
                }
            }
        }

        for field in self.schema.required_fields() {
            if !values.contains_key(&field.name) {
                return Err(RowMappingError::for_field(
                    row.index,
                    &field.name,
                    "required field unresolved",
                ));
            }
        }

        Ok(MappedRecord {
            row_index: row.index,
            values,
        })
    }

    fn resolve(&self, field: &str, rule: &MappingRule, row: &Row) -> Option<FieldValue> {
        match rule {
            MappingRule::Direct { column } => row
                .value(self.columns, column)
                .map(|text| FieldValue::Text(text.to_string())),

            MappingRule::RegexExtract { column, group, .. } => {
                let text = row.value(self.columns, column)?;
                // Compiled at validation time; a missing entry cannot occur
                // for a ValidatedSpec.
                let regex = self.patterns.get(field)?;
                let captures = regex.captures(text)?;
                let matched = match group {
                    CaptureGroup::Index(idx) => captures.get(*idx),
                    CaptureGroup::Name(name) => captures.name(name),
                }?;
                Some(FieldValue::Text(matched.as_str().to_string()))
            }

            MappingRule::Concat { columns, separator } => {
                // Empty cells join like absent ones: skipped, so no
                // separator residue either way.
                let parts: Vec<&str> = columns
                    .iter()
                    .filter_map(|column| row.value(self.columns, column))
                    .filter(|text| !text.is_empty())
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(parts.iter().join(separator)))
                }
            }

            MappingRule::Constant { value } => Some(value.clone()),

            MappingRule::PassthroughUnmapped => {
                let folded = self
                    .unmapped
                    .iter()
                    .filter_map(|&idx| {
                        let cell = row.cell(idx)?;
                        if cell.is_empty() {
                            return None;
                        }
                        Some(format!("{}: {}", self.columns.names()[idx], cell))
                    })
                    .join(PASSTHROUGH_SEPARATOR);
                if folded.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(folded))
                }
            }
        }
    }
}

/// Coerces a resolved value to the schema field type.
///
/// Empty text coerces to absent for numbers and booleans (there is nothing
/// to parse); for strings it stays an explicit empty value. A value that
/// cannot be coerced is a row-level failure, not a silent drop.
fn coerce(value: FieldValue, ty: FieldType) -> Result<Option<FieldValue>, String> {
    match ty {
        FieldType::String => Ok(Some(FieldValue::Text(value.to_string()))),
        FieldType::Number => match value {
            FieldValue::Number(_) => Ok(Some(value)),
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map(|n| Some(FieldValue::Number(n)))
                    .map_err(|_| format!("cannot parse '{text}' as a number"))
            }
            FieldValue::Boolean(b) => Err(format!("cannot use boolean '{b}' as a number")),
        },
        FieldType::Boolean => match value {
            FieldValue::Boolean(_) => Ok(Some(value)),
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                match trimmed.to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Ok(Some(FieldValue::Boolean(true))),
                    "false" | "f" | "no" | "n" | "0" => Ok(Some(FieldValue::Boolean(false))),
                    _ => Err(format!("cannot parse '{text}' as a boolean")),
                }
            }
            FieldValue::Number(n) if n == 1.0 => Ok(Some(FieldValue::Boolean(true))),
            FieldValue::Number(n) if n == 0.0 => Ok(Some(FieldValue::Boolean(false))),
            FieldValue::Number(n) => Err(format!("cannot use number '{n}' as a boolean")),
        },
    }
}
