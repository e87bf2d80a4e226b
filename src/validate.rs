//! Mapping specification validation.
//!
//! `validate` reconciles the three independently-evolving contracts (the
//! file's actual columns, the possibly machine-generated spec, and the
//! target schema) and accumulates every violation into one report instead
//! of stopping at the first. A spec that fails validation can never reach
//! the transformation engine: the only way to obtain a [`ValidatedSpec`] is
//! through this function, and it runs exactly once per batch.

use std::collections::HashMap;

use log::debug;
use regex::Regex;

use crate::{
    analyze::ColumnSet,
    error::{SpecViolation, ValidationReport},
    mapping::{CaptureGroup, MappingRule, MappingSpec},
    registry::TargetSchema,
};

/// A spec proven to legally apply to one (columns, schema) pair, with its
/// regex patterns compiled and the unmapped-column set precomputed.
#[derive(Debug)]
pub struct ValidatedSpec<'a> {
    pub(crate) spec: &'a MappingSpec,
    pub(crate) schema: &'a TargetSchema,
    pub(crate) columns: &'a ColumnSet,
    /// Compiled `regex_extract` patterns keyed by target field name.
    pub(crate) patterns: HashMap<String, Regex>,
    /// Column indices no rule consumes, in file order, for passthrough.
    pub(crate) unmapped: Vec<usize>,
}

impl ValidatedSpec<'_> {
    pub fn spec(&self) -> &MappingSpec {
        self.spec
    }
}

/// Validates `spec` against the file's columns and the target schema.
///
/// Violations accumulate in check order: unknown target fields, missing
/// required fields, dangling column references, invalid regex patterns,
/// then passthrough consistency. The result is deterministic for identical
/// inputs.
pub fn validate<'a>(
    spec: &'a MappingSpec,
    columns: &'a ColumnSet,
    schema: &'a TargetSchema,
) -> Result<ValidatedSpec<'a>, ValidationReport> {
    let mut report = ValidationReport::default();

    for field in spec.fields.keys() {
        if schema.field(field).is_none() {
            report.push(SpecViolation::UnknownTargetField {
                field: field.clone(),
                target: schema.target_id.clone(),
            });
        }
    }

    for field in schema.required_fields() {
        match spec.rule(&field.name) {
            None => report.push(SpecViolation::MissingRequiredField {
                field: field.name.clone(),
            }),
            // Passthrough resolves to absent whenever nothing is left
            // over, so it cannot guarantee a required field.
            Some(MappingRule::PassthroughUnmapped) => {
                report.push(SpecViolation::InvalidPassthrough {
                    field: field.name.clone(),
                    message: "a passthrough rule cannot satisfy a required field".to_string(),
                });
            }
            Some(_) => {}
        }
    }

    for (field, rule) in &spec.fields {
        for column in rule.referenced_columns() {
            if !columns.contains(column) {
                report.push(SpecViolation::DanglingColumnReference {
                    field: field.clone(),
                    column: column.to_string(),
                });
            }
        }
    }

    let mut patterns = HashMap::new();
    for (field, rule) in &spec.fields {
        let MappingRule::RegexExtract { pattern, group, .. } = rule else {
            continue;
        };
        match Regex::new(pattern) {
            Ok(regex) => {
                if let Some(message) = check_capture_group(&regex, group) {
                    report.push(SpecViolation::InvalidPattern {
                        field: field.clone(),
                        pattern: pattern.clone(),
                        message,
                    });
                } else {
                    patterns.insert(field.clone(), regex);
                }
            }
            Err(err) => report.push(SpecViolation::InvalidPattern {
                field: field.clone(),
                pattern: pattern.clone(),
                message: err.to_string(),
            }),
        }
    }

    check_passthrough(spec, &mut report);

    if !report.is_empty() {
        debug!("Spec validation failed: {}", report.violations.len());
        return Err(report);
    }

    let unmapped = unmapped_columns(spec, columns);
    debug!(
        "Spec validated: {} field rule(s), {} unmapped column(s)",
        spec.fields.len(),
        unmapped.len()
    );
    Ok(ValidatedSpec {
        spec,
        schema,
        columns,
        patterns,
        unmapped,
    })
}

fn check_capture_group(regex: &Regex, group: &CaptureGroup) -> Option<String> {
    match group {
        CaptureGroup::Index(idx) => {
            if *idx >= regex.captures_len() {
                Some(format!(
                    "capture group {idx} is out of range (pattern has {} group(s))",
                    regex.captures_len() - 1
                ))
            } else {
                None
            }
        }
        CaptureGroup::Name(name) => {
            if regex.capture_names().flatten().any(|n| n == name) {
                None
            } else {
                Some(format!("pattern has no capture group named '{name}'"))
            }
        }
    }
}

fn check_passthrough(spec: &MappingSpec, report: &mut ValidationReport) {
    let passthrough_fields: Vec<&String> = spec
        .fields
        .iter()
        .filter(|(_, rule)| matches!(rule, MappingRule::PassthroughUnmapped))
        .map(|(field, _)| field)
        .collect();

    match passthrough_fields.as_slice() {
        [] => {}
        [field] => match &spec.free_text_field {
            None => report.push(SpecViolation::InvalidPassthrough {
                field: (*field).clone(),
                message: "no free_text_field is designated".to_string(),
            }),
            Some(designated) if designated != *field => {
                report.push(SpecViolation::InvalidPassthrough {
                    field: (*field).clone(),
                    message: format!(
                        "designated free_text_field is '{designated}', not this field"
                    ),
                });
            }
            Some(_) => {}
        },
        multiple => {
            for field in multiple {
                report.push(SpecViolation::InvalidPassthrough {
                    field: (*field).clone(),
                    message: "only one passthrough_unmapped rule is allowed".to_string(),
                });
            }
        }
    }
}

/// Columns not consumed by any structured rule, in file order.
fn unmapped_columns(spec: &MappingSpec, columns: &ColumnSet) -> Vec<usize> {
    let mut consumed = vec![false; columns.len()];
    for rule in spec.fields.values() {
        for column in rule.referenced_columns() {
            if let Some(idx) = columns.index_of(column) {
                consumed[idx] = true;
            }
        }
    }
    consumed
        .iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(idx, _)| idx)
        .collect()
}
