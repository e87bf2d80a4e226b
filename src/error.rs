//! Error taxonomy for the mapping engine.
//!
//! Two tiers:
//!
//! - **Fatal** errors ([`StructuralError`], [`BatchError`]) are raised before
//!   any row is processed and abort the run entirely.
//! - **Row-level** errors ([`RowMappingError`]) skip one record, are captured
//!   in the [`BatchResult`](crate::runner::BatchResult), and never cross the
//!   runner boundary as an `Err`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// File-level defects that invalidate the whole batch before iteration begins.
#[derive(Debug, Error)]
pub enum StructuralError {
    /// The input contained no header row at all.
    #[error("input is empty: no header row found")]
    EmptyInput,

    /// The header row could not be decoded as text.
    #[error("header row is not valid text: {0}")]
    HeaderDecode(String),

    /// Two header names collide after normalization, making column
    /// references ambiguous.
    #[error("duplicate column name '{name}' (positions {first} and {second})")]
    DuplicateColumn {
        name: String,
        first: usize,
        second: usize,
    },

    /// The underlying CSV parser rejected the header region of the file.
    #[error("malformed input: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A single defect found while validating a mapping specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecViolation {
    /// The spec maps a field the target schema does not define.
    #[error("target field '{field}' does not exist in schema '{target}'")]
    UnknownTargetField { field: String, target: String },

    /// A required schema field has no rule in the spec.
    #[error("required field '{field}' has no mapping rule")]
    MissingRequiredField { field: String },

    /// A rule references a source column absent from the file.
    #[error("rule for '{field}' references column '{column}' which is not in the input")]
    DanglingColumnReference { field: String, column: String },

    /// A `regex_extract` pattern failed to compile.
    #[error("rule for '{field}' has an invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },

    /// `passthrough_unmapped` is used without a usable free-text destination.
    #[error("passthrough rule for '{field}' is unusable: {message}")]
    InvalidPassthrough { field: String, message: String },
}

/// Every violation found in one validation pass, in check order.
///
/// Validation never stops at the first defect; a single report covers the
/// entire spec so a generator can fix everything in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<SpecViolation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn push(&mut self, violation: SpecViolation) {
        self.violations.push(violation);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Fatal, pre-run errors. Nothing partially-run is ever reported as success:
/// when one of these is raised, zero rows have been processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// No schema is registered for the requested target identifier.
    #[error("no schema registered for target '{target}'")]
    SchemaNotFound { target: String },

    /// The mapping specification cannot legally apply to this file+schema
    /// pair.
    #[error("mapping specification is invalid: {0}")]
    InvalidSpec(ValidationReport),
}

/// A single row that could not be resolved into a valid record.
///
/// Recoverable by design: the runner records it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("row {row_index}: {reason}")]
pub struct RowMappingError {
    /// 0-based index of the data row within the source file.
    pub row_index: usize,
    /// Target field the failure is attributed to, when one is identifiable.
    pub field: Option<String>,
    pub reason: String,
}

impl RowMappingError {
    pub fn new(row_index: usize, reason: impl Into<String>) -> Self {
        Self {
            row_index,
            field: None,
            reason: reason.into(),
        }
    }

    pub fn for_field(row_index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row_index,
            field: Some(field.into()),
            reason: reason.into(),
        }
    }
}
