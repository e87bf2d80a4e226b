//! Declarative mapping specification: how source columns become target
//! fields.
//!
//! Rules are a closed, tagged-variant set rather than free-form
//! transformation code. That bounds the failure surface: everything a rule
//! can do is statically known, so validation can be exhaustive and no
//! untrusted generated logic ever executes. A spec is produced once per
//! batch (by a human or a machine generator) and is immutable during the
//! run; this module only models and loads it.

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::registry::is_yaml;

/// A resolved field value. Absence is modeled by omission, never by a
/// variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Which capture of a `regex_extract` pattern supplies the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureGroup {
    Index(usize),
    Name(String),
}

impl Default for CaptureGroup {
    fn default() -> Self {
        CaptureGroup::Index(1)
    }
}

impl fmt::Display for CaptureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureGroup::Index(idx) => write!(f, "{idx}"),
            CaptureGroup::Name(name) => write!(f, "'{name}'"),
        }
    }
}

fn default_concat_separator() -> String {
    " ".to_string()
}

/// One way of producing a target field from a source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingRule {
    /// Value copied verbatim from one column.
    Direct { column: String },

    /// First match of `pattern` against the column text; the selected
    /// capture group is the value. No match yields absent.
    RegexExtract {
        column: String,
        pattern: String,
        #[serde(default)]
        group: CaptureGroup,
    },

    /// Columns joined in order; absent sources are skipped, never fatal.
    Concat {
        columns: Vec<String>,
        #[serde(default = "default_concat_separator")]
        separator: String,
    },

    /// Fixed literal, ignores the row entirely.
    Constant { value: FieldValue },

    /// Folds every column no other rule consumes into the designated
    /// free-text field.
    PassthroughUnmapped,
}

impl MappingRule {
    /// Source columns this rule reads. `passthrough_unmapped` reads the
    /// complement of everything else and so references none directly.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            MappingRule::Direct { column } => vec![column.as_str()],
            MappingRule::RegexExtract { column, .. } => vec![column.as_str()],
            MappingRule::Concat { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            MappingRule::Constant { .. } | MappingRule::PassthroughUnmapped => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MappingRule::Direct { .. } => "direct",
            MappingRule::RegexExtract { .. } => "regex_extract",
            MappingRule::Concat { .. } => "concat",
            MappingRule::Constant { .. } => "constant",
            MappingRule::PassthroughUnmapped => "passthrough_unmapped",
        }
    }
}

/// Mapping from target field name to exactly one rule, plus the optional
/// designated free-text field for `passthrough_unmapped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub fields: BTreeMap<String, MappingRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_field: Option<String>,
}

impl MappingSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening mapping spec {path:?}"))?;
        let reader = BufReader::new(file);
        let spec: MappingSpec = if is_yaml(path) {
            serde_yaml::from_reader(reader)
                .with_context(|| format!("Parsing mapping spec YAML {path:?}"))?
        } else {
            serde_json::from_reader(reader)
                .with_context(|| format!("Parsing mapping spec JSON {path:?}"))?
        };
        Ok(spec)
    }

    pub fn rule(&self, field: &str) -> Option<&MappingRule> {
        self.fields.get(field)
    }
}
