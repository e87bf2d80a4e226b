//! Target schemas and their resolution.
//!
//! A [`TargetSchema`] is the field contract of the downstream tool a mapped
//! record must satisfy. Schemas are owned by an external registry; this
//! module only fetches them. The registry is an injected [`SchemaSource`]
//! rather than an ambient lookup, so a run's behavior is fully determined by
//! its explicit inputs and tests can supply a fake source.

use std::{cell::RefCell, collections::BTreeMap, fs::File, io::BufReader, path::Path, rc::Rc};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ordered field contract for one destination tool. Read-only for the
/// duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSchema {
    /// Filled in from the registry key when the document omits it.
    #[serde(default)]
    pub target_id: String,
    pub fields: Vec<SchemaField>,
}

impl TargetSchema {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// External provider of target schemas.
///
/// `fetch` returns `Ok(None)` when nothing is registered under `target_id`;
/// turning that into a fatal error is the resolver's job.
pub trait SchemaSource {
    fn fetch(&self, target_id: &str) -> Result<Option<TargetSchema>>;
}

/// File-backed registry: a JSON or YAML document mapping target identifiers
/// to schemas. The extension selects the parser (`.yml`/`.yaml` vs JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRegistry {
    pub targets: BTreeMap<String, TargetSchema>,
}

impl FileRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening registry file {path:?}"))?;
        let reader = BufReader::new(file);
        let registry: FileRegistry = if is_yaml(path) {
            serde_yaml::from_reader(reader)
                .with_context(|| format!("Parsing registry YAML {path:?}"))?
        } else {
            serde_json::from_reader(reader)
                .with_context(|| format!("Parsing registry JSON {path:?}"))?
        };
        Ok(registry)
    }
}

impl SchemaSource for FileRegistry {
    fn fetch(&self, target_id: &str) -> Result<Option<TargetSchema>> {
        Ok(self.targets.get(target_id).map(|schema| TargetSchema {
            target_id: target_id.to_string(),
            ..schema.clone()
        }))
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml")
    )
}

/// Per-run schema resolver with a private cache.
///
/// The cache lives exactly as long as the resolver, which is created per
/// batch run: staleness cannot leak across independent invocations.
pub struct SchemaResolver<'a> {
    source: &'a dyn SchemaSource,
    cache: RefCell<BTreeMap<String, Rc<TargetSchema>>>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(source: &'a dyn SchemaSource) -> Self {
        Self {
            source,
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Resolves `target_id`, consulting the source at most once per id.
    pub fn resolve(&self, target_id: &str) -> Result<Rc<TargetSchema>> {
        if let Some(schema) = self.cache.borrow().get(target_id) {
            return Ok(Rc::clone(schema));
        }
        let fetched = self
            .source
            .fetch(target_id)
            .with_context(|| format!("Fetching schema for target '{target_id}'"))?
            .ok_or_else(|| BatchError::SchemaNotFound {
                target: target_id.to_string(),
            })?;
        let schema = Rc::new(fetched);
        self.cache
            .borrow_mut()
            .insert(target_id.to_string(), Rc::clone(&schema));
        Ok(schema)
    }
}
