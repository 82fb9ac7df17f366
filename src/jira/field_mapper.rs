//! Display-name <-> field-id mapping for Jira fields
//!
//! The mapper has two states. It starts `Uninitialized`; an explicit
//! [`FieldMapper::populate`] call fetches the field listing once and moves it
//! to `Populated`, after which the catalog is shared read-only. There is no
//! refresh: field definitions changed in Jira are only picked up after a
//! restart.
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::jira::models::JiraField;
use crate::jira::{JiraApi, JiraResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldMapperError {
    #[error("Field mapping has not been populated")]
    NotPopulated,

    #[error("Unknown field: '{0}'")]
    UnknownField(String),

    #[error("Field name '{name}' is ambiguous, matching ids: {}", .ids.join(", "))]
    AmbiguousField { name: String, ids: Vec<String> },
}

enum MapperState {
    Uninitialized,
    Populated(Arc<FieldCatalog>),
}

pub struct FieldMapper {
    state: RwLock<MapperState>,
    /// Serializes population so concurrent first callers trigger one fetch
    populate_lock: Mutex<()>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMapper {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MapperState::Uninitialized),
            populate_lock: Mutex::new(()),
        }
    }

    /// A mapper that starts out populated with the given listing
    pub fn with_fields(fields: Vec<JiraField>) -> Self {
        Self {
            state: RwLock::new(MapperState::Populated(Arc::new(FieldCatalog::new(fields)))),
            populate_lock: Mutex::new(()),
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(*self.state.read(), MapperState::Populated(_))
    }

    /// The catalog if populated. Never triggers a fetch.
    pub fn catalog(&self) -> Option<Arc<FieldCatalog>> {
        match &*self.state.read() {
            MapperState::Populated(catalog) => Some(catalog.clone()),
            MapperState::Uninitialized => None,
        }
    }

    /// Fetch the field listing unless already populated.
    ///
    /// A failed fetch leaves the mapper uninitialized and returns Jira's error
    /// as is; the next call tries again.
    pub async fn populate(&self, jira: &dyn JiraApi) -> JiraResult<Arc<FieldCatalog>> {
        if let Some(catalog) = self.catalog() {
            return Ok(catalog);
        }

        let _guard = self.populate_lock.lock().await;
        if let Some(catalog) = self.catalog() {
            return Ok(catalog);
        }

        debug!("Populating field mapping from Jira");
        let fields = jira.fields().await?;
        let catalog = Arc::new(FieldCatalog::new(fields));
        info!(
            "Field mapping populated: {} fields ({} custom)",
            catalog.len(),
            catalog.custom_count()
        );

        *self.state.write() = MapperState::Populated(catalog.clone());
        Ok(catalog)
    }

    pub fn resolve(&self, display_name: &str) -> Result<String, FieldMapperError> {
        let catalog = self.catalog().ok_or(FieldMapperError::NotPopulated)?;
        catalog.resolve(display_name).map(str::to_string)
    }

    pub fn describe(&self, field_id: &str) -> Result<String, FieldMapperError> {
        let catalog = self.catalog().ok_or(FieldMapperError::NotPopulated)?;
        catalog.describe(field_id).map(str::to_string)
    }
}

/// Immutable snapshot of the instance's field listing
#[derive(Debug)]
pub struct FieldCatalog {
    fields: Vec<JiraField>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<JiraField>) -> Self {
        let mut by_id = HashMap::with_capacity(fields.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::with_capacity(fields.len());

        for (index, field) in fields.iter().enumerate() {
            by_id.insert(field.id.clone(), index);
            by_name.entry(field.name.clone()).or_default().push(index);
        }

        Self {
            fields,
            by_id,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn custom_count(&self) -> usize {
        self.fields.iter().filter(|f| f.custom).count()
    }

    /// Fields in the order Jira listed them
    pub fn fields(&self) -> &[JiraField] {
        &self.fields
    }

    pub fn field(&self, field_id: &str) -> Option<&JiraField> {
        self.by_id.get(field_id).map(|&index| &self.fields[index])
    }

    /// Exact, case-sensitive display name lookup.
    ///
    /// A name shared by several fields is rejected rather than picking one.
    pub fn resolve(&self, display_name: &str) -> Result<&str, FieldMapperError> {
        match self.by_name.get(display_name).map(Vec::as_slice) {
            Some([index]) => Ok(self.fields[*index].id.as_str()),
            Some(indices) if !indices.is_empty() => Err(FieldMapperError::AmbiguousField {
                name: display_name.to_string(),
                ids: indices.iter().map(|&i| self.fields[i].id.clone()).collect(),
            }),
            _ => Err(FieldMapperError::UnknownField(display_name.to_string())),
        }
    }

    pub fn describe(&self, field_id: &str) -> Result<&str, FieldMapperError> {
        self.field(field_id)
            .map(|f| f.name.as_str())
            .ok_or_else(|| FieldMapperError::UnknownField(field_id.to_string()))
    }

    /// Display name for presentation, falling back to the raw id
    pub fn display_name_or_id<'a>(&'a self, field_id: &'a str) -> &'a str {
        self.describe(field_id).unwrap_or(field_id)
    }

    pub fn is_custom(&self, field_id: &str) -> bool {
        self.field(field_id).is_some_and(|f| f.custom)
    }

    /// Rewrite a field map keyed by display names or ids into one keyed by ids.
    ///
    /// Known ids pass through untouched; every other key must resolve exactly.
    pub fn translate_to_ids(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>, FieldMapperError> {
        let mut translated = Map::with_capacity(fields.len());
        for (key, value) in fields {
            let id = if self.by_id.contains_key(key) {
                key.as_str()
            } else {
                self.resolve(key)?
            };
            translated.insert(id.to_string(), value.clone());
        }
        Ok(translated)
    }
}
