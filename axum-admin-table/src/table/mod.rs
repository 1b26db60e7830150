//! Tables
//!
//! A [`Table`] is the unit the admin routes work on: list and detail reads,
//! form reads, and create/update/delete. [`DefaultTable`] implements it on
//! top of a [`Connection`] or an external data source.

mod default;
mod mutation;

pub use default::DefaultTable;

use crate::config::PrimaryKey;
use crate::form::Values;
use crate::panel::{FormPanel, InfoPanel};
use crate::parameter::Parameters;
use crate::registry::Services;
use crate::schema::{FormInfo, PanelInfo, TableFlags};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Admin table contract
#[async_trait]
pub trait Table: Send + Sync {
    fn info(&self) -> &InfoPanel;
    fn form(&self) -> &FormPanel;

    /// Detail panel; falls back to the info panel when it declares no fields
    fn detail(&self) -> &InfoPanel;

    fn primary_key(&self) -> &PrimaryKey;
    fn flags(&self) -> TableFlags;

    /// One page of the list view, or every row when the "all" flag is set
    async fn get_data(&self, params: &Parameters) -> Result<PanelInfo>;

    /// Rows restricted to the selected primary keys
    async fn get_data_with_ids(&self, params: &Parameters) -> Result<PanelInfo>;

    /// Detail view of the selected primary keys
    async fn get_detail_data(&self, params: &Parameters) -> Result<PanelInfo>;

    /// Edit form filled with the stored row
    async fn get_data_with_id(&self, params: &Parameters) -> Result<FormInfo>;

    async fn update_data(&self, values: Values) -> Result<()>;

    /// Insert a row and return its primary key when known
    async fn insert_data(&self, values: Values) -> Result<Option<String>>;

    /// Delete the rows of a comma separated id list
    async fn delete_data(&self, ids: &str) -> Result<()>;

    /// Create form with default values
    fn new_form(&self) -> FormInfo;

    /// Independent instance, for per-request customization
    fn copy(&self) -> Box<dyn Table>;
}

/// Builds a table from the shared services
pub type Generator = Arc<dyn Fn(&Services) -> Result<Box<dyn Table>> + Send + Sync>;

/// Table generators by table key
#[derive(Clone, Default)]
pub struct GeneratorList {
    generators: BTreeMap<String, Generator>,
}

impl fmt::Debug for GeneratorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.generators.keys()).finish()
    }
}

impl GeneratorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator, replacing an existing one with the same key
    pub fn add(&mut self, key: impl Into<String>, generator: Generator) -> &mut Self {
        self.generators.insert(key.into(), generator);
        self
    }

    /// Merge `other` in; existing keys are kept
    pub fn combine(&mut self, other: GeneratorList) -> &mut Self {
        for (key, generator) in other.generators {
            self.generators.entry(key).or_insert(generator);
        }
        self
    }

    pub fn combine_all(&mut self, others: impl IntoIterator<Item = GeneratorList>) -> &mut Self {
        for other in others {
            self.combine(other);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Generator> {
        self.generators.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}
