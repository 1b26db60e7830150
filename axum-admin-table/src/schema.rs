//! Result types handed to renderers
//!
//! These are what the table engine produces for list pages ([`PanelInfo`]) and
//! forms ([`FormInfo`]); the HTTP layer serializes them as JSON.

use crate::field::{FormType, Markup};
use crate::parameter::FilterOperator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::config::PrimaryKey;

/// One materialized cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoItem {
    /// Display content (text or markup)
    pub content: Markup,

    /// Raw value as text
    pub value: String,
}

impl InfoItem {
    pub fn new(content: Markup, value: impl Into<String>) -> Self {
        Self {
            content,
            value: value.into(),
        }
    }
}

/// One materialized row keyed by (namespaced) field name
pub type InfoRow = BTreeMap<String, InfoItem>;

/// Column header of a list page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheadItem {
    /// Header label
    pub head: String,

    /// Namespaced field name
    pub field: String,

    pub sortable: bool,

    /// Hidden through the column allow-list
    pub hide: bool,
}

/// Filter form input of a list page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterField {
    pub head: String,
    pub field: String,
    pub operator: FilterOperator,
    pub form_type: FormType,

    /// Value currently filtered on
    pub value: String,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginator {
    /// Total rows matching the filters
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
    pub page_size_list: Vec<usize>,

    /// Time spent querying, in milliseconds
    pub query_time_ms: f64,
}

impl Paginator {
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64)
    }
}

/// Everything a list page needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelInfo {
    pub thead: Vec<TheadItem>,
    pub rows: Vec<InfoRow>,
    pub filter_form: Vec<FilterField>,

    /// Absent for full (unpaginated) reads
    pub paginator: Option<Paginator>,

    pub title: String,
    pub description: String,
}

/// One form input with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldValue {
    pub field: String,
    pub head: String,
    pub form_type: FormType,

    /// Value as text (multi-values joined by the field delimiter)
    pub value: String,

    /// Value split into options, for multi-selects
    pub values: Vec<String>,

    pub editable: bool,
    pub hide: bool,
}

/// Everything a form needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    pub fields: Vec<FormFieldValue>,

    /// Fields per tab, parallel to `group_headers`
    pub group_fields: Vec<Vec<FormFieldValue>>,
    pub group_headers: Vec<String>,

    pub title: String,
    pub description: String,
}

impl FormInfo {
    /// Look up a field in the flat list or in the tab groups
    pub fn field(&self, name: &str) -> Option<&FormFieldValue> {
        self.fields
            .iter()
            .chain(self.group_fields.iter().flatten())
            .find(|field| field.field == name)
    }
}

/// Capability flags of a table as shown to renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFlags {
    pub can_add: bool,
    pub editable: bool,
    pub deletable: bool,
    pub exportable: bool,
    pub detail: bool,
}
