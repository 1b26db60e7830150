//! Panels
//!
//! An [`InfoPanel`] declares a list (or detail) view, a [`FormPanel`] the
//! create/edit form. Both carry the fields plus the user supplied hooks that
//! the table engine calls around reads and writes.

use crate::database::{Columns, Row};
use crate::field::{Field, FieldModel};
use crate::form::Values;
use crate::parameter::{FilterOperator, Parameters, SortType};
use crate::schema::{FilterField, FormFieldValue, TheadItem};
use crate::source::GetDataFn;
use crate::HookError;
use axum::routing::MethodRouter;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ValidatorFn = Arc<dyn Fn(&Values) -> Result<(), HookError> + Send + Sync>;
pub type PreProcessFn = Arc<dyn Fn(Values) -> Values + Send + Sync>;
pub type ValuesFn = Arc<dyn Fn(Values) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;
pub type IdsFn = Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

pub const DEFAULT_PAGE_SIZE_LIST: [usize; 5] = [10, 20, 30, 50, 100];

fn boxed_values_fn<F, Fut>(function: F) -> ValuesFn
where
    F: Fn(Values) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(move |values| -> BoxFuture<'static, Result<(), HookError>> { Box::pin(function(values)) })
}

fn boxed_ids_fn<F, Fut>(function: F) -> IdsFn
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(move |ids| -> BoxFuture<'static, Result<(), HookError>> { Box::pin(function(ids)) })
}

/// Static condition applied to every list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Where {
    /// Column name, `table.field` for joined columns
    pub field: String,
    pub operator: FilterOperator,
    pub arg: String,
}

/// Raw SQL condition with its own `?` arguments
#[derive(Debug, Clone, PartialEq)]
pub struct WhereRaw {
    pub raw: String,
    pub args: Vec<Value>,
}

/// Extra route registered alongside the table routes
#[derive(Clone)]
pub struct Callback {
    /// Path relative to the admin prefix
    pub path: String,
    pub handler: MethodRouter,
    pub need_auth: bool,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("path", &self.path)
            .field("need_auth", &self.need_auth)
            .finish_non_exhaustive()
    }
}

/// Tab layout of a panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabGroups {
    pub groups: Vec<Vec<String>>,
    pub headers: Vec<String>,
}

impl TabGroups {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// List (or detail) view declaration
#[derive(Clone)]
pub struct InfoPanel {
    pub table: String,
    pub title: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub wheres: Vec<Where>,
    pub where_raws: Vec<WhereRaw>,
    pub page_size: usize,
    pub page_size_list: Vec<usize>,
    pub sort_field: String,
    pub sort_type: SortType,
    pub hide_new_button: bool,
    pub hide_edit_button: bool,
    pub hide_delete_button: bool,
    pub hide_export_button: bool,
    pub hide_detail_button: bool,
    pub get_data_fn: Option<GetDataFn>,
    pub delete_fn: Option<IdsFn>,
    pub pre_delete_fn: Option<IdsFn>,
    pub delete_hook: Option<IdsFn>,
    pub callbacks: Vec<Callback>,
}

impl fmt::Debug for InfoPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfoPanel")
            .field("table", &self.table)
            .field("title", &self.title)
            .field("fields", &self.fields)
            .field("wheres", &self.wheres)
            .field("where_raws", &self.where_raws)
            .field("sort_field", &self.sort_field)
            .finish_non_exhaustive()
    }
}

impl InfoPanel {
    /// New panel sorted by `primary_key` descending
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            table: String::new(),
            title: String::new(),
            description: String::new(),
            fields: Vec::new(),
            wheres: Vec::new(),
            where_raws: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE_LIST[0],
            page_size_list: DEFAULT_PAGE_SIZE_LIST.to_vec(),
            sort_field: primary_key.into(),
            sort_type: SortType::Desc,
            hide_new_button: false,
            hide_edit_button: false,
            hide_delete_button: false,
            hide_export_button: false,
            hide_detail_button: false,
            get_data_fn: None,
            delete_fn: None,
            pre_delete_fn: None,
            delete_hook: None,
            callbacks: Vec::new(),
        }
    }

    pub fn set_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn add_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn add_where(&mut self, field: impl Into<String>, operator: FilterOperator, arg: impl Into<String>) -> &mut Self {
        self.wheres.push(Where {
            field: field.into(),
            operator,
            arg: arg.into(),
        });
        self
    }

    pub fn add_where_raw(&mut self, raw: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.where_raws.push(WhereRaw { raw: raw.into(), args });
        self
    }

    pub fn set_default_page_size(&mut self, page_size: usize) -> &mut Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn set_page_size_list(&mut self, list: Vec<usize>) -> &mut Self {
        self.page_size_list = list;
        self
    }

    pub fn set_sort(&mut self, field: impl Into<String>, sort_type: SortType) -> &mut Self {
        self.sort_field = field.into();
        self.sort_type = sort_type;
        self
    }

    pub fn set_get_data_fn(&mut self, get_data: GetDataFn) -> &mut Self {
        self.get_data_fn = Some(get_data);
        self
    }

    pub fn set_delete_fn<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.delete_fn = Some(boxed_ids_fn(function));
        self
    }

    pub fn set_pre_delete_fn<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.pre_delete_fn = Some(boxed_ids_fn(function));
        self
    }

    pub fn set_delete_hook<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.delete_hook = Some(boxed_ids_fn(function));
        self
    }

    pub fn add_callback(&mut self, path: impl Into<String>, handler: MethodRouter, need_auth: bool) -> &mut Self {
        self.callbacks.push(Callback {
            path: path.into(),
            handler,
            need_auth,
        });
        self
    }

    /// Request parameters with this panel's defaults
    pub fn parameters<I, K, V>(&self, pairs: I) -> Parameters
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Parameters::from_pairs(pairs, self.page_size, &self.sort_field, self.sort_type)
    }

    pub fn find_field(&self, head_field: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.head_field() == head_field)
    }

    /// Whether `name` is the namespaced name of a declared join field
    pub fn is_join_field(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|field| field.valid_join().is_some() && field.head_field() == name)
    }

    /// Filter value after the owning field's filter-process transform
    pub fn process_filter_value(&self, head_field: &str, value: &str) -> String {
        match self.find_field(head_field) {
            Some(field) => field.process_filter(value),
            None => value.to_string(),
        }
    }

    /// Header row and filter form for the given request
    ///
    /// Without introspected columns every non-hidden field is listed; with
    /// columns, plain fields missing from the table are still shown (they are
    /// rendered from their display transform) but are never filterable.
    pub fn thead_and_filter_form(
        &self,
        params: &Parameters,
        columns: Option<&Columns>,
    ) -> (Vec<TheadItem>, Vec<FilterField>) {
        let mut thead = Vec::new();
        let mut filter_form = Vec::new();

        for field in self.fields.iter().filter(|field| !field.hide) {
            let head_field = field.head_field();
            let physical = field.valid_join().is_some()
                || columns.map_or(true, |columns| columns.contains(&field.name));

            thead.push(TheadItem {
                head: field.head.clone(),
                field: head_field.clone(),
                sortable: field.sortable && physical,
                hide: !params.is_column_visible(&head_field),
            });

            if field.filterable && physical {
                filter_form.push(FilterField {
                    head: field.head.clone(),
                    field: head_field.clone(),
                    operator: field.filter_operator,
                    form_type: field.form_type,
                    value: params.filter_value(&head_field).unwrap_or_default().to_string(),
                });
            }
        }

        (thead, filter_form)
    }
}

/// Create/edit form declaration
#[derive(Clone)]
pub struct FormPanel {
    pub table: String,
    pub title: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub tab_groups: TabGroups,
    pub validator: Option<ValidatorFn>,
    pub pre_process_fn: Option<PreProcessFn>,
    pub insert_fn: Option<ValuesFn>,
    pub update_fn: Option<ValuesFn>,
    pub post_hook: Option<ValuesFn>,
    pub callbacks: Vec<Callback>,
}

impl fmt::Debug for FormPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormPanel")
            .field("table", &self.table)
            .field("title", &self.title)
            .field("fields", &self.fields)
            .field("tab_groups", &self.tab_groups)
            .finish_non_exhaustive()
    }
}

impl Default for FormPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl FormPanel {
    pub fn new() -> Self {
        Self {
            table: String::new(),
            title: String::new(),
            description: String::new(),
            fields: Vec::new(),
            tab_groups: TabGroups::default(),
            validator: None,
            pre_process_fn: None,
            insert_fn: None,
            update_fn: None,
            post_hook: None,
            callbacks: Vec::new(),
        }
    }

    pub fn set_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = title.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn add_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Lay the form out in tabs; `groups` lists field names per tab
    pub fn set_tab_groups(&mut self, headers: Vec<String>, groups: Vec<Vec<String>>) -> &mut Self {
        self.tab_groups = TabGroups { groups, headers };
        self
    }

    pub fn set_validator<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&Values) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn set_pre_process_fn<F>(&mut self, process: F) -> &mut Self
    where
        F: Fn(Values) -> Values + Send + Sync + 'static,
    {
        self.pre_process_fn = Some(Arc::new(process));
        self
    }

    pub fn set_insert_fn<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.insert_fn = Some(boxed_values_fn(function));
        self
    }

    pub fn set_update_fn<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.update_fn = Some(boxed_values_fn(function));
        self
    }

    pub fn set_post_hook<F, Fut>(&mut self, function: F) -> &mut Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.post_hook = Some(boxed_values_fn(function));
        self
    }

    pub fn add_callback(&mut self, path: impl Into<String>, handler: MethodRouter, need_auth: bool) -> &mut Self {
        self.callbacks.push(Callback {
            path: path.into(),
            handler,
            need_auth,
        });
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Form inputs filled from a stored row
    pub fn fields_with_values(&self, id: &str, row: &Row, columns: Option<&Columns>) -> Vec<FormFieldValue> {
        self.fields
            .iter()
            .map(|field| {
                let stored = columns.map_or(true, |columns| columns.contains(&field.name));
                let raw = if stored {
                    field.type_name.coerce(row.get(&field.name))
                } else {
                    field.default.clone()
                };
                let value = field
                    .to_display(FieldModel {
                        id,
                        value: &raw,
                        row,
                    })
                    .into_markup()
                    .to_string();
                form_field_value(field, value, !field.not_allow_edit)
            })
            .collect()
    }

    /// Form inputs with default values, for creating a record
    pub fn fields_with_defaults(&self) -> Vec<FormFieldValue> {
        self.fields
            .iter()
            .filter(|field| !field.not_allow_add)
            .map(|field| form_field_value(field, field.default.clone(), true))
            .collect()
    }

    /// Split a flat input list into the configured tabs
    pub fn group(&self, list: &[FormFieldValue]) -> (Vec<Vec<FormFieldValue>>, Vec<String>) {
        let groups = self
            .tab_groups
            .groups
            .iter()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| list.iter().find(|field| &field.field == name).cloned())
                    .collect()
            })
            .collect();
        (groups, self.tab_groups.headers.clone())
    }
}

fn form_field_value(field: &Field, value: String, editable: bool) -> FormFieldValue {
    let values = if field.form_type.is_multi_select() {
        value
            .split(field.delimiter())
            .filter(|option| !option.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    FormFieldValue {
        field: field.name.clone(),
        head: field.head.clone(),
        form_type: field.form_type,
        value,
        values,
        editable,
        hide: field.hide,
    }
}
