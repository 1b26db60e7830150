//! Field metadata
//!
//! A [`Field`] describes one column of a panel: how it is labelled, where its
//! value comes from (own column or a joined table) and which transforms run
//! when it is displayed, filtered or submitted.

use crate::database::Row;
use crate::parameter::FilterOperator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Separator between join table and field in namespaced names
pub const JOIN_SEPARATOR: char = '.';

/// Storage type of a field, used to turn raw values into display strings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Int,
    Float,
    Decimal,
    Bool,
    #[default]
    Varchar,
    Text,
    Date,
    Datetime,
    Json,
}

impl DatabaseType {
    /// Render a raw value as text according to this type
    pub fn coerce(self, value: Option<&Value>) -> String {
        let Some(value) = value else {
            return String::new();
        };
        match value {
            Value::Null => String::new(),
            Value::String(text) => match self {
                DatabaseType::Datetime => normalize_datetime(text),
                _ => text.clone(),
            },
            Value::Number(number) => match self {
                DatabaseType::Int | DatabaseType::Bool => number
                    .as_i64()
                    .map(|integer| integer.to_string())
                    .or_else(|| number.as_f64().map(|float| (float.trunc() as i64).to_string()))
                    .unwrap_or_else(|| number.to_string()),
                _ => number.to_string(),
            },
            Value::Bool(flag) => match self {
                DatabaseType::Int | DatabaseType::Bool => u8::from(*flag).to_string(),
                _ => flag.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// `2024-01-02T03:04:05Z` style timestamps are shown as `2024-01-02 03:04:05`
fn normalize_datetime(text: &str) -> String {
    match (text.get(..10), text.get(10..11), text.get(11..19)) {
        (Some(date), Some("T"), Some(time)) => format!("{} {}", date, time),
        _ => text.to_string(),
    }
}

/// Markup that is passed to the renderer as-is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Markup(String);

impl Markup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a display transform: plain text or pre-built markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    Text(String),
    Markup(Markup),
}

impl Display {
    /// Normalize into the single content representation handed to renderers
    pub fn into_markup(self) -> Markup {
        match self {
            Display::Text(text) => Markup(text),
            Display::Markup(markup) => markup,
        }
    }
}

impl From<String> for Display {
    fn from(text: String) -> Self {
        Display::Text(text)
    }
}

impl From<&str> for Display {
    fn from(text: &str) -> Self {
        Display::Text(text.to_string())
    }
}

impl From<Markup> for Display {
    fn from(markup: Markup) -> Self {
        Display::Markup(markup)
    }
}

/// Input of a display transform
#[derive(Debug, Clone, Copy)]
pub struct FieldModel<'a> {
    /// Primary key value of the row
    pub id: &'a str,
    /// The field value as text
    pub value: &'a str,
    /// The whole raw row
    pub row: &'a Row,
}

/// Input of a post filter, run on submitted values before they are persisted
#[derive(Debug, Clone)]
pub struct PostFieldModel {
    /// Primary key value of the submitted record (empty on create)
    pub id: String,
    /// Non-blank submitted values
    pub values: Vec<String>,
}

pub type DisplayFn = Arc<dyn Fn(FieldModel<'_>) -> Display + Send + Sync>;
pub type FilterProcessFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type PostFilterFn = Arc<dyn Fn(PostFieldModel) -> Value + Send + Sync>;

/// Relation to another table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Joined table
    pub table: String,
    /// Column of the panel table holding the reference
    pub field: String,
    /// Column of the joined table the reference points at
    pub join_field: String,
}

impl Join {
    pub fn new(table: impl Into<String>, field: impl Into<String>, join_field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            join_field: join_field.into(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.table.is_empty() && !self.field.is_empty() && !self.join_field.is_empty()
    }
}

/// Form widget of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    #[default]
    Default,
    Text,
    SelectSingle,
    Select,
    SelectBox,
    Radio,
    Switch,
    Password,
    RichText,
    TextArea,
    Datetime,
    DatetimeRange,
    Number,
    NumberRange,
    Email,
    Url,
    Ip,
    Color,
    Currency,
    File,
    Custom,
}

impl FormType {
    /// Widgets submitting several values under `field[]`
    pub fn is_multi_select(self) -> bool {
        matches!(self, FormType::Select | FormType::SelectBox)
    }
}

/// Metadata of one panel column
#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub head: String,
    pub type_name: DatabaseType,
    pub join: Option<Join>,
    pub hide: bool,
    pub sortable: bool,
    pub filterable: bool,
    pub filter_operator: FilterOperator,
    pub form_type: FormType,
    pub default: String,
    pub default_option_delimiter: Option<String>,
    pub not_allow_add: bool,
    pub not_allow_edit: bool,
    display: Option<DisplayFn>,
    filter_process: Option<FilterProcessFn>,
    post_filter: Option<PostFilterFn>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("head", &self.head)
            .field("type_name", &self.type_name)
            .field("join", &self.join)
            .field("hide", &self.hide)
            .finish_non_exhaustive()
    }
}

impl Field {
    pub fn new(name: impl Into<String>, head: impl Into<String>, type_name: DatabaseType) -> Self {
        Self {
            name: name.into(),
            head: head.into(),
            type_name,
            join: None,
            hide: false,
            sortable: false,
            filterable: false,
            filter_operator: FilterOperator::Eq,
            form_type: FormType::Default,
            default: String::new(),
            default_option_delimiter: None,
            not_allow_add: false,
            not_allow_edit: false,
            display: None,
            filter_process: None,
            post_filter: None,
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = Some(join);
        self
    }

    pub fn hide(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Filterable with the given default operator
    pub fn filter_operator(mut self, operator: FilterOperator) -> Self {
        self.filterable = true;
        self.filter_operator = operator;
        self
    }

    pub fn form_type(mut self, form_type: FormType) -> Self {
        self.form_type = form_type;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    pub fn option_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.default_option_delimiter = Some(delimiter.into());
        self
    }

    pub fn not_allow_add(mut self) -> Self {
        self.not_allow_add = true;
        self
    }

    pub fn not_allow_edit(mut self) -> Self {
        self.not_allow_edit = true;
        self
    }

    pub fn display<F, D>(mut self, display: F) -> Self
    where
        F: Fn(FieldModel<'_>) -> D + Send + Sync + 'static,
        D: Into<Display>,
    {
        self.display = Some(Arc::new(move |model: FieldModel<'_>| -> Display { display(model).into() }));
        self
    }

    pub fn filter_process<F>(mut self, process: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.filter_process = Some(Arc::new(process));
        self
    }

    pub fn post_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(PostFieldModel) -> Value + Send + Sync + 'static,
    {
        self.post_filter = Some(Arc::new(filter));
        self
    }

    pub fn valid_join(&self) -> Option<&Join> {
        self.join.as_ref().filter(|join| join.is_valid())
    }

    /// Name used in SQL aliases and row keys: `table.field` for joined fields
    pub fn head_field(&self) -> String {
        match self.valid_join() {
            Some(join) => format!("{}{}{}", join.table, JOIN_SEPARATOR, self.name),
            None => self.name.clone(),
        }
    }

    /// Run the display transform, defaulting to the value itself
    pub fn to_display(&self, model: FieldModel<'_>) -> Display {
        match &self.display {
            Some(display) => display(model),
            None => Display::Text(model.value.to_string()),
        }
    }

    /// Apply the filter-process transform to a request filter value
    pub fn process_filter(&self, value: &str) -> String {
        match &self.filter_process {
            Some(process) => process(value),
            None => value.to_string(),
        }
    }

    pub fn post_filter_fn(&self) -> Option<&PostFilterFn> {
        self.post_filter.as_ref()
    }

    pub fn delimiter(&self) -> &str {
        self.default_option_delimiter
            .as_deref()
            .filter(|delimiter| !delimiter.is_empty())
            .unwrap_or(",")
    }
}
