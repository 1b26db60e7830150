//! Request parameters
//!
//! Query pairs of a list/detail request are parsed once into [`Parameters`]:
//! pagination, sort, filter predicates, the column allow-list, the selected
//! primary keys and the "all" flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PAGE_KEY: &str = "__page";
pub const PAGE_SIZE_KEY: &str = "__pageSize";
pub const SORT_KEY: &str = "__sort";
pub const SORT_TYPE_KEY: &str = "__sort_type";
pub const COLUMNS_KEY: &str = "__columns";
pub const PK_KEY: &str = "__pk";
pub const IS_ALL_KEY: &str = "__is_all";

pub const OPERATOR_SUFFIX: &str = "__operator__";
pub const START_SUFFIX: &str = "__start__";
pub const END_SUFFIX: &str = "__end__";
pub const MULTI_SUFFIX: &str = "[]";

/// Largest page size a request may ask for; larger values are clamped
pub const MAX_PAGE_SIZE: usize = 1000;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    Asc,
    #[default]
    Desc,
}

impl SortType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortType::Asc => "ASC",
            SortType::Desc => "DESC",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortType::Asc => "asc",
            SortType::Desc => "desc",
        }
    }
}

impl FromStr for SortType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortType::Asc),
            "desc" => Ok(SortType::Desc),
            _ => Err(()),
        }
    }
}

/// Comparison applied by a filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl FilterOperator {
    pub fn name(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Ge => "ge",
            FilterOperator::Lt => "lt",
            FilterOperator::Le => "le",
            FilterOperator::Like => "like",
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Ge => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Le => "<=",
            FilterOperator::Like => "LIKE",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" => Ok(FilterOperator::Eq),
            "ne" | "!=" => Ok(FilterOperator::Ne),
            "gt" | ">" => Ok(FilterOperator::Gt),
            "ge" | ">=" => Ok(FilterOperator::Ge),
            "lt" | "<" => Ok(FilterOperator::Lt),
            "le" | "<=" => Ok(FilterOperator::Le),
            "like" => Ok(FilterOperator::Like),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One filter predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column name, `table.field` for joined fields
    pub field: String,
    pub operator: FilterOperator,
    /// Several values render as `IN (...)`
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            values: vec![value.into()],
        }
    }

    pub fn is_multi(&self) -> bool {
        self.values.len() > 1
    }
}

/// Parsed request parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub page: usize,
    pub page_size: usize,
    pub sort_field: String,
    pub sort_type: SortType,
    pub filters: Vec<Filter>,
    /// Column allow-list; empty means all columns
    pub columns: Vec<String>,
    pks: Vec<String>,
    all: bool,
}

impl Parameters {
    /// Parameters for the first page sorted by `sort_field`
    pub fn new(page_size: usize, sort_field: impl Into<String>, sort_type: SortType) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            sort_field: sort_field.into(),
            sort_type,
            filters: Vec::new(),
            columns: Vec::new(),
            pks: Vec::new(),
            all: false,
        }
    }

    /// Parse request query pairs on top of the given defaults
    ///
    /// Malformed pagination and sort values fall back to the defaults; keys
    /// starting with `_` that are not recognized and empty values are ignored.
    pub fn from_pairs<I, K, V>(
        pairs: I,
        default_page_size: usize,
        default_sort_field: &str,
        default_sort_type: SortType,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_string(), value.as_ref().trim().to_string()))
            .collect();

        let mut params = Self::new(default_page_size, default_sort_field, default_sort_type);

        let operators: Vec<(&str, FilterOperator)> = pairs
            .iter()
            .filter_map(|(key, value)| {
                let field = key.strip_suffix(OPERATOR_SUFFIX)?;
                Some((field, value.parse().ok()?))
            })
            .collect();
        let operator_of = |field: &str| {
            operators
                .iter()
                .rev()
                .find(|(name, _)| *name == field)
                .map(|(_, operator)| *operator)
                .unwrap_or_default()
        };

        for (key, value) in &pairs {
            match key.as_str() {
                PAGE_KEY => {
                    params.page = value.parse().ok().filter(|page| *page > 0).unwrap_or(1);
                }
                PAGE_SIZE_KEY => {
                    params.page_size = value
                        .parse::<usize>()
                        .ok()
                        .filter(|size| *size > 0)
                        .map_or(params.page_size, |size| size.min(MAX_PAGE_SIZE));
                }
                SORT_KEY => {
                    if !value.is_empty() {
                        params.sort_field = value.clone();
                    }
                }
                SORT_TYPE_KEY => {
                    params.sort_type = value.parse().unwrap_or(default_sort_type);
                }
                COLUMNS_KEY => params.columns = split_list(value),
                PK_KEY => params.pks = split_list(value),
                IS_ALL_KEY => params.all = matches!(value.as_str(), "true" | "1"),
                _ if value.is_empty() || key.starts_with('_') || key.ends_with(OPERATOR_SUFFIX) => {}
                _ => {
                    if let Some(field) = key.strip_suffix(START_SUFFIX) {
                        params.push_filter(Filter::new(field, FilterOperator::Ge, value.clone()));
                    } else if let Some(field) = key.strip_suffix(END_SUFFIX) {
                        params.push_filter(Filter::new(field, FilterOperator::Le, value.clone()));
                    } else if let Some(field) = key.strip_suffix(MULTI_SUFFIX) {
                        params.push_multi_value(field, value.clone());
                    } else {
                        params.push_filter(Filter::new(key.clone(), operator_of(key), value.clone()));
                    }
                }
            }
        }

        // keep the row offset of the last page representable
        let max_page = usize::try_from(i64::MAX).unwrap_or(usize::MAX) / params.page_size;
        params.page = params.page.min(max_page);

        params
    }

    fn push_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    fn push_multi_value(&mut self, field: &str, value: String) {
        match self
            .filters
            .iter_mut()
            .find(|filter| filter.field == field && filter.operator == FilterOperator::Eq)
        {
            Some(filter) => filter.values.push(value),
            None => self.filters.push(Filter::new(field, FilterOperator::Eq, value)),
        }
    }

    /// Same parameters restricted to the given primary keys
    pub fn with_pks<I, S>(mut self, pks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pks = pks
            .into_iter()
            .map(Into::into)
            .filter(|pk: &String| !pk.is_empty())
            .collect();
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Selected primary keys, blanks removed
    pub fn pks(&self) -> &[String] {
        &self.pks
    }

    /// First selected primary key
    pub fn pk(&self) -> &str {
        self.pks.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_column_visible(&self, column: &str) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|name| name == column)
    }

    pub fn has_filter(&self, field: &str) -> bool {
        self.filters.iter().any(|filter| filter.field == field)
    }

    pub fn filter_value(&self, field: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|filter| filter.field == field)
            .and_then(|filter| filter.values.first())
            .map(String::as_str)
    }

    /// Serialize back into query pairs
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (PAGE_KEY.to_string(), self.page.to_string()),
            (PAGE_SIZE_KEY.to_string(), self.page_size.to_string()),
            (SORT_KEY.to_string(), self.sort_field.clone()),
            (SORT_TYPE_KEY.to_string(), self.sort_type.name().to_string()),
        ];
        if !self.columns.is_empty() {
            pairs.push((COLUMNS_KEY.to_string(), self.columns.join(",")));
        }
        if self.all {
            pairs.push((IS_ALL_KEY.to_string(), "true".to_string()));
        }
        for filter in &self.filters {
            if filter.is_multi() {
                for value in &filter.values {
                    pairs.push((format!("{}{}", filter.field, MULTI_SUFFIX), value.clone()));
                }
                continue;
            }
            let value = filter.values.first().cloned().unwrap_or_default();
            pairs.push((filter.field.clone(), value));
            if filter.operator != FilterOperator::Eq {
                pairs.push((
                    format!("{}{}", filter.field, OPERATOR_SUFFIX),
                    filter.operator.name().to_string(),
                ));
            }
        }
        pairs
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Parameters {
        Parameters::from_pairs(pairs.iter().copied(), 10, "id", SortType::Desc)
    }

    #[test]
    fn test_defaults() {
        let params = parse(&[]);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.sort_field, "id");
        assert_eq!(params.sort_type, SortType::Desc);
        assert!(params.filters.is_empty());
        assert!(!params.is_all());
        assert_eq!(params.pk(), "");
    }

    #[test]
    fn test_pagination_and_sort() {
        let params = parse(&[
            ("__page", "3"),
            ("__pageSize", "25"),
            ("__sort", "name"),
            ("__sort_type", "ASC"),
        ]);
        assert_eq!(params.page, 3);
        assert_eq!(params.page_size, 25);
        assert_eq!(params.sort_field, "name");
        assert_eq!(params.sort_type, SortType::Asc);

        let params = parse(&[("__page", "0"), ("__pageSize", "x"), ("__sort_type", "sideways")]);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.sort_type, SortType::Desc);
    }

    #[test]
    fn test_pagination_bounds_are_normalized() {
        let params = parse(&[("__page", "-2"), ("__pageSize", "-5")]);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);

        let params = parse(&[("__pageSize", "0"), ("__page", "abc")]);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);

        let params = parse(&[("__pageSize", "18446744073709551615")]);
        assert_eq!(params.page_size, MAX_PAGE_SIZE);

        let params = parse(&[("__page", "18446744073709551615"), ("__pageSize", "50")]);
        assert_eq!(params.page_size, 50);
        let offset = (params.page as u128 - 1) * params.page_size as u128;
        assert!(offset <= i64::MAX as u128);
        assert!(params.page > 1);
    }

    #[test]
    fn test_filters() {
        let params = parse(&[
            ("name", "ali"),
            ("name__operator__", "like"),
            ("age__start__", "18"),
            ("age__end__", "65"),
            ("status[]", "1"),
            ("status[]", "2"),
            ("email", ""),
            ("_csrf", "abc"),
        ]);

        assert_eq!(
            params.filters,
            vec![
                Filter::new("name", FilterOperator::Like, "ali"),
                Filter::new("age", FilterOperator::Ge, "18"),
                Filter::new("age", FilterOperator::Le, "65"),
                Filter {
                    field: "status".into(),
                    operator: FilterOperator::Eq,
                    values: vec!["1".into(), "2".into()],
                },
            ]
        );
        assert!(params.has_filter("age"));
        assert!(!params.has_filter("email"));
    }

    #[test]
    fn test_columns_pks_and_all() {
        let params = parse(&[("__columns", "id, name,"), ("__pk", "1,,2"), ("__is_all", "true")]);
        assert_eq!(params.columns, vec!["id", "name"]);
        assert!(params.is_column_visible("name"));
        assert!(!params.is_column_visible("email"));
        assert_eq!(params.pks(), ["1", "2"]);
        assert_eq!(params.pk(), "1");
        assert!(params.is_all());

        assert!(parse(&[]).is_column_visible("anything"));
    }

    #[test]
    fn test_to_pairs_reparses_to_same_parameters() {
        let params = parse(&[
            ("__page", "2"),
            ("__sort", "name"),
            ("name", "bob"),
            ("name__operator__", "ne"),
            ("tag[]", "a"),
            ("tag[]", "b"),
        ]);
        let pairs = params.to_pairs();
        let reparsed = Parameters::from_pairs(pairs, 10, "id", SortType::Desc);
        assert_eq!(reparsed, params);
    }
}
