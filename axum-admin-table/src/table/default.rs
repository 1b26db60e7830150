//! Default table: reads

use super::Table;
use crate::config::{PrimaryKey, TableConfig};
use crate::database::columns::{count_value, introspect};
use crate::database::{Columns, Connection, Driver, Row};
use crate::form::Values;
use crate::hooks::ErrorSink;
use crate::materialize::materialize;
use crate::panel::{FormPanel, InfoPanel};
use crate::parameter::Parameters;
use crate::query::{build_all, build_list, build_select_one};
use crate::registry::Services;
use crate::schema::{FilterField, FormFieldValue, FormInfo, InfoRow, Paginator, PanelInfo, TableFlags, TheadItem};
use crate::source::{DataSource, ExternalSource};
use crate::{ConfigError, Error, Result};
use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Table backed by a SQL connection or an external data source
#[derive(Clone)]
pub struct DefaultTable {
    pub(super) info: InfoPanel,
    pub(super) form: FormPanel,
    pub(super) detail: InfoPanel,
    pub(super) primary_key: PrimaryKey,
    pub(super) driver: Driver,
    pub(super) connection_name: String,
    pub(super) connection: Option<Arc<dyn Connection>>,
    pub(super) source: DataSource,
    pub(super) sink: Arc<dyn ErrorSink>,
    can_add: bool,
    editable: bool,
    deletable: bool,
    exportable: bool,
}

impl fmt::Debug for DefaultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTable")
            .field("info", &self.info)
            .field("form", &self.form)
            .field("primary_key", &self.primary_key)
            .field("driver", &self.driver)
            .field("connection", &self.connection_name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl DefaultTable {
    /// Build a table from its configuration
    ///
    /// SQL backed tables need the configured connection, and its engine must
    /// match the configured driver. Tables reading from an external source
    /// keep the connection when there is one, for writes.
    pub fn new(services: &Services, config: TableConfig) -> Result<Self> {
        let source = DataSource::from_config(&config);
        let connection = match services.connection(&config.connection) {
            Ok(connection) => Some(connection),
            Err(error) if source.external().is_none() => return Err(error.into()),
            Err(_) => None,
        };

        if let Some(connection) = &connection {
            if connection.driver() != config.driver {
                return Err(ConfigError::InvalidValue {
                    key: "driver".to_string(),
                    value: format!(
                        "{} (connection {} is {})",
                        config.driver,
                        config.connection,
                        connection.driver()
                    ),
                }
                .into());
            }
        }

        let mut info = InfoPanel::new(config.primary_key.name.clone());
        info.set_default_page_size(services.page_size());

        Ok(Self {
            info,
            form: FormPanel::new(),
            detail: InfoPanel::new(config.primary_key.name.clone()),
            primary_key: config.primary_key,
            driver: config.driver,
            connection_name: config.connection,
            connection,
            source,
            sink: services.sink(),
            can_add: config.can_add,
            editable: config.editable,
            deletable: config.deletable,
            exportable: config.exportable,
        })
    }

    pub fn info_mut(&mut self) -> &mut InfoPanel {
        &mut self.info
    }

    pub fn form_mut(&mut self) -> &mut FormPanel {
        &mut self.form
    }

    pub fn detail_mut(&mut self) -> &mut InfoPanel {
        &mut self.detail
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub(super) fn connection(&self) -> Result<&dyn Connection> {
        self.connection
            .as_deref()
            .ok_or_else(|| ConfigError::MissingConnection(self.connection_name.clone()).into())
    }

    /// Table the list reads and deletes address
    pub(super) fn info_table(&self) -> &str {
        if self.info.table.is_empty() {
            &self.form.table
        } else {
            &self.info.table
        }
    }

    /// Table the form reads and writes address
    pub(super) fn form_table(&self) -> &str {
        if self.form.table.is_empty() {
            &self.info.table
        } else {
            &self.form.table
        }
    }

    /// Non-SQL source for reads through `panel`
    fn external_source(&self, panel: &InfoPanel) -> Option<ExternalSource> {
        self.source
            .external()
            .cloned()
            .or_else(|| panel.get_data_fn.clone().map(ExternalSource::Custom))
    }

    /// Non-SQL source for single-row reads, the detail panel's before the list panel's
    fn row_source(&self) -> Option<ExternalSource> {
        self.external_source(&self.detail)
            .or_else(|| self.external_source(&self.info))
    }

    fn detail_panel(&self) -> Cow<'_, InfoPanel> {
        if self.detail.fields.is_empty() {
            return Cow::Borrowed(&self.info);
        }
        if self.detail.table.is_empty() {
            let mut detail = self.detail.clone();
            detail.table = self.info.table.clone();
            return Cow::Owned(detail);
        }
        Cow::Borrowed(&self.detail)
    }

    async fn list(&self, panel: &InfoPanel, params: &Parameters) -> Result<PanelInfo> {
        let started = Instant::now();

        if let Some(source) = self.external_source(panel) {
            let (rows, total) = source.fetch_list(params).await;
            let rows = rows
                .iter()
                .map(|row| materialize(row, &panel.fields, &self.primary_key, params, None))
                .collect();
            let (thead, filter_form) = panel.thead_and_filter_form(params, None);
            let paginator = self.paginator(panel, params, total, started);
            return Ok(panel_info(panel, thead, rows, filter_form, Some(paginator)));
        }

        let connection = self.connection()?;
        let dialect = self.driver.dialect();
        let primary_key = &self.primary_key.name;
        let columns = introspect(connection, dialect, &panel.table, primary_key).await?;
        let (thead, filter_form) = panel.thead_and_filter_form(params, Some(&columns));

        if params.is_all() && params.pks().is_empty() {
            let statement = build_all(dialect, panel, primary_key, params, &columns);
            let rows = connection.query(&statement.sql, &statement.args).await?;
            debug!(table = %panel.table, rows = rows.len(), "read all rows");
            let rows = self.materialize_all(panel, params, &columns, &rows);
            return Ok(panel_info(panel, thead, rows, filter_form, None));
        }

        let query = build_list(dialect, panel, primary_key, params, &columns);
        let rows = connection.query(&query.sql, &query.args).await?;
        let counted = connection.query(&query.count_sql, &query.count_args).await?;
        let total = counted
            .first()
            .and_then(|row| row.get(dialect.count_key()))
            .map(count_value)
            .unwrap_or_default();
        debug!(
            table = %panel.table,
            rows = rows.len(),
            total,
            sort = %query.sort_field,
            "read page"
        );

        let rows = self.materialize_all(panel, params, &columns, &rows);
        let paginator = self.paginator(panel, params, total, started);
        Ok(panel_info(panel, thead, rows, filter_form, Some(paginator)))
    }

    fn materialize_all(
        &self,
        panel: &InfoPanel,
        params: &Parameters,
        columns: &Columns,
        rows: &[Row],
    ) -> Vec<InfoRow> {
        rows.iter()
            .map(|row| materialize(row, &panel.fields, &self.primary_key, params, Some(columns)))
            .collect()
    }

    fn paginator(&self, panel: &InfoPanel, params: &Parameters, total: u64, started: Instant) -> Paginator {
        Paginator {
            total,
            page: params.page,
            page_size: params.page_size,
            page_size_list: panel.page_size_list.clone(),
            query_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    fn form_info(&self, fields: Vec<FormFieldValue>) -> FormInfo {
        let (group_fields, group_headers) = if self.form.tab_groups.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            self.form.group(&fields)
        };
        FormInfo {
            fields,
            group_fields,
            group_headers,
            title: self.form.title.clone(),
            description: self.form.description.clone(),
        }
    }
}

fn panel_info(
    panel: &InfoPanel,
    thead: Vec<TheadItem>,
    rows: Vec<InfoRow>,
    filter_form: Vec<FilterField>,
    paginator: Option<Paginator>,
) -> PanelInfo {
    PanelInfo {
        thead,
        rows,
        filter_form,
        paginator,
        title: panel.title.clone(),
        description: panel.description.clone(),
    }
}

#[async_trait]
impl Table for DefaultTable {
    fn info(&self) -> &InfoPanel {
        &self.info
    }

    fn form(&self) -> &FormPanel {
        &self.form
    }

    fn detail(&self) -> &InfoPanel {
        if self.detail.fields.is_empty() {
            &self.info
        } else {
            &self.detail
        }
    }

    fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    fn flags(&self) -> TableFlags {
        TableFlags {
            can_add: self.can_add && !self.info.hide_new_button,
            editable: self.editable && !self.info.hide_edit_button,
            deletable: self.deletable && !self.info.hide_delete_button,
            exportable: self.exportable && !self.info.hide_export_button,
            detail: !self.info.hide_detail_button,
        }
    }

    async fn get_data(&self, params: &Parameters) -> Result<PanelInfo> {
        self.list(&self.info, params).await
    }

    async fn get_data_with_ids(&self, params: &Parameters) -> Result<PanelInfo> {
        self.list(&self.info, params).await
    }

    async fn get_detail_data(&self, params: &Parameters) -> Result<PanelInfo> {
        let panel = self.detail_panel();
        self.list(&panel, params).await
    }

    async fn get_data_with_id(&self, params: &Parameters) -> Result<FormInfo> {
        let id = params.pk();
        if id.is_empty() {
            return Err(Error::Validation("missing primary key value".to_string()));
        }

        if let Some(source) = self.row_source() {
            let row = source
                .fetch_one(params)
                .await
                .ok_or_else(|| Error::NotFound(format!("row {}", id)))?;
            return Ok(self.form_info(self.form.fields_with_values(id, &row, None)));
        }

        let connection = self.connection()?;
        let dialect = self.driver.dialect();
        let table = self.form_table();
        let columns = introspect(connection, dialect, table, &self.primary_key.name).await?;

        let mut selected: Vec<&str> = Vec::new();
        for field in &self.form.fields {
            if columns.contains(&field.name) && !selected.contains(&field.name.as_str()) {
                selected.push(&field.name);
            }
        }
        let statement = build_select_one(dialect, table, &selected, &self.primary_key.name, id, &columns);
        let row = connection
            .query(&statement.sql, &statement.args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{} {}", table, id)))?;

        Ok(self.form_info(self.form.fields_with_values(id, &row, Some(&columns))))
    }

    async fn update_data(&self, values: Values) -> Result<()> {
        self.update(values).await
    }

    async fn insert_data(&self, values: Values) -> Result<Option<String>> {
        self.insert(values).await
    }

    async fn delete_data(&self, ids: &str) -> Result<()> {
        self.delete(ids).await
    }

    fn new_form(&self) -> FormInfo {
        self.form_info(self.form.fields_with_defaults())
    }

    fn copy(&self) -> Box<dyn Table> {
        Box::new(self.clone())
    }
}
