//! Default table: writes

use super::DefaultTable;
use crate::database::columns::introspect;
use crate::database::{Columns, DatabaseError};
use crate::field::PostFieldModel;
use crate::form::{PostKind, Values, BOOKKEEPING_KEYS, MULTI_SUFFIX, POST_TYPE_KEY};
use crate::hooks::spawn_detached;
use crate::query::{build_delete, build_insert, build_update};
use crate::{Error, Result};
use serde_json::Value;
use tracing::debug;

impl DefaultTable {
    pub(super) async fn insert(&self, mut values: Values) -> Result<Option<String>> {
        values.set_post_kind(PostKind::Create);
        self.validate(&values)?;

        if let Some(insert_fn) = &self.form.insert_fn {
            values.delete(POST_TYPE_KEY);
            insert_fn(values).await.map_err(Error::hook)?;
            return Ok(None);
        }

        if let Some(process) = &self.form.pre_process_fn {
            values = process(values);
        }

        let connection = self.connection()?;
        let dialect = self.driver.dialect();
        let table = self.form_table();
        let primary_key = &self.primary_key.name;
        let columns = introspect(connection, dialect, table, primary_key).await?;
        let assignments = self.inject_values(&values, &columns);
        let (statement, returns_id) = build_insert(dialect, table, &assignments, primary_key, &columns);

        let generated = if returns_id {
            match connection.query(&statement.sql, &statement.args).await {
                Ok(rows) => rows
                    .first()
                    .and_then(|row| row.get(primary_key))
                    .map(|id| self.primary_key.type_name.coerce(Some(id))),
                Err(error) => {
                    self.tolerate(error)?;
                    None
                }
            }
        } else {
            match connection.exec(&statement.sql, &statement.args).await {
                Ok(outcome) => outcome.last_insert_id.map(|id| id.to_string()),
                Err(error) => {
                    self.tolerate(error)?;
                    None
                }
            }
        };

        // without a generated key the submitted one is the row's key
        let id = generated
            .filter(|id| !id.is_empty())
            .or_else(|| Some(values.get(primary_key).to_string()).filter(|id| !id.is_empty()));
        debug!(table, id = id.as_deref().unwrap_or_default(), "inserted row");

        if let Some(id) = &id {
            values.add(primary_key.clone(), id.clone());
        }
        self.spawn_post_hook(values, PostKind::Create);
        Ok(id)
    }

    pub(super) async fn update(&self, mut values: Values) -> Result<()> {
        values.set_post_kind(PostKind::Update);
        self.validate(&values)?;

        if let Some(update_fn) = &self.form.update_fn {
            values.delete(POST_TYPE_KEY);
            return update_fn(values).await.map_err(Error::hook);
        }

        if let Some(process) = &self.form.pre_process_fn {
            values = process(values);
        }

        let primary_key = &self.primary_key.name;
        let id = values.get(primary_key).to_string();
        if id.is_empty() {
            return Err(Error::Validation(format!("missing value of primary key {}", primary_key)));
        }

        let connection = self.connection()?;
        let dialect = self.driver.dialect();
        let table = self.form_table();
        let columns = introspect(connection, dialect, table, primary_key).await?;
        let assignments = self.inject_values(&values, &columns);

        match build_update(dialect, table, &assignments, primary_key, &id, &columns) {
            None => debug!(table, id = %id, "nothing to update"),
            Some(statement) => match connection.exec(&statement.sql, &statement.args).await {
                Ok(outcome) if outcome.rows_affected == 0 => debug!(table, id = %id, "update changed no rows"),
                Ok(_) => debug!(table, id = %id, "updated row"),
                Err(error) => self.tolerate(error)?,
            },
        }

        self.spawn_post_hook(values, PostKind::Update);
        Ok(())
    }

    pub(super) async fn delete(&self, ids: &str) -> Result<()> {
        let ids: Vec<String> = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Err(Error::Validation("no ids to delete".to_string()));
        }

        if let Some(delete_fn) = &self.info.delete_fn {
            return delete_fn(ids).await.map_err(Error::hook);
        }

        if let Some(pre_delete) = &self.info.pre_delete_fn {
            pre_delete(ids.clone()).await.map_err(Error::hook)?;
        }

        let connection = self.connection()?;
        let dialect = self.driver.dialect();
        let table = self.info_table();
        let primary_key = &self.primary_key.name;
        let columns = introspect(connection, dialect, table, primary_key).await?;

        for id in &ids {
            let statement = build_delete(dialect, table, primary_key, id, &columns);
            match connection.exec(&statement.sql, &statement.args).await {
                Ok(outcome) if outcome.rows_affected == 0 => debug!(table, id = %id, "delete matched no rows"),
                Ok(_) => {}
                Err(error) => self.tolerate(error)?,
            }
        }
        debug!(table, count = ids.len(), "deleted rows");

        if let Some(hook) = self.info.delete_hook.clone() {
            spawn_detached("delete_hook", self.sink.clone(), async move { hook(ids).await });
        }
        Ok(())
    }

    fn validate(&self, values: &Values) -> Result<()> {
        match &self.form.validator {
            Some(validator) => validator(values).map_err(|error| Error::Validation(error.to_string())),
            None => Ok(()),
        }
    }

    /// Swallow the write errors this driver reports for successful writes
    fn tolerate(&self, error: DatabaseError) -> Result<()> {
        if error.is_tolerated(self.driver) {
            debug!(driver = %self.driver, %error, "ignoring write error");
            return Ok(());
        }
        Err(error.into())
    }

    fn spawn_post_hook(&self, mut values: Values, kind: PostKind) {
        if let Some(hook) = self.form.post_hook.clone() {
            values.set_post_kind(kind);
            spawn_detached("post_hook", self.sink.clone(), async move { hook(values).await });
        }
    }

    /// Column values to persist from a submission
    ///
    /// Keys lose their `[]` suffix. Bookkeeping keys, and the primary key when
    /// the database generates it, are skipped. Keys that are not columns are
    /// dropped after their post filter ran.
    fn inject_values(&self, values: &Values, columns: &Columns) -> Vec<(String, Value)> {
        let primary_key = &self.primary_key.name;
        let mut values = values.clone();

        if !values.is_single_update_post() {
            for field in self.form.fields.iter().filter(|field| field.form_type.is_multi_select()) {
                let key = format!("{}{}", field.name, MULTI_SUFFIX);
                if !values.contains(&key) {
                    values.add(key, "");
                }
            }
        }

        let values = values.remove_remark();
        let id = values.get(primary_key).to_string();
        let mut assignments: Vec<(String, Value)> = Vec::new();

        for (key, submitted) in values.iter() {
            let name = key.replace(MULTI_SUFFIX, "");
            if BOOKKEEPING_KEYS.contains(&name.as_str()) || (columns.is_auto() && &name == primary_key) {
                continue;
            }

            let non_blank: Vec<String> = submitted.iter().filter(|value| !value.is_empty()).cloned().collect();
            let field = self.form.find_field(&name);
            let post_filter = field.and_then(|field| field.post_filter_fn());

            if !columns.contains(&name) {
                if let Some(post_filter) = post_filter {
                    post_filter(PostFieldModel {
                        id: id.clone(),
                        values: non_blank,
                    });
                }
                continue;
            }

            let value = match post_filter {
                Some(post_filter) => post_filter(PostFieldModel {
                    id: id.clone(),
                    values: non_blank,
                }),
                None => {
                    let delimiter = field.map_or(",", |field| field.delimiter());
                    Value::String(non_blank.join(delimiter))
                }
            };

            match assignments.iter_mut().find(|(column, _)| *column == name) {
                Some(existing) => existing.1 = value,
                None => assignments.push((name, value)),
            }
        }

        assignments
    }
}
