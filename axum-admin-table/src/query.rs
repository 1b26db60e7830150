//! SQL statement builder
//!
//! Builds the fixed statement shapes the table engine needs: the paginated
//! list with its count statement, the full list, single row reads and the
//! insert/update/delete writes. Identifiers are quoted per dialect, every
//! value is bound as an argument, and the returned SQL is already finalized
//! for the dialect's placeholder style.

use crate::database::dialect::SelectParts;
use crate::database::{Columns, Dialect};
use crate::panel::InfoPanel;
use crate::parameter::{FilterOperator, Parameters};
use serde_json::Value;

/// A finalized statement with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Paginated list statement plus the matching count statement
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub sql: String,
    pub args: Vec<Value>,
    pub count_sql: String,
    pub count_args: Vec<Value>,

    /// Sort column actually used
    pub sort_field: String,
}

/// Rendered pieces shared by the list statements
struct Select {
    table: String,
    /// Non-aggregated columns, primary key last
    plain: Vec<String>,
    aggregates: Vec<String>,
    joins: String,
    primary_key: String,
}

impl Select {
    fn new(dialect: &dyn Dialect, panel: &InfoPanel, primary_key: &str, columns: &Columns) -> Self {
        let table = &panel.table;
        let mut plain = Vec::new();
        let mut aggregates = Vec::new();
        let mut aliases: Vec<String> = Vec::new();
        let mut join_tables: Vec<&str> = Vec::new();
        let mut joins = String::new();

        for field in &panel.fields {
            match field.valid_join() {
                Some(join) => {
                    let alias = field.head_field();
                    if aliases.contains(&alias) {
                        continue;
                    }
                    aggregates.push(dialect.aggregate(
                        &dialect.qualified(&join.table, &field.name),
                        &alias,
                        field.delimiter(),
                    ));
                    aliases.push(alias);

                    if !join_tables.contains(&join.table.as_str()) {
                        join_tables.push(&join.table);
                        joins.push_str(&format!(
                            " LEFT JOIN {} ON {} = {}",
                            dialect.quote(&join.table),
                            dialect.qualified(&join.table, &join.join_field),
                            dialect.qualified(table, &join.field)
                        ));
                    }
                }
                None => {
                    if field.name == primary_key || !columns.contains(&field.name) {
                        continue;
                    }
                    let column = dialect.qualified(table, &field.name);
                    if !plain.contains(&column) {
                        plain.push(column);
                    }
                }
            }
        }

        let primary_key = dialect.qualified(table, primary_key);
        plain.push(primary_key.clone());

        Self {
            table: dialect.quote(table),
            plain,
            aggregates,
            joins,
            primary_key,
        }
    }

    fn fields(&self) -> String {
        let mut fields = self.plain.clone();
        fields.extend(self.aggregates.iter().cloned());
        fields.join(", ")
    }

    fn group_by(&self, dialect: &dyn Dialect) -> String {
        if self.joins.is_empty() {
            return String::new();
        }
        if dialect.group_by_select_list() {
            format!(" GROUP BY {}", self.plain.join(", "))
        } else {
            format!(" GROUP BY {}", self.primary_key)
        }
    }
}

/// WHERE clause under construction
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    args: Vec<Value>,
    filtered: Vec<String>,
}

impl Conditions {
    fn render(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn push(&mut self, clause: String, args: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause);
        self.args.extend(args);
    }
}

/// Resolve a (possibly namespaced) field to its qualified column and declared type
fn resolve<'a>(
    dialect: &dyn Dialect,
    panel: &InfoPanel,
    columns: &'a Columns,
    name: &str,
) -> Option<(String, Option<&'a str>)> {
    if let Some((join_table, join_field)) = name.split_once('.') {
        if !panel.is_join_field(name) {
            return None;
        }
        return Some((dialect.qualified(join_table, join_field), None));
    }
    if !columns.contains(name) {
        return None;
    }
    Some((dialect.qualified(&panel.table, name), columns.type_of(name)))
}

fn comparison(
    dialect: &dyn Dialect,
    column: &str,
    column_type: Option<&str>,
    operator: FilterOperator,
    values: &[String],
) -> (String, Vec<Value>) {
    if values.len() > 1 {
        let placeholders = vec![dialect.value_expression(column_type); values.len()];
        let args = values.iter().cloned().map(Value::String).collect();
        return (format!("{} IN ({})", column, placeholders.join(", ")), args);
    }
    let value = values.first().cloned().unwrap_or_default();
    match operator {
        FilterOperator::Like => (
            format!("{} LIKE ?", dialect.like_operand(column)),
            vec![Value::String(format!("%{}%", value))],
        ),
        operator => (
            format!(
                "{} {} {}",
                column,
                operator.as_sql(),
                dialect.value_expression(column_type)
            ),
            vec![Value::String(value)],
        ),
    }
}

/// Request filters, then static wheres not overridden by a filter, then raw fragments
fn conditions(dialect: &dyn Dialect, panel: &InfoPanel, params: &Parameters, columns: &Columns) -> Conditions {
    let mut conditions = Conditions::default();

    for filter in &params.filters {
        let Some((column, column_type)) = resolve(dialect, panel, columns, &filter.field) else {
            continue;
        };
        let values: Vec<String> = filter
            .values
            .iter()
            .map(|value| panel.process_filter_value(&filter.field, value))
            .collect();
        let (clause, args) = comparison(dialect, &column, column_type, filter.operator, &values);
        conditions.push(clause, args);
        conditions.filtered.push(filter.field.clone());
    }

    for condition in &panel.wheres {
        if conditions.filtered.contains(&condition.field) {
            continue;
        }
        let Some((column, column_type)) = resolve(dialect, panel, columns, &condition.field) else {
            continue;
        };
        let (clause, args) = comparison(
            dialect,
            &column,
            column_type,
            condition.operator,
            std::slice::from_ref(&condition.arg),
        );
        conditions.push(clause, args);
    }

    for raw in &panel.where_raws {
        if raw.raw.trim().is_empty() {
            continue;
        }
        conditions.push(format!("({})", raw.raw), raw.args.iter().cloned());
    }

    conditions
}

fn sort_field(params: &Parameters, primary_key: &str, columns: &Columns) -> String {
    if columns.contains(&params.sort_field) {
        params.sort_field.clone()
    } else {
        primary_key.to_string()
    }
}

/// Paginated list and count statements
///
/// With selected primary keys the statement is restricted to them instead of
/// the filters and is not paginated.
pub fn build_list(
    dialect: &dyn Dialect,
    panel: &InfoPanel,
    primary_key: &str,
    params: &Parameters,
    columns: &Columns,
) -> ListQuery {
    let select = Select::new(dialect, panel, primary_key, columns);
    let sort_field = sort_field(params, primary_key, columns);
    let order_column = dialect.qualified(&panel.table, &sort_field);
    let group_by = select.group_by(dialect);

    if !params.pks().is_empty() {
        let placeholder = dialect.value_expression(columns.type_of(primary_key));
        let placeholders = vec![placeholder; params.pks().len()].join(", ");
        let ids: Vec<Value> = params.pks().iter().cloned().map(Value::String).collect();
        let wheres = format!(" WHERE {} IN ({})", select.primary_key, placeholders);

        let sql = format!(
            "SELECT {} FROM {}{}{}{} ORDER BY {} {}",
            select.fields(),
            select.table,
            select.joins,
            wheres,
            group_by,
            order_column,
            params.sort_type.as_sql()
        );
        let count_sql = format!("SELECT {} FROM {}{}", dialect.count_expression(), select.table, wheres);

        return ListQuery {
            sql: dialect.finalize(&sql),
            args: ids.clone(),
            count_sql: dialect.finalize(&count_sql),
            count_args: ids,
            sort_field,
        };
    }

    let conditions = conditions(dialect, panel, params, columns);
    let wheres = conditions.render();
    let fields = select.fields();

    let (sql, pagination) = dialect.paginate(
        &SelectParts {
            fields: &fields,
            table: &select.table,
            joins: &select.joins,
            wheres: &wheres,
            group_by: &group_by,
            order_column: &order_column,
            order_direction: params.sort_type.as_sql(),
        },
        params.page,
        params.page_size,
    );
    let mut args = conditions.args.clone();
    args.extend(pagination.into_iter().map(Value::from));

    let count_sql = format!(
        "SELECT {} FROM {}{}{}",
        dialect.count_expression(),
        select.table,
        select.joins,
        wheres
    );

    ListQuery {
        sql: dialect.finalize(&sql),
        args,
        count_sql: dialect.finalize(&count_sql),
        count_args: conditions.args,
        sort_field,
    }
}

/// Unpaginated list statement, for full exports
pub fn build_all(
    dialect: &dyn Dialect,
    panel: &InfoPanel,
    primary_key: &str,
    params: &Parameters,
    columns: &Columns,
) -> Statement {
    let select = Select::new(dialect, panel, primary_key, columns);
    let sort_field = sort_field(params, primary_key, columns);
    let conditions = conditions(dialect, panel, params, columns);

    let sql = format!(
        "SELECT {} FROM {}{}{}{} ORDER BY {} {}",
        select.fields(),
        select.table,
        select.joins,
        conditions.render(),
        select.group_by(dialect),
        dialect.qualified(&panel.table, &sort_field),
        params.sort_type.as_sql()
    );

    Statement {
        sql: dialect.finalize(&sql),
        args: conditions.args,
    }
}

fn key_condition(dialect: &dyn Dialect, primary_key: &str, columns: &Columns) -> String {
    format!(
        "{} = {}",
        dialect.quote(primary_key),
        dialect.value_expression(columns.type_of(primary_key))
    )
}

/// One row by primary key, restricted to the given columns
pub fn build_select_one(
    dialect: &dyn Dialect,
    table: &str,
    fields: &[&str],
    primary_key: &str,
    id: &str,
    columns: &Columns,
) -> Statement {
    let mut selected: Vec<String> = fields.iter().map(|field| dialect.quote(field)).collect();
    if !fields.contains(&primary_key) {
        selected.push(dialect.quote(primary_key));
    }
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        selected.join(", "),
        dialect.quote(table),
        key_condition(dialect, primary_key, columns)
    );
    Statement {
        sql: dialect.finalize(&sql),
        args: vec![Value::String(id.to_string())],
    }
}

/// INSERT of the given column values; the flag tells whether it returns the key as a row
pub fn build_insert(
    dialect: &dyn Dialect,
    table: &str,
    values: &[(String, Value)],
    primary_key: &str,
    columns: &Columns,
) -> (Statement, bool) {
    let assignments: Vec<(String, String)> = values
        .iter()
        .map(|(column, _)| {
            (
                dialect.quote(column),
                dialect.value_expression(columns.type_of(column)),
            )
        })
        .collect();
    let (sql, returns_id) = dialect.insert(table, &assignments, primary_key);
    let statement = Statement {
        sql: dialect.finalize(&sql),
        args: values.iter().map(|(_, value)| value.clone()).collect(),
    };
    (statement, returns_id)
}

/// UPDATE of one row; `None` when there is nothing to set
pub fn build_update(
    dialect: &dyn Dialect,
    table: &str,
    values: &[(String, Value)],
    primary_key: &str,
    id: &str,
    columns: &Columns,
) -> Option<Statement> {
    if values.is_empty() {
        return None;
    }
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, _)| {
            format!(
                "{} = {}",
                dialect.quote(column),
                dialect.value_expression(columns.type_of(column))
            )
        })
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.quote(table),
        assignments.join(", "),
        key_condition(dialect, primary_key, columns)
    );
    let mut args: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
    args.push(Value::String(id.to_string()));
    Some(Statement {
        sql: dialect.finalize(&sql),
        args,
    })
}

/// DELETE of one row
pub fn build_delete(dialect: &dyn Dialect, table: &str, primary_key: &str, id: &str, columns: &Columns) -> Statement {
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        dialect.quote(table),
        key_condition(dialect, primary_key, columns)
    );
    Statement {
        sql: dialect.finalize(&sql),
        args: vec![Value::String(id.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Column, Driver};
    use crate::field::{DatabaseType, Field, Join};
    use crate::parameter::Filter;
    use serde_json::json;

    fn users_panel() -> InfoPanel {
        let mut panel = InfoPanel::new("id");
        panel
            .set_table("users")
            .add_field(Field::new("id", "ID", DatabaseType::Int))
            .add_field(Field::new("name", "Name", DatabaseType::Varchar));
        panel
    }

    fn users_columns() -> Columns {
        Columns::from_names(["id", "name", "email", "role_id"], true)
    }

    fn with_roles(mut panel: InfoPanel) -> InfoPanel {
        panel.add_field(
            Field::new("name", "Role", DatabaseType::Varchar).join(Join::new("roles", "role_id", "id")),
        );
        panel
    }

    #[test]
    fn test_simple_list() {
        let panel = users_panel();
        let params = panel.parameters(Vec::<(String, String)>::new());
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());

        assert_eq!(
            query.sql,
            "SELECT \"users\".\"name\", \"users\".\"id\" FROM \"users\" ORDER BY \"users\".\"id\" DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(query.args, vec![json!(10), json!(0)]);
        assert_eq!(query.count_sql, "SELECT count(*) FROM \"users\"");
        assert!(query.count_args.is_empty());
    }

    #[test]
    fn test_oversized_pagination_stays_bounded() {
        let panel = users_panel();
        let columns = users_columns();

        let params = panel.parameters([("__page", "18446744073709551615")]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &columns);
        let offset = query.args[1].as_i64().unwrap();
        assert_eq!(query.args[0], json!(10));
        assert!(offset > 0);

        let params = panel.parameters([("__pageSize", "18446744073709551615")]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &columns);
        assert_eq!(query.args, vec![json!(crate::parameter::MAX_PAGE_SIZE), json!(0)]);
    }

    #[test]
    fn test_primary_key_once_in_select_and_order() {
        let panel = with_roles(users_panel());
        let params = panel.parameters([("__sort", "id"), ("__page", "2")]);
        let query = build_list(Driver::Mysql.dialect(), &panel, "id", &params, &users_columns());

        let (select, rest) = query.sql.split_once(" FROM ").unwrap();
        assert_eq!(select.matches("`users`.`id`").count(), 1);
        let (_, order) = rest.split_once(" ORDER BY ").unwrap();
        assert_eq!(order.matches("`users`.`id`").count(), 1);
        assert_eq!(query.args, vec![json!(10), json!(10)]);
    }

    #[test]
    fn test_unknown_sort_field_falls_back_to_primary_key() {
        let panel = users_panel();
        let params = panel.parameters([("__sort", "password")]);
        let dialect = Driver::Postgresql.dialect();
        let query = build_list(dialect, &panel, "id", &params, &users_columns());

        assert_eq!(query.sort_field, "id");
        assert!(query.sql.contains("ORDER BY \"users\".\"id\" DESC"));

        let mut rebuilt = params.clone();
        rebuilt.sort_field = query.sort_field.clone();
        assert_eq!(build_list(dialect, &panel, "id", &rebuilt, &users_columns()), query);
    }

    #[test]
    fn test_join_aggregates_and_groups() {
        let panel = with_roles(users_panel());
        let params = panel.parameters([("roles.name", "admin")]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());

        assert_eq!(
            query.sql,
            "SELECT \"users\".\"name\", \"users\".\"id\", group_concat(\"roles\".\"name\", ',') AS \"roles.name\" \
             FROM \"users\" LEFT JOIN \"roles\" ON \"roles\".\"id\" = \"users\".\"role_id\" \
             WHERE \"roles\".\"name\" = ? GROUP BY \"users\".\"id\" ORDER BY \"users\".\"id\" DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(query.args, vec![json!("admin"), json!(10), json!(0)]);
        assert_eq!(
            query.count_sql,
            "SELECT count(*) FROM \"users\" LEFT JOIN \"roles\" ON \"roles\".\"id\" = \"users\".\"role_id\" \
             WHERE \"roles\".\"name\" = ?"
        );
        assert_eq!(query.count_args, vec![json!("admin")]);
    }

    #[test]
    fn test_where_sources_in_order() {
        let mut panel = users_panel();
        panel
            .add_where("email", FilterOperator::Ne, "")
            .add_where("name", FilterOperator::Eq, "static")
            .add_where("nickname", FilterOperator::Eq, "dropped")
            .add_where_raw("\"users\".\"id\" > ?", vec![json!(5)]);
        let params = panel.parameters([
            ("name", "al"),
            ("name__operator__", "like"),
            ("password", "x"),
            ("role_id[]", "1"),
            ("role_id[]", "2"),
        ]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());

        assert!(query.sql.contains(
            " WHERE \"users\".\"name\" LIKE ? AND \"users\".\"role_id\" IN (?, ?) \
             AND \"users\".\"email\" != ? AND (\"users\".\"id\" > ?) ORDER BY"
        ));
        assert_eq!(
            query.count_args,
            vec![json!("%al%"), json!("1"), json!("2"), json!(""), json!(5)]
        );
    }

    #[test]
    fn test_filter_process_applies_to_values() {
        let mut panel = InfoPanel::new("id");
        panel
            .set_table("users")
            .add_field(Field::new("name", "Name", DatabaseType::Varchar).filter_process(|value| value.to_uppercase()));
        let params = panel.parameters([("name", "bob")]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());
        assert_eq!(query.count_args, vec![json!("BOB")]);
    }

    #[test]
    fn test_selected_primary_keys() {
        let panel = with_roles(users_panel());
        let params = panel.parameters([("__pk", "3,4"), ("name", "ignored")]);
        let query = build_list(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());

        assert!(query.sql.contains("WHERE \"users\".\"id\" IN (?, ?) GROUP BY \"users\".\"id\""));
        assert!(!query.sql.contains("LIMIT"));
        assert_eq!(query.args, vec![json!("3"), json!("4")]);
        assert_eq!(query.count_sql, "SELECT count(*) FROM \"users\" WHERE \"users\".\"id\" IN (?, ?)");
    }

    #[test]
    fn test_postgres_placeholders_and_casts() {
        let panel = users_panel();
        let columns = Columns::new(
            vec![Column::new("id", Some("integer")), Column::new("name", Some("text"))],
            true,
        );
        let params = panel
            .parameters([("name", "bob")])
            .with_filter(Filter::new("id", FilterOperator::Gt, "3"));
        let query = build_list(Driver::Postgresql.dialect(), &panel, "id", &params, &columns);

        assert!(query.sql.contains(
            "WHERE \"users\".\"name\" = $1 AND \"users\".\"id\" > CAST($2 AS integer) ORDER BY"
        ));
        assert!(query.sql.ends_with("LIMIT $3 OFFSET $4"));
        assert_eq!(query.count_sql.matches('$').count(), 2);
    }

    #[test]
    fn test_mssql_windowed_pagination_and_group_by() {
        let panel = with_roles(users_panel());
        let params = panel.parameters([("__page", "2"), ("__pageSize", "5")]);
        let query = build_list(Driver::Mssql.dialect(), &panel, "id", &params, &users_columns());

        assert!(query.sql.starts_with(
            "SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY [users].[id] DESC) AS ROWNUMBER_, "
        ));
        assert!(query.sql.contains("GROUP BY [users].[name], [users].[id])"));
        assert!(query.sql.ends_with("TMP_.ROWNUMBER_ > @p1 AND TMP_.ROWNUMBER_ <= @p2"));
        assert_eq!(query.args, vec![json!(5), json!(10)]);
        assert!(query.count_sql.starts_with("SELECT count(*) AS [size] FROM [users]"));
    }

    #[test]
    fn test_build_all_has_no_pagination() {
        let panel = users_panel();
        let params = panel.parameters([("name", "bob"), ("__is_all", "1")]);
        let statement = build_all(Driver::Sqlite.dialect(), &panel, "id", &params, &users_columns());
        assert_eq!(
            statement.sql,
            "SELECT \"users\".\"name\", \"users\".\"id\" FROM \"users\" WHERE \"users\".\"name\" = ? ORDER BY \"users\".\"id\" DESC"
        );
        assert_eq!(statement.args, vec![json!("bob")]);
    }

    #[test]
    fn test_write_statements() {
        let dialect = Driver::Postgresql.dialect();
        let columns = Columns::new(
            vec![Column::new("id", Some("integer")), Column::new("name", Some("text"))],
            true,
        );

        let (insert, returns_id) =
            build_insert(dialect, "users", &[("name".to_string(), json!("bob"))], "id", &columns);
        assert_eq!(insert.sql, "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING \"id\"");
        assert!(returns_id);

        let update = build_update(dialect, "users", &[("name".to_string(), json!("bob"))], "id", "7", &columns).unwrap();
        assert_eq!(update.sql, "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = CAST($2 AS integer)");
        assert_eq!(update.args, vec![json!("bob"), json!("7")]);
        assert!(build_update(dialect, "users", &[], "id", "7", &columns).is_none());

        let delete = build_delete(Driver::Sqlite.dialect(), "users", "id", "7", &columns);
        assert_eq!(delete.sql, "DELETE FROM \"users\" WHERE \"id\" = ?");

        let select = build_select_one(Driver::Sqlite.dialect(), "users", &["name"], "id", "7", &columns);
        assert_eq!(select.sql, "SELECT \"name\", \"id\" FROM \"users\" WHERE \"id\" = ?");
    }
}
