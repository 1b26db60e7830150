//! SQL dialects
//!
//! Every syntax difference between the supported engines lives here: identifier
//! quoting, placeholder style, aggregation of joined values, pagination shape,
//! the name of the count column, insert-returning shape and the column
//! metadata query. A [`Driver`] is parsed once from configuration and hands out
//! its `&'static dyn Dialect`.

use crate::database::columns::{Column, Columns};
use crate::database::traits::Row;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Driver {
    Mysql,
    Postgresql,
    Sqlite,
    Mssql,
}

impl Driver {
    /// Configuration name of the driver
    pub fn name(self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Postgresql => "postgresql",
            Driver::Sqlite => "sqlite",
            Driver::Mssql => "mssql",
        }
    }

    /// The dialect implementation for this driver
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Driver::Mysql => &MySql,
            Driver::Postgresql => &Postgres,
            Driver::Sqlite => &Sqlite,
            Driver::Mssql => &MsSql,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Driver::Mysql),
            "postgresql" | "postgres" => Ok(Driver::Postgresql),
            "sqlite" => Ok(Driver::Sqlite),
            "mssql" => Ok(Driver::Mssql),
            _ => Err(ConfigError::UnknownDriver(value.to_string())),
        }
    }
}

impl TryFrom<String> for Driver {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Driver> for String {
    fn from(driver: Driver) -> Self {
        driver.name().to_string()
    }
}

/// The pieces of a paginated SELECT, already rendered for the dialect
#[derive(Debug, Clone)]
pub struct SelectParts<'a> {
    /// Rendered select list
    pub fields: &'a str,
    /// Quoted table name
    pub table: &'a str,
    /// Rendered join clauses (leading space included)
    pub joins: &'a str,
    /// Rendered where clause (leading space included, may be empty)
    pub wheres: &'a str,
    /// Rendered group by clause (leading space included, may be empty)
    pub group_by: &'a str,
    /// Qualified, quoted sort column
    pub order_column: &'a str,
    /// `ASC` or `DESC`
    pub order_direction: &'a str,
}

/// Per-engine SQL syntax
///
/// Statements are assembled with `?` placeholders; [`Dialect::finalize`]
/// rewrites them into the engine's native form right before execution.
pub trait Dialect: Send + Sync {
    fn driver(&self) -> Driver;

    /// Quote a table or column identifier
    fn quote(&self, identifier: &str) -> String;

    /// `table.column`, both quoted
    fn qualified(&self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(column))
    }

    /// Native placeholder for the 1-based argument `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Value expression bound against a column of the given type
    fn value_expression(&self, _column_type: Option<&str>) -> String {
        "?".to_string()
    }

    /// Left-hand side of a LIKE comparison
    fn like_operand(&self, column: &str) -> String {
        column.to_string()
    }

    /// Aggregate a joined column into one delimited string aliased to `alias`
    fn aggregate(&self, column: &str, alias: &str, delimiter: &str) -> String;

    /// Key under which the count statement returns its number
    fn count_key(&self) -> &'static str;

    /// Select list of the count statement
    fn count_expression(&self) -> String {
        "count(*)".to_string()
    }

    /// Whether GROUP BY must name every non-aggregated select column
    fn group_by_select_list(&self) -> bool {
        false
    }

    /// Render a paginated SELECT and the two pagination arguments to append
    fn paginate(&self, parts: &SelectParts<'_>, page: usize, page_size: usize) -> (String, [i64; 2]) {
        let sql = format!(
            "SELECT {} FROM {}{}{}{} ORDER BY {} {} LIMIT ? OFFSET ?",
            parts.fields,
            parts.table,
            parts.joins,
            parts.wheres,
            parts.group_by,
            parts.order_column,
            parts.order_direction
        );
        let [offset, _] = row_bounds(page, page_size);
        (sql, [to_arg(page_size), offset])
    }

    /// Render an INSERT; the flag tells whether it returns the primary key as a row
    fn insert(&self, table: &str, assignments: &[(String, String)], _primary_key: &str) -> (String, bool) {
        (plain_insert(self.quote(table), assignments), false)
    }

    /// Statement listing the columns of `table`
    fn columns_query(&self, table: &str) -> (String, Vec<Value>);

    /// Interpret the rows returned by [`Dialect::columns_query`]
    fn parse_columns(&self, rows: &[Row], primary_key: &str) -> Columns;

    /// Extra statement whose count decides auto increment, for engines that track it separately
    fn sequence_lookup(&self, _table: &str) -> Option<(String, Vec<Value>)> {
        None
    }

    /// Rewrite `?` placeholders into the native form
    fn finalize(&self, sql: &str) -> String {
        rewrite_placeholders(sql, |index| self.placeholder(index))
    }
}

/// First-row offset and last-row bound of a page, saturating at `i64::MAX`
fn row_bounds(page: usize, page_size: usize) -> [i64; 2] {
    let lower = page.saturating_sub(1).saturating_mul(page_size);
    let upper = page.saturating_mul(page_size);
    [to_arg(lower), to_arg(upper)]
}

fn to_arg(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn plain_insert(table: String, assignments: &[(String, String)]) -> String {
    if assignments.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    let columns: Vec<&str> = assignments.iter().map(|(column, _)| column.as_str()).collect();
    let values: Vec<&str> = assignments.iter().map(|(_, value)| value.as_str()).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

/// Replace every `?` outside quoted literals and identifiers with `render(n)`
pub fn rewrite_placeholders(sql: &str, render: impl Fn(usize) -> String) -> String {
    let mut output = String::with_capacity(sql.len() + 16);
    let mut closing: Option<char> = None;
    let mut index = 0;

    for character in sql.chars() {
        match closing {
            Some(end) => {
                if character == end {
                    closing = None;
                }
                output.push(character);
            }
            None => match character {
                '\'' | '"' | '`' => {
                    closing = Some(character);
                    output.push(character);
                }
                '[' => {
                    closing = Some(']');
                    output.push(character);
                }
                '?' => {
                    index += 1;
                    output.push_str(&render(index));
                }
                _ => output.push(character),
            },
        }
    }

    output
}

fn text_of<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

fn integer_of(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(number)) => number.as_i64().unwrap_or_default(),
        Some(Value::String(text)) => text.parse().unwrap_or_default(),
        Some(Value::Bool(flag)) => i64::from(*flag),
        _ => 0,
    }
}

/// MySQL / MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn driver(&self) -> Driver {
        Driver::Mysql
    }

    fn quote(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn aggregate(&self, column: &str, alias: &str, delimiter: &str) -> String {
        format!(
            "group_concat({} separator '{}') AS {}",
            column,
            delimiter.replace('\'', "''"),
            self.quote(alias)
        )
    }

    fn count_key(&self) -> &'static str {
        "count(*)"
    }

    fn insert(&self, table: &str, assignments: &[(String, String)], _primary_key: &str) -> (String, bool) {
        if assignments.is_empty() {
            return (format!("INSERT INTO {} () VALUES ()", self.quote(table)), false);
        }
        (plain_insert(self.quote(table), assignments), false)
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (format!("SHOW COLUMNS FROM {}", self.quote(table)), Vec::new())
    }

    fn parse_columns(&self, rows: &[Row], primary_key: &str) -> Columns {
        let mut auto = false;
        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text_of(row, "Field")?;
                if name == primary_key
                    && text_of(row, "Extra").is_some_and(|extra| extra.contains("auto_increment"))
                {
                    auto = true;
                }
                Some(Column::new(name, text_of(row, "Type")))
            })
            .collect();
        Columns::new(columns, auto)
    }
}

/// PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Postgres {
    /// Types that accept a text argument without an explicit cast
    fn is_textual(column_type: &str) -> bool {
        matches!(
            column_type,
            "text" | "character varying" | "character" | "name" | "USER-DEFINED" | "ARRAY"
        )
    }
}

impl Dialect for Postgres {
    fn driver(&self) -> Driver {
        Driver::Postgresql
    }

    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn value_expression(&self, column_type: Option<&str>) -> String {
        match column_type {
            Some(column_type) if !Self::is_textual(column_type) => {
                format!("CAST(? AS {})", column_type)
            }
            _ => "?".to_string(),
        }
    }

    fn like_operand(&self, column: &str) -> String {
        format!("CAST({} AS TEXT)", column)
    }

    fn aggregate(&self, column: &str, alias: &str, delimiter: &str) -> String {
        format!(
            "string_agg({}::character varying, '{}') AS {}",
            column,
            delimiter.replace('\'', "''"),
            self.quote(alias)
        )
    }

    fn count_key(&self) -> &'static str {
        "count"
    }

    fn insert(&self, table: &str, assignments: &[(String, String)], primary_key: &str) -> (String, bool) {
        let sql = format!(
            "{} RETURNING {}",
            plain_insert(self.quote(table), assignments),
            self.quote(primary_key)
        );
        (sql, true)
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        let sql = "SELECT column_name::text AS column_name, column_default::text AS column_default, \
                   data_type::text AS data_type, is_identity::text AS is_identity \
                   FROM information_schema.columns \
                   WHERE table_schema = current_schema() AND table_name = ? \
                   ORDER BY ordinal_position";
        (sql.to_string(), vec![Value::String(table.to_string())])
    }

    fn parse_columns(&self, rows: &[Row], primary_key: &str) -> Columns {
        let mut auto = false;
        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text_of(row, "column_name")?;
                if name == primary_key {
                    let sequence = text_of(row, "column_default")
                        .is_some_and(|default| default.contains("nextval"));
                    let identity = text_of(row, "is_identity") == Some("YES");
                    auto = sequence || identity;
                }
                Some(Column::new(name, text_of(row, "data_type")))
            })
            .collect();
        Columns::new(columns, auto)
    }
}

/// SQLite
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn aggregate(&self, column: &str, alias: &str, delimiter: &str) -> String {
        format!(
            "group_concat({}, '{}') AS {}",
            column,
            delimiter.replace('\'', "''"),
            self.quote(alias)
        )
    }

    fn count_key(&self) -> &'static str {
        "count(*)"
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (format!("PRAGMA table_info({})", self.quote(table)), Vec::new())
    }

    fn parse_columns(&self, rows: &[Row], primary_key: &str) -> Columns {
        let mut rowid_alias = false;
        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text_of(row, "name")?;
                let data_type = text_of(row, "type");
                if name == primary_key
                    && integer_of(row, "pk") > 0
                    && data_type.is_some_and(|declared| declared.eq_ignore_ascii_case("INTEGER"))
                {
                    rowid_alias = true;
                }
                Some(Column::new(name, data_type))
            })
            .collect();
        Columns::new(columns, rowid_alias)
    }

    fn sequence_lookup(&self, table: &str) -> Option<(String, Vec<Value>)> {
        Some((
            "SELECT count(*) FROM sqlite_sequence WHERE name = ?".to_string(),
            vec![Value::String(table.to_string())],
        ))
    }
}

/// Microsoft SQL Server
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSql;

impl Dialect for MsSql {
    fn driver(&self) -> Driver {
        Driver::Mssql
    }

    fn quote(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn aggregate(&self, column: &str, alias: &str, delimiter: &str) -> String {
        format!(
            "STRING_AGG(CAST({} AS NVARCHAR(MAX)), '{}') AS {}",
            column,
            delimiter.replace('\'', "''"),
            self.quote(alias)
        )
    }

    fn count_key(&self) -> &'static str {
        "size"
    }

    fn count_expression(&self) -> String {
        "count(*) AS [size]".to_string()
    }

    fn group_by_select_list(&self) -> bool {
        true
    }

    fn paginate(&self, parts: &SelectParts<'_>, page: usize, page_size: usize) -> (String, [i64; 2]) {
        let sql = format!(
            "SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY {} {}) AS ROWNUMBER_, {} FROM {}{}{}{}) AS TMP_ \
             WHERE TMP_.ROWNUMBER_ > ? AND TMP_.ROWNUMBER_ <= ?",
            parts.order_column,
            parts.order_direction,
            parts.fields,
            parts.table,
            parts.joins,
            parts.wheres,
            parts.group_by
        );
        (sql, row_bounds(page, page_size))
    }

    fn insert(&self, table: &str, assignments: &[(String, String)], primary_key: &str) -> (String, bool) {
        let output = format!("OUTPUT INSERTED.{}", self.quote(primary_key));
        if assignments.is_empty() {
            return (
                format!("INSERT INTO {} {} DEFAULT VALUES", self.quote(table), output),
                true,
            );
        }
        let columns: Vec<&str> = assignments.iter().map(|(column, _)| column.as_str()).collect();
        let values: Vec<&str> = assignments.iter().map(|(_, value)| value.as_str()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) {} VALUES ({})",
            self.quote(table),
            columns.join(", "),
            output,
            values.join(", ")
        );
        (sql, true)
    }

    fn columns_query(&self, table: &str) -> (String, Vec<Value>) {
        (
            "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = ? ORDER BY ordinal_position"
                .to_string(),
            vec![Value::String(table.to_string())],
        )
    }

    fn parse_columns(&self, rows: &[Row], _primary_key: &str) -> Columns {
        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = text_of(row, "column_name")?;
                Some(Column::new(name, text_of(row, "data_type")))
            })
            .collect();
        // identity-capable regardless of the column definition
        Columns::new(columns, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_driver_parsing() {
        assert_eq!("postgresql".parse::<Driver>().unwrap(), Driver::Postgresql);
        assert_eq!("Postgres".parse::<Driver>().unwrap(), Driver::Postgresql);
        assert_eq!("mssql".parse::<Driver>().unwrap(), Driver::Mssql);
        assert!(matches!(
            "oracle".parse::<Driver>(),
            Err(ConfigError::UnknownDriver(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Driver::Mysql.dialect().quote("users"), "`users`");
        assert_eq!(Driver::Postgresql.dialect().quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Driver::Sqlite.dialect().quote("users"), "\"users\"");
        assert_eq!(Driver::Mssql.dialect().quote("users"), "[users]");
        assert_eq!(
            Driver::Sqlite.dialect().qualified("users", "id"),
            "\"users\".\"id\""
        );
    }

    #[test]
    fn test_aggregate_expression() {
        assert_eq!(
            Driver::Mysql.dialect().aggregate("`roles`.`name`", "roles.name", ","),
            "group_concat(`roles`.`name` separator ',') AS `roles.name`"
        );
        assert_eq!(
            Driver::Postgresql.dialect().aggregate("\"roles\".\"name\"", "roles.name", ","),
            "string_agg(\"roles\".\"name\"::character varying, ',') AS \"roles.name\""
        );
        assert_eq!(
            Driver::Sqlite.dialect().aggregate("\"roles\".\"name\"", "roles.name", ";"),
            "group_concat(\"roles\".\"name\", ';') AS \"roles.name\""
        );
    }

    #[test]
    fn test_count_keys() {
        assert_eq!(Driver::Postgresql.dialect().count_key(), "count");
        assert_eq!(Driver::Mssql.dialect().count_key(), "size");
        assert_eq!(Driver::Mysql.dialect().count_key(), "count(*)");
        assert_eq!(Driver::Sqlite.dialect().count_key(), "count(*)");
    }

    #[test]
    fn test_rewrite_placeholders_skips_quoted_text() {
        let sql = "SELECT \"a?\" FROM t WHERE x = ? AND y = '?' AND z = ?";
        assert_eq!(
            Driver::Postgresql.dialect().finalize(sql),
            "SELECT \"a?\" FROM t WHERE x = $1 AND y = '?' AND z = $2"
        );
        assert_eq!(
            Driver::Mssql.dialect().finalize("SELECT [x?] FROM t WHERE a = ?"),
            "SELECT [x?] FROM t WHERE a = @p1"
        );
        assert_eq!(Driver::Sqlite.dialect().finalize(sql), sql);
    }

    #[test]
    fn test_postgres_casts_typed_columns() {
        let dialect = Driver::Postgresql.dialect();
        assert_eq!(dialect.value_expression(Some("integer")), "CAST(? AS integer)");
        assert_eq!(dialect.value_expression(Some("character varying")), "?");
        assert_eq!(dialect.value_expression(None), "?");
        assert_eq!(Driver::Sqlite.dialect().value_expression(Some("INTEGER")), "?");
    }

    #[test]
    fn test_mssql_windowed_pagination() {
        let parts = SelectParts {
            fields: "[users].[name],[users].[id]",
            table: "[users]",
            joins: "",
            wheres: "",
            group_by: "",
            order_column: "[users].[id]",
            order_direction: "DESC",
        };
        let (sql, args) = Driver::Mssql.dialect().paginate(&parts, 3, 10);
        assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY [users].[id] DESC)"));
        assert!(sql.ends_with("TMP_.ROWNUMBER_ > ? AND TMP_.ROWNUMBER_ <= ?"));
        assert_eq!(args, [20, 30]);

        let (sql, args) = Driver::Sqlite.dialect().paginate(&parts, 3, 10);
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(args, [10, 20]);
    }

    #[test]
    fn test_pagination_args_saturate() {
        let parts = SelectParts {
            fields: "\"users\".\"id\"",
            table: "\"users\"",
            joins: "",
            wheres: "",
            group_by: "",
            order_column: "\"users\".\"id\"",
            order_direction: "ASC",
        };
        let (_, args) = Driver::Sqlite.dialect().paginate(&parts, usize::MAX, 10);
        assert_eq!(args, [10, i64::MAX]);

        let (_, args) = Driver::Sqlite.dialect().paginate(&parts, 1, usize::MAX);
        assert_eq!(args, [i64::MAX, 0]);

        let (_, args) = Driver::Mssql.dialect().paginate(&parts, usize::MAX, usize::MAX);
        assert_eq!(args, [i64::MAX, i64::MAX]);
    }

    #[test]
    fn test_insert_shapes() {
        let assignments = vec![("\"name\"".to_string(), "?".to_string())];
        let (sql, returns) = Driver::Postgresql.dialect().insert("users", &assignments, "id");
        assert_eq!(sql, "INSERT INTO \"users\" (\"name\") VALUES (?) RETURNING \"id\"");
        assert!(returns);

        let (sql, returns) = Driver::Sqlite.dialect().insert("users", &[], "id");
        assert_eq!(sql, "INSERT INTO \"users\" DEFAULT VALUES");
        assert!(!returns);

        let assignments = vec![("[name]".to_string(), "?".to_string())];
        let (sql, _) = Driver::Mssql.dialect().insert("users", &assignments, "id");
        assert_eq!(sql, "INSERT INTO [users] ([name]) OUTPUT INSERTED.[id] VALUES (?)");
    }

    #[test]
    fn test_parse_columns_auto_detection() {
        let rows = vec![
            row(json!({"column_name": "id", "column_default": "nextval('users_id_seq'::regclass)", "data_type": "integer", "is_identity": "NO"})),
            row(json!({"column_name": "name", "column_default": null, "data_type": "text", "is_identity": "NO"})),
        ];
        let columns = Driver::Postgresql.dialect().parse_columns(&rows, "id");
        assert!(columns.is_auto());
        assert_eq!(columns.names(), vec!["id", "name"]);
        assert_eq!(columns.type_of("id"), Some("integer"));

        let rows = vec![
            row(json!({"Field": "id", "Type": "int(11)", "Extra": "auto_increment"})),
            row(json!({"Field": "name", "Type": "varchar(50)", "Extra": ""})),
        ];
        assert!(Driver::Mysql.dialect().parse_columns(&rows, "id").is_auto());
        assert!(!Driver::Mysql.dialect().parse_columns(&rows, "name").is_auto());

        let rows = vec![
            row(json!({"cid": 0, "name": "id", "type": "INTEGER", "pk": 1})),
            row(json!({"cid": 1, "name": "name", "type": "TEXT", "pk": 0})),
        ];
        assert!(Driver::Sqlite.dialect().parse_columns(&rows, "id").is_auto());

        let rows = vec![row(json!({"cid": 0, "name": "code", "type": "TEXT", "pk": 1}))];
        assert!(!Driver::Sqlite.dialect().parse_columns(&rows, "code").is_auto());

        let rows = vec![row(json!({"column_name": "code", "data_type": "nvarchar"}))];
        assert!(Driver::Mssql.dialect().parse_columns(&rows, "code").is_auto());
    }
}
