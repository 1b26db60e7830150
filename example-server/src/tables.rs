use axum::routing::get;
use axum::Json;
use axum_admin_table::config::DEFAULT_CONNECTION;
use axum_admin_table::source::get_data_fn;
use axum_admin_table::{
    DatabaseType, DefaultTable, Field, FieldModel, FilterOperator, FormType, GeneratorList, HookError,
    Join, Markup, Services, SortType, Table, TableConfig, Values,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn generators() -> GeneratorList {
    let mut generators = GeneratorList::new();
    generators
        .add("users", Arc::new(|services: &Services| users(services)))
        .add("products", Arc::new(|services: &Services| products(services)))
        .add("status", Arc::new(|services: &Services| status(services)));
    generators
}

fn sql_config(services: &Services) -> axum_admin_table::Result<TableConfig> {
    let driver = services.connection(DEFAULT_CONNECTION)?.driver();
    Ok(TableConfig::default().with_driver(driver))
}

fn users(services: &Services) -> axum_admin_table::Result<Box<dyn Table>> {
    let mut table = DefaultTable::new(services, sql_config(services)?)?;

    table
        .info_mut()
        .set_table("users")
        .set_title("Users")
        .set_description("Registered accounts")
        .add_field(Field::new("id", "ID", DatabaseType::Int).sortable())
        .add_field(
            Field::new("name", "Name", DatabaseType::Varchar)
                .sortable()
                .filter_operator(FilterOperator::Like),
        )
        .add_field(Field::new("email", "Email", DatabaseType::Varchar).filterable())
        .add_field(
            Field::new("name", "Role", DatabaseType::Varchar)
                .join(Join::new("roles", "role_id", "id"))
                .filterable(),
        )
        .add_field(
            Field::new("is_active", "Active", DatabaseType::Bool).display(|model: FieldModel<'_>| {
                let shown = if model.value == "1" { "yes" } else { "no" };
                shown.to_string()
            }),
        )
        .add_field(
            Field::new("profile", "Profile", DatabaseType::Varchar).display(|model: FieldModel<'_>| {
                Markup::new(format!("<a href=\"/profiles/{}\">open</a>", model.id))
            }),
        )
        .add_field(Field::new("created_at", "Created", DatabaseType::Datetime).sortable())
        .set_sort("created_at", SortType::Desc)
        .set_delete_hook(|ids: Vec<String>| async move {
            info!(ids = %ids.join(","), "users deleted");
            Ok::<(), HookError>(())
        })
        .add_callback(
            "/users/stats",
            get(|| async { Json(json!({"source": "users", "status": "ok"})) }),
            true,
        );

    table
        .form_mut()
        .set_title("User")
        .add_field(Field::new("id", "ID", DatabaseType::Int).not_allow_add().not_allow_edit())
        .add_field(Field::new("name", "Name", DatabaseType::Varchar))
        .add_field(
            Field::new("email", "Email", DatabaseType::Varchar).post_filter(|model| {
                Value::String(model.values.join("").trim().to_lowercase())
            }),
        )
        .add_field(Field::new("role_id", "Role", DatabaseType::Int).form_type(FormType::SelectSingle))
        .add_field(Field::new("tags", "Tags", DatabaseType::Varchar).form_type(FormType::SelectBox))
        .add_field(
            Field::new("is_active", "Active", DatabaseType::Bool)
                .form_type(FormType::Switch)
                .default_value("1"),
        )
        .set_tab_groups(
            vec!["Account".to_string(), "Access".to_string()],
            vec![
                vec!["id".to_string(), "name".to_string(), "email".to_string()],
                vec!["role_id".to_string(), "tags".to_string(), "is_active".to_string()],
            ],
        )
        .set_validator(|values: &Values| {
            if values.get("name").trim().is_empty() {
                return Err("name is required".into());
            }
            if values.contains("email") && !values.get("email").contains('@') {
                return Err("email is invalid".into());
            }
            Ok(())
        })
        .set_post_hook(|values: Values| async move {
            let action = if values.is_update_post() { "updated" } else { "created" };
            info!(id = values.get("id"), action, "user saved");
            Ok::<(), HookError>(())
        });

    Ok(Box::new(table))
}

fn products(services: &Services) -> axum_admin_table::Result<Box<dyn Table>> {
    let mut table = DefaultTable::new(services, sql_config(services)?)?;

    table
        .info_mut()
        .set_table("products")
        .set_title("Products")
        .set_default_page_size(20)
        .add_field(Field::new("id", "ID", DatabaseType::Int).sortable())
        .add_field(Field::new("name", "Name", DatabaseType::Varchar).filter_operator(FilterOperator::Like))
        .add_field(Field::new("price", "Price", DatabaseType::Decimal).sortable().filterable())
        .add_field(Field::new("stock", "Stock", DatabaseType::Int).sortable())
        .add_field(
            Field::new("category", "Category", DatabaseType::Varchar)
                .filterable()
                .filter_process(|value| value.trim().to_string()),
        )
        .add_where("stock", FilterOperator::Ge, "0");

    table
        .form_mut()
        .set_title("Product")
        .add_field(Field::new("name", "Name", DatabaseType::Varchar))
        .add_field(Field::new("price", "Price", DatabaseType::Decimal))
        .add_field(Field::new("stock", "Stock", DatabaseType::Int).default_value("0"))
        .add_field(Field::new("category", "Category", DatabaseType::Varchar));

    Ok(Box::new(table))
}

/// Read-only table served from a function instead of the database
fn status(services: &Services) -> axum_admin_table::Result<Box<dyn Table>> {
    let config = sql_config(services)?
        .read_only()
        .with_get_data(get_data_fn(|_params| async {
            let rows = [("database", "up"), ("hooks", "up")]
                .iter()
                .enumerate()
                .filter_map(|(index, (name, state))| {
                    json!({"id": index + 1, "name": name, "state": state}).as_object().cloned()
                })
                .collect::<Vec<_>>();
            let total = rows.len() as u64;
            (rows, total)
        }));
    let mut table = DefaultTable::new(services, config)?;

    table
        .info_mut()
        .set_title("Status")
        .add_field(Field::new("name", "Component", DatabaseType::Varchar))
        .add_field(Field::new("state", "State", DatabaseType::Varchar));

    Ok(Box::new(table))
}
