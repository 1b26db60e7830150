//! Read endpoints: list, detail and form pages

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use super::{require, AdminState, ApiError, FormResponse, ListResponse};

/// Query string as ordered pairs
type Pairs = Vec<(String, String)>;

/// Handler for GET /info/{table}
///
/// Query parameters follow the list conventions: `__page`, `__pageSize`,
/// `__sort`, `__sort_type`, `__columns`, `__pk`, `__is_all` and one key per
/// filtered field.
pub async fn list_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Query(pairs): Query<Pairs>,
) -> Result<Json<ListResponse>, ApiError> {
    let table = state.table(&key)?;
    let params = table.info().parameters(pairs);

    let info = if params.pks().is_empty() {
        table.get_data(&params).await?
    } else {
        table.get_data_with_ids(&params).await?
    };

    Ok(Json(ListResponse {
        info,
        flags: table.flags(),
        primary_key: table.primary_key().name.clone(),
    }))
}

/// Handler for GET /info/{table}/detail?__pk=<id>
pub async fn detail_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Query(pairs): Query<Pairs>,
) -> Result<Json<ListResponse>, ApiError> {
    let table = state.table(&key)?;
    let flags = table.flags();
    require(flags.detail, "detail view")?;

    let params = table.detail().parameters(pairs);
    let info = table.get_detail_data(&params).await?;

    Ok(Json(ListResponse {
        info,
        flags,
        primary_key: table.primary_key().name.clone(),
    }))
}

/// Handler for GET /info/{table}/edit?__pk=<id>
pub async fn edit_form_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Query(pairs): Query<Pairs>,
) -> Result<Json<FormResponse>, ApiError> {
    let table = state.table(&key)?;
    require(table.flags().editable, "editing")?;

    let params = table.info().parameters(pairs);
    let form = table.get_data_with_id(&params).await?;

    Ok(Json(FormResponse {
        form,
        primary_key: table.primary_key().name.clone(),
    }))
}

/// Handler for GET /info/{table}/new
pub async fn new_form_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Result<Json<FormResponse>, ApiError> {
    let table = state.table(&key)?;
    require(table.flags().can_add, "creating")?;

    Ok(Json(FormResponse {
        form: table.new_form(),
        primary_key: table.primary_key().name.clone(),
    }))
}
