//! Write endpoints: create, update and delete
//!
//! Bodies are urlencoded forms. Repeated keys (`tags[]=a&tags[]=b`) keep all
//! their values.

use axum::{
    extract::{Path, State},
    response::Json,
    Form,
};
use tracing::info;

use super::{require, AdminState, ApiError, WriteResponse};
use crate::form::Values;

/// Form field carrying the comma separated ids to delete
const DELETE_IDS_KEY: &str = "id";

type Pairs = Vec<(String, String)>;

/// Handler for POST /new/{table}
pub async fn new_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Form(pairs): Form<Pairs>,
) -> Result<Json<WriteResponse>, ApiError> {
    let table = state.table(&key)?;
    require(table.flags().can_add, "creating")?;

    let id = table.insert_data(Values::from_pairs(pairs)).await?;
    info!(table = %key, id = id.as_deref().unwrap_or_default(), "record created");

    Ok(Json(WriteResponse { id }))
}

/// Handler for POST /edit/{table}
pub async fn edit_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Form(pairs): Form<Pairs>,
) -> Result<Json<WriteResponse>, ApiError> {
    let table = state.table(&key)?;
    require(table.flags().editable, "editing")?;

    let values = Values::from_pairs(pairs);
    let id = values.get(&table.primary_key().name).to_string();
    table.update_data(values).await?;
    info!(table = %key, id = %id, "record updated");

    Ok(Json(WriteResponse {
        id: Some(id).filter(|id| !id.is_empty()),
    }))
}

/// Handler for POST /delete/{table}
///
/// The `id` field holds the comma separated primary keys.
pub async fn delete_handler(
    State(state): State<AdminState>,
    Path(key): Path<String>,
    Form(pairs): Form<Pairs>,
) -> Result<Json<WriteResponse>, ApiError> {
    let table = state.table(&key)?;
    require(table.flags().deletable, "deleting")?;

    let values = Values::from_pairs(pairs);
    let ids = values.get(DELETE_IDS_KEY).to_string();
    table.delete_data(&ids).await?;
    info!(table = %key, ids = %ids, "records deleted");

    Ok(Json(WriteResponse { id: Some(ids) }))
}
