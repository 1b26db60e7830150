//! REST API endpoints
//!
//! Every handler resolves the table key through the generator list, builds a
//! fresh table from the shared services and answers with JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::registry::AdminContext;
use crate::schema::{FormInfo, PanelInfo, TableFlags};
use crate::table::{GeneratorList, Table};
use crate::Error;

pub mod form;
pub mod info;

// Re-export handlers for convenience
pub use form::{delete_handler, edit_handler, new_handler};
pub use info::{detail_handler, edit_form_handler, list_handler, new_form_handler};

/// State shared by the admin routes
#[derive(Clone)]
pub struct AdminState {
    pub context: AdminContext,
    pub generators: Arc<GeneratorList>,
}

impl AdminState {
    /// Build the table registered under `key`
    pub fn table(&self, key: &str) -> Result<Box<dyn Table>, ApiError> {
        let generator = self
            .generators
            .get(key)
            .ok_or_else(|| ApiError::UnknownTable(key.to_string()))?;
        let services = self.context.services().map_err(Error::from)?;
        Ok(generator(services)?)
    }
}

/// Fail with 403 unless the table allows `action`
pub(crate) fn require(allowed: bool, action: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(Error::NotAllowed(format!("{} is disabled for this table", action)).into())
    }
}

/// List or detail page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub info: PanelInfo,
    pub flags: TableFlags,
    pub primary_key: String,
}

/// Create or edit form
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub form: FormInfo,
    pub primary_key: String,
}

/// Outcome of a write
#[derive(Debug, Serialize)]
pub struct WriteResponse {
    /// Key of the written row(s), when known
    pub id: Option<String>,
}

/// API error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Table(#[from] Error),
}

/// Error response JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::UnknownTable(_) => (StatusCode::NOT_FOUND, "UNKNOWN_TABLE", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Table(Error::Validation(message)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message.clone())
            }
            ApiError::Table(Error::NotFound(message)) => (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone()),
            ApiError::Table(Error::NotAllowed(message)) => (StatusCode::FORBIDDEN, "FORBIDDEN", message.clone()),
            ApiError::Table(Error::Hook(message)) => {
                error!(error = %message, "hook rejected the request");
                (StatusCode::INTERNAL_SERVER_ERROR, "HOOK_FAILED", message.clone())
            }
            ApiError::Table(error) => {
                error!(%error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
