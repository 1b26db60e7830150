//! AdminLayer - Main Axum integration layer
//!
//! This module mounts the admin table routes, plus the callback routes the
//! tables declare, under a URL prefix.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, warn};

use crate::api::{
    delete_handler, detail_handler, edit_form_handler, edit_handler, list_handler, new_form_handler,
    new_handler, AdminState, ApiError, ErrorResponse,
};
use crate::registry::AdminContext;
use crate::table::GeneratorList;

/// Decides whether a request may reach routes that need authentication
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, headers: &HeaderMap) -> bool;
}

impl<F> Authenticator for F
where
    F: Fn(&HeaderMap) -> bool + Send + Sync + 'static,
{
    fn authenticate(&self, headers: &HeaderMap) -> bool {
        self(headers)
    }
}

/// Main layer for integrating the admin tables into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_admin_table::{AdminContext, AdminLayer, GeneratorList, Services};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let context = AdminContext::new();
/// context.init(Services::new())?;
/// let admin = AdminLayer::new("/admin", context, GeneratorList::new())
///     .with_authenticator(|headers: &axum::http::HeaderMap| headers.contains_key("x-admin-token"));
/// let app: Router = Router::new().merge(admin.into_router());
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
pub struct AdminLayer {
    prefix: String,
    context: AdminContext,
    generators: GeneratorList,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl fmt::Debug for AdminLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminLayer")
            .field("prefix", &self.prefix)
            .field("generators", &self.generators)
            .field("authenticator", &self.authenticator.is_some())
            .finish()
    }
}

impl AdminLayer {
    /// Create the admin routes at the given prefix
    ///
    /// # Arguments
    ///
    /// * `prefix` - The URL path where the routes will be mounted (e.g., "/admin")
    /// * `context` - Context holding the database services
    /// * `generators` - Table generators by table key
    pub fn new(prefix: impl Into<String>, context: AdminContext, generators: GeneratorList) -> Self {
        Self {
            prefix: prefix.into(),
            context,
            generators,
            authenticator: None,
        }
    }

    /// Guard the routes that need authentication
    pub fn with_authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The table routes always need authentication; callback routes declare
    /// it themselves. Callbacks are collected by building every table once,
    /// so the context should be initialized before this is called.
    pub fn into_router(self) -> Router {
        let state = AdminState {
            context: self.context,
            generators: Arc::new(self.generators),
        };

        let mut protected: Router = Router::new()
            .route("/info/{table}", get(list_handler))
            .route("/info/{table}/detail", get(detail_handler))
            .route("/info/{table}/edit", get(edit_form_handler))
            .route("/info/{table}/new", get(new_form_handler))
            .route("/new/{table}", post(new_handler))
            .route("/edit/{table}", post(edit_handler))
            .route("/delete/{table}", post(delete_handler))
            .with_state(state.clone());
        let mut public = Router::new();

        let mut paths = BTreeSet::new();
        for key in state.generators.keys() {
            let table = match state.table(key) {
                Ok(table) => table,
                Err(error) => {
                    warn!(table = key, %error, "skipping callbacks of table");
                    continue;
                }
            };
            for callback in table.info().callbacks.iter().chain(table.form().callbacks.iter()) {
                let path = normalize_path(&callback.path);
                if !paths.insert(path.clone()) {
                    warn!(table = key, path = %path, "callback path already registered");
                    continue;
                }
                debug!(table = key, path = %path, need_auth = callback.need_auth, "registering callback");
                if callback.need_auth {
                    protected = protected.route(&path, callback.handler.clone());
                } else {
                    public = public.route(&path, callback.handler.clone());
                }
            }
        }

        if let Some(authenticator) = self.authenticator {
            protected = protected.layer(middleware::from_fn_with_state(authenticator, require_auth));
        }

        let routes = protected.merge(public);
        let prefix = normalize_path(&self.prefix);
        let router = if prefix == "/" {
            routes
        } else {
            Router::new().nest(&prefix, routes)
        };

        router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(CorsLayer::permissive())
    }
}

/// `admin/` and `/admin` both become `/admin`
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

async fn require_auth(
    State(authenticator): State<Arc<dyn Authenticator>>,
    request: Request,
    next: Next,
) -> Response {
    if authenticator.authenticate(request.headers()) {
        return next.run(request).await;
    }
    debug!(path = %request.uri().path(), "rejected unauthenticated request");
    ApiError::Unauthorized.into_response()
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %message, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("INTERNAL_ERROR", "Internal server error")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::database::testing::RecordingConnection;
    use crate::database::Driver;
    use crate::field::{DatabaseType, Field};
    use crate::form::Values;
    use crate::registry::Services;
    use crate::table::{DefaultTable, Table};
    use crate::HookError;
    use axum::body::Body;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn connection() -> Arc<RecordingConnection> {
        Arc::new(
            RecordingConnection::new(Driver::Mysql)
                .respond(
                    "SHOW COLUMNS",
                    vec![
                        json!({"Field": "id", "Type": "int", "Extra": "auto_increment"}),
                        json!({"Field": "name", "Type": "varchar(50)", "Extra": ""}),
                    ],
                )
                .respond("SELECT count(*)", vec![json!({"count(*)": 1})])
                .respond("SELECT `users`", vec![json!({"id": 1, "name": "ada"})])
                .with_last_insert_id(2),
        )
    }

    fn generators() -> GeneratorList {
        let mut generators = GeneratorList::new();
        generators.add(
            "users",
            Arc::new(|services: &Services| {
                let mut table = DefaultTable::new(services, TableConfig::default())?;
                table
                    .info_mut()
                    .set_table("users")
                    .add_field(Field::new("name", "Name", DatabaseType::Varchar))
                    .add_callback("/users/ping", get(|| async { "pong" }), false)
                    .add_callback(
                        "/users/boom",
                        get(|| async {
                            if true {
                                panic!("boom");
                            }
                            "unreachable"
                        }),
                        true,
                    );
                table
                    .form_mut()
                    .add_field(Field::new("name", "Name", DatabaseType::Varchar))
                    .set_validator(|values: &Values| {
                        if values.get("name").is_empty() {
                            return Err::<(), HookError>("name is required".into());
                        }
                        Ok(())
                    });
                Ok(Box::new(table) as Box<dyn Table>)
            }),
        );
        generators.add(
            "logs",
            Arc::new(|services: &Services| {
                let mut table = DefaultTable::new(services, TableConfig::default().read_only())?;
                table.info_mut().set_table("logs");
                Ok(Box::new(table) as Box<dyn Table>)
            }),
        );
        generators
    }

    fn router() -> Router {
        let mut services = Services::new();
        services.add_connection("default", connection());
        let context = AdminContext::new();
        context.init(services).unwrap();
        AdminLayer::new("/admin", context, generators()).into_router()
    }

    fn get_request(uri: &str) -> Request {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, request: Request) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_list_route() {
        let (status, body) = send(router(), get_request("/admin/info/users?__page=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["rows"][0]["name"]["value"], json!("ada"));
        assert_eq!(body["info"]["paginator"]["total"], json!(1));
        assert_eq!(body["primaryKey"], json!("id"));
        assert_eq!(body["flags"]["canAdd"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let (status, body) = send(router(), get_request("/admin/info/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], json!("UNKNOWN_TABLE"));
    }

    #[tokio::test]
    async fn test_write_guards_and_validation() {
        let (status, _) = send(router(), post_form("/admin/new/logs", "name=x")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(router(), post_form("/admin/delete/logs", "id=1")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(router(), post_form("/admin/new/users", "name=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], json!("name is required"));

        let (status, body) = send(router(), post_form("/admin/new/users", "name=grace")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("2"));
    }

    #[tokio::test]
    async fn test_new_form_route() {
        let (status, body) = send(router(), get_request("/admin/info/users/new")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["form"]["fields"][0]["field"], json!("name"));

        let (status, _) = send(router(), get_request("/admin/info/logs/new")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_authenticator_guards_protected_routes() {
        let mut services = Services::new();
        services.add_connection("default", connection());
        let context = AdminContext::new();
        context.init(services).unwrap();
        let router = AdminLayer::new("admin/", context, generators())
            .with_authenticator(|headers: &HeaderMap| {
                headers.get("x-admin-token").is_some_and(|token| token == "secret")
            })
            .into_router();

        let (status, body) = send(router.clone(), get_request("/admin/info/users")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], json!("UNAUTHORIZED"));

        let request = axum::http::Request::builder()
            .uri("/admin/info/users")
            .header("x-admin-token", "secret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router.clone(), request).await;
        assert_eq!(status, StatusCode::OK);

        let response = router.oneshot(get_request("/admin/users/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let (status, body) = send(router(), get_request("/admin/users/boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], json!("INTERNAL_ERROR"));
    }

    #[tokio::test]
    async fn test_uninitialized_context() {
        let router = AdminLayer::new("/admin", AdminContext::new(), generators()).into_router();
        let (status, body) = send(router, get_request("/admin/info/users")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], json!("INTERNAL_ERROR"));
    }
}
