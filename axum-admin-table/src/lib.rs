//! # axum-admin-table
//!
//! CRUD table engine for admin panels, mountable as an Axum layer.
//!
//! ## Features
//!
//! - Declarative fields with joins, display transforms and filters
//! - SQL generation for MySQL, PostgreSQL, SQLite and SQL Server dialects
//! - Paginated, filtered and sorted listing with a matching count statement
//! - Create/update/delete with validators, pre-processing and detached hooks
//! - Custom function and URL data sources
//! - `sqlx` backed connections for SQLite and PostgreSQL
//!
//! ## Security Warning
//!
//! Table and column names are interpolated into SQL as quoted identifiers.
//! Only argument values are bound. Never build fields from untrusted input.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum_admin_table::{
//!     AdminContext, AdminLayer, DatabaseType, DefaultTable, Field, GeneratorList, Services,
//!     SqliteConnection, TableConfig,
//! };
//! use axum_admin_table::database::Driver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//!
//!     let mut services = Services::new();
//!     services.add_connection("default", Arc::new(SqliteConnection::new(pool)));
//!
//!     let mut generators = GeneratorList::new();
//!     generators.add("users", Arc::new(|services: &Services| {
//!         let config = TableConfig::default().with_driver(Driver::Sqlite);
//!         let mut table = DefaultTable::new(services, config)?;
//!         table.info_mut().set_table("users");
//!         table.info_mut().add_field(Field::new("name", "Name", DatabaseType::Varchar));
//!         Ok(Box::new(table) as Box<dyn axum_admin_table::Table>)
//!     }));
//!
//!     let context = AdminContext::new();
//!     context.init(services)?;
//!     let app = AdminLayer::new("/admin", context, generators).into_router();
//!
//!     // Serve the application...
//!     # let _ = app;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod api;
pub mod config;
pub mod database;
pub mod field;
pub mod form;
pub mod hooks;
pub mod layer;
pub mod materialize;
pub mod panel;
pub mod parameter;
pub mod query;
pub mod registry;
pub mod schema;
pub mod source;
pub mod table;

// Public exports
pub use config::{AdminConfig, DatabaseConfig, TableConfig};
pub use field::{DatabaseType, Display, Field, FieldModel, FormType, Join, Markup, PostFieldModel};
pub use form::Values;
pub use hooks::{ErrorSink, TracingSink};
pub use layer::{AdminLayer, Authenticator};
pub use panel::{FormPanel, InfoPanel};
pub use parameter::{Filter, FilterOperator, Parameters, SortType};
pub use registry::{AdminContext, Services};
pub use schema::{FormInfo, PanelInfo};
pub use table::{DefaultTable, Generator, GeneratorList, Table};

// Re-export database connections
pub use database::traits::Connection;

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteConnection;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresConnection;

// Error types
use database::DatabaseError;
use thiserror::Error;

/// Error returned by user supplied hooks, validators and custom functions
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not allowed: {0}")]
    NotAllowed(String),

    #[error("Hook error: {0}")]
    Hook(String),
}

impl Error {
    /// Wrap a hook/custom-function failure
    pub fn hook(error: HookError) -> Self {
        Error::Hook(error.to_string())
    }
}

/// Configuration problems, reported at construction or startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown database driver: {0}")]
    UnknownDriver(String),

    #[error("services are already initialized")]
    ServicesAlreadyInitialized,

    #[error("services are not initialized")]
    ServicesNotInitialized,

    #[error("no connection named {0}")]
    MissingConnection(String),

    #[error("driver {0} is not compiled in")]
    UnsupportedDriver(String),

    #[error("invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
