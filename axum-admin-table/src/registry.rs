//! Shared services
//!
//! [`Services`] holds the named database connections and the hook error sink.
//! An [`AdminContext`] is created once at startup and initialized exactly once
//! with the services; handlers read it from there.

use crate::config::AdminConfig;
use crate::database::{Connection, DatabaseError, Driver};
use crate::hooks::{ErrorSink, TracingSink};
use crate::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Database connections and the hook error sink
#[derive(Clone)]
pub struct Services {
    connections: BTreeMap<String, Arc<dyn Connection>>,
    sink: Arc<dyn ErrorSink>,
    page_size: usize,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("connections", &self.connections.keys().collect::<Vec<_>>())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

impl Services {
    pub fn new() -> Self {
        Self {
            connections: BTreeMap::new(),
            sink: Arc::new(TracingSink),
            page_size: AdminConfig::default().page_size,
        }
    }

    /// Open a pool for every configured database
    pub async fn connect(config: &AdminConfig) -> crate::Result<Self> {
        let mut services = Self::new().with_page_size(config.page_size);
        for (name, database) in &config.databases {
            let connection = open(database.driver, &database.url).await?;
            info!(connection = %name, driver = %database.driver, "database connected");
            services.add_connection(name.clone(), connection);
        }
        Ok(services)
    }

    pub fn add_connection(&mut self, name: impl Into<String>, connection: Arc<dyn Connection>) -> &mut Self {
        self.connections.insert(name.into(), connection);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn connection(&self, name: &str) -> Result<Arc<dyn Connection>, ConfigError> {
        self.connections
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingConnection(name.to_string()))
    }

    pub fn sink(&self) -> Arc<dyn ErrorSink> {
        self.sink.clone()
    }

    /// Default page size of list views
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

async fn open(driver: Driver, url: &str) -> crate::Result<Arc<dyn Connection>> {
    match driver {
        #[cfg(feature = "sqlite")]
        Driver::Sqlite => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .connect(url)
                .await
                .map_err(DatabaseError::from)?;
            Ok(Arc::new(crate::database::sqlite::SqliteConnection::new(pool)))
        }
        #[cfg(feature = "postgres")]
        Driver::Postgresql => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .connect(url)
                .await
                .map_err(DatabaseError::from)?;
            Ok(Arc::new(crate::database::postgres::PostgresConnection::new(pool)))
        }
        other => {
            let _ = url;
            Err(ConfigError::UnsupportedDriver(other.to_string()).into())
        }
    }
}

/// Write-once holder of the [`Services`]
#[derive(Clone, Default)]
pub struct AdminContext {
    services: Arc<OnceLock<Services>>,
}

impl fmt::Debug for AdminContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminContext")
            .field("initialized", &self.services.get().is_some())
            .finish()
    }
}

impl AdminContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the services; a second call fails
    pub fn init(&self, services: Services) -> Result<(), ConfigError> {
        self.services
            .set(services)
            .map_err(|_| ConfigError::ServicesAlreadyInitialized)
    }

    pub fn services(&self) -> Result<&Services, ConfigError> {
        self.services.get().ok_or(ConfigError::ServicesNotInitialized)
    }
}
