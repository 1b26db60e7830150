//! Configuration
//!
//! [`TableConfig`] configures one table; [`AdminConfig`] the whole admin
//! surface and its database connections.

use crate::database::Driver;
use crate::field::DatabaseType;
use crate::source::GetDataFn;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;

/// Name of the connection used when none is configured
pub const DEFAULT_CONNECTION: &str = "default";

/// Primary key of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: DatabaseType,
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self {
            name: "id".to_string(),
            type_name: DatabaseType::Int,
        }
    }
}

/// Configuration of one table
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Database engine, validated when deserialized
    pub driver: Driver,

    /// Name of the connection in [`crate::Services`]
    pub connection: String,

    pub primary_key: PrimaryKey,

    pub can_add: bool,
    pub editable: bool,
    pub deletable: bool,
    pub exportable: bool,

    /// Read rows from this URL instead of the database
    pub source_url: Option<String>,

    /// Read rows from this function instead of the database
    #[serde(skip)]
    pub get_data: Option<GetDataFn>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Mysql,
            connection: DEFAULT_CONNECTION.to_string(),
            primary_key: PrimaryKey::default(),
            can_add: true,
            editable: true,
            deletable: true,
            exportable: true,
            source_url: None,
            get_data: None,
        }
    }
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("driver", &self.driver)
            .field("connection", &self.connection)
            .field("primary_key", &self.primary_key)
            .field("can_add", &self.can_add)
            .field("editable", &self.editable)
            .field("deletable", &self.deletable)
            .field("exportable", &self.exportable)
            .field("source_url", &self.source_url)
            .field("get_data", &self.get_data.is_some())
            .finish()
    }
}

impl TableConfig {
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    pub fn with_primary_key(mut self, name: impl Into<String>, type_name: DatabaseType) -> Self {
        self.primary_key = PrimaryKey {
            name: name.into(),
            type_name,
        };
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_get_data(mut self, get_data: GetDataFn) -> Self {
        self.get_data = Some(get_data);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_add = false;
        self.editable = false;
        self.deletable = false;
        self
    }
}

/// A named database connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub url: String,
}

/// Admin-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// URL prefix the admin router is nested under
    pub prefix: String,

    /// Page size used when a request does not ask for one
    pub page_size: usize,

    /// Connections by name
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            prefix: "/admin".to_string(),
            page_size: 10,
            databases: BTreeMap::new(),
        }
    }
}

impl AdminConfig {
    /// Load from `ADMIN_PREFIX`, `ADMIN_PAGE_SIZE`, `DATABASE_DRIVER` and `DATABASE_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let page_size = match lookup("ADMIN_PAGE_SIZE") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "ADMIN_PAGE_SIZE".to_string(),
                    value,
                })?,
            None => defaults.page_size,
        };

        let mut databases = BTreeMap::new();
        if let Some(url) = lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            let driver = match lookup("DATABASE_DRIVER") {
                Some(name) => name.parse()?,
                None => driver_from_url(&url)?,
            };
            databases.insert(DEFAULT_CONNECTION.to_string(), DatabaseConfig { driver, url });
        }

        Ok(Self {
            prefix: lookup("ADMIN_PREFIX").unwrap_or(defaults.prefix),
            page_size,
            databases,
        })
    }
}

/// Guess the driver from the URL scheme
fn driver_from_url(url: &str) -> Result<Driver, ConfigError> {
    let scheme = url.split(':').next().unwrap_or_default();
    scheme.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_table_config_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.driver, Driver::Mysql);
        assert_eq!(config.connection, "default");
        assert_eq!(config.primary_key.name, "id");
        assert_eq!(config.primary_key.type_name, DatabaseType::Int);
        assert!(config.can_add && config.editable && config.deletable && config.exportable);
    }

    #[test]
    fn test_table_config_deserialize_validates_driver() {
        let config: TableConfig =
            serde_json::from_str(r#"{"driver": "postgres", "primary_key": {"name": "uid", "type": "varchar"}}"#)
                .unwrap();
        assert_eq!(config.driver, Driver::Postgresql);
        assert_eq!(config.primary_key.type_name, DatabaseType::Varchar);
        assert!(config.can_add);

        let error = serde_json::from_str::<TableConfig>(r#"{"driver": "oracle"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown database driver"));
    }

    #[test]
    fn test_admin_config_from_lookup() {
        let config = AdminConfig::from_lookup(lookup(&[
            ("ADMIN_PREFIX", "/manage"),
            ("ADMIN_PAGE_SIZE", "25"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]))
        .unwrap();
        assert_eq!(config.prefix, "/manage");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.databases["default"].driver, Driver::Sqlite);

        let config = AdminConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.prefix, "/admin");
        assert!(config.databases.is_empty());
    }

    #[test]
    fn test_admin_config_rejects_bad_values() {
        assert!(matches!(
            AdminConfig::from_lookup(lookup(&[("ADMIN_PAGE_SIZE", "0")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AdminConfig::from_lookup(lookup(&[("DATABASE_URL", "x://y"), ("DATABASE_DRIVER", "db2")])),
            Err(ConfigError::UnknownDriver(_))
        ));
    }
}
