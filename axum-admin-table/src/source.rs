//! Data sources
//!
//! A table reads its rows either from SQL (through the query builder) or from
//! an external source: a user function or a JSON endpoint. The choice is made
//! once, when the table is built.

use crate::config::TableConfig;
use crate::database::Row;
use crate::panel::BoxFuture;
use crate::parameter::Parameters;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// User function returning one page of rows and the total row count
pub type GetDataFn = Arc<dyn Fn(Parameters) -> BoxFuture<'static, (Vec<Row>, u64)> + Send + Sync>;

/// Wrap an async function as a [`GetDataFn`]
pub fn get_data_fn<F, Fut>(function: F) -> GetDataFn
where
    F: Fn(Parameters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Vec<Row>, u64)> + Send + 'static,
{
    Arc::new(move |params| -> BoxFuture<'static, (Vec<Row>, u64)> { Box::pin(function(params)) })
}

/// Where a table reads its rows from
#[derive(Clone)]
pub enum DataSource {
    Sql,
    External(ExternalSource),
}

impl DataSource {
    /// Pick the source for a table; a custom function wins over a URL
    pub fn from_config(config: &TableConfig) -> Self {
        if let Some(get_data) = &config.get_data {
            return DataSource::External(ExternalSource::Custom(get_data.clone()));
        }
        match config.source_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => DataSource::External(ExternalSource::Url(UrlSource::new(url))),
            None => DataSource::Sql,
        }
    }

    pub fn external(&self) -> Option<&ExternalSource> {
        match self {
            DataSource::Sql => None,
            DataSource::External(source) => Some(source),
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Sql => f.write_str("Sql"),
            DataSource::External(source) => f.debug_tuple("External").field(source).finish(),
        }
    }
}

/// A non-SQL row source
#[derive(Clone)]
pub enum ExternalSource {
    Custom(GetDataFn),
    Url(UrlSource),
}

impl fmt::Debug for ExternalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalSource::Custom(_) => f.write_str("Custom"),
            ExternalSource::Url(source) => f.debug_tuple("Url").field(&source.url).finish(),
        }
    }
}

impl ExternalSource {
    /// Rows of one page and the total count
    pub async fn fetch_list(&self, params: &Parameters) -> (Vec<Row>, u64) {
        match self {
            ExternalSource::Custom(get_data) => get_data(params.clone()).await,
            ExternalSource::Url(source) => source.fetch(params).await,
        }
    }

    /// First row for the given parameters
    pub async fn fetch_one(&self, params: &Parameters) -> Option<Row> {
        self.fetch_list(params).await.0.into_iter().next()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlResponse {
    data: Vec<Row>,
    size: u64,
}

/// JSON endpoint answering `{"data": [...], "size": n}`
#[derive(Debug, Clone)]
pub struct UrlSource {
    url: String,
    client: reqwest::Client,
}

impl UrlSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET `url?<params>&pk=<ids>`; any failure yields no rows
    pub async fn fetch(&self, params: &Parameters) -> (Vec<Row>, u64) {
        match self.request(params).await {
            Ok(response) => {
                debug!(url = %self.url, rows = response.data.len(), size = response.size, "fetched url source");
                (response.data, response.size)
            }
            Err(error) => {
                warn!(url = %self.url, %error, "url source request failed");
                (Vec::new(), 0)
            }
        }
    }

    async fn request(&self, params: &Parameters) -> Result<UrlResponse, reqwest::Error> {
        self.client
            .get(&self.url)
            .query(&params.to_pairs())
            .query(&[("pk", params.pks().join(","))])
            .send()
            .await?
            .error_for_status()?
            .json::<UrlResponse>()
            .await
    }
}
