//! Datasources: connections to external databases that Minds can query.
//!
//! [`Datasources`] is the manager reached through `client.datasources`. It creates,
//! lists, fetches and drops datasources described by a [`DatabaseConfig`].
//!
//! ```rust,no_run
//! use minds_sdk::{Client, DatabaseConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("MY_API_KEY")?;
//!
//! let config = DatabaseConfig::new("my_datasource", "postgres")
//!     .with_description("House sales")
//!     .with_connection("host", "samples.mindsdb.com")
//!     .with_connection("port", "5432")
//!     .with_tables(["house_sales"]);
//!
//! let datasource = client.datasources.create(&config, true).await?;
//! println!("{} uses {}", datasource.name, datasource.engine);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::minds::error::{MindsError, ResourceKind, Result};
use crate::minds::transport::{Method, Transport};

/// Description of a datasource to create.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Unique name of the datasource.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Database driver, e.g. `"postgres"`.
    pub engine: String,
    /// Engine specific connection parameters.
    #[serde(default)]
    pub connection_data: BTreeMap<String, String>,
    /// Tables to expose. Empty means all of them.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>, engine: impl Into<String>) -> Self {
        DatabaseConfig {
            name: name.into(),
            engine: engine.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_connection(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_data.insert(key.into(), value.into());
        self
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Check the fields the service requires. Runs before any request is sent.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MindsError::validation("datasource name must not be empty"));
        }
        if self.engine.trim().is_empty() {
            return Err(MindsError::validation(format!(
                "datasource '{}' has no engine",
                self.name
            )));
        }
        Ok(())
    }
}

/// A datasource as reported by the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Datasource {
    pub name: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_string_map")]
    pub connection_data: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub tables: Vec<String>,
    /// Fields the service adds that this crate does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Datasource {
    /// The configuration that would recreate this datasource.
    pub fn to_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            engine: self.engine.clone(),
            connection_data: self.connection_data.clone(),
            tables: self.tables.clone(),
        }
    }
}

// The service may send numbers or booleans in connection data (e.g. `"port": 5432`).
fn de_string_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

fn de_string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

/// Either a datasource to create on the fly or the name of one that already exists.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasourceRef {
    /// Create (or reuse, when the name is taken) this datasource before attaching it.
    Inline(DatabaseConfig),
    /// Attach an existing datasource by name.
    Existing(String),
}

impl DatasourceRef {
    pub fn name(&self) -> &str {
        match self {
            DatasourceRef::Inline(config) => &config.name,
            DatasourceRef::Existing(name) => name,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            DatasourceRef::Inline(config) => config.validate(),
            DatasourceRef::Existing(name) if name.trim().is_empty() => {
                Err(MindsError::validation("datasource name must not be empty"))
            }
            DatasourceRef::Existing(_) => Ok(()),
        }
    }
}

impl From<DatabaseConfig> for DatasourceRef {
    fn from(config: DatabaseConfig) -> Self {
        DatasourceRef::Inline(config)
    }
}

impl From<&DatabaseConfig> for DatasourceRef {
    fn from(config: &DatabaseConfig) -> Self {
        DatasourceRef::Inline(config.clone())
    }
}

impl From<Datasource> for DatasourceRef {
    fn from(datasource: Datasource) -> Self {
        DatasourceRef::Existing(datasource.name)
    }
}

impl From<&Datasource> for DatasourceRef {
    fn from(datasource: &Datasource) -> Self {
        DatasourceRef::Existing(datasource.name.clone())
    }
}

impl From<&str> for DatasourceRef {
    fn from(name: &str) -> Self {
        DatasourceRef::Existing(name.to_string())
    }
}

impl From<String> for DatasourceRef {
    fn from(name: String) -> Self {
        DatasourceRef::Existing(name)
    }
}

pub(crate) fn datasource_path(name: &str) -> String {
    format!("/datasources/{}", urlencoding::encode(name))
}

/// Manager for datasource resources.
#[derive(Clone)]
pub struct Datasources {
    transport: Arc<dyn Transport>,
}

impl Datasources {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Datasources { transport }
    }

    /// Create a datasource.
    ///
    /// With `replace_if_exists` an existing datasource of the same name is dropped
    /// first; without it, an existing name fails with [`MindsError::AlreadyExists`].
    pub async fn create(&self, config: &DatabaseConfig, replace_if_exists: bool) -> Result<Datasource> {
        config.validate()?;

        if replace_if_exists {
            match self.drop(&config.name).await {
                Ok(()) => log::debug!("Datasources::create: replaced '{}'", config.name),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let body = serde_json::to_value(config)?;
        let created = self
            .transport
            .request(Method::POST, "/datasources", Some(body))
            .await?
            .into_result(ResourceKind::Datasource, &config.name)?;

        match serde_json::from_value::<Datasource>(created) {
            Ok(datasource) if datasource.name == config.name => Ok(datasource),
            _ => self.get(&config.name).await,
        }
    }

    /// All datasources visible to the API key, in the order the service lists them.
    pub async fn list(&self) -> Result<Vec<Datasource>> {
        let body = self
            .transport
            .request(Method::GET, "/datasources", None)
            .await?
            .into_remote_result()?;

        match body {
            Value::Null => Ok(Vec::new()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Datasource> {
        if name.trim().is_empty() {
            return Err(MindsError::validation("datasource name must not be empty"));
        }
        let body = self
            .transport
            .request(Method::GET, &datasource_path(name), None)
            .await?
            .into_result(ResourceKind::Datasource, name)?;

        if body.is_null() {
            return Err(MindsError::not_found(ResourceKind::Datasource, name));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Delete a datasource. Dropping a name that is already gone fails with `NotFound`.
    pub async fn drop(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MindsError::validation("datasource name must not be empty"));
        }
        self.transport
            .request(Method::DELETE, &datasource_path(name), None)
            .await?
            .into_result(ResourceKind::Datasource, name)?;
        Ok(())
    }

    /// Fetch the datasource named by `config`, creating it when it does not exist yet.
    pub async fn ensure(&self, config: &DatabaseConfig) -> Result<Datasource> {
        config.validate()?;
        match self.get(&config.name).await {
            Ok(existing) => Ok(existing),
            Err(e) if e.is_not_found() => self.create(config, false).await,
            Err(e) => Err(e),
        }
    }

    /// Resolve a reference to a datasource name, creating inline configs as needed.
    pub(crate) async fn resolve(&self, reference: &DatasourceRef) -> Result<String> {
        match reference {
            DatasourceRef::Inline(config) => Ok(self.ensure(config).await?.name),
            DatasourceRef::Existing(name) => Ok(name.clone()),
        }
    }
}
