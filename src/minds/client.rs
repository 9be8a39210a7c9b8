//! Root client.

use std::fmt;
use std::sync::Arc;

use crate::minds::config::{ClientConfig, DEFAULT_PROJECT};
use crate::minds::datasources::Datasources;
use crate::minds::error::Result;
use crate::minds::http_transport::HttpTransport;
use crate::minds::manager::Minds;
use crate::minds::transport::Transport;

/// Entry point: owns the transport and exposes the two resource managers.
///
/// ```rust
/// use minds_sdk::Client;
///
/// let client = Client::with_base_url("MY_API_KEY", "https://custom_cloud.mdb.ai/").unwrap();
/// assert_eq!(client.minds.project(), "mindsdb");
/// ```
#[derive(Clone)]
pub struct Client {
    /// Datasource manager.
    pub datasources: Datasources,
    /// Mind manager.
    pub minds: Minds,
}

impl Client {
    /// Client for the hosted service.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::from_config(ClientConfig::new(api_key))
    }

    /// Client for another deployment. An empty `base_url` means the hosted service.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        Self::from_config(ClientConfig::new(api_key).with_base_url(base_url))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(transport, &config.project))
    }

    /// Build a client on top of any transport, e.g. a mock in tests.
    pub fn with_transport(transport: Arc<dyn Transport>, project: &str) -> Self {
        let project = if project.trim().is_empty() {
            DEFAULT_PROJECT
        } else {
            project
        };
        let datasources = Datasources::new(transport.clone());
        let minds = Minds::new(transport, project, datasources.clone());
        Client { datasources, minds }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("project", &self.minds.project())
            .finish()
    }
}
