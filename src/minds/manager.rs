//! The Mind manager reached through `client.minds`.
//!
//! Minds live under a project (`mindsdb` unless configured otherwise). Creating a Mind
//! with inline datasource configs creates those datasources first; references to
//! existing datasources are only attached.
//!
//! ```rust,no_run
//! use minds_sdk::{Client, CreateMindOptions, DatabaseConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("MY_API_KEY")?;
//!
//! let postgres = DatabaseConfig::new("my_datasource", "postgres")
//!     .with_connection("host", "samples.mindsdb.com");
//!
//! let options = CreateMindOptions::new()
//!     .with_datasource(postgres)
//!     .with_prompt_template("You are a coding assistant.");
//! let mind = client.minds.create("mind_name", Some(options), false).await?;
//!
//! for mind in client.minds.list().await? {
//!     println!("{} -> {:?}", mind.name(), mind.datasources());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::minds::datasources::{DatasourceRef, Datasources};
use crate::minds::error::{MindsError, ResourceKind, Result};
use crate::minds::mind::{CreateMindOptions, Mind, MindState};
use crate::minds::transport::{Method, Transport};

/// Manager for Mind resources.
#[derive(Clone)]
pub struct Minds {
    transport: Arc<dyn Transport>,
    project: String,
    datasources: Datasources,
}

impl Minds {
    pub fn new(transport: Arc<dyn Transport>, project: impl Into<String>, datasources: Datasources) -> Self {
        Minds {
            transport,
            project: project.into(),
            datasources,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn datasources(&self) -> &Datasources {
        &self.datasources
    }

    pub(crate) fn collection_path(&self) -> String {
        format!("/projects/{}/minds", urlencoding::encode(&self.project))
    }

    pub(crate) fn mind_path(&self, name: &str) -> String {
        format!("{}/{}", self.collection_path(), urlencoding::encode(name))
    }

    pub(crate) fn attachments_path(&self, name: &str) -> String {
        format!("{}/datasources", self.mind_path(name))
    }

    pub(crate) fn attachment_path(&self, name: &str, datasource: &str) -> String {
        format!(
            "{}/{}",
            self.attachments_path(name),
            urlencoding::encode(datasource)
        )
    }

    pub(crate) fn completions_path(&self, name: &str) -> String {
        format!("{}/completions", self.mind_path(name))
    }

    pub(crate) async fn fetch_state(&self, name: &str) -> Result<MindState> {
        let body = self
            .transport
            .request(Method::GET, &self.mind_path(name), None)
            .await?
            .into_result(ResourceKind::Mind, name)?;

        if body.is_null() {
            return Err(MindsError::not_found(ResourceKind::Mind, name));
        }
        MindState::from_json(body)
    }

    /// Create a Mind and return a handle on it.
    ///
    /// `options: None` creates a bare Mind. With `replace_if_exists` an existing Mind of
    /// the same name is dropped right before the new one is posted, after its datasources
    /// are ready; without it an existing name fails with [`MindsError::AlreadyExists`].
    ///
    /// Inline datasources are created before the Mind. If creating the Mind then fails,
    /// those datasources are **not** removed; drop them with
    /// [`Datasources::drop`](crate::Datasources::drop) if they are unwanted.
    pub async fn create(
        &self,
        name: &str,
        options: Option<CreateMindOptions>,
        replace_if_exists: bool,
    ) -> Result<Mind> {
        if name.trim().is_empty() {
            return Err(MindsError::validation("Mind name must not be empty"));
        }
        let options = options.unwrap_or_default();
        options.validate()?;

        let mut datasource_names = Vec::with_capacity(options.datasources.len());
        let mut created_inline = Vec::new();
        for reference in &options.datasources {
            let ds_name = self.datasources.resolve(reference).await?;
            if matches!(reference, DatasourceRef::Inline(_)) {
                created_inline.push(ds_name.clone());
            }
            datasource_names.push(ds_name);
        }

        let body = create_body(name, &options, datasource_names);
        if let Err(e) = self.post_mind(name, body, replace_if_exists).await {
            if !created_inline.is_empty() {
                log::warn!(
                    "Minds::create: '{}' failed after preparing datasources {:?}; they were left in place",
                    name,
                    created_inline
                );
            }
            return Err(e);
        }

        self.get(name).await
    }

    // The existing Mind is only dropped once everything it depends on is in place.
    async fn post_mind(&self, name: &str, body: Value, replace_if_exists: bool) -> Result<()> {
        if replace_if_exists {
            match self.drop(name).await {
                Ok(()) => log::debug!("Minds::create: replacing '{}'", name),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.transport
            .request(Method::POST, &self.collection_path(), Some(body))
            .await?
            .into_result(ResourceKind::Mind, name)?;
        Ok(())
    }

    /// All Minds of the project, as full handles.
    pub async fn list(&self) -> Result<Vec<Mind>> {
        let body = self
            .transport
            .request(Method::GET, &self.collection_path(), None)
            .await?
            .into_remote_result()?;

        let entries = match body {
            Value::Null => Vec::new(),
            Value::Array(entries) => entries,
            other => {
                return Err(MindsError::Decode(format!(
                    "expected a list of Minds, got {}",
                    other
                )))
            }
        };

        entries
            .into_iter()
            .map(|entry| MindState::from_json(entry).map(|state| Mind::from_state(self.clone(), state)))
            .collect()
    }

    pub async fn get(&self, name: &str) -> Result<Mind> {
        if name.trim().is_empty() {
            return Err(MindsError::validation("Mind name must not be empty"));
        }
        let state = self.fetch_state(name).await?;
        Ok(Mind::from_state(self.clone(), state))
    }

    /// Delete a Mind. Its datasources are detached, not deleted.
    pub async fn drop(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MindsError::validation("Mind name must not be empty"));
        }
        self.transport
            .request(Method::DELETE, &self.mind_path(name), None)
            .await?
            .into_result(ResourceKind::Mind, name)?;
        Ok(())
    }
}

fn create_body(name: &str, options: &CreateMindOptions, datasources: Vec<String>) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(name));
    body.insert("datasources".into(), json!(datasources));
    if let Some(template) = &options.prompt_template {
        body.insert("prompt_template".into(), json!(template));
    }
    if let Some(model_name) = &options.model_name {
        body.insert("model_name".into(), json!(model_name));
    }
    if let Some(provider) = &options.provider {
        body.insert("provider".into(), json!(provider));
    }
    if let Some(parameters) = &options.parameters {
        body.insert("parameters".into(), Value::Object(parameters.clone()));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minds::transport::{ByteStream, TransportResponse};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn request(&self, _: Method, path: &str, _: Option<Value>) -> Result<TransportResponse> {
            panic!("unexpected request to {}", path)
        }

        async fn request_stream(&self, _: Method, path: &str, _: Option<Value>) -> Result<ByteStream> {
            panic!("unexpected stream to {}", path)
        }
    }

    struct Answering(u16, Value);

    #[async_trait]
    impl Transport for Answering {
        async fn request(&self, _: Method, _: &str, _: Option<Value>) -> Result<TransportResponse> {
            Ok(TransportResponse::new(self.0, self.1.clone()))
        }

        async fn request_stream(&self, _: Method, _: &str, _: Option<Value>) -> Result<ByteStream> {
            Err(MindsError::Transport("no streams here".into()))
        }
    }

    fn minds(project: &str) -> Minds {
        let transport: Arc<dyn Transport> = Arc::new(Unreachable);
        Minds::new(transport.clone(), project, Datasources::new(transport))
    }

    #[test]
    fn test_paths() {
        let minds = minds("mindsdb");
        assert_eq!(minds.collection_path(), "/projects/mindsdb/minds");
        assert_eq!(minds.mind_path("m 1"), "/projects/mindsdb/minds/m%201");
        assert_eq!(
            minds.attachment_path("m1", "my/ds"),
            "/projects/mindsdb/minds/m1/datasources/my%2Fds"
        );
        assert_eq!(
            minds.completions_path("m1"),
            "/projects/mindsdb/minds/m1/completions"
        );
    }

    #[test]
    fn test_create_body() {
        let options = CreateMindOptions::new().with_prompt_template("Be brief.");
        let body = create_body("m1", &options, vec!["pg".into()]);
        assert_eq!(
            body,
            json!({"name": "m1", "datasources": ["pg"], "prompt_template": "Be brief."})
        );

        let bare = create_body("m2", &CreateMindOptions::default(), vec![]);
        assert_eq!(bare, json!({"name": "m2", "datasources": []}));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_request() {
        let minds = minds("mindsdb");
        assert!(matches!(
            minds.create("", None, false).await,
            Err(MindsError::Validation(_))
        ));

        let bad = CreateMindOptions::new()
            .with_datasource(crate::minds::datasources::DatabaseConfig::new("pg", ""));
        assert!(matches!(
            minds.create("m1", Some(bad), true).await,
            Err(MindsError::Validation(_))
        ));
        assert!(matches!(minds.get(" ").await, Err(MindsError::Validation(_))));
        assert!(matches!(minds.drop("").await, Err(MindsError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_failure_is_remote_error() {
        let transport: Arc<dyn Transport> =
            Arc::new(Answering(404, json!({"detail": "Project not found"})));
        let minds = Minds::new(transport.clone(), "ghost", Datasources::new(transport));
        assert_eq!(
            minds.list().await.unwrap_err(),
            MindsError::RemoteService {
                status: 404,
                message: "Project not found".into()
            }
        );
    }
}
