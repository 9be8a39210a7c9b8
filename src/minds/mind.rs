//! The [`Mind`] handle and the option types used to create and update Minds.
//!
//! A `Mind` is a local snapshot of one remote Mind plus the means to act on it. Every
//! mutating call talks to the service and then re-reads the Mind, so after a successful
//! call the snapshot matches the server. Two handles for the same name are independent;
//! call [`Mind::refresh`] to pick up changes made elsewhere.
//!
//! ```rust,no_run
//! use minds_sdk::{Client, DatabaseConfig, Patch, UpdateMindOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("MY_API_KEY")?;
//! let mut mind = client.minds.create("mind_name_to_update", None, false).await?;
//!
//! mind.add_datasource(DatabaseConfig::new("my_datasource", "postgres")).await?;
//!
//! mind.update(UpdateMindOptions {
//!     name: Some("updated_mind_name".into()),
//!     prompt_template: Patch::Set("You are a coding assistant.".into()),
//!     ..Default::default()
//! })
//! .await?;
//!
//! println!("{}", mind.completion("2+3").await?);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::minds::completion::{extract_answer, CompletionOutput, CompletionRequest, CompletionStream};
use crate::minds::datasources::DatasourceRef;
use crate::minds::error::{MindsError, ResourceKind, Result};
use crate::minds::manager::Minds;
use crate::minds::transport::{completion_error, error_message, Method};

/// Field presence for partial updates.
///
/// `Keep` leaves the remote value alone, `Clear` resets it to null, `Set` replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

impl<T: Serialize> Patch<T> {
    /// JSON to send for this field, or `None` when the field must be omitted.
    pub fn to_json(&self) -> Result<Option<Value>> {
        match self {
            Patch::Keep => Ok(None),
            Patch::Clear => Ok(Some(Value::Null)),
            Patch::Set(value) => Ok(Some(serde_json::to_value(value)?)),
        }
    }
}

/// Options for [`Minds::create`]. Consumed by the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateMindOptions {
    /// Datasources to attach; inline configs are created first.
    pub datasources: Vec<DatasourceRef>,
    pub prompt_template: Option<String>,
    pub model_name: Option<String>,
    pub provider: Option<String>,
    /// Extra model parameters passed through untouched.
    pub parameters: Option<Map<String, Value>>,
}

impl CreateMindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datasource(mut self, datasource: impl Into<DatasourceRef>) -> Self {
        self.datasources.push(datasource.into());
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn with_model(mut self, provider: impl Into<String>, model_name: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model_name = Some(model_name.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.datasources.iter().try_for_each(DatasourceRef::validate)
    }
}

/// Partial update for [`Mind::update`]. Unset fields are left unchanged remotely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMindOptions {
    /// Rename the Mind.
    pub name: Option<String>,
    /// Replace the whole set of attached datasources. `Some(vec![])` detaches all.
    pub datasources: Option<Vec<DatasourceRef>>,
    pub prompt_template: Patch<String>,
    pub model_name: Option<String>,
    pub provider: Option<String>,
    /// Replace the model parameters map.
    pub parameters: Option<Map<String, Value>>,
}

impl UpdateMindOptions {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.datasources.is_none()
            && self.prompt_template.is_keep()
            && self.model_name.is_none()
            && self.provider.is_none()
            && self.parameters.is_none()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(MindsError::validation("new Mind name must not be empty"));
            }
        }
        if let Some(datasources) = &self.datasources {
            datasources.iter().try_for_each(DatasourceRef::validate)?;
        }
        Ok(())
    }

    /// PATCH body with only the set fields. Datasources must already be resolved to names.
    pub(crate) fn to_body(&self, datasource_names: Option<Vec<String>>) -> Result<Value> {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(names) = datasource_names {
            body.insert("datasources".into(), json!(names));
        }
        if let Some(template) = self.prompt_template.to_json()? {
            body.insert("prompt_template".into(), template);
        }
        if let Some(model_name) = &self.model_name {
            body.insert("model_name".into(), json!(model_name));
        }
        if let Some(provider) = &self.provider {
            body.insert("provider".into(), json!(provider));
        }
        if let Some(parameters) = &self.parameters {
            body.insert("parameters".into(), Value::Object(parameters.clone()));
        }
        Ok(Value::Object(body))
    }
}

/// Server view of a Mind, as decoded from the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct MindState {
    pub name: String,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default, deserialize_with = "de_datasource_names")]
    pub datasources: BTreeSet<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "de_object")]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MindState {
    pub(crate) fn from_json(body: Value) -> Result<Self> {
        let mut state: MindState = serde_json::from_value(body)?;
        if state.prompt_template.is_none() {
            state.prompt_template = state
                .parameters
                .get("prompt_template")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        Ok(state)
    }
}

// Datasources come back either as plain names or as objects carrying a `name`.
fn de_datasource_names<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

fn de_object<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

/// Lenient timestamp parse: RFC 3339, or the naive `YYYY-MM-DD HH:MM:SS[.f]` the service
/// emits, taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Handle on one remote Mind.
#[derive(Clone)]
pub struct Mind {
    minds: Minds,
    state: MindState,
}

impl Mind {
    pub(crate) fn from_state(minds: Minds, state: MindState) -> Self {
        Mind { minds, state }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn prompt_template(&self) -> Option<&str> {
        self.state.prompt_template.as_deref()
    }

    /// Names of the attached datasources.
    pub fn datasources(&self) -> &BTreeSet<String> {
        &self.state.datasources
    }

    pub fn model_name(&self) -> Option<&str> {
        self.state.model_name.as_deref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.state.provider.as_deref()
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.state.parameters
    }

    /// Creation time as reported by the service, when it parses.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.state.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.updated_at.as_deref().and_then(parse_timestamp)
    }

    /// Server fields not modelled by this crate.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.state.extra
    }

    /// Re-read the Mind from the service.
    pub async fn refresh(&mut self) -> Result<()> {
        self.state = self.minds.fetch_state(&self.state.name).await?;
        Ok(())
    }

    /// Apply a partial update, then refresh the snapshot.
    ///
    /// Inline datasource configs in `options.datasources` are created first (an existing
    /// datasource of the same name is reused) and stay in place if the update fails.
    pub async fn update(&mut self, options: UpdateMindOptions) -> Result<()> {
        options.validate()?;
        let current = self.state.name.clone();

        if !options.is_empty() {
            let names = match &options.datasources {
                Some(refs) => {
                    let mut names = Vec::with_capacity(refs.len());
                    for reference in refs {
                        names.push(self.minds.datasources().resolve(reference).await?);
                    }
                    Some(names)
                }
                None => None,
            };
            let body = options.to_body(names)?;

            log::debug!("Mind::update: patching '{}' with {}", current, body);
            self.minds
                .transport()
                .request(Method::PATCH, &self.minds.mind_path(&current), Some(body))
                .await?
                .into_result(ResourceKind::Mind, &current)?;
        }

        let name = options.name.unwrap_or(current);
        self.state = self.minds.fetch_state(&name).await?;
        Ok(())
    }

    /// Attach a datasource, creating it first when given a config.
    ///
    /// Attaching a datasource that is already attached succeeds without changes.
    pub async fn add_datasource(&mut self, datasource: impl Into<DatasourceRef>) -> Result<()> {
        let reference = datasource.into();
        reference.validate()?;

        let ds_name = match &reference {
            DatasourceRef::Inline(_) => self.minds.datasources().resolve(&reference).await?,
            DatasourceRef::Existing(name) => self.minds.datasources().get(name).await?.name,
        };

        let response = self
            .minds
            .transport()
            .request(
                Method::POST,
                &self.minds.attachments_path(&self.state.name),
                Some(json!({ "name": ds_name })),
            )
            .await?
            .into_result(ResourceKind::Mind, &self.state.name);

        match response {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                log::debug!(
                    "Mind::add_datasource: '{}' already attached to '{}'",
                    ds_name,
                    self.state.name
                );
            }
            Err(e) => return Err(e),
        }

        self.refresh().await
    }

    /// Detach a datasource from this Mind. The datasource itself is kept.
    pub async fn del_datasource(&mut self, datasource_name: &str) -> Result<()> {
        if datasource_name.trim().is_empty() {
            return Err(MindsError::validation("datasource name must not be empty"));
        }
        self.minds
            .transport()
            .request(
                Method::DELETE,
                &self.minds.attachment_path(&self.state.name, datasource_name),
                None,
            )
            .await?
            .into_result(ResourceKind::Attachment, datasource_name)?;

        self.refresh().await
    }

    /// Ask the Mind and wait for the whole answer.
    pub async fn completion(&self, message: &str) -> Result<String> {
        let request = CompletionRequest::new(message, false)?;
        let response = self
            .minds
            .transport()
            .request(
                Method::POST,
                &self.minds.completions_path(&self.state.name),
                Some(request.to_json()?),
            )
            .await?;

        if !response.is_success() {
            let err = completion_error(
                response.status,
                error_message(&response.body),
                &self.state.name,
            );
            log::error!("Mind::completion: '{}' failed: {}", self.state.name, err);
            return Err(err);
        }
        extract_answer(&response.body)
    }

    /// Ask the Mind and receive the answer chunk by chunk.
    ///
    /// A failure status is returned here; failures after the first byte arrive as an
    /// item of the stream.
    pub async fn completion_stream(&self, message: &str) -> Result<CompletionStream> {
        let request = CompletionRequest::new(message, true)?;
        let body = self
            .minds
            .transport()
            .request_stream(
                Method::POST,
                &self.minds.completions_path(&self.state.name),
                Some(request.to_json()?),
            )
            .await
            .map_err(|e| match e {
                MindsError::RemoteService { status, message } => {
                    completion_error(status, message, &self.state.name)
                }
                other => other,
            })?;

        Ok(CompletionStream::new(body))
    }

    /// Buffered or streamed completion, chosen at runtime.
    pub async fn completion_with(&self, message: &str, stream: bool) -> Result<CompletionOutput> {
        if stream {
            Ok(CompletionOutput::Stream(self.completion_stream(message).await?))
        } else {
            Ok(CompletionOutput::Text(self.completion(message).await?))
        }
    }
}

impl fmt::Debug for Mind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mind")
            .field("name", &self.state.name)
            .field("prompt_template", &self.state.prompt_template)
            .field("datasources", &self.state.datasources)
            .field("model_name", &self.state.model_name)
            .field("provider", &self.state.provider)
            .field("project", &self.minds.project())
            .finish()
    }
}

impl fmt::Display for Mind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mind({})", self.state.name)
    }
}
