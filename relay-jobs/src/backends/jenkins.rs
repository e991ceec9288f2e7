// ABOUTME: Jenkins backend: JSON API client implementing StatusSource and JobServer.
// ABOUTME: Lists jobs with parameter definitions, triggers builds and polls queue/build state.

use crate::config::BackendConfig;
use crate::describe::{JobDetails, ParameterDefinition};
use crate::job::RemoteJob;
use crate::registry::ServerFactory;
use crate::runner::RunSettings;
use crate::traits::{BuildStatus, Job, JobServer, QueueId, QueueStatus, StatusSource};
use crate::update::JobArgs;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// `tree` filter that pulls everything `describe` needs in one request
const JOB_TREE: &str = "jobs[name,description,property[parameterDefinitions[name,type,description,defaultParameterValue[value]]]]";

/// Jenkins answers that are well-formed HTTP but unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JenkinsError {
    #[error("Jenkins did not return a queue location for `{0}`")]
    MissingLocation(String),
    #[error("Unrecognised queue location: {0}")]
    BadLocation(String),
    #[error("Queue item {0} was cancelled")]
    Cancelled(u64),
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct JobListResponse {
    #[serde(default)]
    jobs: Vec<JobResponse>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    property: Vec<PropertyResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyResponse {
    #[serde(default)]
    parameter_definitions: Vec<ParameterResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterResponse {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_parameter_value: Option<DefaultValueResponse>,
}

#[derive(Debug, Deserialize)]
struct DefaultValueResponse {
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct QueueItemResponse {
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    executable: Option<ExecutableResponse>,
}

#[derive(Debug, Deserialize)]
struct ExecutableResponse {
    #[serde(default)]
    number: u64,
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    #[serde(default)]
    building: bool,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbResponse {
    crumb: String,
    crumb_request_field: String,
}

impl From<JobResponse> for JobDetails {
    fn from(job: JobResponse) -> Self {
        let parameters = job
            .property
            .into_iter()
            .flat_map(|p| p.parameter_definitions)
            .map(|p| ParameterDefinition {
                name: p.name,
                kind: p.kind,
                description: p.description.unwrap_or_default(),
                default: p
                    .default_parameter_value
                    .map(|d| value_text(&d.value))
                    .unwrap_or_default(),
            })
            .collect();
        JobDetails {
            name: job.name,
            description: job.description.unwrap_or_default(),
            parameters,
        }
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the queue item id from a `Location` header such as
/// `https://ci/queue/item/123/`
pub fn parse_queue_id(location: &str) -> Option<QueueId> {
    let rest = location.split("/queue/item/").nth(1)?;
    rest.trim_end_matches('/')
        .split('/')
        .next()?
        .parse()
        .ok()
        .map(QueueId)
}

// =============================================================================
// JenkinsClient - StatusSource over the Jenkins JSON API
// =============================================================================

/// Thin client for the parts of the Jenkins API relay uses
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: Url,
    user: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for JenkinsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsClient")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl JenkinsClient {
    pub fn new(base_url: &str, user: Option<String>, password: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Jenkins URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Jenkins URL cannot be used as a base: {}", base_url);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            // Crumbs are bound to the session cookie issued with them
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            user,
            password,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            anyhow!("jobs.url is required for the jenkins backend (set JENKINS_URL)")
        })?;
        Self::new(url, config.user.clone(), config.password.clone())
    }

    /// Build an absolute URL from path segments under the base URL
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.user {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Jenkins rejected GET {}", url))?;
        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }

    /// CSRF crumb, if the server has a crumb issuer
    async fn crumb(&self) -> Result<Option<CrumbResponse>> {
        let url = self.url(&["crumbIssuer", "api", "json"]);
        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let crumb = response
            .error_for_status()
            .context("Jenkins rejected crumb request")?
            .json()
            .await
            .context("Invalid crumb JSON")?;
        Ok(Some(crumb))
    }

    /// Every job the server defines, with parameter definitions
    pub async fn list_jobs(&self) -> Result<Vec<JobDetails>> {
        let mut url = self.url(&["api", "json"]);
        url.query_pairs_mut().append_pair("tree", JOB_TREE);
        let list: JobListResponse = self.get_json(url).await?;
        Ok(list.jobs.into_iter().map(JobDetails::from).collect())
    }
}

#[async_trait]
impl StatusSource for JenkinsClient {
    async fn trigger(&self, job: &str, args: &JobArgs) -> Result<QueueId> {
        let endpoint = if args.is_empty() {
            "build"
        } else {
            "buildWithParameters"
        };
        let url = self.url(&["job", job, endpoint]);
        let mut request = self.request(Method::POST, url.clone());
        if !args.is_empty() {
            request = request.form(args);
        }
        if let Some(crumb) = self.crumb().await? {
            request = request.header(crumb.crumb_request_field, crumb.crumb);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Jenkins refused to build `{}`", job))?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| JenkinsError::MissingLocation(job.to_string()))?;
        let queue = parse_queue_id(location)
            .ok_or_else(|| JenkinsError::BadLocation(location.to_string()))?;

        tracing::debug!(job = %job, queue = queue.0, "Build triggered");
        Ok(queue)
    }

    async fn queue_status(&self, queue: QueueId) -> Result<QueueStatus> {
        let id = queue.0.to_string();
        let item: QueueItemResponse = self
            .get_json(self.url(&["queue", "item", &id, "api", "json"]))
            .await?;
        if item.cancelled {
            return Err(JenkinsError::Cancelled(queue.0).into());
        }
        Ok(QueueStatus {
            build_number: item.executable.map(|e| e.number).unwrap_or(0),
        })
    }

    async fn build_status(&self, job: &str, number: u64) -> Result<BuildStatus> {
        let number = number.to_string();
        let build: BuildResponse = self
            .get_json(self.url(&["job", job, &number, "api", "json"]))
            .await?;
        Ok(BuildStatus {
            building: build.building,
            url: build.url,
        })
    }
}

// =============================================================================
// JenkinsServer - JobServer backed by a JenkinsClient
// =============================================================================

/// Job server that loads every Jenkins job as a RemoteJob
pub struct JenkinsServer {
    client: Arc<JenkinsClient>,
    settings: RunSettings,
}

impl JenkinsServer {
    pub fn new(client: JenkinsClient, settings: RunSettings) -> Self {
        Self {
            client: Arc::new(client),
            settings,
        }
    }

    /// Factory function for the registry
    pub fn factory() -> ServerFactory {
        Box::new(|config: &BackendConfig| {
            let client = JenkinsClient::from_config(config)?;
            Ok(Arc::new(JenkinsServer::new(client, config.run_settings())) as Arc<dyn JobServer>)
        })
    }
}

#[async_trait]
impl JobServer for JenkinsServer {
    fn name(&self) -> &'static str {
        "jenkins"
    }

    async fn load(&self) -> Result<Vec<Arc<dyn Job>>> {
        let jobs = self.client.list_jobs().await?;
        let source: Arc<dyn StatusSource> = self.client.clone();
        Ok(jobs
            .into_iter()
            .map(|details| {
                Arc::new(RemoteJob::new(details, Arc::clone(&source), self.settings)) as Arc<dyn Job>
            })
            .collect())
    }
}
