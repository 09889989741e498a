use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::error::BackendError;
use crate::types::{ExperimentRecord, ExperimentSpec, LoginResponse, OrgInfo, ProjectRecord};

/// The one genuinely external collaborator this SDK depends on: the hosted
/// backend's login, project and experiment registration surface. Everything
/// else the backend offers (datasets, functions, full experiment CRUD) is out
/// of scope and reachable only by swapping in a different implementation of
/// this trait.
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    async fn login(&self, app_url: &str, api_key: &str) -> Result<Vec<OrgInfo>, BackendError>;

    async fn register_project(
        &self,
        api_url: &str,
        api_key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError>;

    async fn register_experiment(
        &self,
        api_url: &str,
        api_key: &str,
        spec: &ExperimentSpec,
    ) -> Result<ExperimentRecord, BackendError>;
}

/// Default [`BackendClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
}

impl HttpBackendClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn bearer(api_key: &str) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| BackendError::Status {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: e.to_string(),
            })?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

impl Default for HttpBackendClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn login(&self, app_url: &str, api_key: &str) -> Result<Vec<OrgInfo>, BackendError> {
        let response = self
            .http
            .post(format!("{app_url}/api/apikey/login"))
            .headers(Self::bearer(api_key)?)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let parsed: LoginResponse = response.json().await?;
        Ok(parsed.org_info)
    }

    async fn register_project(
        &self,
        api_url: &str,
        api_key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError> {
        let response = self
            .http
            .post(format!("{api_url}/api/project/register"))
            .headers(Self::bearer(api_key)?)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn register_experiment(
        &self,
        api_url: &str,
        api_key: &str,
        spec: &ExperimentSpec,
    ) -> Result<ExperimentRecord, BackendError> {
        let response = self
            .http
            .post(format!("{api_url}/api/experiment/register"))
            .headers(Self::bearer(api_key)?)
            .json(&serde_json::json!({
                "name": spec.name,
                "project_id": spec.project_id,
                "update": spec.update,
                "tags": spec.tags,
                "metadata": spec.metadata,
            }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }
}
