use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::auth::Token;
use crate::error::{BuildLightError, Result};
use crate::providers::StatusSource;

use super::types::{select_latest, BuildStatus, PipelineRunsResponse};

pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.1";
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Azure DevOps REST client for a single pipeline.
pub struct AzureDevOpsClient {
    client: Client,
    /// `{base}/{organization}/{project}/_apis`
    api_root: Url,
    pipeline_id: String,
    token: Token,
}

impl AzureDevOpsClient {
    /// Create a client for `pipeline_id` in `organization/project`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base_url` is not a usable base URL
    /// or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        organization: &str,
        project: &str,
        pipeline_id: &str,
        token: Token,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("buildlight/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| BuildLightError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_root = Url::parse(base_url)
            .map_err(|e| BuildLightError::Config(format!("Invalid base URL: {e}")))?;
        api_root
            .path_segments_mut()
            .map_err(|()| BuildLightError::Config(format!("Base URL cannot be a base: {base_url}")))?
            .pop_if_empty()
            .extend([organization, project, "_apis"]);

        Ok(Self {
            client,
            api_root,
            pipeline_id: pipeline_id.to_string(),
            token,
        })
    }

    /// Attach the Basic credential: empty user name, token as password.
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth("", Some(self.token.as_str()))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|()| BuildLightError::Fault(format!("Cannot extend API URL {}", self.api_root)))?
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    pub fn runs_url(&self) -> Result<Url> {
        self.api_url(&["pipelines", &self.pipeline_id, "runs"])
    }

    pub fn build_url(&self, build_id: u64) -> Result<Url> {
        self.api_url(&["build", "builds", &build_id.to_string()])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        debug!("GET {url}");

        let response = self
            .auth_request(self.client.get(url.clone()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(BuildLightError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl StatusSource for AzureDevOpsClient {
    /// Two sequential lookups: list the runs, then fetch detail for the
    /// newest one.
    ///
    /// Transport, HTTP and parse failures are logged and reported as
    /// `Ok(None)`. A failed detail request also yields `None` even though
    /// the list entry carries a state and result of its own.
    async fn latest_status(&self) -> Result<Option<BuildStatus>> {
        let runs_url = self.runs_url()?;
        let runs = match self.get_json::<PipelineRunsResponse>(&runs_url).await {
            Ok(response) => {
                debug!(
                    "Pipeline {} reported {} runs",
                    self.pipeline_id, response.count
                );
                response.value
            }
            Err(e) => {
                warn!("Error fetching pipeline runs: {e}");
                return Ok(None);
            }
        };

        let Some(latest) = select_latest(&runs) else {
            warn!("No pipeline runs found for pipeline {}", self.pipeline_id);
            return Ok(None);
        };

        info!(
            "Pipeline: {} (ID: {}), state: {}, result: {}",
            latest.name,
            latest.id,
            latest.state,
            latest.result.as_deref().unwrap_or("N/A")
        );
        debug!(
            "Run {} created {}, finished {}",
            latest.url,
            latest.created_date,
            latest
                .finished_date
                .map_or_else(|| "-".to_string(), |d| d.to_string())
        );

        let build_url = self.build_url(latest.id)?;
        match self.get_json::<BuildStatus>(&build_url).await {
            Ok(build) => Ok(Some(build)),
            Err(e) => {
                warn!("Error fetching build details for run {}: {e}", latest.id);
                Ok(None)
            }
        }
    }
}
