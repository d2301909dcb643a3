use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Credentials;
use crate::error::{JenLensError, Result};

use super::failures::Fetcher;
use super::locator::{self, JobCoordinate, PipelineCoordinate};
use super::types::{BuildNode, RunSummary};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blue Ocean REST client.
///
/// Every request is bounded by [`REQUEST_TIMEOUT`] and carries basic auth
/// when credentials are configured. No retries: each fetch error is final
/// for the one call that made it.
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl JenkinsClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jenlens/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| JenLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = Url::parse(base_url)
            .map_err(|e| JenLensError::Config(format!("Invalid base URL: {e}")))?;

        // A trailing slash keeps Url::join from eating a path prefix when
        // Jenkins is served under one (e.g. https://host/jenkins).
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(credentials) = &self.credentials {
            request.basic_auth(&credentials.user, Some(credentials.token.as_str()))
        } else {
            request
        }
    }

    /// Issues a `GET`, mapping auth and server errors to their error kinds.
    /// Returns `Ok(None)` on 404 so each caller can attach coordinate
    /// context to its own not-found error.
    async fn get(&self, path: &str) -> Result<Option<reqwest::Response>> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| JenLensError::Config(format!("Invalid request path {path}: {e}")))?;

        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(JenLensError::AuthFailure {
                status: status.as_u16(),
            }),
            status if status.is_success() => Ok(Some(response)),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                Err(JenLensError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(response) = self.get(path).await? else {
            return Ok(None);
        };
        let body = response.text().await?;
        let value = serde_json::from_str(&body)
            .map_err(|e| JenLensError::Malformed(format!("{path}: {e}")))?;
        Ok(Some(value))
    }

    /// Most recent runs of a pipeline, newest first as the server emits
    /// them.
    pub async fn fetch_runs(&self, job: &JobCoordinate, limit: usize) -> Result<Vec<RunSummary>> {
        let path = locator::runs_request_path(job, limit);
        self.get_json(&path)
            .await?
            .ok_or_else(|| JenLensError::Api {
                status: 404,
                message: format!("pipeline {} not found", job.path()),
            })
    }
}

#[async_trait]
impl Fetcher for JenkinsClient {
    async fn fetch_step_list(&self, coord: &PipelineCoordinate) -> Result<Vec<BuildNode>> {
        let path = locator::nodes_request_path(coord);
        self.get_json(&path)
            .await?
            .ok_or_else(|| JenLensError::BuildNotFound {
                path: coord.path().to_string(),
                build_number: coord.build_number(),
            })
    }

    async fn fetch_console_text(
        &self,
        coord: &PipelineCoordinate,
        node_id: &str,
    ) -> Result<String> {
        let path = locator::console_request_path(coord, node_id);
        let Some(response) = self.get(&path).await? else {
            return Err(JenLensError::NodeNotFound {
                path: coord.path().to_string(),
                build_number: coord.build_number(),
                node_id: node_id.to_string(),
            });
        };
        Ok(response.text().await?)
    }
}
