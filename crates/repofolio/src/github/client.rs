//! GitHub REST client built on the [`HttpTransport`] boundary.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;

use super::error::GitHubError;
use super::types::{
    ACCEPT_TOPICS, ACCEPT_V3, GitHubRepo, LanguageBytes, ReadmeResponse, TopicsResponse,
    UserProfile,
};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::retry::{RetryPolicy, with_retry};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("repofolio/", env!("CARGO_PKG_VERSION"));

/// GitHub API client scoped to a single account.
///
/// Every call goes through [`with_retry`] using the client's
/// [`RetryPolicy`]; only errors for which [`GitHubError::is_retryable`]
/// holds are retried.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    username: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Create a client backed by reqwest.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GitHubClient::new(
    ///     "https://api.github.com",
    ///     "octocat",
    ///     std::env::var("GITHUB_TOKEN").ok().as_deref(),
    ///     Duration::from_secs(30),
    ///     RetryPolicy::default(),
    /// )?;
    /// ```
    pub fn new(
        api_base: &str,
        username: &str,
        token: Option<&str>,
        timeout: StdDuration,
        retry: RetryPolicy,
    ) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Ok(Self::new_with_transport(
            api_base,
            username,
            token,
            retry,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_base: &str,
        username: &str,
        token: Option<&str>,
        retry: RetryPolicy,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.trim_end_matches('/').to_string(),
            username: username.to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            retry,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, url: String, accept: &str) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        }
    }

    async fn send_once(&self, request: HttpRequest) -> Result<HttpResponse, GitHubError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let message = String::from_utf8_lossy(&response.body).trim().to_string();
            return Err(GitHubError::Api {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }

    async fn send_with_retry(&self, url: String, accept: &str) -> Result<Vec<u8>, GitHubError> {
        let label = url.clone();
        let response = with_retry(
            || self.send_once(self.build_request(url.clone(), accept)),
            &self.retry,
            &label,
            GitHubError::is_retryable,
        )
        .await?;
        Ok(response.body)
    }

    /// Issue an authenticated GET against `path` and parse the JSON body.
    pub async fn request(&self, path: &str, accept: &str) -> Result<serde_json::Value, GitHubError> {
        self.get(path, accept).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, accept: &str) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.api_base, path);
        tracing::debug!(path, "GET");
        let body = self.send_with_retry(url, accept).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Download an arbitrary absolute URL, e.g. a screenshot.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, GitHubError> {
        self.send_with_retry(url.to_string(), "*/*").await
    }

    /// Fetch one page of the account's repositories.
    pub async fn list_repositories(
        &self,
        page: u32,
        per_page: u32,
        sort: &str,
        direction: &str,
    ) -> Result<Vec<GitHubRepo>, GitHubError> {
        let path = format!(
            "/users/{}/repos?per_page={}&page={}&sort={}&direction={}",
            self.username, per_page, page, sort, direction
        );
        self.get(&path, ACCEPT_V3).await
    }

    pub async fn get_repository_details(&self, name: &str) -> Result<GitHubRepo, GitHubError> {
        let path = format!("/repos/{}/{}", self.username, name);
        self.get(&path, ACCEPT_V3).await
    }

    pub async fn get_repository_topics(&self, name: &str) -> Result<Vec<String>, GitHubError> {
        let path = format!("/repos/{}/{}/topics", self.username, name);
        let value: serde_json::Value = self.get(&path, ACCEPT_TOPICS).await?;
        let topics: TopicsResponse = serde_json::from_value(value)
            .map_err(|e| GitHubError::malformed(format!("topics for {}: {}", name, e)))?;
        Ok(topics.names)
    }

    pub async fn get_repository_readme(&self, name: &str) -> Result<ReadmeResponse, GitHubError> {
        let path = format!("/repos/{}/{}/readme", self.username, name);
        self.get(&path, ACCEPT_V3).await
    }

    pub async fn get_repository_languages(
        &self,
        name: &str,
    ) -> Result<LanguageBytes, GitHubError> {
        let path = format!("/repos/{}/{}/languages", self.username, name);
        self.get(&path, ACCEPT_V3).await
    }

    pub async fn get_user_profile(&self) -> Result<UserProfile, GitHubError> {
        let path = format!("/users/{}", self.username);
        self.get(&path, ACCEPT_V3).await
    }
}
