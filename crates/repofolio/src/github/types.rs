//! GitHub API data types.
//!
//! Only the fields the portfolio uses are modelled; everything else in the
//! API payloads is ignored during deserialization.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GitHubError;

/// Accept header for REST v3 responses.
pub const ACCEPT_V3: &str = "application/vnd.github.v3+json";

/// Accept header required by the topics endpoint.
pub const ACCEPT_TOPICS: &str = "application/vnd.github.mercy-preview+json";

/// Repository as returned by `/users/{u}/repos` and `/repos/{u}/{r}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Body of `/repos/{u}/{r}/topics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub names: Vec<String>,
}

/// Body of `/repos/{u}/{r}/readme`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl ReadmeResponse {
    /// Decode the README text.
    ///
    /// Base64 payloads arrive wrapped at 60 columns, so embedded newlines
    /// are stripped before decoding. Any other encoding is passed through.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::Malformed`] when the base64 payload is invalid.
    pub fn decode(&self) -> Result<String, GitHubError> {
        match self.encoding.as_deref() {
            Some("base64") => {
                let cleaned: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(cleaned)
                    .map_err(|e| {
                        GitHubError::malformed(format!("README is not valid base64: {}", e))
                    })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => Ok(self.content.clone()),
        }
    }
}

/// Body of `/repos/{u}/{r}/languages`: language name to byte count.
pub type LanguageBytes = BTreeMap<String, u64>;

/// Public profile from `/users/{u}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
