//! The enriched repository record stored in snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::GitHubRepo;

/// One repository as served to the front-end.
///
/// `topics` and `languages` are always present (possibly empty). `fork`
/// and `screenshot_source` exist only while a run is in progress and are
/// never written to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(rename = "homepageUrl", default)]
    pub homepage_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub languages: BTreeMap<String, u64>,
    #[serde(rename = "hasReadme", default)]
    pub has_readme: bool,
    #[serde(rename = "readmeContent", default)]
    pub readme_content: Option<String>,
    #[serde(rename = "screenshotUrl", default)]
    pub screenshot_url: Option<String>,
    #[serde(skip)]
    pub fork: bool,
    /// Absolute URL of the screenshot before it was mapped to a local path.
    #[serde(skip)]
    pub screenshot_source: Option<String>,
}

impl From<GitHubRepo> for RepositoryRecord {
    fn from(repo: GitHubRepo) -> Self {
        let homepage_url = repo.homepage.clone().unwrap_or_default();
        Self {
            id: repo.id,
            name: repo.name,
            description: repo.description,
            html_url: repo.html_url,
            homepage: repo.homepage,
            homepage_url,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pushed_at: repo.pushed_at,
            topics: Vec::new(),
            languages: BTreeMap::new(),
            has_readme: false,
            readme_content: None,
            screenshot_url: None,
            fork: repo.fork,
            screenshot_source: None,
        }
    }
}

/// Sort newest first by `created_at`; records without one go last.
pub fn sort_by_created_desc(records: &mut [RepositoryRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
