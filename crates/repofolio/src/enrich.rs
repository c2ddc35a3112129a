//! Per-repository enrichment: topics, README, screenshot and languages.
//!
//! Each step fails independently. A failed step logs a warning and leaves
//! its field at the default (`[]`, `{}`, `false` or `None`); enrichment
//! itself never returns an error.

use std::time::Duration;

use crate::batch::run_batched;
use crate::github::{GitHubClient, GitHubError};
use crate::progress::{PipelineProgress, ProgressCallback, emit};
use crate::repository::RepositoryRecord;
use crate::screenshot::extract_screenshot;

/// Repositories enriched concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause between enrichment batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Fills in the per-repository fields of listed repositories.
#[derive(Clone)]
pub struct RepositoryEnricher {
    client: GitHubClient,
    raw_content_base: String,
    batch_size: usize,
    batch_delay: Duration,
}

impl RepositoryEnricher {
    pub fn new(client: GitHubClient, raw_content_base: impl Into<String>) -> Self {
        Self {
            client,
            raw_content_base: raw_content_base.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Set batch size and inter-batch delay.
    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size;
        self.batch_delay = batch_delay;
        self
    }

    /// Enrich every repository, preserving input order.
    pub async fn enrich(
        &self,
        repos: Vec<RepositoryRecord>,
        on_progress: Option<&ProgressCallback>,
    ) -> Vec<RepositoryRecord> {
        let total = repos.len();
        emit(on_progress, PipelineProgress::EnrichingRepos { total });

        let enriched = run_batched(
            repos,
            self.batch_size,
            |repo| async move {
                let repo = self.enrich_one(repo).await;
                emit(
                    on_progress,
                    PipelineProgress::RepoEnriched {
                        name: repo.name.clone(),
                        has_readme: repo.has_readme,
                        has_screenshot: repo.screenshot_url.is_some(),
                    },
                );
                repo
            },
            self.batch_delay,
        )
        .await;

        emit(on_progress, PipelineProgress::EnrichComplete { total });
        tracing::info!(count = total, "Enriched repositories");
        enriched
    }

    /// Run all four enrichment steps for a single repository.
    pub async fn enrich_one(&self, mut repo: RepositoryRecord) -> RepositoryRecord {
        let name = repo.name.clone();
        let (topics, readme, languages) = tokio::join!(
            self.client.get_repository_topics(&name),
            self.fetch_readme(&name),
            self.client.get_repository_languages(&name),
        );

        repo.topics = topics.unwrap_or_else(|e| {
            warn_step(&name, "topics", &e);
            Vec::new()
        });

        repo.languages = languages.unwrap_or_else(|e| {
            warn_step(&name, "languages", &e);
            Default::default()
        });

        match readme {
            Some(content) => {
                let screenshot = extract_screenshot(
                    &content,
                    self.client.username(),
                    &name,
                    &self.raw_content_base,
                );
                repo.has_readme = true;
                repo.readme_content = Some(content);
                repo.screenshot_url = screenshot.as_ref().map(|s| s.url.clone());
                repo.screenshot_source = screenshot.and_then(|s| s.source);
            }
            None => {
                repo.has_readme = false;
                repo.readme_content = None;
                repo.screenshot_url = None;
                repo.screenshot_source = None;
            }
        }

        tracing::debug!(
            repo = %name,
            topics = repo.topics.len(),
            languages = repo.languages.len(),
            has_readme = repo.has_readme,
            "Enriched repository"
        );
        repo
    }

    /// Fetch and decode the README; `None` when absent or unusable.
    async fn fetch_readme(&self, name: &str) -> Option<String> {
        let readme = match self.client.get_repository_readme(name).await {
            Ok(readme) => readme,
            Err(e) if e.is_not_found() => {
                tracing::debug!(repo = %name, "No README");
                return None;
            }
            Err(e) => {
                warn_step(name, "readme", &e);
                return None;
            }
        };

        match readme.decode() {
            Ok(content) => Some(content),
            Err(e) => {
                warn_step(name, "readme", &e);
                None
            }
        }
    }
}

fn warn_step(name: &str, step: &str, e: &GitHubError) {
    tracing::warn!(
        repo = %name,
        step,
        "Enrichment step failed: {}",
        crate::error::short_error_message(e)
    );
}
