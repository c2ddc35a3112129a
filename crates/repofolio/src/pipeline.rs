//! The pipeline context and its query modes.
//!
//! A [`Pipeline`] owns the API client, the snapshot store and the in-memory
//! cache for one account. Each mode returns a serializable envelope that a
//! front-end (or the CLI) can emit directly as JSON.
//!
//! # Example
//!
//! ```ignore
//! use repofolio::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::builder()
//!     .config(PipelineConfig::new("octocat"))
//!     .build()?;
//!
//! let check = pipeline.check().await?;
//! if check.needs_full_fetch {
//!     pipeline.full().await?;
//! } else if !check.changed_repos.is_empty() {
//!     pipeline.update(&check.changed_repos).await?;
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::assets::mirror_screenshots;
use crate::batch::run_batched;
use crate::cache::{InMemoryCache, cache_key};
use crate::config::PipelineConfig;
use crate::enrich::RepositoryEnricher;
use crate::error::{PipelineError, Result, short_error_message};
use crate::filter::{filter_forks, split_excluded};
use crate::github::{GitHubClient, PER_PAGE};
use crate::http::HttpTransport;
use crate::progress::{PipelineProgress, ProgressCallback, emit};
use crate::reconcile::check_for_updates;
use crate::repository::{RepositoryRecord, sort_by_created_desc};
use crate::snapshot::{Snapshot, SnapshotStore, merge_patch};

/// Result of [`Pipeline::full`].
#[derive(Debug, Clone, Serialize)]
pub struct FullResponse {
    pub success: bool,
    /// Served from the in-memory cache without touching the API.
    pub cached: bool,
    pub snapshot: Snapshot,
}

/// Result of [`Pipeline::check`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    pub needs_full_fetch: bool,
    pub reason: String,
    pub changed_repos: Vec<String>,
    pub unchanged_repos: Vec<String>,
    pub total_checked: usize,
}

/// Result of [`Pipeline::update`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub success: bool,
    pub needs_full_fetch: bool,
    pub updated_repos: Vec<String>,
    pub repositories: Vec<RepositoryRecord>,
}

/// Result of [`Pipeline::clear`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub success: bool,
    pub cleared_entries: usize,
}

/// Where a README was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeSource {
    Snapshot,
    Cache,
    Api,
}

/// Result of [`Pipeline::readme`].
#[derive(Debug, Clone, Serialize)]
pub struct ReadmeLookup {
    pub success: bool,
    pub name: String,
    /// `None` when the repository has no README.
    pub content: Option<String>,
    pub source: ReadmeSource,
}

/// Envelope for a failed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub needs_full_fetch: bool,
    pub error: String,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        Self {
            success: false,
            needs_full_fetch: false,
            error: short_error_message(err),
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    progress: Option<ProgressCallback>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom HTTP transport instead of reqwest.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Validate the configuration and assemble the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] when no config was given or
    /// it fails validation.
    pub fn build(self) -> Result<Pipeline> {
        let config = self
            .config
            .ok_or_else(|| PipelineError::configuration("missing pipeline config"))?;
        config.validate()?;

        let client = match self.transport {
            Some(transport) => GitHubClient::new_with_transport(
                &config.api_base,
                &config.username,
                config.token.as_deref(),
                config.retry,
                transport,
            ),
            None => GitHubClient::new(
                &config.api_base,
                &config.username,
                config.token.as_deref(),
                config.request_timeout,
                config.retry,
            )
            .map_err(|e| PipelineError::configuration(short_error_message(&e)))?,
        };

        let enricher = RepositoryEnricher::new(client.clone(), config.raw_content_base.clone())
            .with_batching(config.batch_size, config.batch_delay);
        let store = SnapshotStore::new(config.snapshot_path.clone(), config.read_only);
        let cache = InMemoryCache::new(config.cache_ttl);

        Ok(Pipeline {
            config,
            client,
            enricher,
            store,
            cache,
            snapshot_lock: Mutex::new(()),
            progress: self.progress,
        })
    }
}

/// Aggregation and reconciliation context for one account.
pub struct Pipeline {
    config: PipelineConfig,
    client: GitHubClient,
    enricher: RepositoryEnricher,
    store: SnapshotStore,
    cache: InMemoryCache,
    /// Serializes read-modify-write of the snapshot file.
    snapshot_lock: Mutex<()>,
    progress: Option<ProgressCallback>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FullKey<'a> {
    username: &'a str,
    include_forks: bool,
    per_page: u32,
    exclude_topics: Vec<&'a str>,
}

#[derive(Serialize)]
struct ReadmeKey<'a> {
    username: &'a str,
    name: &'a str,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.cache
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }

    fn full_cache_key(&self) -> String {
        let mut exclude_topics: Vec<&str> =
            self.config.exclude_topics.iter().map(String::as_str).collect();
        exclude_topics.sort_unstable();
        cache_key(
            "full",
            &FullKey {
                username: &self.config.username,
                include_forks: false,
                per_page: PER_PAGE,
                exclude_topics,
            },
        )
    }

    /// List every non-fork repository without enrichment.
    async fn list_owned(&self) -> Result<Vec<RepositoryRecord>> {
        emit(
            self.on_progress(),
            PipelineProgress::FetchingRepos {
                username: self.config.username.clone(),
            },
        );
        let listed = self.client.list_all_repositories().await?;
        emit(
            self.on_progress(),
            PipelineProgress::FetchComplete {
                total: listed.len(),
            },
        );

        let records: Vec<RepositoryRecord> =
            listed.into_iter().map(RepositoryRecord::from).collect();
        let before = records.len();
        let owned = filter_forks(records);
        tracing::debug!(forks = before - owned.len(), remaining = owned.len(), "Dropped forks");
        Ok(owned)
    }

    /// Split enriched repositories into kept and topic-excluded.
    fn apply_exclusions(
        &self,
        repos: Vec<RepositoryRecord>,
    ) -> (Vec<RepositoryRecord>, Vec<RepositoryRecord>) {
        let (kept, removed) = split_excluded(repos, &self.config.exclude_topics);
        emit(
            self.on_progress(),
            PipelineProgress::FilterComplete {
                removed: removed.len(),
                remaining: kept.len(),
            },
        );
        (kept, removed)
    }

    async fn maybe_mirror(&self, repos: Vec<RepositoryRecord>) -> Vec<RepositoryRecord> {
        if !self.config.should_mirror() {
            return repos;
        }
        mirror_screenshots(
            &self.client,
            repos,
            &self.config.images_dir,
            self.on_progress(),
        )
        .await
    }

    /// Fetch, enrich and filter everything, then replace the snapshot.
    ///
    /// Repeated calls are served from the in-memory cache until it expires
    /// or is cleared.
    pub async fn full(&self) -> Result<FullResponse> {
        let key = self.full_cache_key();
        if let Some(snapshot) = self.cache.get_as::<Snapshot>(&key) {
            return Ok(FullResponse {
                success: true,
                cached: true,
                snapshot,
            });
        }

        let owned = self.list_owned().await?;
        let enriched = self.enricher.enrich(owned, self.on_progress()).await;
        let (mut repos, excluded) = self.apply_exclusions(enriched);
        sort_by_created_desc(&mut repos);
        let repos = self.maybe_mirror(repos).await;

        let user_profile = match self.client.get_user_profile().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Failed to fetch user profile: {}", short_error_message(&e));
                None
            }
        };

        let snapshot = Snapshot::new(
            self.config.username.clone(),
            self.config.exclude_topics.clone(),
            repos,
            user_profile,
        )
        .with_excluded(&excluded);

        let snapshot = {
            let _guard = self.snapshot_lock.lock().await;
            self.store.replace(snapshot, self.on_progress()).await
        };

        self.cache_snapshot(&key, &snapshot);
        tracing::info!(
            username = %self.config.username,
            count = snapshot.repositories.len(),
            "Full fetch complete"
        );

        Ok(FullResponse {
            success: true,
            cached: false,
            snapshot,
        })
    }

    fn cache_snapshot(&self, key: &str, snapshot: &Snapshot) {
        match serde_json::to_value(snapshot) {
            Ok(value) => self.cache.set(key, value),
            Err(e) => tracing::warn!("Failed to cache snapshot: {}", e),
        }
    }

    /// Compare a fresh listing against the stored snapshot.
    pub async fn check(&self) -> Result<CheckResponse> {
        let Some(stored) = self.store.load().await.filter(|s| !s.is_empty()) else {
            return Ok(CheckResponse {
                success: true,
                needs_full_fetch: true,
                reason: "No snapshot available".to_string(),
                changed_repos: Vec::new(),
                unchanged_repos: Vec::new(),
                total_checked: 0,
            });
        };

        let fresh = self.list_owned().await?;
        let check = check_for_updates(&fresh, Some(&stored));
        emit(
            self.on_progress(),
            PipelineProgress::CheckComplete {
                changed: check.changed.len(),
                unchanged: check.unchanged.len(),
            },
        );

        let reason = if check.changed.is_empty() {
            "Snapshot is up to date".to_string()
        } else {
            format!("{} repositories changed since snapshot", check.changed.len())
        };
        tracing::info!(
            changed = check.changed.len(),
            unchanged = check.unchanged.len(),
            "Update check complete"
        );

        Ok(CheckResponse {
            success: true,
            needs_full_fetch: false,
            reason,
            total_checked: check.total_checked(),
            changed_repos: check.changed,
            unchanged_repos: check.unchanged,
        })
    }

    /// Re-fetch the named repositories and patch them into the snapshot.
    ///
    /// With no names, the repositories reported as changed by
    /// [`Pipeline::check`] are updated. Repositories that no longer exist,
    /// became forks or now carry an excluded topic are removed from the
    /// snapshot. Excluded ones are remembered with their timestamps so the
    /// next check does not report them again.
    pub async fn update(&self, names: &[String]) -> Result<UpdateResponse> {
        let names: Vec<String> = if names.is_empty() {
            let check = self.check().await?;
            if check.needs_full_fetch {
                return Ok(Self::needs_full_fetch_update());
            }
            check.changed_repos
        } else {
            dedupe(names)
        };

        if self.store.load().await.filter(|s| !s.is_empty()).is_none() {
            return Ok(Self::needs_full_fetch_update());
        }

        if names.is_empty() {
            return Ok(UpdateResponse {
                success: true,
                needs_full_fetch: false,
                updated_repos: Vec::new(),
                repositories: Vec::new(),
            });
        }

        let fetched = self.fetch_details(names.clone()).await?;
        let owned = filter_forks(fetched);
        let enriched = self.enricher.enrich(owned, self.on_progress()).await;
        let (kept, excluded) = self.apply_exclusions(enriched);
        let kept = self.maybe_mirror(kept).await;

        let kept_names: HashSet<&str> = kept.iter().map(|r| r.name.as_str()).collect();
        let dropped: HashSet<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| !kept_names.contains(n))
            .collect();

        let snapshot = {
            let _guard = self.snapshot_lock.lock().await;
            // Re-read under the lock so concurrent updates are not lost.
            let Some(mut existing) = self.store.load().await else {
                return Ok(Self::needs_full_fetch_update());
            };
            existing
                .repositories
                .retain(|r| !dropped.contains(r.name.as_str()));
            let refreshed: HashSet<&str> = names.iter().map(String::as_str).collect();
            existing.refresh_excluded(&refreshed, &excluded);
            let merged = merge_patch(existing, &kept);
            self.store.replace(merged, self.on_progress()).await
        };

        self.cache_snapshot(&self.full_cache_key(), &snapshot);
        tracing::info!(
            updated = kept.len(),
            removed = dropped.len(),
            total = snapshot.repositories.len(),
            "Partial update complete"
        );

        Ok(UpdateResponse {
            success: true,
            needs_full_fetch: false,
            updated_repos: kept.iter().map(|r| r.name.clone()).collect(),
            repositories: kept,
        })
    }

    fn needs_full_fetch_update() -> UpdateResponse {
        UpdateResponse {
            success: true,
            needs_full_fetch: true,
            updated_repos: Vec::new(),
            repositories: Vec::new(),
        }
    }

    /// Fetch repository details, leaving out names that no longer exist.
    async fn fetch_details(&self, names: Vec<String>) -> Result<Vec<RepositoryRecord>> {
        let client = &self.client;
        let results = run_batched(
            names,
            self.config.batch_size,
            |name| async move {
                let result = client.get_repository_details(&name).await;
                (name, result)
            },
            self.config.batch_delay,
        )
        .await;

        let mut records = Vec::with_capacity(results.len());
        for (name, result) in results {
            match result {
                Ok(repo) => records.push(RepositoryRecord::from(repo)),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(repo = %name, "Repository no longer exists, removing it");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(records)
    }

    /// Drop every cached response.
    pub fn clear(&self) -> ClearResponse {
        ClearResponse {
            success: true,
            cleared_entries: self.cache.clear(),
        }
    }

    /// README of one repository: snapshot first, then cache, then API.
    pub async fn readme(&self, name: &str) -> Result<ReadmeLookup> {
        if let Some(snapshot) = self.store.load().await
            && let Some(content) = snapshot.find(name).and_then(|r| r.readme_content.clone())
        {
            return Ok(ReadmeLookup {
                success: true,
                name: name.to_string(),
                content: Some(content),
                source: ReadmeSource::Snapshot,
            });
        }

        let key = cache_key(
            "readme",
            &ReadmeKey {
                username: &self.config.username,
                name,
            },
        );
        if let Some(content) = self.cache.get_as::<Option<String>>(&key) {
            return Ok(ReadmeLookup {
                success: true,
                name: name.to_string(),
                content,
                source: ReadmeSource::Cache,
            });
        }

        let content = match self.client.get_repository_readme(name).await {
            Ok(readme) => Some(readme.decode()?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        self.cache.set(key, serde_json::json!(content));

        Ok(ReadmeLookup {
            success: true,
            name: name.to_string(),
            content,
            source: ReadmeSource::Api,
        })
    }
}

fn dedupe(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}
