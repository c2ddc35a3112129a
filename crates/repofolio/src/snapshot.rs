//! The persisted dataset and its file-backed store.
//!
//! A snapshot is a single pretty-printed JSON document:
//!
//! ```json
//! { "metadata": { "generatedAt": "...", "username": "...", "totalRepos": 2, ... },
//!   "repositories": [ ... ] }
//! ```
//!
//! The store never fails a run. Unreadable files load as `None` and write
//! failures are logged and skipped. The last snapshot handed to the store is
//! kept in memory and served before the file, so a read-only deployment
//! reconciles against its own results.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::github::UserProfile;
use crate::progress::{PipelineProgress, ProgressCallback, emit};
use crate::repository::RepositoryRecord;

/// Summary of the most recent partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdate {
    pub timestamp: DateTime<Utc>,
    pub changed_repos: Vec<String>,
    pub total_repos: usize,
}

/// A repository hidden by topic, remembered so reconciliation can tell
/// whether it moved since it was last inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedRepo {
    pub name: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl From<&RepositoryRecord> for ExcludedRepo {
    fn from(record: &RepositoryRecord) -> Self {
        Self {
            name: record.name.clone(),
            updated_at: record.updated_at,
            pushed_at: record.pushed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub generated_at: DateTime<Utc>,
    pub username: String,
    pub total_repos: usize,
    #[serde(default)]
    pub exclude_topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
    /// Language name to number of repositories using it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_stats: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<LastUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_repos: Vec<ExcludedRepo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub repositories: Vec<RepositoryRecord>,
}

impl Snapshot {
    /// Build a snapshot from a freshly fetched repository list.
    pub fn new(
        username: impl Into<String>,
        exclude_topics: Vec<String>,
        repositories: Vec<RepositoryRecord>,
        user_profile: Option<UserProfile>,
    ) -> Self {
        Self {
            metadata: SnapshotMetadata {
                generated_at: Utc::now(),
                username: username.into(),
                total_repos: repositories.len(),
                exclude_topics,
                user_profile,
                language_stats: Some(language_stats(&repositories)),
                last_update: None,
                excluded_repos: Vec::new(),
            },
            repositories,
        }
    }

    /// Remember the repositories dropped by topic exclusion.
    #[must_use]
    pub fn with_excluded(mut self, excluded: &[RepositoryRecord]) -> Self {
        self.metadata.excluded_repos = excluded.iter().map(ExcludedRepo::from).collect();
        self
    }

    /// Forget the exclusion entries of every `refreshed` name, then record
    /// `excluded` (a subset of `refreshed`) with their current timestamps.
    pub fn refresh_excluded(
        &mut self,
        refreshed: &HashSet<&str>,
        excluded: &[RepositoryRecord],
    ) {
        let entries = &mut self.metadata.excluded_repos;
        entries.retain(|e| !refreshed.contains(e.name.as_str()));
        entries.extend(excluded.iter().map(ExcludedRepo::from));
    }

    pub fn find_excluded(&self, name: &str) -> Option<&ExcludedRepo> {
        self.metadata.excluded_repos.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&RepositoryRecord> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

/// Count, per language, how many repositories use it.
pub fn language_stats(repos: &[RepositoryRecord]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for repo in repos {
        for language in repo.languages.keys() {
            *stats.entry(language.clone()).or_insert(0) += 1;
        }
    }
    stats
}

/// Overwrite or insert `fresh` records by name.
///
/// Existing records keep their position and new names are appended in the
/// order given. `generatedAt`, `totalRepos` and `lastUpdate` are refreshed,
/// and `languageStats` is recomputed when the snapshot carries it.
pub fn merge_patch(mut existing: Snapshot, fresh: &[RepositoryRecord]) -> Snapshot {
    let mut index: HashMap<String, usize> = existing
        .repositories
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.clone(), i))
        .collect();

    for record in fresh {
        match index.get(&record.name) {
            Some(&i) => existing.repositories[i] = record.clone(),
            None => {
                index.insert(record.name.clone(), existing.repositories.len());
                existing.repositories.push(record.clone());
            }
        }
    }

    let now = Utc::now();
    let total = existing.repositories.len();
    let metadata = &mut existing.metadata;
    metadata.generated_at = now;
    metadata.total_repos = total;
    metadata.last_update = Some(LastUpdate {
        timestamp: now,
        changed_repos: fresh.iter().map(|r| r.name.clone()).collect(),
        total_repos: total,
    });
    if metadata.language_stats.is_some() {
        metadata.language_stats = Some(language_stats(&existing.repositories));
    }

    existing
}

/// File-backed snapshot storage with an in-memory copy of the latest
/// snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    read_only: bool,
    current: Mutex<Option<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, read_only: bool) -> Self {
        Self {
            path: path.into(),
            read_only,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, snapshot: &Snapshot) {
        *self.current() = Some(snapshot.clone());
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Load the latest snapshot.
    ///
    /// The in-memory copy wins over the file. Returns `None` on first run or
    /// when the file cannot be read or parsed; the cause is logged.
    pub async fn load(&self) -> Option<Snapshot> {
        let remembered = self.current().clone();
        if remembered.is_some() {
            return remembered;
        }

        match self.try_load().await {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    path = %self.path.display(),
                    count = snapshot.repositories.len(),
                    "Loaded snapshot"
                );
                self.remember(&snapshot);
                Some(snapshot)
            }
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "No snapshot on disk");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Ignoring unreadable snapshot: {}", e);
                None
            }
        }
    }

    async fn try_load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write `snapshot` as pretty JSON, creating parent directories.
    ///
    /// The file is written next to its destination and renamed into place
    /// so readers never observe a partial document.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if self.read_only {
            return Err(SnapshotError::ReadOnly);
        }

        let io_err = |source| SnapshotError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        self.remember(snapshot);
        Ok(())
    }

    /// Make `snapshot` the current one and persist it.
    ///
    /// The in-memory copy is updated even when the write is skipped, so
    /// later loads see it either way.
    pub async fn replace(
        &self,
        snapshot: Snapshot,
        on_progress: Option<&ProgressCallback>,
    ) -> Snapshot {
        self.remember(&snapshot);
        match self.write(&snapshot).await {
            Ok(()) => {
                tracing::info!(
                    path = %self.path.display(),
                    count = snapshot.repositories.len(),
                    "Saved snapshot"
                );
                emit(
                    on_progress,
                    PipelineProgress::SnapshotSaved {
                        path: self.path.display().to_string(),
                        total: snapshot.repositories.len(),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "PersistenceError: skipping snapshot write: {}",
                    e
                );
                emit(
                    on_progress,
                    PipelineProgress::SnapshotWriteSkipped {
                        reason: e.to_string(),
                    },
                );
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::GitHubRepo;

    fn record(name: &str, languages: &[&str]) -> RepositoryRecord {
        let mut record = RepositoryRecord::from(GitHubRepo {
            id: 1,
            name: name.to_string(),
            description: None,
            html_url: String::new(),
            homepage: None,
            fork: false,
            created_at: None,
            updated_at: None,
            pushed_at: None,
        });
        for lang in languages {
            record.languages.insert(lang.to_string(), 10);
        }
        record
    }

    fn snapshot(names: &[&str]) -> Snapshot {
        Snapshot::new(
            "bob",
            vec![],
            names.iter().map(|n| record(n, &["Rust"])).collect(),
            None,
        )
    }

    fn names(s: &Snapshot) -> Vec<&str> {
        s.repositories.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_new_sets_totals_and_language_stats() {
        let s = Snapshot::new(
            "bob",
            vec!["private".into()],
            vec![record("a", &["Rust", "Shell"]), record("b", &["Rust"])],
            None,
        );
        assert_eq!(s.metadata.total_repos, 2);
        let stats = s.metadata.language_stats.unwrap();
        assert_eq!(stats.get("Rust"), Some(&2));
        assert_eq!(stats.get("Shell"), Some(&1));
    }

    #[test]
    fn test_merge_patch_with_empty_patch_keeps_repositories() {
        let existing = snapshot(&["a", "b"]);
        let merged = merge_patch(existing.clone(), &[]);
        assert_eq!(merged.repositories, existing.repositories);
        assert_eq!(merged.metadata.total_repos, 2);
        let last = merged.metadata.last_update.unwrap();
        assert!(last.changed_repos.is_empty());
    }

    #[test]
    fn test_merge_patch_overwrites_in_place_and_appends_new() {
        let existing = snapshot(&["a", "b", "c"]);
        let mut updated_b = record("b", &["Go"]);
        updated_b.description = Some("new".into());
        let merged = merge_patch(existing, &[record("d", &["Rust"]), updated_b]);

        assert_eq!(names(&merged), vec!["a", "b", "c", "d"]);
        assert_eq!(merged.repositories[1].description.as_deref(), Some("new"));
        assert_eq!(merged.metadata.total_repos, 4);

        let last = merged.metadata.last_update.as_ref().unwrap();
        assert_eq!(last.changed_repos, vec!["d", "b"]);
        assert_eq!(last.total_repos, 4);

        let stats = merged.metadata.language_stats.unwrap();
        assert_eq!(stats.get("Go"), Some(&1));
        assert_eq!(stats.get("Rust"), Some(&3));
    }

    #[test]
    fn test_merge_patch_is_idempotent() {
        let patch = vec![record("b", &["Go"]), record("z", &[])];
        let once = merge_patch(snapshot(&["a", "b"]), &patch);
        let twice = merge_patch(once.clone(), &patch);
        assert_eq!(once.repositories, twice.repositories);
        assert_eq!(once.metadata.total_repos, twice.metadata.total_repos);
    }

    #[test]
    fn test_merge_patch_collapses_duplicate_names_in_patch() {
        let mut second = record("n", &[]);
        second.description = Some("second".into());
        let merged = merge_patch(snapshot(&["a"]), &[record("n", &[]), second]);
        assert_eq!(names(&merged), vec!["a", "n"]);
        assert_eq!(merged.repositories[1].description.as_deref(), Some("second"));
        assert_eq!(merged.metadata.total_repos, 2);
    }

    #[test]
    fn test_metadata_uses_camel_case_and_omits_absent_fields() {
        let value = serde_json::to_value(snapshot(&["a"])).unwrap();
        let metadata = &value["metadata"];
        assert!(metadata.get("generatedAt").is_some());
        assert_eq!(metadata["totalRepos"], 1);
        assert!(metadata.get("lastUpdate").is_none());
        assert!(metadata.get("userProfile").is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("repos.json"), false);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_load_unparseable_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SnapshotStore::new(path, false).load().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public").join("data").join("repos.json");
        let store = SnapshotStore::new(&path, false);

        let saved = store.replace(snapshot(&["a", "b"]), None).await;
        let loaded = store.load().await.expect("snapshot should load");
        assert_eq!(loaded, saved);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"metadata\""));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_only_store_skips_write_but_returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.json");
        let store = SnapshotStore::new(&path, true);

        let returned = store.replace(snapshot(&["a"]), None).await;
        assert_eq!(names(&returned), vec!["a"]);
        assert!(!path.exists());
        assert!(matches!(
            store.write(&returned).await,
            Err(SnapshotError::ReadOnly)
        ));
        assert_eq!(store.load().await, Some(returned));
    }

    #[tokio::test]
    async fn test_read_only_store_serves_patched_snapshot_over_shipped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.json");
        SnapshotStore::new(&path, false)
            .write(&snapshot(&["a"]))
            .await
            .unwrap();
        let shipped = std::fs::read_to_string(&path).unwrap();

        let store = SnapshotStore::new(&path, true);
        let loaded = store.load().await.unwrap();
        let patched = store
            .replace(merge_patch(loaded, &[record("b", &[])]), None)
            .await;

        assert_eq!(names(&store.load().await.unwrap()), vec!["a", "b"]);
        assert_eq!(store.load().await, Some(patched));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), shipped);
    }

    #[test]
    fn test_refresh_excluded_replaces_entries_of_refreshed_names() {
        let mut s = snapshot(&["a"]).with_excluded(&[record("hidden", &[]), record("old", &[])]);
        let mut moved = record("hidden", &[]);
        moved.pushed_at = Some("2024-06-01T00:00:00Z".parse().unwrap());

        let refreshed: HashSet<&str> = ["hidden", "old", "a"].into_iter().collect();
        s.refresh_excluded(&refreshed, &[moved]);

        let excluded = &s.metadata.excluded_repos;
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].name, "hidden");
        assert!(excluded[0].pushed_at.is_some());
        assert!(s.find_excluded("old").is_none());
    }

    #[test]
    fn test_excluded_repos_serialize_only_when_present() {
        let plain = serde_json::to_value(snapshot(&["a"])).unwrap();
        assert!(plain["metadata"].get("excludedRepos").is_none());

        let hidden = snapshot(&["a"]).with_excluded(&[record("secret", &[])]);
        let value = serde_json::to_value(&hidden).unwrap();
        assert_eq!(value["metadata"]["excludedRepos"][0]["name"], "secret");

        let back: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back.find_excluded("secret").unwrap().name, "secret");
    }
}
