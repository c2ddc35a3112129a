//! Staleness detection between a fresh listing and the stored snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::repository::RepositoryRecord;
use crate::snapshot::{ExcludedRepo, Snapshot};

/// Outcome of comparing a fresh listing against a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCheck {
    /// Names that are new or whose timestamps advanced.
    ///
    /// Repositories hidden by topic are compared against the timestamps
    /// recorded when they were excluded.
    pub changed: Vec<String>,
    /// Names whose timestamps did not advance.
    pub unchanged: Vec<String>,
    /// No usable snapshot exists; a full fetch is required.
    pub is_new_snapshot: bool,
}

impl UpdateCheck {
    pub fn total_checked(&self) -> usize {
        self.changed.len() + self.unchanged.len()
    }
}

/// A stored timestamp that is missing is older than any present one.
fn advanced(fresh: Option<DateTime<Utc>>, stored: Option<DateTime<Utc>>) -> bool {
    match (fresh, stored) {
        (Some(f), Some(s)) => f > s,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn moved_since(
    fresh: &RepositoryRecord,
    updated_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
) -> bool {
    advanced(fresh.updated_at, updated_at) || advanced(fresh.pushed_at, pushed_at)
}

fn has_changed(fresh: &RepositoryRecord, stored: &RepositoryRecord) -> bool {
    moved_since(fresh, stored.updated_at, stored.pushed_at)
}

/// Classify each repository of `fresh` as changed or unchanged.
///
/// A repository is changed when it is absent from the snapshot or when
/// either `updated_at` or `pushed_at` is strictly newer than the stored
/// value. Names listed in `excludedRepos` are not absent. Without a snapshot (or with an empty one) nothing is compared
/// and `is_new_snapshot` is set.
pub fn check_for_updates(fresh: &[RepositoryRecord], stored: Option<&Snapshot>) -> UpdateCheck {
    let Some(stored) = stored.filter(|s| !s.is_empty()) else {
        return UpdateCheck {
            is_new_snapshot: true,
            ..Default::default()
        };
    };

    let by_name: HashMap<&str, &RepositoryRecord> = stored
        .repositories
        .iter()
        .map(|r| (r.name.as_str(), r))
        .collect();
    let excluded: HashMap<&str, &ExcludedRepo> = stored
        .metadata
        .excluded_repos
        .iter()
        .map(|e| (e.name.as_str(), e))
        .collect();

    let mut check = UpdateCheck::default();
    for repo in fresh {
        let name = repo.name.as_str();
        let is_changed = match (by_name.get(name), excluded.get(name)) {
            (Some(previous), _) => has_changed(repo, previous),
            (None, Some(hidden)) => moved_since(repo, hidden.updated_at, hidden.pushed_at),
            (None, None) => true,
        };
        if is_changed {
            check.changed.push(repo.name.clone());
        } else {
            check.unchanged.push(repo.name.clone());
        }
    }

    tracing::debug!(
        changed = check.changed.len(),
        unchanged = check.unchanged.len(),
        "Compared listing against snapshot"
    );
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::GitHubRepo;

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(s.parse().unwrap())
    }

    fn record(
        name: &str,
        updated: Option<DateTime<Utc>>,
        pushed: Option<DateTime<Utc>>,
    ) -> RepositoryRecord {
        RepositoryRecord::from(GitHubRepo {
            id: 1,
            name: name.to_string(),
            description: None,
            html_url: String::new(),
            homepage: None,
            fork: false,
            created_at: None,
            updated_at: updated,
            pushed_at: pushed,
        })
    }

    fn stored(records: Vec<RepositoryRecord>) -> Snapshot {
        Snapshot::new("bob", vec![], records, None)
    }

    const T1: &str = "2024-01-01T00:00:00Z";
    const T2: &str = "2024-06-01T00:00:00Z";

    #[test]
    fn test_missing_snapshot_is_new() {
        let check = check_for_updates(&[record("a", ts(T1), ts(T1))], None);
        assert!(check.is_new_snapshot);
        assert!(check.changed.is_empty());
        assert!(check.unchanged.is_empty());
    }

    #[test]
    fn test_empty_snapshot_is_new() {
        let empty = stored(vec![]);
        let check = check_for_updates(&[record("a", ts(T1), ts(T1))], Some(&empty));
        assert!(check.is_new_snapshot);
    }

    #[test]
    fn test_either_timestamp_advancing_marks_changed() {
        let snapshot = stored(vec![
            record("pushed", ts(T1), ts(T1)),
            record("updated", ts(T1), ts(T1)),
            record("same", ts(T1), ts(T1)),
        ]);
        let fresh = vec![
            record("pushed", ts(T1), ts(T2)),
            record("updated", ts(T2), ts(T1)),
            record("same", ts(T1), ts(T1)),
            record("brand-new", ts(T1), ts(T1)),
        ];

        let check = check_for_updates(&fresh, Some(&snapshot));
        assert!(!check.is_new_snapshot);
        assert_eq!(check.changed, vec!["pushed", "updated", "brand-new"]);
        assert_eq!(check.unchanged, vec!["same"]);
        assert_eq!(check.total_checked(), 4);
    }

    #[test]
    fn test_older_fresh_timestamps_are_unchanged() {
        let snapshot = stored(vec![record("a", ts(T2), ts(T2))]);
        let check = check_for_updates(&[record("a", ts(T1), ts(T1))], Some(&snapshot));
        assert_eq!(check.unchanged, vec!["a"]);
    }

    #[test]
    fn test_excluded_repositories_use_recorded_timestamps() {
        let snapshot = stored(vec![record("shown", ts(T1), ts(T1))]).with_excluded(&[
            record("hidden", ts(T1), ts(T1)),
            record("moved", ts(T1), ts(T1)),
        ]);
        let fresh = vec![
            record("shown", ts(T1), ts(T1)),
            record("hidden", ts(T1), ts(T1)),
            record("moved", ts(T1), ts(T2)),
        ];

        let check = check_for_updates(&fresh, Some(&snapshot));
        assert_eq!(check.changed, vec!["moved"]);
        assert_eq!(check.unchanged, vec!["shown", "hidden"]);
    }

    #[test]
    fn test_missing_stored_timestamp_counts_as_older() {
        let snapshot = stored(vec![record("a", ts(T1), None)]);
        let check = check_for_updates(&[record("a", ts(T1), ts(T1))], Some(&snapshot));
        assert_eq!(check.changed, vec!["a"]);

        let snapshot = stored(vec![record("b", ts(T1), ts(T1))]);
        let check = check_for_updates(&[record("b", None, None)], Some(&snapshot));
        assert_eq!(check.unchanged, vec!["b"]);
    }
}
