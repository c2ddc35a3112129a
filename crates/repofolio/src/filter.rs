use crate::repository::RepositoryRecord;

/// Normalize a comma-separated topic list: trimmed, lowercased, empties
/// dropped.
pub fn parse_exclude_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn has_excluded_topic(repo: &RepositoryRecord, exclude_topics: &[String]) -> bool {
    repo.topics.iter().any(|topic| {
        let topic = topic.to_lowercase();
        exclude_topics.iter().any(|ex| ex.to_lowercase() == topic)
    })
}

/// Drop repositories tagged with any excluded topic.
///
/// Matching is case-insensitive. An empty exclusion list returns the input
/// unchanged without scanning it.
pub fn filter_excluded(
    repos: Vec<RepositoryRecord>,
    exclude_topics: &[String],
) -> Vec<RepositoryRecord> {
    split_excluded(repos, exclude_topics).0
}

/// Like [`filter_excluded`], but also returns the repositories it dropped.
pub fn split_excluded(
    repos: Vec<RepositoryRecord>,
    exclude_topics: &[String],
) -> (Vec<RepositoryRecord>, Vec<RepositoryRecord>) {
    if exclude_topics.is_empty() {
        return (repos, Vec::new());
    }

    let (removed, kept): (Vec<_>, Vec<_>) = repos
        .into_iter()
        .partition(|repo| has_excluded_topic(repo, exclude_topics));
    tracing::debug!(
        removed = removed.len(),
        remaining = kept.len(),
        "Applied topic exclusion"
    );
    (kept, removed)
}

/// Drop forked repositories.
pub fn filter_forks(repos: Vec<RepositoryRecord>) -> Vec<RepositoryRecord> {
    repos.into_iter().filter(|repo| !repo.fork).collect()
}
