//! Progress events emitted while a pipeline run is in progress.

/// Progress events emitted during pipeline operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PipelineProgress {
    /// Starting to list repositories for an account.
    FetchingRepos {
        /// The account being listed.
        username: String,
    },

    /// Finished listing repositories.
    FetchComplete {
        /// Total repositories returned by the API (forks included).
        total: usize,
    },

    /// Starting per-repository enrichment.
    EnrichingRepos {
        /// Number of repositories to enrich.
        total: usize,
    },

    /// One repository finished enrichment.
    RepoEnriched {
        /// Repository name.
        name: String,
        /// Whether a README was found.
        has_readme: bool,
        /// Whether a screenshot was found.
        has_screenshot: bool,
    },

    /// Enrichment finished for all repositories.
    EnrichComplete {
        /// Number of repositories enriched.
        total: usize,
    },

    /// Topic exclusion applied.
    FilterComplete {
        /// Repositories removed.
        removed: usize,
        /// Repositories remaining.
        remaining: usize,
    },

    /// Staleness check finished.
    CheckComplete {
        /// Repositories that are new or changed.
        changed: usize,
        /// Repositories unchanged since the snapshot.
        unchanged: usize,
    },

    /// Starting to mirror remote screenshots.
    MirroringScreenshots {
        /// Number of screenshots to mirror.
        total: usize,
    },

    /// A screenshot was written to disk.
    ScreenshotMirrored {
        /// Repository name.
        name: String,
        /// Destination path.
        path: String,
    },

    /// A screenshot already existed locally.
    ScreenshotSkipped {
        /// Repository name.
        name: String,
    },

    /// A screenshot could not be mirrored.
    ScreenshotFailed {
        /// Repository name.
        name: String,
        /// Error message.
        error: String,
    },

    /// The snapshot was written.
    SnapshotSaved {
        /// Snapshot file path.
        path: String,
        /// Number of repositories stored.
        total: usize,
    },

    /// The snapshot write was skipped.
    SnapshotWriteSkipped {
        /// Why nothing was written.
        reason: String,
    },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(PipelineProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use repofolio::progress::{emit, PipelineProgress, ProgressCallback};
///
/// fn my_step(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, PipelineProgress::FetchComplete { total: 42 });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: PipelineProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
