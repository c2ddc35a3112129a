use repofolio::PipelineProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: PipelineProgress) {
        match event {
            PipelineProgress::FetchingRepos { username } => {
                tracing::info!(username = %username, "Listing repositories");
            }

            PipelineProgress::FetchComplete { total } => {
                tracing::info!(total, "Listing complete");
            }

            PipelineProgress::EnrichingRepos { total } => {
                tracing::info!(total, "Enriching repositories");
            }

            PipelineProgress::RepoEnriched {
                name,
                has_readme,
                has_screenshot,
            } => {
                tracing::debug!(repo = %name, has_readme, has_screenshot, "Enriched");
            }

            PipelineProgress::EnrichComplete { total } => {
                tracing::info!(total, "Enrichment complete");
            }

            PipelineProgress::FilterComplete { removed, remaining } => {
                tracing::info!(removed, remaining, "Excluded topics filtered");
            }

            PipelineProgress::CheckComplete { changed, unchanged } => {
                tracing::info!(changed, unchanged, "Checked against snapshot");
            }

            PipelineProgress::MirroringScreenshots { total } => {
                tracing::info!(total, "Mirroring screenshots");
            }

            PipelineProgress::ScreenshotMirrored { name, path } => {
                tracing::debug!(repo = %name, path = %path, "Screenshot saved");
            }

            PipelineProgress::ScreenshotSkipped { name } => {
                tracing::debug!(repo = %name, "Screenshot already present");
            }

            PipelineProgress::ScreenshotFailed { name, error } => {
                tracing::warn!(repo = %name, error = %error, "Failed to mirror screenshot");
            }

            PipelineProgress::SnapshotSaved { path, total } => {
                tracing::info!(path = %path, total, "Snapshot saved");
            }

            PipelineProgress::SnapshotWriteSkipped { reason } => {
                tracing::warn!(reason = %reason, "Snapshot not written");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
