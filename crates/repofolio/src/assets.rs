//! Mirroring of remote screenshots into the site's image directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::run_batched;
use crate::error::short_error_message;
use crate::github::GitHubClient;
use crate::progress::{PipelineProgress, ProgressCallback, emit};
use crate::repository::RepositoryRecord;
use crate::screenshot::{LOCAL_IMAGE_PREFIX, extension_of};

/// Downloads run three at a time.
pub const DOWNLOAD_BATCH_SIZE: usize = 3;

/// Pause between download batches.
pub const DOWNLOAD_BATCH_DELAY: Duration = Duration::from_millis(500);

/// Extension used when the source URL has none.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".png";

struct Download {
    index: usize,
    name: String,
    source: String,
}

fn file_name_for(name: &str, source: &str) -> String {
    let path = url::Url::parse(source)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| source.to_string());
    let ext = match extension_of(&path) {
        "" => DEFAULT_IMAGE_EXTENSION,
        ext => ext,
    };
    format!("{}{}", name, ext)
}

/// Download each record's remote screenshot to `{images_dir}/{repo}{ext}`.
///
/// Existing files are not downloaded again. A mirrored (or already
/// present) image sets `screenshotUrl` to its site-local path; a failed
/// download falls back to the remote URL.
pub async fn mirror_screenshots(
    client: &GitHubClient,
    mut repos: Vec<RepositoryRecord>,
    images_dir: &Path,
    on_progress: Option<&ProgressCallback>,
) -> Vec<RepositoryRecord> {
    let downloads: Vec<Download> = repos
        .iter()
        .enumerate()
        .filter_map(|(index, repo)| {
            repo.screenshot_source.as_ref().map(|source| Download {
                index,
                name: repo.name.clone(),
                source: source.clone(),
            })
        })
        .collect();

    if downloads.is_empty() {
        return repos;
    }

    if let Err(e) = tokio::fs::create_dir_all(images_dir).await {
        tracing::warn!(
            dir = %images_dir.display(),
            "Cannot create image directory, keeping remote screenshots: {}",
            e
        );
        for download in downloads {
            repos[download.index].screenshot_url = Some(download.source);
        }
        return repos;
    }

    emit(
        on_progress,
        PipelineProgress::MirroringScreenshots {
            total: downloads.len(),
        },
    );

    let results = run_batched(
        downloads,
        DOWNLOAD_BATCH_SIZE,
        |download| async move {
            let url = mirror_one(client, &download, images_dir, on_progress).await;
            (download.index, url)
        },
        DOWNLOAD_BATCH_DELAY,
    )
    .await;

    for (index, url) in results {
        repos[index].screenshot_url = Some(url);
    }
    repos
}

async fn mirror_one(
    client: &GitHubClient,
    download: &Download,
    images_dir: &Path,
    on_progress: Option<&ProgressCallback>,
) -> String {
    let file_name = file_name_for(&download.name, &download.source);
    let target: PathBuf = images_dir.join(&file_name);
    let local_url = format!("{}/{}", LOCAL_IMAGE_PREFIX, file_name);

    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        tracing::debug!(repo = %download.name, path = %target.display(), "Screenshot already present");
        emit(
            on_progress,
            PipelineProgress::ScreenshotSkipped {
                name: download.name.clone(),
            },
        );
        return local_url;
    }

    let result = match client.fetch_bytes(&download.source).await {
        Ok(bytes) => tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(short_error_message(&e)),
    };

    match result {
        Ok(()) => {
            tracing::debug!(repo = %download.name, path = %target.display(), "Mirrored screenshot");
            emit(
                on_progress,
                PipelineProgress::ScreenshotMirrored {
                    name: download.name.clone(),
                    path: target.display().to_string(),
                },
            );
            local_url
        }
        Err(error) => {
            tracing::warn!(repo = %download.name, "Failed to mirror screenshot: {}", error);
            emit(
                on_progress,
                PipelineProgress::ScreenshotFailed {
                    name: download.name.clone(),
                    error,
                },
            );
            download.source.clone()
        }
    }
}
