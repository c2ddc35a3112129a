//! Screenshot discovery from README Markdown.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Default raw-content host for repository files.
pub const DEFAULT_RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";

/// Site-local directory that mirrored screenshots are served from.
pub const LOCAL_IMAGE_PREFIX: &str = "/images/repos";

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("valid regex"));

/// A screenshot chosen for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Value stored as `screenshotUrl`.
    pub url: String,
    /// Remote file to mirror when `url` is a local path.
    pub source: Option<String>,
}

/// Pick the first Markdown image of `readme` as the repository screenshot.
///
/// Repository-relative paths are resolved against the raw-content host on
/// the `main` branch, `data:` URLs are discarded, and anything on the
/// raw-content host is mapped to `/images/repos/{repo}{ext}`.
pub fn extract_screenshot(
    readme: &str,
    username: &str,
    repo: &str,
    raw_content_base: &str,
) -> Option<Screenshot> {
    let captures = MARKDOWN_IMAGE.captures(readme)?;
    // `![alt](path "title")` carries an optional title after the target.
    let target = captures.get(1)?.as_str().split_whitespace().next()?;

    if target.starts_with("data:") {
        return None;
    }

    let raw_base = raw_content_base.trim_end_matches('/');
    let resolved = if is_repository_relative(target) {
        let clean = target.trim_start_matches("./");
        format!("{}/{}/{}/main/{}", raw_base, username, repo, clean)
    } else {
        target.to_string()
    };

    match local_path_for(&resolved, raw_base, repo) {
        Some(local) => Some(Screenshot {
            url: local,
            source: Some(resolved),
        }),
        None => Some(Screenshot {
            url: resolved,
            source: None,
        }),
    }
}

/// A path with no scheme that is not already rooted at the site.
fn is_repository_relative(target: &str) -> bool {
    if target.starts_with('/') {
        return false;
    }
    matches!(
        Url::parse(target),
        Err(url::ParseError::RelativeUrlWithoutBase)
    )
}

fn local_path_for(resolved: &str, raw_base: &str, repo: &str) -> Option<String> {
    let url = Url::parse(resolved).ok()?;
    let raw = Url::parse(raw_base).ok()?;
    if url.host_str()? != raw.host_str()? {
        return None;
    }
    Some(format!(
        "{}/{}{}",
        LOCAL_IMAGE_PREFIX,
        repo,
        extension_of(url.path())
    ))
}

/// Extension (with the dot) of the last path segment, or `""`.
pub fn extension_of(path: &str) -> &str {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[idx..],
        _ => "",
    }
}
