//! Library-level configuration for a [`crate::Pipeline`].

use std::path::PathBuf;
use std::time::Duration;

use crate::enrich::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE};
use crate::error::PipelineError;
use crate::github::DEFAULT_API_BASE;
use crate::retry::RetryPolicy;
use crate::screenshot::DEFAULT_RAW_CONTENT_BASE;

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "public/data/repos.json";

/// Default directory for mirrored screenshots.
pub const DEFAULT_IMAGES_DIR: &str = "public/images/repos";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Account whose repositories are aggregated. Required.
    pub username: String,
    /// Optional API token, sent as `Authorization: token <t>`.
    pub token: Option<String>,
    /// Lowercased topics whose repositories are dropped.
    pub exclude_topics: Vec<String>,
    /// Cache entry lifetime; zero keeps entries until cleared.
    pub cache_ttl: Duration,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub api_base: String,
    pub raw_content_base: String,
    pub snapshot_path: PathBuf,
    pub images_dir: PathBuf,
    /// Never write the snapshot or images (e.g. serverless deployments).
    pub read_only: bool,
    /// Download screenshots on `full` runs.
    pub mirror_screenshots: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: None,
            exclude_topics: Vec::new(),
            cache_ttl: Duration::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            raw_content_base: DEFAULT_RAW_CONTENT_BASE.to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            read_only: false,
            mirror_screenshots: true,
        }
    }
}

impl PipelineConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Check required values before any remote call is made.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.username.trim().is_empty() {
            return Err(PipelineError::configuration(
                "GitHub username not configured",
            ));
        }
        for (label, value) in [
            ("api_base", &self.api_base),
            ("raw_content_base", &self.raw_content_base),
        ] {
            url::Url::parse(value).map_err(|e| {
                PipelineError::configuration(format!("{} is not a valid URL ({}): {}", label, value, e))
            })?;
        }
        if self.request_timeout.is_zero() {
            return Err(PipelineError::configuration(
                "request_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Whether screenshots should be mirrored on this run.
    pub fn should_mirror(&self) -> bool {
        self.mirror_screenshots && !self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.api_base, "https://api.github.com");
        assert!(config.cache_ttl.is_zero());
        assert!(config.should_mirror());
    }

    #[test]
    fn test_missing_username_is_configuration_error() {
        let err = PipelineConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_invalid_api_base_is_rejected() {
        let config = PipelineConfig {
            api_base: "not a url".to_string(),
            ..PipelineConfig::new("bob")
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_base"));
    }

    #[test]
    fn test_valid_config() {
        assert!(PipelineConfig::new("bob").validate().is_ok());
    }

    #[test]
    fn test_read_only_disables_mirroring() {
        let config = PipelineConfig {
            read_only: true,
            ..PipelineConfig::new("bob")
        };
        assert!(!config.should_mirror());
    }
}
