//! Configuration file support for repofolio.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REPOFOLIO_`, e.g. `REPOFOLIO_USERNAME`)
//! 3. Legacy environment variables (`GITHUB_USERNAME`, `GITHUB_TOKEN`, `EXCLUDE_TOPICS`)
//! 4. Config file (./repofolio.toml, then ~/.config/repofolio/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! username = "octocat"
//! token = "ghp_..."                  # or use REPOFOLIO_TOKEN / GITHUB_TOKEN
//! exclude_topics = "private, wip"    # a list works too: ["private", "wip"]
//!
//! snapshot_path = "public/data/repos.json"
//! images_dir = "public/images/repos"
//! read_only = false
//! mirror_screenshots = true
//!
//! cache_ttl_secs = 0                 # 0 keeps cached responses until `clear`
//! batch_size = 5
//! batch_delay_ms = 100
//! max_retries = 3
//! backoff_base_ms = 1000
//! timeout_secs = 30
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use repofolio::PipelineConfig;
use repofolio::config::{DEFAULT_IMAGES_DIR, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SNAPSHOT_PATH};
use repofolio::enrich::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE};
use repofolio::filter::parse_exclude_topics;
use repofolio::github::DEFAULT_API_BASE;
use repofolio::retry::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_RETRIES, RetryPolicy};
use repofolio::screenshot::DEFAULT_RAW_CONTENT_BASE;
use serde::Deserialize;

/// Legacy variable names and the keys they feed.
const LEGACY_VARIABLES: [(&str, &str); 3] = [
    ("GITHUB_USERNAME", "username"),
    ("GITHUB_TOKEN", "token"),
    ("EXCLUDE_TOPICS", "exclude_topics"),
];

/// Excluded topics as written in config: a comma-separated string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TopicList {
    Csv(String),
    List(Vec<String>),
}

impl TopicList {
    /// Normalized topics: trimmed, lowercased, empties dropped.
    pub fn topics(&self) -> Vec<String> {
        match self {
            Self::Csv(raw) => parse_exclude_topics(raw),
            Self::List(items) => parse_exclude_topics(&items.join(",")),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub account to aggregate.
    pub username: Option<String>,
    /// GitHub API token.
    pub token: Option<String>,
    pub exclude_topics: Option<TopicList>,
    pub snapshot_path: PathBuf,
    pub images_dir: PathBuf,
    /// Never write the snapshot or mirrored images.
    pub read_only: bool,
    pub mirror_screenshots: bool,
    pub cache_ttl_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_retries: usize,
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
    pub api_base: String,
    pub raw_content_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            exclude_topics: None,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            read_only: false,
            mirror_screenshots: true,
            cache_ttl_secs: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            api_base: DEFAULT_API_BASE.to_string(),
            raw_content_base: DEFAULT_RAW_CONTENT_BASE.to_string(),
        }
    }
}

/// Values given on the command line; `None` leaves the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub username: Option<String>,
    pub exclude_topics: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub read_only: bool,
    pub no_mirror: bool,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/repofolio/config.toml)
    /// 3. Local config file (./repofolio.toml)
    /// 4. Legacy environment variables
    /// 5. Environment variables with REPOFOLIO_ prefix
    pub fn load() -> Self {
        let mut files = Vec::new();
        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            files.push(path);
        }
        let local_config = PathBuf::from("repofolio.toml");
        if local_config.exists() {
            files.push(local_config);
        }

        let legacy = legacy_variables(|name| std::env::var(name).ok());
        match Self::from_sources(&files, legacy, None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    }

    /// Build from explicit sources.
    ///
    /// `env` replaces the process environment for the `REPOFOLIO_` layer
    /// when given.
    pub fn from_sources(
        files: &[PathBuf],
        legacy: config::Map<String, String>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = ConfigBuilder::builder();

        for path in files {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        if !legacy.is_empty() {
            builder = builder.add_source(Environment::default().source(Some(legacy)));
        }

        // e.g. REPOFOLIO_EXCLUDE_TOPICS -> exclude_topics
        let mut prefixed = Environment::with_prefix("REPOFOLIO")
            .prefix_separator("_")
            .try_parsing(true);
        if env.is_some() {
            prefixed = prefixed.source(env);
        }
        builder = builder.add_source(prefixed);

        builder.build()?.try_deserialize::<Config>()
    }

    /// Resolve into a library config, applying command-line overrides.
    pub fn to_pipeline_config(&self, overrides: &Overrides) -> PipelineConfig {
        let username = overrides
            .username
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_default();

        let exclude_topics = match &overrides.exclude_topics {
            Some(raw) => parse_exclude_topics(raw),
            None => self
                .exclude_topics
                .as_ref()
                .map(TopicList::topics)
                .unwrap_or_default(),
        };

        PipelineConfig {
            username,
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            exclude_topics,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            retry: RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms)),
            request_timeout: Duration::from_secs(self.timeout_secs),
            api_base: self.api_base.clone(),
            raw_content_base: self.raw_content_base.clone(),
            snapshot_path: overrides
                .snapshot_path
                .clone()
                .unwrap_or_else(|| self.snapshot_path.clone()),
            images_dir: overrides
                .images_dir
                .clone()
                .unwrap_or_else(|| self.images_dir.clone()),
            read_only: self.read_only || overrides.read_only,
            mirror_screenshots: self.mirror_screenshots && !overrides.no_mirror,
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "repofolio").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Collect the legacy variables that are set, keyed by config field.
pub fn legacy_variables(
    lookup: impl Fn(&str) -> Option<String>,
) -> config::Map<String, String> {
    LEGACY_VARIABLES
        .iter()
        .filter_map(|(var, key)| lookup(var).map(|value| (key.to_string(), value)))
        .collect()
}
