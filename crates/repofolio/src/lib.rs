//! Repofolio - portfolio data aggregation for a GitHub account.
//!
//! This library lists an account's repositories, enriches each with topics,
//! README, languages and a screenshot, drops forks and excluded topics, and
//! persists the result as a JSON snapshot for a static front-end. Later runs
//! compare a cheap listing against the snapshot and refresh only the
//! repositories whose timestamps moved.
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
//! let full = pipeline.full().await?;
//! println!("{} repositories", full.snapshot.metadata.total_repos);
//! ```

pub mod assets;
pub mod batch;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod github;
pub mod http;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod repository;
pub mod retry;
pub mod screenshot;
pub mod snapshot;

pub use cache::{CacheStats, InMemoryCache, cache_key};
pub use config::PipelineConfig;
pub use error::{PipelineError, SnapshotError, short_error_message};
pub use pipeline::{
    CheckResponse, ClearResponse, ErrorResponse, FullResponse, Pipeline, PipelineBuilder,
    ReadmeLookup, ReadmeSource, UpdateResponse,
};
pub use progress::{PipelineProgress, ProgressCallback};
pub use reconcile::{UpdateCheck, check_for_updates};
pub use repository::RepositoryRecord;
pub use retry::RetryPolicy;
pub use snapshot::{ExcludedRepo, Snapshot, SnapshotMetadata, SnapshotStore, merge_patch};
