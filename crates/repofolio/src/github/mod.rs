//! GitHub API client for the portfolio endpoints.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`types`] - Response payloads and accept headers
//! - [`client`] - Authenticated requests with retry
//! - [`pagination`] - Listing every repository of an account
//!
//! ```ignore
//! use repofolio::github::GitHubClient;
//!
//! let client = GitHubClient::new(api_base, "octocat", None, timeout, retry)?;
//! let repos = client.list_all_repositories().await?;
//! ```

mod client;
mod error;
mod pagination;
mod types;

pub use error::{GitHubError, short_error_message};

pub use types::{
    ACCEPT_TOPICS, ACCEPT_V3, GitHubRepo, LanguageBytes, ReadmeResponse, TopicsResponse,
    UserProfile,
};

pub use client::{DEFAULT_API_BASE, GitHubClient, USER_AGENT};

pub use pagination::{MAX_PAGES, PER_PAGE};
