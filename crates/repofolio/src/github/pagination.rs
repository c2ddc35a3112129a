//! Page-by-page listing of an account's repositories.

use super::client::GitHubClient;
use super::error::GitHubError;
use super::types::GitHubRepo;

/// Largest page size the API accepts.
pub const PER_PAGE: u32 = 100;

/// Safety ceiling on the number of pages fetched in one listing.
pub const MAX_PAGES: u32 = 50;

impl GitHubClient {
    /// Fetch every repository of the account, newest first.
    ///
    /// Pages are requested until one comes back short or empty, or until
    /// [`MAX_PAGES`] pages have been read.
    pub async fn list_all_repositories(&self) -> Result<Vec<GitHubRepo>, GitHubError> {
        self.list_all_repositories_paged(PER_PAGE).await
    }

    pub(crate) async fn list_all_repositories_paged(
        &self,
        per_page: u32,
    ) -> Result<Vec<GitHubRepo>, GitHubError> {
        let mut all_items: Vec<GitHubRepo> = Vec::new();
        let mut page = 1u32;

        loop {
            let items = self
                .list_repositories(page, per_page, "created", "desc")
                .await?;
            let count = items.len();
            if count == 0 {
                break;
            }

            all_items.extend(items);
            tracing::debug!(page, count, total = all_items.len(), "Fetched repository page");

            if count < per_page as usize {
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                tracing::warn!(max_pages = MAX_PAGES, "Reached page limit, stopping pagination");
                break;
            }
        }

        tracing::info!(
            username = self.username(),
            count = all_items.len(),
            "Listed repositories"
        );
        Ok(all_items)
    }
}
