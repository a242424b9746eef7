//! Category fetcher: the first, and only fatal, network step of a run.

use tracing::{error, info};

use crate::contract::EncyclopediaApi;
use crate::error::SourceError;

/// Up to `limit` page titles in `category`.
///
/// Fails with [`SourceError::EmptyCategory`] when the category has no pages.
/// No retries: the caller decides whether the error ends the run.
pub async fn fetch_titles<A>(
    api: &A,
    category: &str,
    limit: usize,
) -> Result<Vec<String>, SourceError>
where
    A: EncyclopediaApi + ?Sized,
{
    info!(category, limit, "Fetching article titles");
    let titles = match api.category_members(category, limit).await {
        Ok(titles) => titles,
        Err(e) => {
            error!(category, error = %e, "Category member request failed");
            return Err(e);
        }
    };

    if titles.is_empty() {
        error!(category, "Category returned no articles");
        return Err(SourceError::EmptyCategory(category.to_string()));
    }

    info!(category, found = titles.len(), "Fetched article titles");
    Ok(titles)
}
