#![allow(unused)]

//! # contract: interfaces to every external collaborator of the pipeline
//!
//! The populate pipeline reads from two sources and writes to one sink. Each
//! of them is a trait here so the orchestration can be driven by real HTTP
//! clients, by an offline export, or by `mockall` mocks in tests.
//!
//! - [`EncyclopediaApi`]: category listing and page lookup (Wikipedia-style API).
//! - [`ImageFeed`]: photo search feed plus the permalink pages it points to.
//! - [`ContentSink`]: the CMS the generated content is written to.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall`; mocks are exported under the
//!   default `test-export-mocks` feature so integration tests can use them.
//!
//! ## Adding New Sinks
//! - Implement [`ContentSink`] for the destination.
//! - Map upstream failures to [`SinkError`]; `Rejected` is reserved for the
//!   destination refusing a request, `Transport` for not reaching it.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::{automock, predicate::*};

use crate::error::{ImageError, SinkError, SourceError};

/// Identifier of a taxonomy term in the sink.
pub type TermId = i64;
/// Identifier of a created content item in the sink.
pub type ItemId = i64;
/// Identifier of an uploaded media object in the sink.
pub type MediaId = i64;

/// A page as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_id: i64,
    pub title: String,
    /// Intro extract (HTML). `None` when the API returned no `extract` field.
    pub extract: Option<String>,
    /// Category labels, e.g. `Category:Dog breeds`.
    pub categories: Vec<String>,
}

/// Result of looking a title up: either a page or the missing-page sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLookup {
    Found(Page),
    Missing { title: String },
}

/// An enriched article, ready to be handed to the sink exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub body: String,
    pub term_ids: Vec<TermId>,
    pub content_type: String,
    /// Publish date, whole seconds.
    pub publish_date: NaiveDateTime,
    /// Canonical URL of the article on the encyclopedia.
    pub source_url: String,
    pub slug: String,
}

/// Everything the sink needs to create one content item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContentItem {
    pub content_type: String,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub term_ids: Vec<TermId>,
    pub publish_date: NaiveDateTime,
    pub source_url: String,
    /// Author id in the sink; `None` lets the sink pick its current user.
    pub author: Option<i64>,
}

impl ArticleRecord {
    /// Consumes the record into a sink request.
    pub fn into_new_item(self, author: Option<i64>) -> NewContentItem {
        NewContentItem {
            content_type: self.content_type,
            title: self.title,
            body: self.body,
            slug: self.slug,
            term_ids: self.term_ids,
            publish_date: self.publish_date,
            source_url: self.source_url,
            author,
        }
    }
}

/// Read access to a Wikipedia-style encyclopedia.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait EncyclopediaApi: Send + Sync {
    /// Titles of up to `limit` pages in `category`, in the order the API returns them.
    /// An empty category yields an empty vector, not an error.
    async fn category_members(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<String>, SourceError>;

    /// Intro extract and categories of a page, following redirects.
    async fn page(&self, title: &str) -> Result<PageLookup, SourceError>;

    /// Public URL of an article by title.
    fn article_url(&self, title: &str) -> String;
}

/// Read access to a photo search feed.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageFeed: Send + Sync {
    /// Permalinks of the feed items for a search category, in feed order.
    async fn permalinks(&self, category: &str) -> Result<Vec<String>, ImageError>;

    /// Raw HTML body of an item page.
    async fn page_body(&self, page_url: &str) -> Result<String, ImageError>;
}

/// Trait for writing generated content to a CMS.
///
/// Implemented by the WordPress REST client, the WXR export and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Id of the category term named `label`, creating it when absent.
    async fn ensure_term(&self, label: &str) -> Result<TermId, SinkError>;

    /// Create a published content item.
    async fn create_item(&self, item: &NewContentItem) -> Result<ItemId, SinkError>;

    /// Download the image at `image_url` and store it as media belonging to `item_id`.
    async fn attach_media(&self, image_url: &str, item_id: ItemId) -> Result<MediaId, SinkError>;

    /// Make `media_id` the featured image of `item_id`.
    async fn set_primary_image(&self, item_id: ItemId, media_id: MediaId)
        -> Result<(), SinkError>;

    /// Whether items of `content_type` can carry category terms.
    async fn supports_categories(&self, content_type: &str) -> Result<bool, SinkError>;

    /// Whether items of `content_type` can show a featured image.
    async fn supports_primary_image(&self, content_type: &str) -> Result<bool, SinkError>;

    /// Permanently delete every item of `content_type`, returning how many went.
    async fn delete_items_of_type(&self, content_type: &str) -> Result<usize, SinkError>;
}
