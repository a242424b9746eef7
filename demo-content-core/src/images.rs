//! Image sourcer: candidate pool from a photo feed, and the per-article coin flip.
//!
//! The pool is built once per run from the first `count` feed items. Each
//! item page is scraped for its `itemprop="image"` meta tag; pages without
//! one are recorded as rejections. Candidates leave the pool when taken, so
//! an image is attached at most once per run.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::{debug, info};

use crate::config::ImageFeedConfig;
use crate::contract::ImageFeed;
use crate::error::ImageError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

static META_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta itemprop="image"[^>]*content="([^"]*)"[^>]*>"#)
        .expect("Invalid meta image regex")
});

static IMAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[^?]+\.(jpe?g|jpe|gif|png)\b").expect("Invalid image file regex")
});

/// A feed item page and the image it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub page_url: String,
    pub image_url: String,
}

/// A feed item that did not yield an image.
#[derive(Debug)]
pub struct RejectedImage {
    pub page_url: String,
    pub error: ImageError,
}

/// Images available for attachment during one run. Only ever shrinks.
#[derive(Debug, Default)]
pub struct ImagePool {
    candidates: Vec<ImageCandidate>,
    rejected: Vec<RejectedImage>,
}

impl ImagePool {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_candidates(candidates: Vec<ImageCandidate>) -> Self {
        Self {
            candidates,
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[ImageCandidate] {
        &self.candidates
    }

    /// Removes and returns a uniformly chosen candidate.
    pub fn take<R>(&mut self, rng: &mut R) -> Option<ImageCandidate>
    where
        R: Rng + ?Sized,
    {
        if self.candidates.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.candidates.len());
        Some(self.candidates.swap_remove(index))
    }

    /// Hands over the feed items that failed to resolve while the pool was built.
    pub fn take_rejected(&mut self) -> Vec<RejectedImage> {
        std::mem::take(&mut self.rejected)
    }
}

/// First `itemprop="image"` meta content in an HTML page.
pub fn extract_image_url(html: &str) -> Option<String> {
    META_IMAGE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
}

/// File name to store an image under, ignoring any query string.
pub fn media_filename(image_url: &str) -> String {
    let path = match IMAGE_FILE.find(image_url) {
        Some(m) => m.as_str(),
        None => image_url.split('?').next().unwrap_or(image_url),
    };
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "image".to_string(),
    }
}

/// Direct image URL behind a feed item page.
pub async fn resolve_direct_url<F>(feed: &F, page_url: &str) -> Result<String, ImageError>
where
    F: ImageFeed + ?Sized,
{
    let body = feed.page_body(page_url).await?;
    if body.trim().is_empty() {
        return Err(ImageError::EmptyResponse);
    }
    extract_image_url(&body).ok_or_else(|| ImageError::NoImageFound(page_url.to_string()))
}

/// Builds the run's image pool from the first `count` items of the feed for `category`.
///
/// Fails with [`ImageError::InsufficientImages`] when the feed has fewer than
/// `count` items. Items that do not resolve are kept in the pool's rejections;
/// duplicate image URLs are dropped.
pub async fn fetch_image_pool<F>(
    feed: &F,
    category: &str,
    count: usize,
) -> Result<ImagePool, ImageError>
where
    F: ImageFeed + ?Sized,
{
    info!(category, count, "Fetching image feed");
    let permalinks = feed.permalinks(category).await?;
    if permalinks.len() < count {
        return Err(ImageError::InsufficientImages {
            wanted: count,
            found: permalinks.len(),
        });
    }

    let mut pool = ImagePool::empty();
    let mut seen = HashSet::new();
    for page_url in permalinks.into_iter().take(count) {
        match resolve_direct_url(feed, &page_url).await {
            Ok(image_url) => {
                if seen.insert(image_url.clone()) {
                    debug!(page_url = %page_url, image_url = %image_url, "Resolved image");
                    pool.candidates.push(ImageCandidate {
                        page_url,
                        image_url,
                    });
                } else {
                    debug!(image_url = %image_url, "Duplicate image dropped");
                }
            }
            Err(error) => {
                debug!(page_url = %page_url, error = %error, "Could not resolve image");
                pool.rejected.push(RejectedImage { page_url, error });
            }
        }
    }

    info!(
        category,
        images = pool.len(),
        rejected = pool.rejected.len(),
        "Image pool ready"
    );
    Ok(pool)
}

/// reqwest-backed [`ImageFeed`] for a search feed at `<search_url><category>/feed/`.
pub struct FeedClient {
    http: reqwest::Client,
    search_url: String,
}

impl FeedClient {
    pub fn new(config: &ImageFeedConfig) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("demo-content/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            search_url: config.search_url.clone(),
        })
    }

    pub fn feed_url(&self, category: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(category.as_bytes()).collect();
        format!("{}{}/feed/", self.search_url, encoded)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ImageError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::Transport(format!("{url} returned HTTP {status}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ImageFeed for FeedClient {
    async fn permalinks(&self, category: &str) -> Result<Vec<String>, ImageError> {
        let url = self.feed_url(category);
        let bytes = self.get(&url).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ImageError::EmptyResponse);
        }
        let feed =
            feed_rs::parser::parse(&bytes[..]).map_err(|e| ImageError::Feed(e.to_string()))?;
        Ok(feed
            .entries
            .into_iter()
            .filter_map(|entry| entry.links.into_iter().next().map(|link| link.href))
            .collect())
    }

    async fn page_body(&self, page_url: &str) -> Result<String, ImageError> {
        Ok(self.get(page_url).await?.text().await?)
    }
}
