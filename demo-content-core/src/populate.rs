//! High-level pipeline: orchestrates fetch → allocate → enrich → persist → attach.
//!
//! This module runs one populate pass against a content sink:
//!   - Checks what the sink supports for each requested type, and optionally
//!     deletes existing items of those types
//!   - Fetches article titles from the encyclopedia category (fatal on failure)
//!   - Shuffles and allocates titles across the content-type quotas
//!   - Builds the image pool from the photo feed, unless images are off
//!   - For each allocated title, in order: enriches it, creates the item, and
//!     on a winning coin flip attaches one image from the pool. A cached media
//!     id the sink refuses is uploaded again rather than dropped
//!
//! # Error Handling
//! Two severities. A failed category fetch or a sink refusing `create_item`
//! returns [`PopulateError`] and ends the run. Everything else becomes a
//! [`PopulateWarning`]: it is logged, kept in the report, and the run moves on
//! to the next unit of work.
//!
//! # Concurrency
//! Articles are processed one at a time in allocation order. The quota
//! accumulator, the image pool and the download cache are owned by this call.
//!
//! # Navigation
//! - Main entrypoint: [`populate`]
//! - Supporting types: [`PopulateReport`], [`PopulateWarning`], [`CreatedItem`]

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::allocate::allocate;
use crate::category::fetch_titles;
use crate::config::PopulateConfig;
use crate::contract::{ContentSink, EncyclopediaApi, ImageFeed, ItemId, MediaId};
use crate::enrich::enrich;
use crate::error::{PopulateError, SinkError};
use crate::images::{fetch_image_pool, media_filename, ImageCandidate, ImagePool};
use crate::media_cache::DownloadCache;

/// A recoverable event; the affected unit of work was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateWarning {
    /// Images were requested for a type the sink cannot show them on.
    NoPrimaryImageSupport { content_type: String },
    ReplaceFailed { content_type: String, reason: String },
    InsufficientArticles {
        requested: usize,
        found: usize,
        deficit: usize,
    },
    /// The feed could not supply a pool; no images this run.
    ImagePoolUnavailable { reason: String },
    /// One feed item did not resolve to an image.
    ImageUnavailable { page_url: String, reason: String },
    ArticleSkipped {
        title: String,
        content_type: String,
        reason: String,
    },
    ImageAttachFailed {
        title: String,
        image_url: String,
        reason: String,
    },
}

impl fmt::Display for PopulateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulateWarning::NoPrimaryImageSupport { content_type } => write!(
                f,
                "The sink does not support featured images on content type '{content_type}'."
            ),
            PopulateWarning::ReplaceFailed {
                content_type,
                reason,
            } => write!(f, "Could not delete existing {content_type} items: {reason}"),
            PopulateWarning::InsufficientArticles { found, deficit, .. } => write!(
                f,
                "Only {found} articles were found in this category ({deficit} short)."
            ),
            PopulateWarning::ImagePoolUnavailable { reason } => {
                write!(f, "No images this run: {reason}")
            }
            PopulateWarning::ImageUnavailable { page_url, reason } => {
                write!(f, "Skipped image {page_url}: {reason}")
            }
            PopulateWarning::ArticleSkipped { title, reason, .. } => {
                write!(f, "Skipped '{title}': {reason}")
            }
            PopulateWarning::ImageAttachFailed {
                title,
                image_url,
                reason,
            } => write!(f, "Could not attach {image_url} to '{title}': {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedItem {
    pub item_id: ItemId,
    pub content_type: String,
    pub title: String,
    pub media_id: Option<MediaId>,
}

#[derive(Debug, Default)]
pub struct PopulateReport {
    pub requested: usize,
    pub fetched: usize,
    pub deleted: usize,
    pub created: Vec<CreatedItem>,
    pub warnings: Vec<PopulateWarning>,
}

impl PopulateReport {
    fn warn(&mut self, warning: PopulateWarning) {
        warn!(warning = %warning, "[POPULATE][WARN]");
        self.warnings.push(warning);
    }

    /// Number of created items that received an image.
    pub fn images_attached(&self) -> usize {
        self.created.iter().filter(|c| c.media_id.is_some()).count()
    }
}

/// Runs one populate pass. See the module docs for the sequence and error policy.
pub async fn populate<A, F, S, R>(
    config: &PopulateConfig,
    source: &A,
    images: &F,
    sink: &S,
    cache: &mut DownloadCache,
    rng: &mut R,
) -> Result<PopulateReport, PopulateError>
where
    A: EncyclopediaApi + ?Sized,
    F: ImageFeed + ?Sized,
    S: ContentSink + ?Sized,
    R: Rng + ?Sized,
{
    info!("[POPULATE] Starting populate pipeline");
    config.trace_loaded();

    let requested = config.quotas.total();
    if requested == 0 {
        error!("[POPULATE][ERROR] Nothing requested");
        return Err(PopulateError::NothingRequested);
    }
    let mut report = PopulateReport {
        requested,
        ..PopulateReport::default()
    };

    // --- Init: sink capabilities, optional wipe ---
    let mut category_support: HashMap<String, bool> = HashMap::new();
    for content_type in config.quotas.content_types() {
        let supported = match sink.supports_categories(content_type).await {
            Ok(supported) => supported,
            Err(e) => {
                warn!(content_type, error = %e, "[POPULATE] Could not check category support, assuming none");
                false
            }
        };
        category_support.insert(content_type.to_string(), supported);

        if !config.image_chance.is_none() {
            match sink.supports_primary_image(content_type).await {
                Ok(true) => {}
                Ok(false) => report.warn(PopulateWarning::NoPrimaryImageSupport {
                    content_type: content_type.to_string(),
                }),
                Err(e) => {
                    warn!(content_type, error = %e, "[POPULATE] Could not check featured image support")
                }
            }
        }
    }

    if config.replace {
        for content_type in config.quotas.content_types() {
            match sink.delete_items_of_type(content_type).await {
                Ok(deleted) => {
                    info!(content_type, deleted, "[POPULATE] Deleted existing {}s.", content_type);
                    report.deleted += deleted;
                }
                Err(e) => report.warn(PopulateWarning::ReplaceFailed {
                    content_type: content_type.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    // --- FetchCategory ---
    let titles = match fetch_titles(source, &config.category, requested).await {
        Ok(titles) => titles,
        Err(e) => {
            error!(category = %config.category, error = %e, "[POPULATE][ERROR] Category fetch failed");
            return Err(PopulateError::CategoryFetch(e));
        }
    };
    report.fetched = titles.len();

    // --- Allocate ---
    let allocation = allocate(titles, &config.quotas, rng);
    if let Some(shortfall) = allocation.shortfall {
        report.warn(PopulateWarning::InsufficientArticles {
            requested: shortfall.requested,
            found: shortfall.found,
            deficit: shortfall.deficit(),
        });
    }
    info!(
        assigned = allocation.assignments.len(),
        "[POPULATE] Allocated articles across content types"
    );

    // --- Image pool ---
    let mut pool = if config.image_chance.is_none() {
        ImagePool::empty()
    } else {
        match fetch_image_pool(images, config.image_category(), requested).await {
            Ok(mut pool) => {
                for rejected in pool.take_rejected() {
                    report.warn(PopulateWarning::ImageUnavailable {
                        page_url: rejected.page_url,
                        reason: rejected.error.to_string(),
                    });
                }
                pool
            }
            Err(e) => {
                report.warn(PopulateWarning::ImagePoolUnavailable {
                    reason: e.to_string(),
                });
                ImagePool::empty()
            }
        }
    };

    // --- PerArticle ---
    let now = Utc::now();
    for assignment in allocation.assignments {
        let title = assignment.title;
        let content_type = assignment.content_type;
        let with_categories = category_support
            .get(&content_type)
            .copied()
            .unwrap_or(false);

        let record = match enrich(source, sink, &title, &content_type, with_categories, now, rng)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                report.warn(PopulateWarning::ArticleSkipped {
                    title,
                    content_type,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let wants_image = !pool.is_empty() && config.image_chance.decide(rng);

        let item_id = match sink.create_item(&record.into_new_item(config.author)).await {
            Ok(id) => id,
            Err(e) => {
                error!(title = %title, content_type = %content_type, error = %e, "[POPULATE][ERROR] Sink rejected item");
                return Err(PopulateError::SinkRejected {
                    content_type,
                    title,
                    source: e,
                });
            }
        };

        let mut media_id = None;
        if wants_image {
            if let Some(candidate) = pool.take(rng) {
                match attach_image(sink, cache, item_id, &candidate).await {
                    Ok(id) => media_id = Some(id),
                    Err(e) => report.warn(PopulateWarning::ImageAttachFailed {
                        title: title.clone(),
                        image_url: candidate.image_url,
                        reason: e.to_string(),
                    }),
                }
            }
        }

        info!(item_id, content_type = %content_type, title = %title, "[POPULATE] Created {} [{}], from {}", content_type, item_id, title);
        report.created.push(CreatedItem {
            item_id,
            content_type,
            title,
            media_id,
        });
    }

    info!(
        created = report.created.len(),
        images = report.images_attached(),
        warnings = report.warnings.len(),
        images_left = pool.len(),
        "[POPULATE] Done"
    );
    Ok(report)
}

/// Uploads (or reuses) `candidate` and makes it the item's featured image.
async fn attach_image<S>(
    sink: &S,
    cache: &mut DownloadCache,
    item_id: ItemId,
    candidate: &ImageCandidate,
) -> Result<MediaId, SinkError>
where
    S: ContentSink + ?Sized,
{
    let filename = media_filename(&candidate.image_url);
    if let Some(media_id) = cache.get(&candidate.image_url) {
        info!(item_id, media_id, "Already downloaded {}", filename);
        match sink.set_primary_image(item_id, media_id).await {
            Ok(()) => return Ok(media_id),
            Err(e) => {
                warn!(item_id, media_id, error = %e, "[POPULATE] Cached media rejected, uploading {} again", filename)
            }
        }
    }

    info!(item_id, "Downloading & attaching {}", filename);
    let media_id = sink.attach_media(&candidate.image_url, item_id).await?;
    cache.record_or_warn(&candidate.image_url, media_id);
    sink.set_primary_image(item_id, media_id).await?;
    Ok(media_id)
}
