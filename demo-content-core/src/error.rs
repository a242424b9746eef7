//! Error types for every stage of the populate pipeline.
//!
//! Stage errors (`SourceError`, `EnrichError`, `ImageError`, `SinkError`) are
//! either fatal or recoverable depending on where they surface; only
//! [`PopulateError`] ends a run.

use thiserror::Error;

/// Failures talking to the encyclopedia API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("The response body is empty.")]
    EmptyResponse,
    #[error("No articles in {0} returned.")]
    EmptyCategory(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        SourceError::Transport(e.to_string())
    }
}

/// Why a single article could not be turned into an [`crate::contract::ArticleRecord`].
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("The article '{0}' could not be found.")]
    ArticleNotFound(String),
    #[error("No text found for article '{0}'.")]
    EmptyExtract(String),
    #[error("could not create term '{label}': {source}")]
    Term {
        label: String,
        #[source]
        source: SinkError,
    },
}

/// Failures of the photo feed or of a single image page.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("The response body is empty.")]
    EmptyResponse,
    #[error("could not parse image feed: {0}")]
    Feed(String),
    #[error("Not enough images returned (wanted {wanted}, found {found}).")]
    InsufficientImages { wanted: usize, found: usize },
    #[error("No image was found at {0}.")]
    NoImageFound(String),
}

impl From<reqwest::Error> for ImageError {
    fn from(e: reqwest::Error) -> Self {
        ImageError::Transport(e.to_string())
    }
}

/// Errors reported by a [`crate::contract::ContentSink`] implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport error: {0}")]
    Transport(String),
    #[error("sink rejected request: {0}")]
    Rejected(String),
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("download cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download cache is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors that halt a populate run.
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("no content requested: every quota is zero")]
    NothingRequested,
    #[error("category fetch failed: {0}")]
    CategoryFetch(#[source] SourceError),
    #[error("sink rejected {content_type} '{title}': {source}")]
    SinkRejected {
        content_type: String,
        title: String,
        #[source]
        source: SinkError,
    },
}
