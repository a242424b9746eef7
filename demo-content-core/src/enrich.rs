//! Article enricher: turns an allocated title into an [`ArticleRecord`].

use std::sync::LazyLock;

use chrono::{DateTime, Months, NaiveDateTime, Timelike, Utc};
use rand::Rng;
use regex::Regex;
use tracing::{debug, info};

use crate::contract::{ArticleRecord, ContentSink, EncyclopediaApi, PageLookup, TermId};
use crate::error::EnrichError;

const CATEGORY_PREFIX: &str = "Category:";
/// Longer category labels are too specific to be useful as terms.
pub const MAX_CATEGORY_WORDS: usize = 4;
const PUBLISH_WINDOW_MONTHS: u32 = 3;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}'-]+").expect("Invalid word regex"));

/// Counts runs of letters, apostrophes and hyphens. Digits do not form words.
pub fn word_count(label: &str) -> usize {
    WORD.find_iter(label).count()
}

/// Category labels worth turning into terms, prefix stripped, in API order.
pub fn usable_category_labels(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .map(|raw| raw.strip_prefix(CATEGORY_PREFIX).unwrap_or(raw).trim())
        .filter(|label| {
            let keep = !label.is_empty() && word_count(label) <= MAX_CATEGORY_WORDS;
            if !keep {
                debug!(label, "Skipping long category label");
            }
            keep
        })
        .map(str::to_string)
        .collect()
}

/// Uniformly random instant in `[now - 3 months, now]`, whole seconds.
pub fn random_publish_date<R>(now: DateTime<Utc>, rng: &mut R) -> NaiveDateTime
where
    R: Rng + ?Sized,
{
    let earliest = now
        .checked_sub_months(Months::new(PUBLISH_WINDOW_MONTHS))
        .unwrap_or(now);
    let secs = rng.random_range(earliest.timestamp()..=now.timestamp());
    match DateTime::from_timestamp(secs, 0) {
        Some(date) => date.naive_utc(),
        None => now.naive_utc().with_nanosecond(0).unwrap_or(now.naive_utc()),
    }
}

/// Lowercase ASCII alphanumerics separated by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Looks up each label in the sink, creating missing terms.
async fn map_terms<S>(sink: &S, labels: &[String]) -> Result<Vec<TermId>, EnrichError>
where
    S: ContentSink + ?Sized,
{
    let mut ids = Vec::with_capacity(labels.len());
    for label in labels {
        let id = sink
            .ensure_term(label)
            .await
            .map_err(|source| EnrichError::Term {
                label: label.clone(),
                source,
            })?;
        ids.push(id);
    }
    Ok(ids)
}

/// Fetches the intro and categories of `title` and builds the record for `content_type`.
///
/// Categories are only mapped to terms when `with_categories` is set, i.e. the
/// sink's type supports them. A page with no usable categories gets an empty
/// term list.
pub async fn enrich<A, S, R>(
    api: &A,
    sink: &S,
    title: &str,
    content_type: &str,
    with_categories: bool,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<ArticleRecord, EnrichError>
where
    A: EncyclopediaApi + ?Sized,
    S: ContentSink + ?Sized,
    R: Rng + ?Sized,
{
    let page = match api.page(title).await? {
        PageLookup::Found(page) => page,
        PageLookup::Missing { title: missing } => {
            debug!(title, resolved = %missing, "Page lookup hit the missing-page sentinel");
            return Err(EnrichError::ArticleNotFound(title.to_string()));
        }
    };

    let body = match page.extract {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(EnrichError::EmptyExtract(title.to_string())),
    };

    let term_ids = if with_categories {
        let labels = usable_category_labels(&page.categories);
        debug!(
            title,
            returned = page.categories.len(),
            usable = labels.len(),
            "Mapping categories to terms"
        );
        map_terms(sink, &labels).await?
    } else {
        Vec::new()
    };

    let record = ArticleRecord {
        source_url: api.article_url(title),
        slug: slugify(title),
        title: title.to_string(),
        body,
        term_ids,
        content_type: content_type.to_string(),
        publish_date: random_publish_date(now, rng),
    };
    info!(
        title,
        content_type,
        terms = record.term_ids.len(),
        publish_date = %record.publish_date,
        "Enriched article"
    );
    Ok(record)
}
