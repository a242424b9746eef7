//! Allocator: spreads shuffled titles over the content-type quotas.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::config::Quotas;

/// A title bound to the content type it will be created as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub title: String,
    pub content_type: String,
}

/// Fewer titles came back than the quotas asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientArticles {
    pub requested: usize,
    pub found: usize,
}

impl InsufficientArticles {
    pub fn deficit(&self) -> usize {
        self.requested - self.found
    }
}

#[derive(Debug, Clone)]
pub struct Allocation {
    /// In processing order.
    pub assignments: Vec<Assignment>,
    /// Quota left unfilled after allocation.
    pub remaining: Quotas,
    pub shortfall: Option<InsufficientArticles>,
}

/// Shuffles `titles`, then hands each one to the first type with quota left.
///
/// The category API lists titles alphabetically, so the shuffle keeps every
/// type from getting one end of the alphabet. Titles past the quota total are
/// dropped. `quotas` is not modified; the leftover is returned in
/// [`Allocation::remaining`].
pub fn allocate<R>(mut titles: Vec<String>, quotas: &Quotas, rng: &mut R) -> Allocation
where
    R: Rng + ?Sized,
{
    let requested = quotas.total();
    let found = titles.len();
    titles.shuffle(rng);

    let mut remaining = quotas.clone();
    let mut assignments = Vec::with_capacity(found.min(requested));
    for title in titles {
        let Some(content_type) = remaining.take_next() else {
            debug!(title = %title, "All quotas filled, dropping title");
            continue;
        };
        assignments.push(Assignment {
            title,
            content_type,
        });
    }

    let shortfall = (found < requested).then(|| {
        let shortfall = InsufficientArticles { requested, found };
        debug!(
            requested,
            found,
            deficit = shortfall.deficit(),
            "Only {} articles were found in this category.",
            found
        );
        shortfall
    });

    Allocation {
        assignments,
        remaining,
        shortfall,
    }
}
