use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_IMAGE_SEARCH_URL: &str = "http://www.pexels.com/search/";

/// Connection settings for the encyclopedia API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Site being populated; sent in the User-Agent so the API owner can reach us.
    #[serde(default)]
    pub site_url: Option<String>,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_url: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Connection settings for the photo search feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFeedConfig {
    /// Prefix the url-encoded category and `/feed/` are appended to.
    #[serde(default = "default_image_search_url")]
    pub search_url: String,
}

impl Default for ImageFeedConfig {
    fn default() -> Self {
        Self {
            search_url: default_image_search_url(),
        }
    }
}

fn default_image_search_url() -> String {
    DEFAULT_IMAGE_SEARCH_URL.to_string()
}

/// How many created items should get a featured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageChance {
    All,
    #[default]
    Most,
    Some,
    Few,
    None,
}

impl ImageChance {
    /// Attachment threshold in percent.
    pub fn percent(self) -> u32 {
        match self {
            ImageChance::All => 100,
            ImageChance::Most => 75,
            ImageChance::Some => 50,
            ImageChance::Few => 25,
            ImageChance::None => 0,
        }
    }

    pub fn is_none(self) -> bool {
        self == ImageChance::None
    }

    /// Draws in `[0, 100]` and attaches when the draw is at or below the threshold.
    /// `None` never attaches, whatever the draw.
    pub fn decide<R: rand::Rng + ?Sized>(self, rng: &mut R) -> bool {
        if self.is_none() {
            return false;
        }
        rng.random_range(0..=100u32) <= self.percent()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown image chance '{0}', expected one of all, most, some, few, none")]
pub struct UnknownImageChance(String);

impl FromStr for ImageChance {
    type Err = UnknownImageChance;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ImageChance::All),
            "most" => Ok(ImageChance::Most),
            "some" => Ok(ImageChance::Some),
            "few" => Ok(ImageChance::Few),
            "none" => Ok(ImageChance::None),
            _ => Err(UnknownImageChance(s.to_string())),
        }
    }
}

impl fmt::Display for ImageChance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageChance::All => "all",
            ImageChance::Most => "most",
            ImageChance::Some => "some",
            ImageChance::Few => "few",
            ImageChance::None => "none",
        };
        f.write_str(name)
    }
}

/// Requested count for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub content_type: String,
    pub count: usize,
}

/// Ordered content-type quotas. Declaration order is the allocation order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quotas(Vec<Quota>);

impl Quotas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` to `content_type`, appending the type if it is new.
    pub fn add(&mut self, content_type: &str, count: usize) {
        match self.0.iter_mut().find(|q| q.content_type == content_type) {
            Some(existing) => existing.count += count,
            None => self.0.push(Quota {
                content_type: content_type.to_string(),
                count,
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|q| q.count).sum()
    }

    pub fn get(&self, content_type: &str) -> usize {
        self.0
            .iter()
            .find(|q| q.content_type == content_type)
            .map_or(0, |q| q.count)
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|q| q.content_type.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quota> {
        self.0.iter()
    }

    /// Decrements the first type with remaining quota and returns its name.
    pub(crate) fn take_next(&mut self) -> Option<String> {
        let quota = self.0.iter_mut().find(|q| q.count > 0)?;
        quota.count -= 1;
        Some(quota.content_type.clone())
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for Quotas {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut quotas = Quotas::new();
        for (content_type, count) in iter {
            let content_type: String = content_type.into();
            quotas.add(&content_type, count);
        }
        quotas
    }
}

/// Settings for a single populate run.
#[derive(Debug, Clone)]
pub struct PopulateConfig {
    /// Encyclopedia category the articles come from.
    pub category: String,
    /// Photo feed category; falls back to `category`.
    pub image_category: Option<String>,
    pub quotas: Quotas,
    pub image_chance: ImageChance,
    /// Delete existing items of the requested types first.
    pub replace: bool,
    pub author: Option<i64>,
}

impl PopulateConfig {
    pub fn image_category(&self) -> &str {
        self.image_category.as_deref().unwrap_or(&self.category)
    }

    pub fn trace_loaded(&self) {
        info!(
            category = %self.category,
            image_category = %self.image_category(),
            total = self.quotas.total(),
            image_chance = %self.image_chance,
            replace = self.replace,
            "Loaded PopulateConfig"
        );
        debug!(?self, "PopulateConfig loaded (full debug)");
    }
}
