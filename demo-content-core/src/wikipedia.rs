//! reqwest-backed [`EncyclopediaApi`] for MediaWiki's `api.php`.
//!
//! Responses are decoded into typed structs at this boundary; a page lookup
//! comes out as [`PageLookup::Found`] or [`PageLookup::Missing`] and nothing
//! downstream touches raw JSON.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::WikipediaConfig;
use crate::contract::{EncyclopediaApi, Page, PageLookup};
use crate::error::SourceError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MISSING_PAGE_ID: &str = "-1";

#[derive(Debug, Deserialize)]
struct CategoryMembersResponse {
    query: Option<CategoryMembersQuery>,
}

#[derive(Debug, Deserialize)]
struct CategoryMembersQuery {
    #[serde(default)]
    categorymembers: Vec<CategoryMember>,
}

#[derive(Debug, Deserialize)]
struct CategoryMember {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    query: Option<PageQuery>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: HashMap<String, RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    pageid: Option<i64>,
    title: String,
    missing: Option<serde_json::Value>,
    extract: Option<String>,
    #[serde(default)]
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    title: String,
}

/// Decodes a `list=categorymembers` response into page titles.
pub fn parse_category_members(body: &str) -> Result<Vec<String>, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::EmptyResponse);
    }
    let response: CategoryMembersResponse =
        serde_json::from_str(body).map_err(|_| SourceError::EmptyResponse)?;
    Ok(response
        .query
        .map(|q| q.categorymembers.into_iter().map(|m| m.title).collect())
        .unwrap_or_default())
}

/// Decodes a `prop=extracts|categories` response for `requested_title`.
pub fn parse_page_lookup(requested_title: &str, body: &str) -> Result<PageLookup, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::EmptyResponse);
    }
    let response: PageResponse =
        serde_json::from_str(body).map_err(|_| SourceError::EmptyResponse)?;
    let mut pages = response.query.map(|q| q.pages).unwrap_or_default();

    if let Some(missing) = pages.remove(MISSING_PAGE_ID) {
        return Ok(PageLookup::Missing {
            title: missing.title,
        });
    }

    let Some(raw) = pages.into_values().next() else {
        return Ok(PageLookup::Missing {
            title: requested_title.to_string(),
        });
    };

    match (raw.pageid, raw.missing) {
        (Some(page_id), None) => Ok(PageLookup::Found(Page {
            page_id,
            title: raw.title,
            extract: raw.extract,
            categories: raw.categories.into_iter().map(|c| c.title).collect(),
        })),
        _ => Ok(PageLookup::Missing { title: raw.title }),
    }
}

pub struct WikipediaClient {
    http: reqwest::Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Result<Self, SourceError> {
        let user_agent = match &config.site_url {
            Some(site) => format!("demo-content/{}; {}", env!("CARGO_PKG_VERSION"), site),
            None => format!("demo-content/{}", env!("CARGO_PKG_VERSION")),
        };
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()?;
        info!(api_url = %config.api_url, "Initialised Wikipedia client");
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    async fn get_body(&self, params: &[(&str, &str)]) -> Result<String, SourceError> {
        let resp = self.http.get(&self.api_url).query(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Transport(format!(
                "{} returned HTTP {}",
                self.api_url, status
            )));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl EncyclopediaApi for WikipediaClient {
    async fn category_members(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<String>, SourceError> {
        let cmtitle = format!("Category:{category}");
        let cmlimit = limit.to_string();
        debug!(category, limit, "Requesting category members");
        let body = self
            .get_body(&[
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmlimit", cmlimit.as_str()),
                ("cmtype", "page"),
                ("format", "json"),
                ("continue", ""),
            ])
            .await?;
        parse_category_members(&body)
    }

    async fn page(&self, title: &str) -> Result<PageLookup, SourceError> {
        debug!(title, "Requesting page extract and categories");
        let body = self
            .get_body(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "extracts|categories"),
                ("redirects", "true"),
                ("exintro", "true"),
                ("format", "json"),
                ("continue", ""),
            ])
            .await?;
        parse_page_lookup(title, &body)
    }

    fn article_url(&self, title: &str) -> String {
        let base = self
            .api_url
            .strip_suffix("/w/api.php")
            .unwrap_or_else(|| self.api_url.trim_end_matches('/'));
        format!("{}/wiki/{}", base, title.replace(' ', "_"))
    }
}
