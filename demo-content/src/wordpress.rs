#![doc = "WordPress REST sink: implements the core `ContentSink` contract against `/wp-json/wp/v2`."]
//
//! # WordPress Sink (CLI <-> Core)
//!
//! This module wires the [`ContentSink`] trait from `demo_content_core::contract`
//! to a live WordPress site over its REST API.
//!
//! ## Client Usage
//!
//! - Construct [`WordPressClient`] from a loaded [`WordPressConfig`]; the
//!   application password comes from `WORDPRESS_APP_PASSWORD` (see `load_config`).
//! - Requests authenticate with HTTP Basic auth (username + application password).
//! - Type lookups (`/types/{type}`) and the active theme's thumbnail support are
//!   fetched once and cached for the lifetime of the client.
//!
//! Every call is attempted once; non-2xx answers become [`SinkError::Rejected`]
//! carrying WordPress' `code: message`.

use crate::load_config::WordPressConfig;
use async_trait::async_trait;
use demo_content_core::contract::{ContentSink, ItemId, MediaId, NewContentItem, TermId};
use demo_content_core::error::SinkError;
use demo_content_core::images::media_filename;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const DELETE_PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, Deserialize)]
struct TypeInfo {
    rest_base: String,
    #[serde(default)]
    taxonomies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum ThumbnailSupport {
    All,
    Types(Vec<String>),
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct WpObject {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WpTerm {
    id: i64,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct WpErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

pub struct WordPressClient {
    http: reqwest::Client,
    api_root: String,
    username: String,
    app_password: String,
    types: Mutex<HashMap<String, TypeInfo>>,
    thumbnails: Mutex<Option<ThumbnailSupport>>,
    // rest_base each created item lives under, for the featured image update.
    item_bases: Mutex<HashMap<ItemId, String>>,
}

impl WordPressClient {
    pub fn new(config: &WordPressConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("demo-content/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        let api_root = format!("{}/wp-json/wp/v2", config.base_url.trim_end_matches('/'));
        tracing::info!(
            api_root = %api_root,
            username = %config.username,
            password_set = !config.app_password.is_empty(),
            "Initialized WordPressClient"
        );
        Ok(WordPressClient {
            http,
            api_root,
            username: config.username.clone(),
            app_password: config.app_password.clone(),
            types: Mutex::new(HashMap::new()),
            thumbnails: Mutex::new(None),
            item_bases: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.app_password))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SinkError> {
        let response = self.authed(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: WpErrorBody = response.json().await.unwrap_or_default();
            return Err(rejection(status, &body));
        }
        Ok(response.json::<T>().await?)
    }

    async fn type_info(&self, content_type: &str) -> Result<TypeInfo, SinkError> {
        let cached = lock(&self.types)?.get(content_type).cloned();
        if let Some(info) = cached {
            return Ok(info);
        }
        let info: TypeInfo = self
            .send_json(
                self.http
                    .get(self.url(&format!("types/{content_type}")))
                    .query(&[("context", "edit")]),
            )
            .await?;
        tracing::debug!(content_type, rest_base = %info.rest_base, "Resolved content type");
        lock(&self.types)?.insert(content_type.to_string(), info.clone());
        Ok(info)
    }

    async fn thumbnail_support(&self) -> Result<ThumbnailSupport, SinkError> {
        let cached = lock(&self.thumbnails)?.clone();
        if let Some(support) = cached {
            return Ok(support);
        }
        let themes: Vec<Value> = self
            .send_json(
                self.http
                    .get(self.url("themes"))
                    .query(&[("status", "active")]),
            )
            .await?;
        let support = match themes
            .first()
            .and_then(|t| t.get("theme_supports"))
            .and_then(|s| s.get("post-thumbnails"))
        {
            Some(Value::Bool(true)) => ThumbnailSupport::All,
            Some(Value::Array(types)) => ThumbnailSupport::Types(
                types
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => ThumbnailSupport::Unsupported,
        };
        tracing::debug!(?support, "Resolved active theme thumbnail support");
        *lock(&self.thumbnails)? = Some(support.clone());
        Ok(support)
    }

    async fn find_term(&self, label: &str) -> Result<Option<TermId>, SinkError> {
        let terms: Vec<WpTerm> = self
            .send_json(
                self.http
                    .get(self.url("categories"))
                    .query(&[("search", label), ("per_page", "100")]),
            )
            .await?;
        Ok(terms
            .into_iter()
            .find(|t| decode_entities(&t.name).eq_ignore_ascii_case(label))
            .map(|t| t.id))
    }

    async fn download(&self, image_url: &str) -> Result<(Vec<u8>, String), SinkError> {
        let response = self.http.get(image_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Transport(format!(
                "image download {image_url} returned {status}"
            )));
        }
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), mime))
    }
}

#[async_trait]
impl ContentSink for WordPressClient {
    async fn ensure_term(&self, label: &str) -> Result<TermId, SinkError> {
        if let Some(id) = self.find_term(label).await? {
            tracing::debug!(label, term_id = id, "Category already exists");
            return Ok(id);
        }

        let response = self
            .authed(self.http.post(self.url("categories")))
            .json(&json!({ "name": label }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let term: WpObject = response.json().await?;
            tracing::info!(label, term_id = term.id, "Created category");
            return Ok(term.id);
        }

        // A concurrent or differently-cased term: WordPress reports its id.
        let body: WpErrorBody = response.json().await.unwrap_or_default();
        if body.code == "term_exists" {
            if let Some(id) = body.data.get("term_id").and_then(Value::as_i64) {
                return Ok(id);
            }
        }
        Err(rejection(status, &body))
    }

    async fn create_item(&self, item: &NewContentItem) -> Result<ItemId, SinkError> {
        let info = self.type_info(&item.content_type).await?;
        let mut body = json!({
            "title": item.title,
            "content": item.body,
            "slug": item.slug,
            "status": "publish",
            "date_gmt": item.publish_date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "comment_status": "closed",
            "ping_status": "closed",
        });
        if !item.term_ids.is_empty() {
            body["categories"] = json!(item.term_ids);
        }
        if let Some(author) = item.author {
            body["author"] = json!(author);
        }

        let created: WpObject = self
            .send_json(self.http.post(self.url(&info.rest_base)).json(&body))
            .await?;
        tracing::info!(
            content_type = %item.content_type,
            item_id = created.id,
            title = %item.title,
            "Created content item"
        );
        lock(&self.item_bases)?.insert(created.id, info.rest_base);
        Ok(created.id)
    }

    async fn attach_media(&self, image_url: &str, item_id: ItemId) -> Result<MediaId, SinkError> {
        let (bytes, mime) = self.download(image_url).await?;
        let filename = media_filename(image_url);
        let media: WpObject = self
            .send_json(
                self.http
                    .post(self.url("media"))
                    .query(&[("post", item_id)])
                    .header(CONTENT_TYPE, mime)
                    .header(
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    )
                    .body(bytes),
            )
            .await?;
        tracing::info!(item_id, media_id = media.id, filename = %filename, "Uploaded media");
        Ok(media.id)
    }

    async fn set_primary_image(&self, item_id: ItemId, media_id: MediaId) -> Result<(), SinkError> {
        let rest_base = lock(&self.item_bases)?
            .get(&item_id)
            .cloned()
            .unwrap_or_else(|| "posts".to_string());
        let _: WpObject = self
            .send_json(
                self.http
                    .post(self.url(&format!("{rest_base}/{item_id}")))
                    .json(&json!({ "featured_media": media_id })),
            )
            .await?;
        tracing::debug!(item_id, media_id, "Set featured image");
        Ok(())
    }

    async fn supports_categories(&self, content_type: &str) -> Result<bool, SinkError> {
        let info = self.type_info(content_type).await?;
        Ok(info.taxonomies.iter().any(|t| t == "category"))
    }

    async fn supports_primary_image(&self, content_type: &str) -> Result<bool, SinkError> {
        Ok(match self.thumbnail_support().await? {
            ThumbnailSupport::All => true,
            ThumbnailSupport::Types(types) => types.iter().any(|t| t == content_type),
            ThumbnailSupport::Unsupported => false,
        })
    }

    async fn delete_items_of_type(&self, content_type: &str) -> Result<usize, SinkError> {
        let info = self.type_info(content_type).await?;
        let mut deleted = 0;
        loop {
            let batch: Vec<WpObject> = self
                .send_json(self.http.get(self.url(&info.rest_base)).query(&[
                    ("per_page", DELETE_PAGE_SIZE),
                    ("status", "any"),
                    ("context", "edit"),
                    ("_fields", "id"),
                ]))
                .await?;
            if batch.is_empty() {
                break;
            }
            for item in batch {
                let _: Value = self
                    .send_json(
                        self.http
                            .delete(self.url(&format!("{}/{}", info.rest_base, item.id)))
                            .query(&[("force", "true")]),
                    )
                    .await?;
                deleted += 1;
            }
        }
        tracing::info!(content_type, deleted, "Deleted existing items");
        Ok(deleted)
    }
}

fn rejection(status: StatusCode, body: &WpErrorBody) -> SinkError {
    if body.code.is_empty() {
        SinkError::Rejected(format!("HTTP {status}"))
    } else {
        SinkError::Rejected(format!("{}: {}", body.code, body.message))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, SinkError> {
    mutex
        .lock()
        .map_err(|_| SinkError::Rejected("client state poisoned".to_string()))
}

/// WordPress returns term names HTML-escaped.
fn decode_entities(name: &str) -> String {
    name.replace("&amp;", "&")
        .replace("&#039;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
