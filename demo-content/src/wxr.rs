//! WXR export sink.
//!
//! Collects terms, content items and image attachments in memory and writes a
//! WordPress eXtended RSS (1.2) file once the run is over, for sites that are
//! populated through the importer rather than the REST API.
//!
//! Ids are local to the export and assigned in creation order; the importer
//! remaps them. Attachments reference their image by URL and are fetched by
//! the importer, so nothing is downloaded here. Because ids are local, a
//! persisted download cache is never used with this sink.

use crate::load_config::WxrConfig;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use demo_content_core::contract::{ContentSink, ItemId, MediaId, NewContentItem, TermId};
use demo_content_core::enrich::slugify;
use demo_content_core::error::SinkError;
use demo_content_core::images::media_filename;
use std::fmt::Write as _;
use std::fs;
use std::sync::{Mutex, MutexGuard};

const WXR_VERSION: &str = "1.2";
const DEFAULT_SITE_URL: &str = "http://localhost";

#[derive(Debug, Clone)]
struct WxrTerm {
    id: TermId,
    name: String,
    slug: String,
}

#[derive(Debug, Clone)]
struct WxrItem {
    id: i64,
    title: String,
    link: String,
    body: String,
    slug: String,
    post_type: String,
    date: NaiveDateTime,
    term_ids: Vec<TermId>,
    author: Option<i64>,
    parent: ItemId,
    thumbnail: Option<MediaId>,
    attachment_url: Option<String>,
}

#[derive(Debug, Default)]
struct ExportState {
    next_id: i64,
    terms: Vec<WxrTerm>,
    items: Vec<WxrItem>,
}

impl ExportState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct WxrExport {
    config: WxrConfig,
    state: Mutex<ExportState>,
}

impl WxrExport {
    pub fn new(config: WxrConfig) -> Self {
        tracing::info!(path = ?config.path, category_types = ?config.category_types, "Initialized WXR export");
        WxrExport {
            config,
            state: Mutex::new(ExportState::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ExportState>, SinkError> {
        self.state
            .lock()
            .map_err(|_| SinkError::Rejected("export state poisoned".to_string()))
    }

    /// Number of content items (attachments excluded) in the export.
    pub fn item_count(&self) -> usize {
        self.state()
            .map(|s| s.items.iter().filter(|i| i.attachment_url.is_none()).count())
            .unwrap_or(0)
    }

    /// The export document as it would be written now.
    pub fn render(&self) -> Result<String, SinkError> {
        let state = self.state()?;
        let site = self
            .config
            .site_url
            .as_deref()
            .unwrap_or(DEFAULT_SITE_URL);
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" ?>"#);
        let _ = writeln!(
            out,
            r#"<rss version="2.0" xmlns:excerpt="http://wordpress.org/export/{v}/excerpt/" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:wfw="http://wellformedweb.org/CommentAPI/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:wp="http://wordpress.org/export/{v}/">"#,
            v = WXR_VERSION
        );
        let _ = writeln!(out, "<channel>");
        let _ = writeln!(out, "\t<title>demo-content</title>");
        let _ = writeln!(out, "\t<link>{}</link>", escape(site));
        let _ = writeln!(out, "\t<pubDate>{}</pubDate>", Utc::now().to_rfc2822());
        let _ = writeln!(out, "\t<wp:wxr_version>{WXR_VERSION}</wp:wxr_version>");
        let _ = writeln!(out, "\t<wp:base_site_url>{}</wp:base_site_url>", escape(site));
        let _ = writeln!(out, "\t<wp:base_blog_url>{}</wp:base_blog_url>", escape(site));

        for term in &state.terms {
            let _ = writeln!(
                out,
                "\t<wp:category><wp:term_id>{}</wp:term_id><wp:category_nicename>{}</wp:category_nicename><wp:category_parent></wp:category_parent><wp:cat_name>{}</wp:cat_name></wp:category>",
                term.id,
                cdata(&term.slug),
                cdata(&term.name)
            );
        }

        for item in &state.items {
            render_item(&mut out, item, &state.terms);
        }

        let _ = writeln!(out, "</channel>");
        let _ = writeln!(out, "</rss>");
        Ok(out)
    }

    /// Writes the export to the configured path, creating parent directories.
    pub fn write(&self) -> Result<(), SinkError> {
        let document = self.render()?;
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.config.path, document)?;
        tracing::info!(path = ?self.config.path, "Wrote WXR export");
        Ok(())
    }
}

fn render_item(out: &mut String, item: &WxrItem, terms: &[WxrTerm]) {
    let date = item.date.format("%Y-%m-%d %H:%M:%S").to_string();
    let is_attachment = item.attachment_url.is_some();

    let _ = writeln!(out, "\t<item>");
    let _ = writeln!(out, "\t\t<title>{}</title>", escape(&item.title));
    let _ = writeln!(out, "\t\t<link>{}</link>", escape(&item.link));
    let _ = writeln!(
        out,
        "\t\t<pubDate>{}</pubDate>",
        item.date.and_utc().to_rfc2822()
    );
    let _ = writeln!(out, "\t\t<guid isPermaLink=\"false\">{}</guid>", escape(&item.link));
    let _ = writeln!(out, "\t\t<content:encoded>{}</content:encoded>", cdata(&item.body));
    let _ = writeln!(out, "\t\t<excerpt:encoded>{}</excerpt:encoded>", cdata(""));
    let _ = writeln!(out, "\t\t<wp:post_id>{}</wp:post_id>", item.id);
    let _ = writeln!(out, "\t\t<wp:post_date>{}</wp:post_date>", cdata(&date));
    let _ = writeln!(out, "\t\t<wp:post_date_gmt>{}</wp:post_date_gmt>", cdata(&date));
    let _ = writeln!(out, "\t\t<wp:comment_status>closed</wp:comment_status>");
    let _ = writeln!(out, "\t\t<wp:ping_status>closed</wp:ping_status>");
    let _ = writeln!(out, "\t\t<wp:post_name>{}</wp:post_name>", cdata(&item.slug));
    let _ = writeln!(
        out,
        "\t\t<wp:status>{}</wp:status>",
        if is_attachment { "inherit" } else { "publish" }
    );
    let _ = writeln!(out, "\t\t<wp:post_parent>{}</wp:post_parent>", item.parent);
    let _ = writeln!(out, "\t\t<wp:post_type>{}</wp:post_type>", cdata(&item.post_type));
    if let Some(author) = item.author {
        let _ = writeln!(out, "\t\t<wp:post_author>{author}</wp:post_author>");
    }
    if let Some(url) = &item.attachment_url {
        let _ = writeln!(out, "\t\t<wp:attachment_url>{}</wp:attachment_url>", cdata(url));
    }
    for term in terms.iter().filter(|t| item.term_ids.contains(&t.id)) {
        let _ = writeln!(
            out,
            "\t\t<category domain=\"category\" nicename=\"{}\">{}</category>",
            escape(&term.slug),
            cdata(&term.name)
        );
    }
    if let Some(thumbnail) = item.thumbnail {
        let _ = writeln!(
            out,
            "\t\t<wp:postmeta><wp:meta_key>{}</wp:meta_key><wp:meta_value>{}</wp:meta_value></wp:postmeta>",
            cdata("_thumbnail_id"),
            cdata(&thumbnail.to_string())
        );
    }
    let _ = writeln!(out, "\t</item>");
}

#[async_trait]
impl ContentSink for WxrExport {
    async fn ensure_term(&self, label: &str) -> Result<TermId, SinkError> {
        let mut state = self.state()?;
        if let Some(term) = state.terms.iter().find(|t| t.name == label) {
            return Ok(term.id);
        }
        let id = state.allocate_id();
        state.terms.push(WxrTerm {
            id,
            name: label.to_string(),
            slug: slugify(label),
        });
        tracing::debug!(label, term_id = id, "Added category to export");
        Ok(id)
    }

    async fn create_item(&self, item: &NewContentItem) -> Result<ItemId, SinkError> {
        let mut state = self.state()?;
        let id = state.allocate_id();
        state.items.push(WxrItem {
            id,
            title: item.title.clone(),
            link: item.source_url.clone(),
            body: item.body.clone(),
            slug: item.slug.clone(),
            post_type: item.content_type.clone(),
            date: item.publish_date,
            term_ids: item.term_ids.clone(),
            author: item.author,
            parent: 0,
            thumbnail: None,
            attachment_url: None,
        });
        tracing::debug!(item_id = id, title = %item.title, "Added item to export");
        Ok(id)
    }

    async fn attach_media(&self, image_url: &str, item_id: ItemId) -> Result<MediaId, SinkError> {
        let mut state = self.state()?;
        let date = state
            .items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.date)
            .ok_or_else(|| SinkError::Rejected(format!("no item {item_id} in export")))?;
        let filename = media_filename(image_url);
        let id = state.allocate_id();
        state.items.push(WxrItem {
            id,
            title: filename.clone(),
            link: image_url.to_string(),
            body: String::new(),
            slug: slugify(&filename),
            post_type: "attachment".to_string(),
            date,
            term_ids: Vec::new(),
            author: None,
            parent: item_id,
            thumbnail: None,
            attachment_url: Some(image_url.to_string()),
        });
        Ok(id)
    }

    async fn set_primary_image(&self, item_id: ItemId, media_id: MediaId) -> Result<(), SinkError> {
        let mut state = self.state()?;
        // Only an attachment of this very item can become its thumbnail.
        let owned = state
            .items
            .iter()
            .any(|i| i.id == media_id && i.attachment_url.is_some() && i.parent == item_id);
        if !owned {
            return Err(SinkError::Rejected(format!(
                "no attachment {media_id} of item {item_id} in export"
            )));
        }
        match state.items.iter_mut().find(|i| i.id == item_id) {
            Some(item) => {
                item.thumbnail = Some(media_id);
                Ok(())
            }
            None => Err(SinkError::Rejected(format!("no item {item_id} in export"))),
        }
    }

    async fn supports_categories(&self, content_type: &str) -> Result<bool, SinkError> {
        Ok(self.config.category_types.iter().any(|t| t == content_type))
    }

    async fn supports_primary_image(&self, _content_type: &str) -> Result<bool, SinkError> {
        Ok(true)
    }

    async fn delete_items_of_type(&self, content_type: &str) -> Result<usize, SinkError> {
        let mut state = self.state()?;
        let removed: Vec<i64> = state
            .items
            .iter()
            .filter(|i| i.post_type == content_type)
            .map(|i| i.id)
            .collect();
        state
            .items
            .retain(|i| !removed.contains(&i.id) && !removed.contains(&i.parent));
        Ok(removed.len())
    }
}

fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
