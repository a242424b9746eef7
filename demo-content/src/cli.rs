/// # demo-content CLI Interface
///
/// This module implements the CLI for demo-content: command parsing, argument
/// validation and the async entrypoint.
///
/// All pipeline logic (allocation, enrichment, image sourcing, orchestration)
/// lives in [`demo-content-core`]. This module is strictly CLI glue: it loads the
/// YAML config, builds the clients and the sink, runs one populate pass and
/// prints what was created.
///
/// ## How To Use
/// - From the command line: `demo-content populate --help`.
/// - Programmatically: call [`run`] with a constructed [`Cli`].
///
/// [`demo-content-core`]: ../../demo_content_core/
use crate::load_config::{load_config, CliConfig, SinkConfig};
use crate::wordpress::WordPressClient;
use crate::wxr::WxrExport;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use demo_content_core::config::{ImageChance, PopulateConfig, Quotas};
use demo_content_core::images::FeedClient;
use demo_content_core::media_cache::DownloadCache;
use demo_content_core::populate::{populate, PopulateReport};
use demo_content_core::wikipedia::WikipediaClient;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::str::FromStr;

/// CLI for demo-content: fill a site with encyclopedia articles and stock photos.
#[derive(Parser)]
#[clap(
    name = "demo-content",
    version,
    about = "Populate a site with demo content from a Wikipedia category and a photo feed"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create content items from the articles of one category
    Populate(PopulateArgs),
}

#[derive(Debug, Args)]
pub struct PopulateArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,

    /// Encyclopedia category to take articles from, e.g. "Dogs"
    #[clap(long = "from", value_name = "CATEGORY")]
    pub category: String,

    /// How many items of a content type to create; repeatable
    #[clap(long = "count", value_name = "TYPE=N", required = true)]
    pub counts: Vec<QuotaArg>,

    /// Share of items that get a featured image
    #[clap(long = "with-images", value_name = "CHANCE", default_value = "most")]
    pub image_chance: ImageChance,

    /// Photo feed category; defaults to --from
    #[clap(long = "images-from", value_name = "CATEGORY")]
    pub image_category: Option<String>,

    /// Delete existing items of the requested types first
    #[clap(long)]
    pub replace: bool,

    /// Author id for created items
    #[clap(long)]
    pub author: Option<i64>,
}

impl PopulateArgs {
    pub fn populate_config(&self) -> PopulateConfig {
        PopulateConfig {
            category: self.category.clone(),
            image_category: self.image_category.clone(),
            quotas: self
                .counts
                .iter()
                .map(|q| (q.content_type.clone(), q.count))
                .collect::<Quotas>(),
            image_chance: self.image_chance,
            replace: self.replace,
            author: self.author,
        }
    }
}

/// One `--count type=n` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaArg {
    pub content_type: String,
    pub count: usize,
}

impl FromStr for QuotaArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (content_type, count) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TYPE=N, got '{s}'"))?;
        let content_type = content_type.trim();
        if content_type.is_empty() {
            return Err(format!("missing content type in '{s}'"));
        }
        let count = count
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid count in '{s}': {e}"))?;
        Ok(QuotaArg {
            content_type: content_type.to_string(),
            count,
        })
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Populate(args) => {
            let config = load_config(&args.config)?;
            let populate_config = args.populate_config();
            tracing::info!(command = "populate", category = %populate_config.category, "Starting populate");

            let report = populate_with(&config, &populate_config)
                .await
                .map_err(|e| {
                    tracing::error!(command = "populate", error = %e, "Populate failed");
                    e
                })?;
            print_report(&report);
            tracing::info!(
                command = "populate",
                created = report.created.len(),
                warnings = report.warnings.len(),
                "Populate complete"
            );
            Ok(())
        }
    }
}

async fn populate_with(config: &CliConfig, populate_config: &PopulateConfig) -> Result<PopulateReport> {
    let source = WikipediaClient::new(&config.wikipedia).context("Failed to build encyclopedia client")?;
    let images = FeedClient::new(&config.images).context("Failed to build photo feed client")?;
    let mut cache = open_download_cache(config)?;
    let mut rng = StdRng::from_os_rng();

    match &config.sink {
        SinkConfig::Wordpress(wp) => {
            let sink = WordPressClient::new(wp).context("Failed to build WordPress client")?;
            let report = populate(populate_config, &source, &images, &sink, &mut cache, &mut rng).await?;
            Ok(report)
        }
        SinkConfig::Wxr(wxr) => {
            let sink = WxrExport::new(wxr.clone());
            let report = populate(populate_config, &source, &images, &sink, &mut cache, &mut rng).await?;
            sink.write()
                .with_context(|| format!("Failed to write export {:?}", wxr.path))?;
            println!("Wrote {} items to {}", sink.item_count(), wxr.path.display());
            Ok(report)
        }
    }
}

/// Download cache for the configured sink.
///
/// WordPress media ids are scoped to the site's base URL. A WXR export numbers
/// its media from scratch each run, so it always gets an in-memory cache.
pub fn open_download_cache(config: &CliConfig) -> Result<DownloadCache> {
    match (&config.cache_path, &config.sink) {
        (Some(path), SinkConfig::Wordpress(wp)) => {
            DownloadCache::load(path, wp.base_url.trim_end_matches('/'))
                .with_context(|| format!("Failed to load download cache {path:?}"))
        }
        (Some(path), SinkConfig::Wxr(_)) => {
            tracing::info!(cache_path = ?path, "Ignoring download cache: WXR media ids are local to one export");
            Ok(DownloadCache::in_memory())
        }
        (None, _) => Ok(DownloadCache::in_memory()),
    }
}

fn print_report(report: &PopulateReport) {
    for warning in &report.warnings {
        println!("Warning: {warning}");
    }
    for item in &report.created {
        println!(
            "Created {} [{}], from {}",
            item.content_type, item.item_id, item.title
        );
    }
    println!(
        "Success: created {} of {} requested items ({} with images)",
        report.created.len(),
        report.requested,
        report.images_attached()
    );
}
