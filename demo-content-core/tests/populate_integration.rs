use demo_content_core::config::{ImageChance, PopulateConfig, Quotas};
use demo_content_core::contract::{
    MockContentSink, MockEncyclopediaApi, MockImageFeed, NewContentItem, Page, PageLookup,
};
use demo_content_core::error::{PopulateError, SinkError, SourceError};
use demo_content_core::media_cache::DownloadCache;
use demo_content_core::populate::{populate, PopulateWarning};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

type CallLog = Arc<Mutex<Vec<String>>>;

const MISSING: &str = "Nonexistent hound";

fn config(quotas: Vec<(&str, usize)>, image_chance: ImageChance) -> PopulateConfig {
    PopulateConfig {
        category: "Dogs".to_string(),
        image_category: None,
        quotas: quotas.into_iter().collect::<Quotas>(),
        image_chance,
        replace: false,
        author: Some(1),
    }
}

/// Encyclopedia that lists `titles` and knows every page except [`MISSING`].
fn encyclopedia(titles: Vec<&str>) -> MockEncyclopediaApi {
    let titles: Vec<String> = titles.into_iter().map(str::to_string).collect();
    let mut api = MockEncyclopediaApi::new();
    api.expect_category_members()
        .return_once(move |_, _| Ok(titles));
    api.expect_page().returning(|title| {
        if title == MISSING {
            return Ok(PageLookup::Missing {
                title: title.to_string(),
            });
        }
        Ok(PageLookup::Found(Page {
            page_id: 100,
            title: title.to_string(),
            extract: Some(format!("<p>{title} is a dog breed.</p>")),
            categories: vec![
                "Category:Dog breeds".to_string(),
                "Category:Dog breeds originating in the United Kingdom".to_string(),
            ],
        }))
    });
    api.expect_article_url()
        .returning(|title| format!("https://en.wikipedia.org/wiki/{title}"));
    api
}

/// Photo feed with `n` distinct images.
fn photo_feed(n: usize) -> MockImageFeed {
    let mut feed = MockImageFeed::new();
    feed.expect_permalinks().returning(move |_| {
        Ok((0..n)
            .map(|i| format!("https://www.pexels.com/photo/dog-{i}/"))
            .collect())
    });
    feed.expect_page_body().returning(|page_url| {
        let id = page_url.trim_end_matches('/').rsplit('/').next().unwrap_or("x").to_string();
        Ok(format!(
            r#"<meta itemprop="image" content="https://images.pexels.com/{id}.jpeg?w=500">"#
        ))
    });
    feed
}

/// Sink that records every call; posts support categories, pages do not.
fn recording_sink(log: CallLog) -> MockContentSink {
    let mut sink = MockContentSink::new();
    let next_id = Arc::new(AtomicI64::new(1));

    sink.expect_supports_categories()
        .returning(|content_type| Ok(content_type == "post"));
    sink.expect_supports_primary_image().returning(|_| Ok(true));

    let l = log.clone();
    sink.expect_delete_items_of_type().returning(move |content_type| {
        l.lock().unwrap().push(format!("delete:{content_type}"));
        Ok(2)
    });

    let l = log.clone();
    sink.expect_ensure_term().returning(move |label| {
        l.lock().unwrap().push(format!("term:{label}"));
        Ok(7)
    });

    let l = log.clone();
    let ids = next_id.clone();
    sink.expect_create_item()
        .returning(move |item: &NewContentItem| {
            l.lock()
                .unwrap()
                .push(format!("create:{}:{}", item.content_type, item.title));
            Ok(ids.fetch_add(1, Ordering::SeqCst))
        });

    let l = log.clone();
    let ids = next_id;
    sink.expect_attach_media().returning(move |url, item_id| {
        l.lock().unwrap().push(format!("media:{url}:{item_id}"));
        Ok(1000 + ids.fetch_add(1, Ordering::SeqCst))
    });

    let l = log;
    sink.expect_set_primary_image()
        .returning(move |item_id, media_id| {
            l.lock()
                .unwrap()
                .push(format!("primary:{item_id}:{media_id}"));
            Ok(())
        });
    sink
}

fn calls_starting_with(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

#[tokio::test]
async fn dogs_scenario_allocates_enriches_and_attaches_unique_images() {
    let feed = photo_feed(3);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());

    for seed in 0..10u64 {
        log.lock().unwrap().clear();
        let api = encyclopedia(vec!["Beagle", "Dachshund", "Poodle"]);
        let mut cache = DownloadCache::in_memory();
        let mut rng = StdRng::seed_from_u64(seed);
        let report = populate(
            &config(vec![("post", 2), ("page", 1)], ImageChance::Most),
            &api,
            &feed,
            &sink,
            &mut cache,
            &mut rng,
        )
        .await
        .expect("populate succeeds");

        assert_eq!(report.requested, 3);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.created.len(), 3);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);

        let posts = report.created.iter().filter(|c| c.content_type == "post").count();
        let pages = report.created.iter().filter(|c| c.content_type == "page").count();
        assert_eq!((posts, pages), (2, 1));

        // Terms only for posts, and only the short label.
        let terms = calls_starting_with(&log, "term:");
        assert_eq!(terms, vec!["term:Dog breeds", "term:Dog breeds"]);

        let media: Vec<_> = report.created.iter().filter_map(|c| c.media_id).collect();
        let unique: HashSet<_> = media.iter().collect();
        assert_eq!(media.len(), unique.len(), "media reused within a run");
        assert!(report.images_attached() <= 3);
        assert_eq!(
            calls_starting_with(&log, "media:").len(),
            report.images_attached()
        );
    }
}

#[tokio::test]
async fn all_tier_attaches_every_article_while_pool_lasts() {
    let api = encyclopedia(vec!["Beagle", "Dachshund", "Poodle", "Whippet"]);
    let feed = photo_feed(4);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(1);

    let report = populate(
        &config(vec![("post", 4)], ImageChance::All),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.images_attached(), 4);
    let attached: HashSet<_> = calls_starting_with(&log, "media:")
        .into_iter()
        .map(|c| c.rsplit_once(':').map(|(url, _)| url.to_string()).unwrap())
        .collect();
    assert_eq!(attached.len(), 4, "every image used once");
    assert_eq!(calls_starting_with(&log, "primary:").len(), 4);
}

#[tokio::test]
async fn none_tier_never_touches_the_feed() {
    let api = encyclopedia(vec!["Beagle", "Poodle"]);
    let mut feed = MockImageFeed::new();
    feed.expect_permalinks().never();
    feed.expect_page_body().never();
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(2);

    let report = populate(
        &config(vec![("post", 2)], ImageChance::None),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.images_attached(), 0);
    assert!(calls_starting_with(&log, "media:").is_empty());
}

#[tokio::test]
async fn missing_article_is_skipped_with_one_warning_and_no_sink_calls() {
    let api = encyclopedia(vec!["Beagle", MISSING, "Poodle"]);
    let feed = photo_feed(3);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(3);

    let report = populate(
        &config(vec![("post", 3)], ImageChance::None),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.created.len(), 2);
    assert!(report.created.iter().all(|c| c.title != MISSING));
    assert!(log.lock().unwrap().iter().all(|c| !c.contains(MISSING)));

    let skipped: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| matches!(w, PopulateWarning::ArticleSkipped { title, .. } if title == MISSING))
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(report.warnings.len(), 1);
}

#[tokio::test]
async fn category_fetch_failure_halts_the_run() {
    let mut api = MockEncyclopediaApi::new();
    api.expect_category_members()
        .returning(|_, _| Err(SourceError::Transport("connection refused".to_string())));
    api.expect_page().never();
    let feed = photo_feed(3);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(4);

    let err = populate(
        &config(vec![("post", 3)], ImageChance::Most),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PopulateError::CategoryFetch(SourceError::Transport(_))));
    assert!(calls_starting_with(&log, "create:").is_empty());
}

#[tokio::test]
async fn empty_category_halts_the_run() {
    let api = encyclopedia(vec![]);
    let feed = photo_feed(1);
    let sink = recording_sink(CallLog::default());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(4);

    let err = populate(
        &config(vec![("post", 1)], ImageChance::None),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        PopulateError::CategoryFetch(SourceError::EmptyCategory(ref c)) if c == "Dogs"
    ));
}

#[tokio::test]
async fn zero_quota_is_rejected() {
    let api = MockEncyclopediaApi::new();
    let feed = MockImageFeed::new();
    let sink = MockContentSink::new();
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(0);

    let err = populate(
        &config(vec![("post", 0)], ImageChance::Most),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PopulateError::NothingRequested));
}

#[tokio::test]
async fn sink_rejecting_an_item_is_fatal() {
    let api = encyclopedia(vec!["Beagle", "Poodle"]);
    let feed = photo_feed(2);
    let mut sink = MockContentSink::new();
    sink.expect_supports_categories().returning(|_| Ok(false));
    sink.expect_supports_primary_image().returning(|_| Ok(true));
    sink.expect_create_item()
        .times(1)
        .returning(|_| Err(SinkError::Rejected("invalid_post_type".to_string())));
    sink.expect_attach_media().never();
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(5);

    let err = populate(
        &config(vec![("post", 2)], ImageChance::All),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PopulateError::SinkRejected { ref content_type, .. } if content_type == "post"));
}

#[tokio::test]
async fn shortfall_and_thin_feed_are_warnings() {
    let api = encyclopedia(vec!["Beagle", "Poodle"]);
    let feed = photo_feed(1);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(6);

    let report = populate(
        &config(vec![("post", 3), ("page", 2)], ImageChance::All),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.created.len(), 2);
    assert!(report
        .created
        .iter()
        .all(|c| c.content_type == "post" && c.media_id.is_none()));

    let shortfalls: Vec<_> = report
        .warnings
        .iter()
        .filter_map(|w| match w {
            PopulateWarning::InsufficientArticles { deficit, .. } => Some(*deficit),
            _ => None,
        })
        .collect();
    assert_eq!(shortfalls, vec![3]);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, PopulateWarning::ImagePoolUnavailable { .. })));
}

#[tokio::test]
async fn replace_deletes_each_requested_type_first() {
    let api = encyclopedia(vec!["Beagle", "Poodle"]);
    let feed = photo_feed(2);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(7);
    let mut cfg = config(vec![("post", 1), ("page", 1)], ImageChance::None);
    cfg.replace = true;

    let report = populate(&cfg, &api, &feed, &sink, &mut cache, &mut rng)
        .await
        .expect("populate succeeds");

    assert_eq!(report.deleted, 4);
    let calls = log.lock().unwrap().clone();
    assert_eq!(calls[0], "delete:post");
    assert_eq!(calls[1], "delete:page");
    assert!(calls[2..].iter().all(|c| !c.starts_with("delete:")));
}

#[tokio::test]
async fn cached_image_is_reused_without_download() {
    let api = encyclopedia(vec!["Beagle"]);
    let feed = photo_feed(1);
    let log = CallLog::default();
    let sink = recording_sink(log.clone());
    let mut cache = DownloadCache::in_memory();
    cache
        .record("https://images.pexels.com/dog-0.jpeg?w=500", 555)
        .expect("in-memory record");
    let mut rng = StdRng::seed_from_u64(8);

    let report = populate(
        &config(vec![("post", 1)], ImageChance::All),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.created[0].media_id, Some(555));
    assert!(calls_starting_with(&log, "media:").is_empty());
    assert_eq!(calls_starting_with(&log, "primary:"), vec!["primary:1:555"]);
}

#[tokio::test]
async fn refused_cached_image_is_uploaded_again() {
    let api = encyclopedia(vec!["Beagle"]);
    let feed = photo_feed(1);
    let image_url = "https://images.pexels.com/dog-0.jpeg?w=500";

    let mut sink = MockContentSink::new();
    sink.expect_supports_categories().returning(|_| Ok(false));
    sink.expect_supports_primary_image().returning(|_| Ok(true));
    sink.expect_create_item().returning(|_| Ok(1));
    sink.expect_set_primary_image()
        .withf(|_, media_id| *media_id == 555)
        .times(1)
        .returning(|_, _| Err(SinkError::Rejected("no attachment 555".to_string())));
    sink.expect_attach_media()
        .times(1)
        .returning(|_, _| Ok(2000));
    sink.expect_set_primary_image()
        .withf(|item_id, media_id| *item_id == 1 && *media_id == 2000)
        .times(1)
        .returning(|_, _| Ok(()));

    let mut cache = DownloadCache::in_memory();
    cache.record(image_url, 555).expect("in-memory record");
    let mut rng = StdRng::seed_from_u64(8);

    let report = populate(
        &config(vec![("post", 1)], ImageChance::All),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.created[0].media_id, Some(2000));
    assert!(report.warnings.is_empty());
    assert_eq!(cache.get(image_url), Some(2000));
}

#[tokio::test]
async fn unsupported_featured_images_are_warned_about() {
    let api = encyclopedia(vec!["Beagle"]);
    let feed = photo_feed(1);
    let mut sink_pages_only = MockContentSink::new();
    sink_pages_only
        .expect_supports_categories()
        .returning(|_| Ok(false));
    sink_pages_only
        .expect_supports_primary_image()
        .returning(|content_type| Ok(content_type != "page"));
    sink_pages_only.expect_create_item().returning(|_| Ok(1));
    sink_pages_only.expect_attach_media().returning(|_, _| Ok(2));
    sink_pages_only
        .expect_set_primary_image()
        .returning(|_, _| Ok(()));
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(9);

    let report = populate(
        &config(vec![("page", 1)], ImageChance::Few),
        &api,
        &feed,
        &sink_pages_only,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert!(report.warnings.contains(&PopulateWarning::NoPrimaryImageSupport {
        content_type: "page".to_string()
    }));
}

/// Collects the level of every emitted event.
struct LevelCollector {
    levels: Arc<Mutex<Vec<tracing::Level>>>,
}

impl<S: tracing::Subscriber> Layer<S> for LevelCollector {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.levels.lock().unwrap().push(*event.metadata().level());
    }
}

#[tokio::test]
async fn shortfall_is_logged_as_a_single_warning() {
    let levels = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(LevelCollector {
        levels: levels.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let api = encyclopedia(vec!["Beagle", "Poodle"]);
    let feed = MockImageFeed::new();
    let sink = recording_sink(CallLog::default());
    let mut cache = DownloadCache::in_memory();
    let mut rng = StdRng::seed_from_u64(12);

    let report = populate(
        &config(vec![("post", 3)], ImageChance::None),
        &api,
        &feed,
        &sink,
        &mut cache,
        &mut rng,
    )
    .await
    .expect("populate succeeds");

    assert_eq!(report.warnings.len(), 1);
    let warnings = levels
        .lock()
        .unwrap()
        .iter()
        .filter(|level| **level == tracing::Level::WARN)
        .count();
    assert_eq!(warnings, 1);
}
