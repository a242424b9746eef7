use demo_content_core::error::CacheError;
use demo_content_core::media_cache::DownloadCache;
use std::fs;
use tempfile::tempdir;

const SITE: &str = "https://demo.example.com";

#[test]
fn missing_file_is_an_empty_cache() {
    let dir = tempdir().unwrap();
    let cache = DownloadCache::load(dir.path().join("cache.json"), SITE).expect("loads");
    assert!(cache.is_empty());
    assert_eq!(cache.scope(), SITE);
}

#[test]
fn records_survive_a_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.json");

    let mut cache = DownloadCache::load(&path, SITE).expect("loads");
    cache
        .record("https://images.pexels.com/photos/1/dog.jpeg", 42)
        .expect("writes");
    cache
        .record("https://images.pexels.com/photos/2/dog.jpeg", 43)
        .expect("writes");
    // Upsert keeps one entry per URL.
    cache
        .record("https://images.pexels.com/photos/1/dog.jpeg", 44)
        .expect("writes");

    let reloaded = DownloadCache::load(&path, SITE).expect("reloads");
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get("https://images.pexels.com/photos/1/dog.jpeg"), Some(44));
    assert_eq!(reloaded.get("https://images.pexels.com/photos/2/dog.jpeg"), Some(43));
}

#[test]
fn entries_from_another_sink_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");

    let mut cache = DownloadCache::load(&path, SITE).expect("loads");
    cache.record("https://images.pexels.com/photos/1/dog.jpeg", 42).unwrap();

    let mut other = DownloadCache::load(&path, "https://staging.example.com").expect("loads");
    assert!(other.is_empty());
    assert_eq!(other.get("https://images.pexels.com/photos/1/dog.jpeg"), None);

    // The next record rewrites the file under the new scope.
    other.record("https://images.pexels.com/photos/2/dog.jpeg", 7).unwrap();
    let original = DownloadCache::load(&path, SITE).expect("loads");
    assert!(original.is_empty());
    let staging = DownloadCache::load(&path, "https://staging.example.com").expect("loads");
    assert_eq!(staging.get("https://images.pexels.com/photos/2/dog.jpeg"), Some(7));
}

#[test]
fn same_filename_from_different_urls_does_not_collide() {
    let mut cache = DownloadCache::in_memory();
    cache.record("https://a.example.com/dog.jpeg", 1).unwrap();
    assert_eq!(cache.get("https://b.example.com/dog.jpeg"), None);
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(&path, "{not json").unwrap();
    assert!(matches!(
        DownloadCache::load(&path, SITE),
        Err(CacheError::Format(_))
    ));
}
