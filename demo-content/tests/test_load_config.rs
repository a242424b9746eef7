use demo_content::load_config::{load_config, SinkConfig, APP_PASSWORD_ENV};
use demo_content_core::config::{DEFAULT_API_URL, DEFAULT_IMAGE_SEARCH_URL};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A wordpress sink picks its application password up from the environment.
#[test]
#[serial]
fn test_load_config_wordpress_with_env_password() {
    let file = config_file(
        r#"
wikipedia:
  site_url: https://demo.example.com
cache_path: ./tmp/cache.json
sink:
  type: wordpress
  base_url: https://demo.example.com
  username: admin
"#,
    );
    env::set_var(APP_PASSWORD_ENV, "abcd efgh ijkl");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.wikipedia.api_url, DEFAULT_API_URL);
    assert_eq!(config.wikipedia.site_url.as_deref(), Some("https://demo.example.com"));
    assert_eq!(config.images.search_url, DEFAULT_IMAGE_SEARCH_URL);
    assert_eq!(config.cache_path, Some(PathBuf::from("./tmp/cache.json")));
    match config.sink {
        SinkConfig::Wordpress(wp) => {
            assert_eq!(wp.base_url, "https://demo.example.com");
            assert_eq!(wp.username, "admin");
            assert_eq!(wp.app_password, "abcd efgh ijkl");
        }
        other => panic!("expected wordpress sink, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_load_config_wordpress_without_password_fails() {
    let file = config_file(
        r#"
sink:
  type: wordpress
  base_url: https://demo.example.com
  username: admin
"#,
    );
    env::remove_var(APP_PASSWORD_ENV);

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains(APP_PASSWORD_ENV), "got: {err}");
}

/// The wxr sink needs no secrets and defaults its category types.
#[test]
#[serial]
fn test_load_config_wxr_defaults() {
    let file = config_file(
        r#"
images:
  search_url: https://photos.example.com/search/
sink:
  type: wxr
  path: ./out/demo.wxr
"#,
    );
    env::remove_var(APP_PASSWORD_ENV);

    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.images.search_url, "https://photos.example.com/search/");
    assert!(config.cache_path.is_none());
    match config.sink {
        SinkConfig::Wxr(wxr) => {
            assert_eq!(wxr.path, PathBuf::from("./out/demo.wxr"));
            assert_eq!(wxr.category_types, vec!["post"]);
        }
        other => panic!("expected wxr sink, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_load_config_errors_on_unknown_sink() {
    let file = config_file("sink:\n  type: ftp\n  path: x\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("parse"), "got: {err}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/nonexistent/demo-content.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
