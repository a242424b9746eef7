/// `load_config` module: loads the static YAML config and injects environment secrets.
///
/// This module is the only place where untrusted YAML is parsed and mapped to typed structs.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into [`CliConfig`]
/// - Fill defaults for the encyclopedia and photo feed endpoints
/// - Inject the WordPress application password from `WORDPRESS_APP_PASSWORD`
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use demo_content_core::config::{ImageFeedConfig, WikipediaConfig};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable holding the WordPress application password.
pub const APP_PASSWORD_ENV: &str = "WORDPRESS_APP_PASSWORD";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub images: ImageFeedConfig,
    /// JSON file remembering which images were already uploaded.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    pub sink: SinkConfig,
}

/// Where created content goes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Wordpress(WordPressConfig),
    Wxr(WxrConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordPressConfig {
    pub base_url: String,
    pub username: String,
    /// Never read from YAML.
    #[serde(skip)]
    pub app_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WxrConfig {
    pub path: PathBuf,
    /// Content types that carry the `category` taxonomy in the export.
    #[serde(default = "default_category_types")]
    pub category_types: Vec<String>,
    #[serde(default)]
    pub site_url: Option<String>,
}

fn default_category_types() -> Vec<String> {
    vec!["post".to_string()]
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let SinkConfig::Wordpress(wp) = &mut config.sink {
        wp.app_password = match env::var(APP_PASSWORD_ENV) {
            Ok(secret) => secret,
            Err(e) => {
                error!(error = ?e, "{} missing in environment", APP_PASSWORD_ENV);
                return Err(anyhow::anyhow!(
                    "{APP_PASSWORD_ENV} must be set for the wordpress sink"
                ));
            }
        };
        info!(base_url = %wp.base_url, username = %wp.username, "WordPress sink configured");
    }

    Ok(config)
}
