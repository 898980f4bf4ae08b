use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use tracing::{debug, info};

use crate::schemas::AppState;

/// Runtime settings. Resolved from built-in defaults, then an optional
/// `foodgram.toml`, then `FOODGRAM_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    /// Directory uploaded images are written to.
    pub media_root: PathBuf,
    /// URL prefix the media directory is served under.
    pub media_url: String,
    pub page_size: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://foodgram.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            media_root: PathBuf::from("media"),
            media_url: "/media".to_string(),
            page_size: common::DEFAULT_PAGE_SIZE,
            cache_ttl_secs: 300,
            cache_capacity: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from the config file and environment.
    pub fn load() -> Result<Self> {
        let defaults = Settings::default();
        let settings = Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("media_root", defaults.media_root.to_string_lossy().to_string())?
            .set_default("media_url", defaults.media_url)?
            .set_default("page_size", defaults.page_size)?
            .set_default("cache_ttl_secs", defaults.cache_ttl_secs)?
            .set_default("cache_capacity", defaults.cache_capacity)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .add_source(File::with_name("foodgram").required(false))
            .add_source(Environment::with_prefix("FOODGRAM").try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;

        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Apply command line overrides on top of the loaded settings.
    pub fn with_overrides(mut self, database_url: Option<String>, bind_address: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        if let Some(address) = bind_address {
            self.bind_address = address;
        }
        self
    }
}

/// Build the shared state around an existing connection.
pub fn build_app_state(db: DatabaseConnection, settings: Settings) -> AppState {
    let cache = Cache::builder()
        .max_capacity(settings.cache_capacity)
        .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
        .build();

    AppState {
        db,
        cache,
        settings: Arc::new(settings),
    }
}

/// Connect to the configured database and initialize application state
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url).await?;

    tokio::fs::create_dir_all(&settings.media_root).await?;
    debug!("Media root ready at {}", settings.media_root.display());

    Ok(build_app_state(db, settings))
}
