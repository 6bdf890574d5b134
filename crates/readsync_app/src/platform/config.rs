use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::engine_info;
use readsync_core::{Author, DEFAULT_PAGE_SIZE};
use readsync_engine::ApiSettings;
use serde::{Deserialize, Serialize};

use super::logging::LogDestination;

/// Backend location and path shapes; see [`ApiSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub discussion_path: String,
    pub create_review_path: String,
    pub update_review_path: String,
    pub delete_review_path: String,
    pub search_path: String,
    pub fact_path: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub bearer_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let settings = ApiSettings::default();
        Self {
            base_url: settings.base_url,
            discussion_path: settings.discussion_path,
            create_review_path: settings.create_review_path,
            update_review_path: settings.update_review_path,
            delete_review_path: settings.delete_review_path,
            search_path: settings.search_path,
            fact_path: settings.fact_path,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            bearer_token: settings.bearer_token,
        }
    }
}

impl ApiConfig {
    pub fn to_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            discussion_path: self.discussion_path.clone(),
            create_review_path: self.create_review_path.clone(),
            update_review_path: self.update_review_path.clone(),
            delete_review_path: self.delete_review_path.clone(),
            search_path: self.search_path.clone(),
            fact_path: self.fact_path.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            bearer_token: self.bearer_token.clone(),
            ..ApiSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub page_size: u32,
    pub banner_interval_ms: u64,
    /// Directory holding the award ledger files.
    pub data_dir: PathBuf,
    /// Identity the ledger is kept for; one file per namespace.
    pub namespace: String,
    pub viewer_id: Option<String>,
    pub viewer_name: Option<String>,
    pub log: LogDestination,
    pub log_file: PathBuf,
    /// Give up waiting on the backend after this long.
    pub wait_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            banner_interval_ms: 3_000,
            data_dir: PathBuf::from(".readsync"),
            namespace: "default".to_string(),
            viewer_id: None,
            viewer_name: None,
            log: LogDestination::File,
            log_file: PathBuf::from("./readsync.log"),
            wait_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Read `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = ron::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        engine_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn viewer(&self) -> Author {
        match (&self.viewer_id, &self.viewer_name) {
            (Some(id), Some(name)) => Author::new(id, name),
            (Some(id), None) => Author::new(id, id),
            (None, Some(name)) => Author {
                id: None,
                display_name: name.clone(),
            },
            (None, None) => Author::unknown(),
        }
    }

    pub fn banner_interval(&self) -> Duration {
        Duration::from_millis(self.banner_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
