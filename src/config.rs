//! Configuration management for the sitedesk console

use config::{Config, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::{DeskError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/v1";
pub const DEFAULT_REFRESH_LEAD_SECS: u64 = 5 * 60;
pub const DEFAULT_NOTICE_WINDOW_SECS: u64 = 5;
pub const DEFAULT_ASSET_PREFIX: &str = "/images";

/// Settings persisted in `~/.config/sitedesk/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub verbose: bool,
    pub storage_dir: PathBuf,
    pub session_storage_enabled: bool,
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    #[serde(default = "default_notice_window_secs")]
    pub notice_window_secs: u64,
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,
    #[serde(default)]
    pub asset_root: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: 30,
            verbose: false,
            storage_dir: default_storage_dir(),
            session_storage_enabled: true,
            refresh_lead_secs: DEFAULT_REFRESH_LEAD_SECS,
            notice_window_secs: DEFAULT_NOTICE_WINDOW_SECS,
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            asset_root: None,
        }
    }
}

impl ConsoleConfig {
    /// Load the settings file, writing defaults back when it is missing or unreadable
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if config_file.exists() {
            let content = fs::read_to_string(&config_file).await?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::warn!(
                        path = %config_file.display(),
                        error = %e,
                        "Config file unreadable, restoring defaults"
                    );
                    let config = Self::default();
                    config.save(&config_file).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(&config_file).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let session_storage = SessionStorageConfig {
            enabled: self.session_storage_enabled,
            storage_path: self
                .session_storage_enabled
                .then(|| self.storage_dir.join("session.json")),
        };

        let mut builder = ClientConfigBuilder::new()
            .base_url(&self.endpoint)
            .timeout(self.timeout)
            .verbose(self.verbose)
            .refresh_lead_secs(self.refresh_lead_secs)
            .notice_window_secs(self.notice_window_secs)
            .asset_prefix(&self.asset_prefix)
            .session_storage(session_storage);

        if let Some(root) = &self.asset_root {
            builder = builder.asset_root(root);
        }

        builder.build()
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitedesk")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitedesk")
}

/// Where the session keys are persisted
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionStorageConfig {
    #[serde(default)]
    pub enabled: bool,
    pub storage_path: Option<PathBuf>,
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub session_storage: SessionStorageConfig,
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    #[serde(default = "default_notice_window_secs")]
    pub notice_window_secs: u64,
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,
    #[serde(default)]
    pub asset_root: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_lead_secs() -> u64 {
    DEFAULT_REFRESH_LEAD_SECS
}

fn default_notice_window_secs() -> u64 {
    DEFAULT_NOTICE_WINDOW_SECS
}

fn default_asset_prefix() -> String {
    DEFAULT_ASSET_PREFIX.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: default_timeout(),
            verbose: false,
            session_storage: SessionStorageConfig::default(),
            refresh_lead_secs: default_refresh_lead_secs(),
            notice_window_secs: default_notice_window_secs(),
            asset_prefix: default_asset_prefix(),
            asset_root: None,
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    verbose: Option<bool>,
    session_storage: Option<SessionStorageConfig>,
    refresh_lead_secs: Option<u64>,
    notice_window_secs: Option<u64>,
    asset_prefix: Option<String>,
    asset_root: Option<String>,
    config_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn session_storage(mut self, session_storage: SessionStorageConfig) -> Self {
        self.session_storage = Some(session_storage);
        self
    }

    pub fn refresh_lead_secs(mut self, secs: u64) -> Self {
        self.refresh_lead_secs = Some(secs);
        self
    }

    pub fn notice_window_secs(mut self, secs: u64) -> Self {
        self.notice_window_secs = Some(secs);
        self
    }

    pub fn asset_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.asset_prefix = Some(prefix.into());
        self
    }

    pub fn asset_root<S: Into<String>>(mut self, root: S) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_file_and_env(self.config_file.as_deref())?;

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(session_storage) = self.session_storage {
            config.session_storage = session_storage;
        }
        if let Some(secs) = self.refresh_lead_secs {
            config.refresh_lead_secs = secs;
        }
        if let Some(secs) = self.notice_window_secs {
            config.notice_window_secs = secs;
        }
        if let Some(prefix) = self.asset_prefix {
            config.asset_prefix = prefix;
        }
        if let Some(root) = self.asset_root {
            config.asset_root = Some(root);
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Defaults, then the optional file, then `SITEDESK_*` environment variables
    pub fn from_file_and_env<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_ENDPOINT)?
            .set_default("timeout", 30)?
            .set_default("verbose", false)?
            .set_default("refresh_lead_secs", DEFAULT_REFRESH_LEAD_SECS)?
            .set_default("notice_window_secs", DEFAULT_NOTICE_WINDOW_SECS)?
            .set_default("asset_prefix", DEFAULT_ASSET_PREFIX)?;

        if let Some(config_path) = config_file {
            if config_path.as_ref().exists() {
                builder = builder.add_source(File::from(config_path.as_ref()));
            }
        }
        builder = builder.add_source(Environment::with_prefix("SITEDESK").try_parsing(true));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(DeskError::invalid_input("Base URL cannot be empty"));
        }
        if Url::parse(&self.normalized_base()).is_err() {
            return Err(DeskError::invalid_endpoint(format!(
                "Base URL is not a valid URL: {}",
                self.base_url
            )));
        }
        if self.refresh_lead_secs >= 24 * 60 * 60 {
            return Err(DeskError::validation_field(
                "Refresh lead time must be shorter than a day",
                "refresh_lead_secs",
            ));
        }
        Ok(())
    }

    fn normalized_base(&self) -> String {
        if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
            self.base_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.base_url.trim_end_matches('/'))
        }
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{}", self.normalized_base(), endpoint)
    }

    pub fn refresh_lead(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_secs)
    }

    pub fn notice_window(&self) -> Duration {
        Duration::from_secs(self.notice_window_secs)
    }

    /// Root that image paths are rewritten to (`<origin>/uploads` unless configured)
    pub fn asset_root(&self) -> String {
        if let Some(root) = &self.asset_root {
            return root.trim_end_matches('/').to_string();
        }
        match Url::parse(&self.normalized_base()) {
            Ok(url) => format!("{}/uploads", url.origin().ascii_serialization()),
            Err(_) => "/uploads".to_string(),
        }
    }

    /// Whether `path` lives under the stored media prefix (`/images/...`)
    pub fn is_asset_path(&self, path: &str) -> bool {
        let prefix = self.asset_prefix.trim_matches('/');
        let relative = path.trim_start_matches('/');
        if prefix.is_empty() {
            return false;
        }
        match relative.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Rewrite a stored media path to a URL the backend serves.
    ///
    /// `/images/team/a.png` becomes `<asset_root>/team/a.png`; absolute URLs
    /// are returned unchanged.
    pub fn asset_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let prefix = self.asset_prefix.trim_end_matches('/');
        let relative = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let rest = match relative.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => relative.as_str(),
        };

        format!("{}{}", self.asset_root(), rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_config(base_url: &str) -> ClientConfig {
        ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_endpoint_url_joins_paths() {
        let config = client_config("https://backend.example.com/api/v1/");
        assert_eq!(
            config.endpoint_url("/user/login"),
            "https://backend.example.com/api/v1/user/login"
        );
        assert_eq!(
            config.endpoint_url("faqs"),
            "https://backend.example.com/api/v1/faqs"
        );
    }

    #[test]
    fn test_endpoint_url_adds_scheme() {
        let config = client_config("backend.example.com/api");
        assert_eq!(
            config.endpoint_url("/refresh-token"),
            "https://backend.example.com/api/refresh-token"
        );
    }

    #[test]
    fn test_asset_url_rewrites_prefix_to_static_root() {
        let config = client_config("http://localhost:5000/api/v1");
        assert_eq!(
            config.asset_url("/images/team/alice.png"),
            "http://localhost:5000/uploads/team/alice.png"
        );
        assert_eq!(
            config.asset_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_asset_url_custom_root_and_unprefixed_path() {
        let mut config = client_config("http://localhost:5000/api/v1");
        config.asset_root = Some("https://static.example.com/public/".to_string());
        assert_eq!(
            config.asset_url("images/logo.svg"),
            "https://static.example.com/public/logo.svg"
        );
        assert_eq!(
            config.asset_url("/imagesets/x.png"),
            "https://static.example.com/public/imagesets/x.png"
        );
    }

    #[test]
    fn test_is_asset_path_requires_prefix_segment() {
        let config = client_config("http://localhost:5000/api/v1");
        assert!(config.is_asset_path("/images/team/alice.png"));
        assert!(config.is_asset_path("images/logo.svg"));
        assert!(!config.is_asset_path("/imagesets/x.png"));
        assert!(!config.is_asset_path("www.partner.com"));
        assert!(!config.is_asset_path("https://cdn.example.com/images/a.png"));
    }

    #[test]
    fn test_validate_rejects_empty_and_long_lead() {
        assert!(client_config("").validate().is_err());

        let mut config = client_config("http://localhost:5000");
        config.refresh_lead_secs = 24 * 60 * 60;
        assert!(config.validate().is_err());

        config.refresh_lead_secs = DEFAULT_REFRESH_LEAD_SECS;
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_console_config_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ConsoleConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(path.exists());

        tokio::fs::write(&path, "{not json").await.unwrap();
        let config = ConsoleConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.refresh_lead_secs, DEFAULT_REFRESH_LEAD_SECS);
    }

    #[tokio::test]
    async fn test_console_config_round_trips_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ConsoleConfig::default();
        config.timeout = 12;
        config.endpoint = "https://cms.example.com/api".to_string();
        config.save(&path).await.unwrap();

        let loaded = ConsoleConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded.timeout, 12);
        let client = loaded.to_client_config().unwrap();
        assert_eq!(client.base_url, "https://cms.example.com/api");
        assert!(client.session_storage.enabled);
        assert!(client
            .session_storage
            .storage_path
            .unwrap()
            .ends_with("session.json"));
    }
}
