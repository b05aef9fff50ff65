//! Configuration management using the prefer crate for discovery.
//!
//! Every field has a default, so running without a config file works. A
//! file is found by `prefer` (any `artacquire.{toml,yaml,json}` in the usual
//! locations) or passed with `--config`, and parsed by extension.

mod browser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::BatchSettings;
use crate::extract::{ExtractSettings, GroupingMode};

pub use browser::{default_timeout, BrowserEngineConfig};

/// Name used for config discovery.
pub const CONFIG_NAME: &str = "artacquire";

/// Site-specific addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the site; session cookies are read for it.
    pub site_url: String,
    /// Only image requests under this prefix are captured.
    pub image_origin: String,
    /// Login pages start with this prefix.
    pub auth_url_prefix: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: "https://www.pixiv.net/".to_string(),
            image_origin: "https://i.pximg.net/".to_string(),
            auth_url_prefix: "https://accounts.pixiv.net/".to_string(),
        }
    }
}

/// Timing and limits of the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub classify_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub reading_settle_ms: u64,
    pub auth_poll_interval_ms: u64,
    pub max_scroll_iterations: usize,
    pub max_auth_attempts: u32,
    pub grouping: GroupingMode,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        let settings = ExtractSettings::default();
        Self {
            classify_settle_ms: millis(settings.classify_settle),
            scroll_settle_ms: millis(settings.scroll_settle),
            reading_settle_ms: millis(settings.reading_settle),
            auth_poll_interval_ms: millis(settings.auth_poll_interval),
            max_scroll_iterations: settings.max_scroll_iterations,
            max_auth_attempts: settings.max_auth_attempts,
            grouping: settings.grouping,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// URLs extracted concurrently.
    pub size: usize,
    /// Seconds to sleep between batches.
    pub delay_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 1,
            delay_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Newline-delimited backlog of artwork URLs.
    pub input: String,
    /// Root of the dated output tree.
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: "data/pixiv/manual_process_urls.txt".to_string(),
            output: "src/content/pixiv".to_string(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserEngineConfig,
    pub site: SiteConfig,
    pub extract: ExtractConfig,
    pub batch: BatchConfig,
    pub paths: PathsConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Options for loading configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of the config file directory.
    pub use_cwd: bool,
}

impl Config {
    /// Load configuration. An explicit path must exist and parse; a
    /// discovered file that fails to parse is reported and ignored.
    pub async fn load(options: &LoadOptions) -> anyhow::Result<Self> {
        if let Some(path) = &options.config_path {
            return Self::load_from_path(path).await;
        }

        let config = match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("Ignoring config file: {:#}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(e) => {
                debug!("No config file found: {}", e);
                Self::default()
            }
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::parse(path, &contents)?;
        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(path: &Path, contents: &str) -> anyhow::Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let config = match ext {
            "toml" => toml::from_str(contents).context("Failed to parse TOML config")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).context("Failed to parse YAML config")?
            }
            _ => serde_json::from_str(contents).context("Failed to parse JSON config")?,
        };
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Directory that relative paths are resolved against.
    pub fn base_dir(&self, options: &LoadOptions) -> PathBuf {
        let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if options.use_cwd {
            return cwd();
        }
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(cwd)
    }

    /// Resolve a path that may be relative to `base_dir`; `~` is expanded.
    pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn to_extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            image_origin: self.site.image_origin.clone(),
            auth_url_prefix: self.site.auth_url_prefix.clone(),
            classify_settle: Duration::from_millis(self.extract.classify_settle_ms),
            scroll_settle: Duration::from_millis(self.extract.scroll_settle_ms),
            reading_settle: Duration::from_millis(self.extract.reading_settle_ms),
            auth_poll_interval: Duration::from_millis(self.extract.auth_poll_interval_ms),
            max_scroll_iterations: self.extract.max_scroll_iterations,
            max_auth_attempts: self.extract.max_auth_attempts,
            grouping: self.extract.grouping,
        }
    }

    pub fn to_batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch.size.max(1),
            delay: Duration::try_from_secs_f64(self.batch.delay_secs).unwrap_or_default(),
        }
    }
}
