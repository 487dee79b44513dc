//! Configuration management for gnarchive.
//!
//! Settings are layered: built-in defaults, then an optional
//! `gnarchive.toml`, then environment variables, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::repository::DbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "gnarchive.db";

/// Default page-image subdirectory name.
const PAGES_SUBDIR: &str = "pages";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
    /// Directory for storing rendered page images.
    pub pages_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/gnarchive/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gnarchive");

        Self {
            pages_dir: data_dir.join(PAGES_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            pages_dir: data_dir.join(PAGES_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            let path = self.data_dir.join(&self.database_filename);
            format!("sqlite:{}", path.display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        if self.database_url.is_some() {
            true
        } else {
            self.database_path().exists()
        }
    }

    /// Create a database context for this configuration.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url(), &self.pages_dir)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        fs::create_dir_all(&self.pages_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create pages directory '{}': {}",
                    self.pages_dir.display(),
                    e
                ),
            )
        })?;
        Ok(())
    }
}

/// Extraction pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Pages per parallel LLM batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Confidence recorded on appearances from text-only extraction.
    #[serde(default = "default_text_confidence")]
    pub text_confidence: f64,
    /// Confidence recorded on appearances from vision extraction.
    #[serde(default = "default_vision_confidence")]
    pub vision_confidence: f64,
    /// Tesseract language code.
    #[serde(default = "default_ocr_lang")]
    pub ocr_lang: String,
    /// Rasterization resolution in DPI.
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
}

fn default_batch_size() -> usize {
    5
}

fn default_text_confidence() -> f64 {
    0.7
}

fn default_vision_confidence() -> f64 {
    0.85
}

fn default_ocr_lang() -> String {
    "eng".to_string()
}

fn default_render_dpi() -> u32 {
    300
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            text_confidence: default_text_confidence(),
            vision_confidence: default_vision_confidence(),
            ocr_lang: default_ocr_lang(),
            render_dpi: default_render_dpi(),
        }
    }
}

impl ExtractConfig {
    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// LLM configuration for entity extraction.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Extraction pipeline tuning.
    #[serde(default, skip_serializing_if = "ExtractConfig::is_default")]
    pub extract: ExtractConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific TOML file.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|e| format!("Failed to parse TOML config: {}", e))?;

        config.source_path = Some(path.to_path_buf());
        config.llm = config.llm.with_env_overrides();
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.pages_dir = settings.data_dir.join(PAGES_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data flag).
    pub data: Option<PathBuf>,
}

/// Look for a config file in a directory.
fn find_config_in(dir: &Path) -> Option<PathBuf> {
    for basename in ["gnarchive", "config"] {
        let path = dir.join(format!("{}.toml", basename));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load config from the appropriate source based on options.
async fn load_config(options: &LoadOptions, data_dir_override: Option<&PathBuf>) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Config::default()
            });
    }

    // Priority 2: Config next to the data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_in(data_dir) {
            tracing::debug!("Found config next to data dir: {}", config_path.display());
            if let Ok(config) = Config::load_from_path(&config_path).await {
                return config;
            }
        }
    }

    // Priority 3: Config in the current directory
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if let Some(config_path) = find_config_in(&cwd) {
        tracing::debug!("Found config in cwd: {}", config_path.display());
        if let Ok(config) = Config::load_from_path(&config_path).await {
            return config;
        }
    }

    let mut config = Config::default();
    config.llm = config.llm.with_env_overrides();
    config
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let data_dir_override = options.data.as_ref().map(|d| {
        if d.is_absolute() {
            d.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(d)
        }
    });

    let config = load_config(&options, data_dir_override.as_ref()).await;

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    // GNARCHIVE_DATA_DIR env var overrides the config file
    if let Some(dir) = std::env::var("GNARCHIVE_DATA_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        settings = Settings::with_data_dir(PathBuf::from(dir));
    }

    // --data flag takes precedence over both
    if let Some(data_dir) = data_dir_override {
        settings.pages_dir = data_dir.join(PAGES_SUBDIR);
        settings.data_dir = data_dir;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }

    (settings, config)
}
