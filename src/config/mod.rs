// Configuration management for drivetunes
// Handles loading/saving settings, with sensible defaults when config is missing.
// The Drive API key lives here (or in DRIVETUNES_API_KEY), never in code.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "DRIVETUNES_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub visualizer: VisualizerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub api_key: String,
    pub api_base_url: String,
    /// Folders shown in the dashboard sidebar.
    pub root_folder_ids: Vec<String>,
    /// Where the explorer starts. "root" is the key owner's My Drive.
    pub explorer_root_id: String,
    pub dashboard_page_size: u32,
    /// `None` lets Drive pick the page size.
    pub explorer_page_size: Option<u32>,
    pub request_timeout_secs: u64,
    /// Downloads larger than this are refused before playback.
    pub max_media_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub volume: f32, // 0.0 to 1.0
    pub auto_advance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Analysis window, rounded up to a power of two. Bin count is half of this.
    pub fft_size: usize,
    pub frame_interval_ms: u64,
    /// 0.0 = raw frames, towards 1.0 = heavier decay between frames.
    pub smoothing: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub status_message_secs: u64,
    pub tick_rate_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            root_folder_ids: Vec::new(),
            explorer_root_id: "root".to_string(),
            dashboard_page_size: 50,
            explorer_page_size: Some(20),
            request_timeout_secs: 30,
            max_media_mb: 200,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            auto_advance: true,
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            frame_interval_ms: 33, // ~30 fps is plenty for a terminal
            smoothing: 0.0,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_message_secs: 5,
            tick_rate_ms: 250,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drive: DriveConfig::default(),
            playback: PlaybackConfig::default(),
            visualizer: VisualizerConfig::default(),
            ui: UiConfig::default(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drivetunes")
        .join("logs")
}

impl DriveConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn max_media_bytes(&self) -> usize {
        usize::try_from(self.max_media_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl VisualizerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// FFT length actually used: power of two in 32..=32768, like an analyser node accepts.
    pub fn effective_fft_size(&self) -> usize {
        self.fft_size.clamp(32, 32768).next_power_of_two()
    }
}

impl UiConfig {
    pub fn status_duration(&self) -> Duration {
        Duration::from_secs(self.status_message_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(16))
    }
}

impl Config {
    /// Load `config_path`, writing defaults there on first run.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            config
        };

        config.apply_env(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    /// Environment wins over the file so keys can stay out of dotfiles.
    pub fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.drive.api_key = key.trim().to_string();
        }
    }

    /// `source` is the file this config was loaded from, named in the error.
    pub fn validate(&self, source: &Path) -> Result<()> {
        if self.drive.api_key.trim().is_empty() {
            anyhow::bail!(
                "No Drive API key configured. Set drive.api_key in {} or export {}",
                source.display(),
                API_KEY_ENV
            );
        }
        if self.drive.dashboard_page_size == 0 {
            anyhow::bail!("drive.dashboard_page_size must be at least 1");
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("drivetunes");

        Ok(config_dir.join("config.toml"))
    }
}
