//! Application configuration.
//!
//! Every component receives the section it needs through its constructor;
//! nothing here is read from process-global state after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BeatreelError, BeatreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Motion clip cache location.
    pub cache: CacheConfig,

    /// External encoder settings.
    pub encoder: EncoderConfig,

    /// Motion engine tuning.
    pub motion: MotionConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Content-addressed clip cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory; entries live at `root/<key[:2]>/<key>.mp4`.
    pub root: PathBuf,
}

/// Encoder binaries, fixed codec parameters, and subprocess bounds.
///
/// The codec fields are part of the determinism contract: changing any of
/// them changes output bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Path or name of the `ffmpeg` binary.
    pub ffmpeg: String,

    /// Path or name of the `ffprobe` binary.
    pub ffprobe: String,

    /// x264 constant rate factor.
    pub crf: u32,

    /// x264 preset.
    pub preset: String,

    /// Output pixel format.
    pub pixel_format: String,

    /// AAC bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Hard wall-clock limit for one encoder run.
    pub timeout_secs: u64,

    /// How long to wait for exit after the progress stream closes.
    pub exit_grace_secs: u64,

    /// Seconds without progress before a stall warning is logged.
    pub stall_warn_secs: u64,
}

/// Beat pulse shape used by the motion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Peak additive zoom of one beat pulse.
    pub pulse_amplitude: f64,

    /// Pulse decay length in milliseconds (converted to frames per clip fps).
    pub pulse_decay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "beatreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            encoder: EncoderConfig::default(),
            motion: MotionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            crf: 20,
            preset: "medium".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_bitrate_kbps: 192,
            timeout_secs: 600,
            exit_grace_secs: 30,
            stall_warn_secs: 60,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pulse_amplitude: 0.04,
            pulse_decay_ms: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> BeatreelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BeatreelError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BeatreelError::config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("beatreel").join("config.json")
}

/// Default motion clip cache directory.
fn default_cache_root() -> PathBuf {
    let base = std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".cache")
        });
    base.join("beatreel").join("motion")
}
