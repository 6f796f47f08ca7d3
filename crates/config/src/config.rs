//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// A value parsed but is out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Dither algorithm handed to ffmpeg's `paletteuse` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DitherMode {
    #[serde(rename = "bayer")]
    Bayer,
    #[serde(rename = "heckbert")]
    Heckbert,
    #[serde(rename = "floyd_steinberg")]
    FloydSteinberg,
    #[serde(rename = "sierra2")]
    Sierra2,
    #[serde(rename = "sierra2_4a")]
    Sierra2_4a,
    #[serde(rename = "sierra3")]
    Sierra3,
    #[serde(rename = "burkes")]
    Burkes,
    #[serde(rename = "atkinson")]
    Atkinson,
    #[serde(rename = "none")]
    None,
}

impl DitherMode {
    pub const ALL: [DitherMode; 9] = [
        DitherMode::Bayer,
        DitherMode::Heckbert,
        DitherMode::FloydSteinberg,
        DitherMode::Sierra2,
        DitherMode::Sierra2_4a,
        DitherMode::Sierra3,
        DitherMode::Burkes,
        DitherMode::Atkinson,
        DitherMode::None,
    ];

    /// Name as ffmpeg spells it, also used in output file names
    pub fn as_str(&self) -> &'static str {
        match self {
            DitherMode::Bayer => "bayer",
            DitherMode::Heckbert => "heckbert",
            DitherMode::FloydSteinberg => "floyd_steinberg",
            DitherMode::Sierra2 => "sierra2",
            DitherMode::Sierra2_4a => "sierra2_4a",
            DitherMode::Sierra3 => "sierra3",
            DitherMode::Burkes => "burkes",
            DitherMode::Atkinson => "atkinson",
            DitherMode::None => "none",
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DitherMode::ALL
            .iter()
            .find(|mode| mode.as_str() == wanted)
            .copied()
            .ok_or_else(|| ConfigError::Invalid(format!("unknown dither mode '{}'", s)))
    }
}

/// How output GIF names are derived from the source name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// `<stem>_<dither>.gif`; variants of the same dither mode overwrite each other
    #[default]
    Dither,
    /// `<stem>_<dither>_q<quality>.gif`
    DitherQuality,
}

/// File readiness polling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessConfig {
    /// Give up on a file after this many seconds (default 300)
    #[serde(default = "default_readiness_timeout_secs")]
    pub timeout_secs: f64,
    /// Seconds between size checks (default 5)
    #[serde(default = "default_readiness_poll_interval_secs")]
    pub poll_interval_secs: f64,
}

fn default_readiness_timeout_secs() -> f64 {
    300.0
}

fn default_readiness_poll_interval_secs() -> f64 {
    5.0
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_readiness_timeout_secs(),
            poll_interval_secs: default_readiness_poll_interval_secs(),
        }
    }
}

/// Longest accepted scan period (one year)
pub const MAX_SCHEDULE_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Seconds to a Duration, `None` when negative, NaN or too large to represent.
pub fn duration_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

impl ReadinessConfig {
    /// Falls back to the default when `timeout_secs` is not representable.
    pub fn timeout(&self) -> Duration {
        duration_from_secs(self.timeout_secs)
            .unwrap_or_else(|| Duration::from_secs_f64(default_readiness_timeout_secs()))
    }

    /// Falls back to the default when `poll_interval_secs` is zero or not representable.
    pub fn poll_interval(&self) -> Duration {
        duration_from_secs(self.poll_interval_secs)
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_readiness_poll_interval_secs()))
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// ffmpeg executable (default "ffmpeg", resolved through PATH)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    /// ffprobe executable (default "ffprobe")
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
    /// Kill an ffmpeg invocation after this many seconds (unset = wait forever)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            timeout_secs: None,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory trees to watch, scanned in this order
    #[serde(default)]
    pub root_paths: Vec<PathBuf>,
    /// Minutes between scans (default 2)
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval: f64,
    /// Dither modes to render, in output order
    #[serde(default)]
    pub dither_options: Vec<DitherMode>,
    /// Output width override; native width when unset
    #[serde(default)]
    pub width: Option<u32>,
    /// Output frame rate override; native rate when unset
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub output_naming: OutputNaming,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_schedule_interval() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            schedule_interval: default_schedule_interval(),
            dither_options: Vec::new(),
            width: None,
            fps: None,
            output_naming: OutputNaming::default(),
            readiness: ReadinessConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - GIF_SCHEDULE_INTERVAL -> schedule_interval
    /// - GIF_DITHER_OPTIONS -> dither_options (comma separated)
    /// - GIF_WIDTH -> width
    /// - GIF_FPS -> fps
    /// - GIF_READINESS_TIMEOUT_SECS -> readiness.timeout_secs
    /// - GIF_READINESS_POLL_SECS -> readiness.poll_interval_secs
    /// - FFMPEG_PATH -> tools.ffmpeg
    /// - FFPROBE_PATH -> tools.ffprobe
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("GIF_SCHEDULE_INTERVAL") {
            if let Ok(minutes) = val.parse::<f64>() {
                self.schedule_interval = minutes;
            }
        }

        if let Ok(val) = env::var("GIF_DITHER_OPTIONS") {
            let parsed: Result<Vec<DitherMode>, _> = val
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(DitherMode::from_str)
                .collect();
            if let Ok(modes) = parsed {
                self.dither_options = modes;
            }
        }

        if let Ok(val) = env::var("GIF_WIDTH") {
            if let Ok(width) = val.parse::<u32>() {
                self.width = Some(width);
            }
        }

        if let Ok(val) = env::var("GIF_FPS") {
            if let Ok(fps) = val.parse::<f64>() {
                self.fps = Some(fps);
            }
        }

        if let Ok(val) = env::var("GIF_READINESS_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.readiness.timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("GIF_READINESS_POLL_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.readiness.poll_interval_secs = secs;
            }
        }

        if let Ok(val) = env::var("FFMPEG_PATH") {
            if !val.is_empty() {
                self.tools.ffmpeg = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("FFPROBE_PATH") {
            if !val.is_empty() {
                self.tools.ffprobe = PathBuf::from(val);
            }
        }
    }

    /// Reject values that parse but cannot drive the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        let period = duration_from_secs(self.schedule_interval * 60.0)
            .filter(|d| !d.is_zero() && *d <= MAX_SCHEDULE_PERIOD);
        if period.is_none() {
            return Err(ConfigError::Invalid(format!(
                "schedule_interval must be a positive number of minutes up to one year, got {}",
                self.schedule_interval
            )));
        }

        if self.dither_options.is_empty() {
            return Err(ConfigError::Invalid(
                "dither_options must name at least one dither mode".to_string(),
            ));
        }

        if self.width == Some(0) {
            return Err(ConfigError::Invalid("width must be positive".to_string()));
        }

        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "fps must be a positive number, got {}",
                    fps
                )));
            }
        }

        let readiness = &self.readiness;
        if duration_from_secs(readiness.timeout_secs).is_none() {
            return Err(ConfigError::Invalid(format!(
                "readiness.timeout_secs must be a non-negative number of seconds, got {}",
                readiness.timeout_secs
            )));
        }
        if duration_from_secs(readiness.poll_interval_secs)
            .filter(|d| !d.is_zero())
            .is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "readiness.poll_interval_secs must be positive, got {}",
                readiness.poll_interval_secs
            )));
        }

        if self.tools.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "tools.timeout_secs must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Time between the starts of two scans
    ///
    /// Out-of-range intervals (rejected by `validate`) fall back to the default.
    pub fn schedule_period(&self) -> Duration {
        duration_from_secs(self.schedule_interval * 60.0)
            .filter(|d| !d.is_zero() && *d <= MAX_SCHEDULE_PERIOD)
            .unwrap_or_else(|| Duration::from_secs_f64(default_schedule_interval() * 60.0))
    }

    /// Load configuration from file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
