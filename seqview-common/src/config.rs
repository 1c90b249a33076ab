//! Configuration loading and resolution
//!
//! Bootstrap configuration for the player. Every setting is resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SEQVIEW_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing default config file is not an error: the player logs a
//! warning and starts with defaults. An explicitly requested file that
//! cannot be read is an error.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Manifest location used when nothing else is configured
pub const DEFAULT_MANIFEST: &str = "images.json";
/// Playback rate of the animation loop
pub const DEFAULT_FPS: f64 = 9.0;
/// Rest on the last frame before the loop wraps
pub const DEFAULT_LAST_FRAME_HOLD_MS: u64 = 1000;
/// Re-arm delay of the playback tick (roughly one display refresh)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;
/// EventBus channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Accepted playback rates (one frame per 100 s up to 1000 fps)
pub const MIN_FPS: f64 = 0.01;
pub const MAX_FPS: f64 = 1000.0;
/// Longest accepted playback tick
pub const MAX_TICK_INTERVAL_MS: u64 = 1000;

pub const ENV_MANIFEST: &str = "SEQVIEW_MANIFEST";
pub const ENV_FPS: &str = "SEQVIEW_FPS";
pub const ENV_LAST_FRAME_HOLD_MS: &str = "SEQVIEW_LAST_FRAME_HOLD_MS";
pub const ENV_BUFFER_SIZE: &str = "SEQVIEW_BUFFER_SIZE";
pub const ENV_AUTOPLAY: &str = "SEQVIEW_AUTOPLAY";
pub const ENV_LOG_LEVEL: &str = "SEQVIEW_LOG_LEVEL";
pub const ENV_LOAD_TIMEOUT_MS: &str = "SEQVIEW_LOAD_TIMEOUT_MS";
pub const ENV_TICK_INTERVAL_MS: &str = "SEQVIEW_TICK_INTERVAL_MS";
pub const ENV_EVENT_CAPACITY: &str = "SEQVIEW_EVENT_CAPACITY";

/// How many frames the buffer keeps resident ahead of the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Load every frame up front (window = manifest length)
    All,
    /// Sliding window of N frames starting at the cursor
    Window(usize),
}

impl BufferPolicy {
    /// Window size for a manifest of `len` frames
    pub fn window_len(&self, len: usize) -> usize {
        match self {
            BufferPolicy::All => len,
            BufferPolicy::Window(n) => (*n).min(len),
        }
    }

    /// True for the sliding-window policy
    pub fn is_bounded(&self) -> bool {
        matches!(self, BufferPolicy::Window(_))
    }
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy::Window(20)
    }
}

impl std::fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferPolicy::All => write!(f, "all"),
            BufferPolicy::Window(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for BufferPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(BufferPolicy::All);
        }
        match s.parse::<usize>() {
            Ok(0) => Err(Error::Config("buffer_size must be at least 1".to_string())),
            Ok(n) => Ok(BufferPolicy::Window(n)),
            Err(_) => Err(Error::Config(format!(
                "buffer_size must be a positive integer or \"all\", got {:?}",
                s
            ))),
        }
    }
}

/// TOML accepts either `buffer_size = 20` or `buffer_size = "all"`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBufferPolicy {
    Count(usize),
    Keyword(String),
}

impl<'de> Deserialize<'de> for BufferPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawBufferPolicy::deserialize(deserializer)? {
            RawBufferPolicy::Count(0) => Err(serde::de::Error::custom(
                "buffer_size must be at least 1",
            )),
            RawBufferPolicy::Count(n) => Ok(BufferPolicy::Window(n)),
            RawBufferPolicy::Keyword(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for BufferPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            BufferPolicy::All => serializer.serialize_str("all"),
            BufferPolicy::Window(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Every key is optional; absent keys fall through to the compiled
/// defaults during resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Manifest URL or path
    #[serde(default)]
    pub manifest: Option<String>,

    /// Animation frames per second
    #[serde(default)]
    pub fps: Option<f64>,

    /// Hold time on the last frame of the loop
    #[serde(default)]
    pub last_frame_hold_ms: Option<u64>,

    /// Integer window size or "all"
    #[serde(default)]
    pub buffer_size: Option<BufferPolicy>,

    /// Playback tick re-arm delay
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,

    /// Start playing once the first buffer fill completes
    #[serde(default)]
    pub autoplay: Option<bool>,

    /// Per-frame load timeout (unset = wait forever)
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,

    /// EventBus channel capacity
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line
///
/// `None` means "not given"; resolution then consults the environment,
/// the TOML file and finally the compiled defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub manifest: Option<String>,
    pub fps: Option<f64>,
    pub last_frame_hold_ms: Option<u64>,
    pub buffer_size: Option<BufferPolicy>,
    pub autoplay: Option<bool>,
    pub load_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// Fully resolved player configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub manifest: String,
    pub fps: f64,
    pub last_frame_hold: Duration,
    pub buffer: BufferPolicy,
    pub tick_interval: Duration,
    pub autoplay: bool,
    pub load_timeout: Option<Duration>,
    pub event_capacity: usize,
    pub logging: LoggingConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            manifest: DEFAULT_MANIFEST.to_string(),
            fps: DEFAULT_FPS,
            last_frame_hold: Duration::from_millis(DEFAULT_LAST_FRAME_HOLD_MS),
            buffer: BufferPolicy::default(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            autoplay: true,
            load_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            logging: LoggingConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Regular per-frame hold (1 / fps)
    ///
    /// Saturates for rates `validate()` would reject.
    pub fn frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::MAX)
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FPS..=MAX_FPS).contains(&self.fps) {
            return Err(Error::Config(format!(
                "fps must be between {} and {}, got {}",
                MIN_FPS, MAX_FPS, self.fps
            )));
        }
        if self.manifest.trim().is_empty() {
            return Err(Error::Config("manifest location is empty".to_string()));
        }
        if let BufferPolicy::Window(0) = self.buffer {
            return Err(Error::Config("buffer_size must be at least 1".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick_interval_ms must be at least 1".to_string()));
        }
        if self.tick_interval > Duration::from_millis(MAX_TICK_INTERVAL_MS) {
            return Err(Error::Config(format!(
                "tick_interval_ms must be at most {}",
                MAX_TICK_INTERVAL_MS
            )));
        }
        if self.load_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config("load_timeout_ms must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Resolves a PlayerConfig from CLI, environment, TOML and defaults
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// `explicit_path` comes from `--config`; when absent the platform
    /// default locations are searched.
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Load the TOML layer
    ///
    /// Explicit path: must exist and parse. Default locations: missing
    /// file yields an empty config with a warning.
    pub fn load_toml(&self) -> Result<TomlConfig> {
        if let Some(path) = &self.explicit_path {
            info!("Loading configuration from {}", path.display());
            return TomlConfig::load(path);
        }

        match default_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::load(&path)
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Ok(TomlConfig::default())
            }
        }
    }

    /// Resolve every setting in priority order and validate the result
    pub fn resolve(&self, cli: &ConfigOverrides) -> Result<PlayerConfig> {
        let toml = self.load_toml()?;
        let defaults = PlayerConfig::default();

        let manifest = cli
            .manifest
            .clone()
            .or(env_value(ENV_MANIFEST))
            .or(toml.manifest)
            .unwrap_or(defaults.manifest);

        let fps = match cli.fps {
            Some(fps) => fps,
            None => env_parsed::<f64>(ENV_FPS)?.or(toml.fps).unwrap_or(defaults.fps),
        };

        let last_frame_hold = match cli.last_frame_hold_ms {
            Some(ms) => Duration::from_millis(ms),
            None => env_parsed::<u64>(ENV_LAST_FRAME_HOLD_MS)?
                .or(toml.last_frame_hold_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.last_frame_hold),
        };

        let buffer = match cli.buffer_size {
            Some(policy) => policy,
            None => match env_value(ENV_BUFFER_SIZE) {
                Some(raw) => raw.parse::<BufferPolicy>()?,
                None => toml.buffer_size.unwrap_or(defaults.buffer),
            },
        };

        let autoplay = match cli.autoplay {
            Some(autoplay) => autoplay,
            None => env_parsed::<bool>(ENV_AUTOPLAY)?
                .or(toml.autoplay)
                .unwrap_or(defaults.autoplay),
        };

        let load_timeout = match cli.load_timeout_ms {
            Some(ms) => Some(ms),
            None => env_parsed::<u64>(ENV_LOAD_TIMEOUT_MS)?.or(toml.load_timeout_ms),
        }
        .map(Duration::from_millis);

        let tick_interval = env_parsed::<u64>(ENV_TICK_INTERVAL_MS)?
            .or(toml.tick_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let event_capacity = env_parsed::<usize>(ENV_EVENT_CAPACITY)?
            .or(toml.event_capacity)
            .unwrap_or(defaults.event_capacity);

        let mut logging = toml.logging;
        if let Some(level) = cli.log_level.clone().or(env_value(ENV_LOG_LEVEL)) {
            logging.level = level;
        }

        let config = PlayerConfig {
            manifest,
            fps,
            last_frame_hold,
            buffer,
            tick_interval,
            autoplay,
            load_timeout,
            event_capacity,
            logging,
        };

        config.validate()?;
        debug!(?config, "Configuration resolved");
        Ok(config)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        None => Ok(None),
    }
}

/// First existing config file among the platform default locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("seqview").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/seqview/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_policy_from_str() {
        assert_eq!("all".parse::<BufferPolicy>().unwrap(), BufferPolicy::All);
        assert_eq!("ALL".parse::<BufferPolicy>().unwrap(), BufferPolicy::All);
        assert_eq!("10".parse::<BufferPolicy>().unwrap(), BufferPolicy::Window(10));
        assert!("0".parse::<BufferPolicy>().is_err());
        assert!("lots".parse::<BufferPolicy>().is_err());
    }

    #[test]
    fn test_buffer_policy_window_len() {
        assert_eq!(BufferPolicy::All.window_len(75), 75);
        assert_eq!(BufferPolicy::Window(20).window_len(75), 20);
        assert_eq!(BufferPolicy::Window(20).window_len(3), 3);
        assert!(BufferPolicy::Window(1).is_bounded());
        assert!(!BufferPolicy::All.is_bounded());
    }

    #[test]
    fn test_toml_buffer_size_forms() {
        let config = TomlConfig::from_toml_str("buffer_size = 10").unwrap();
        assert_eq!(config.buffer_size, Some(BufferPolicy::Window(10)));

        let config = TomlConfig::from_toml_str("buffer_size = \"all\"").unwrap();
        assert_eq!(config.buffer_size, Some(BufferPolicy::All));

        assert!(TomlConfig::from_toml_str("buffer_size = 0").is_err());
        assert!(TomlConfig::from_toml_str("buffer_size = \"some\"").is_err());
    }

    #[test]
    fn test_toml_logging_defaults() {
        let config = TomlConfig::from_toml_str("fps = 12.0").unwrap();
        assert_eq!(config.fps, Some(12.0));
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());

        let config = TomlConfig::from_toml_str("[logging]\nlevel = \"debug\"").unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_frame_interval_from_fps() {
        let config = PlayerConfig {
            fps: 10.0,
            ..PlayerConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PlayerConfig::default().validate().is_ok());

        let config = PlayerConfig {
            fps: 0.0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            fps: f64::NAN,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            manifest: "  ".to_string(),
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        // Tiny rates would overflow the frame interval
        let config = PlayerConfig {
            fps: 1e-300,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.frame_interval(), Duration::MAX);

        let config = PlayerConfig {
            fps: 5000.0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            tick_interval: Duration::from_millis(u64::MAX),
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            load_timeout: Some(Duration::ZERO),
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            load_timeout: Some(Duration::from_millis(1)),
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
