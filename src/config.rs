//! Configuration system for Haptic Link
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (HAPTIC_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::haptics::HapticSettings;

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "haptic-link.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Device server connection settings
    pub server: ServerSettings,

    /// Haptic feedback settings
    pub haptics: HapticSettings,

    /// Simulated device server used by `simulate`
    pub simulator: SimulatorSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Device server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Device server WebSocket URL
    pub url: String,

    /// Name announced to the server
    pub client_name: String,

    /// Connect as soon as the application starts
    pub auto_connect: bool,
}

/// Simulated device server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Number of devices announced once scanning starts
    pub devices: usize,

    /// Round-trip latency of every call in milliseconds
    pub latency_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:12345".to_string(),
            client_name: "Haptic Link".to_string(),
            auto_connect: false,
        }
    }
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            devices: 1,
            latency_ms: 25,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl LinkConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_unvalidated(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load file and environment layers, leaving validation to the caller
    ///
    /// Used when command-line flags still have to be applied on top.
    pub fn load_unvalidated(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.expand_paths();

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })?;
        info!(path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            // Current directory
            Some(PathBuf::from(LOCAL_CONFIG_FILE)),
            // User config directory
            dirs::config_dir().map(|p| p.join("haptic-link").join("config.toml")),
            // Home directory
            dirs::home_dir().map(|p| p.join(".haptic-link").join("config.toml")),
        ];

        for path in search_paths.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server settings
        if let Ok(val) = std::env::var("HAPTIC_SERVER_URL") {
            self.server.url = val;
        }
        if let Ok(val) = std::env::var("HAPTIC_CLIENT_NAME") {
            self.server.client_name = val;
        }
        if let Some(flag) = env_flag("HAPTIC_AUTO_CONNECT") {
            self.server.auto_connect = flag;
        }

        // Haptic settings
        if let Some(flag) = env_flag("HAPTIC_ENABLED") {
            self.haptics.enabled = flag;
        }
        if let Some(flag) = env_flag("HAPTIC_PREVIEW_ENABLED") {
            self.haptics.preview_enabled = flag;
        }
        if let Some(mode) = env_parse("HAPTIC_PULSE_MODE") {
            self.haptics.pulse_mode = mode;
        }
        if let Some(n) = env_parse("HAPTIC_PULSE_LENGTH_MS") {
            self.haptics.pulse_length_ms = n;
        }
        if let Some(mode) = env_parse("HAPTIC_STRENGTH_MODE") {
            self.haptics.strength_mode = mode;
        }
        if let Some(n) = env_parse("HAPTIC_MAX_STRENGTH") {
            self.haptics.max_strength = n;
        }
        if let Some(n) = env_parse("HAPTIC_MIN_STRENGTH") {
            self.haptics.min_strength = n;
        }
        if let Some(n) = env_parse("HAPTIC_TICK_INTERVAL_MS") {
            self.haptics.tick_interval_ms = n;
        }

        // Simulator settings
        if let Some(n) = env_parse("HAPTIC_SIM_DEVICES") {
            self.simulator.devices = n;
        }
        if let Some(n) = env_parse("HAPTIC_SIM_LATENCY_MS") {
            self.simulator.latency_ms = n;
        }

        // Logging settings
        if let Ok(val) = std::env::var("HAPTIC_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("HAPTIC_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Some(flag) = env_flag("HAPTIC_LOG_JSON") {
            self.logging.json_format = flag;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server_url()?;

        if self.server.client_name.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "server.client_name",
                "client name cannot be empty",
            ));
        }

        let haptics = &self.haptics;
        if haptics.max_strength > 100 {
            return Err(Error::config_field_invalid(
                "haptics.max_strength",
                "max_strength must be between 0 and 100",
            ));
        }
        if haptics.min_strength > haptics.max_strength {
            return Err(Error::config_field_invalid(
                "haptics.min_strength",
                "min_strength cannot exceed max_strength",
            ));
        }
        if haptics.pulse_length_ms == 0 {
            return Err(Error::config_field_invalid(
                "haptics.pulse_length_ms",
                "pulse_length_ms must be greater than 0",
            ));
        }
        if haptics.tick_interval_ms == 0 {
            return Err(Error::config_field_invalid(
                "haptics.tick_interval_ms",
                "tick_interval_ms must be greater than 0",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// The device server address
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server.url).map_err(|e| {
            Error::config_field_invalid("server.url", format!("'{}': {}", self.server.url, e))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config_field_invalid(
                "server.url",
                "Server URL must start with ws:// or wss://",
            ));
        }
        Ok(url)
    }

    /// Serialize the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Read a boolean environment variable
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|val| val.to_lowercase() == "true" || val == "1")
}

/// Read and parse an environment variable, ignoring bad values
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let val = std::env::var(name).ok()?;
    match val.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = name, value = %val, "Ignoring invalid environment override");
            None
        }
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for a new configuration file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haptic-link")
        .join("config.toml")
}

/// Initialize a new configuration file, returning where it was written
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Haptic Link Configuration

[server]
# Device server WebSocket URL
url = "ws://127.0.0.1:12345"

# Name announced to the device server
client_name = "Haptic Link"

# Connect as soon as the application starts
auto_connect = false

[haptics]
# Master switch for note pulses
enabled = true

# Pulse once at max strength when settings are previewed
preview_enabled = false

# Which notes pulse: disabled, note-miss, note-hit, every-note
pulse_mode = "note-miss"

# Length of one pulse in milliseconds
pulse_length_ms = 300

# What scales the strength: disabled, battery, inverse-battery, song-time
strength_mode = "battery"

# Strength range in percent (0-100)
max_strength = 100
min_strength = 0

# Interval between pulse updates in milliseconds
tick_interval_ms = 20

[simulator]
# Devices announced by the simulated server
devices = 1

# Simulated round-trip latency in milliseconds
latency_ms = 25

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.haptic-link/logs/haptic-link.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
