use crate::ColoringOption;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for the connectome viewer engines
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConnectomeConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Graph reconciliation defaults
    #[serde(default)]
    pub graph: GraphConfig,

    /// Image-stack sliding ring
    #[serde(default)]
    pub ring: RingConfig,

    /// Initial state of the viewer synchronizer pairs
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Show neighbours of the active neurons as individual cells instead of classes
    #[serde(default)]
    pub include_neighboring_cells_as_individual_cells: bool,

    /// Render annotation tags on edges
    #[serde(default)]
    pub include_annotations: bool,

    /// Include neurons born after embryogenesis
    #[serde(default = "default_true")]
    pub include_post_embryonic: bool,

    #[serde(default)]
    pub coloring: ColoringOption,

    /// Radius used to fan out the cells of a split class
    #[serde(default = "default_split_fanout_radius")]
    pub split_fanout_radius: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            include_neighboring_cells_as_individual_cells: false,
            include_annotations: false,
            include_post_embryonic: true,
            coloring: ColoringOption::default(),
            split_fanout_radius: default_split_fanout_radius(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RingConfig {
    /// Number of slices kept materialized
    #[serde(default = "default_ring_capacity")]
    pub capacity: usize,

    #[serde(default)]
    pub min: i64,

    #[serde(default = "default_ring_max")]
    pub max: i64,

    #[serde(default = "default_ring_start")]
    pub start_at: i64,

    /// Quiet period before layers are settled after scrolling (ms)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: default_ring_capacity(),
            min: 0,
            max: default_ring_max(),
            start_at: default_ring_start(),
            settle_ms: default_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub graph_instance_details: bool,
    #[serde(default = "default_true")]
    pub graph_three_d: bool,
    #[serde(default = "default_true")]
    pub three_d_em: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            graph_instance_details: true,
            graph_three_d: true,
            three_d_em: true,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_true() -> bool {
    true
}
fn default_split_fanout_radius() -> f64 {
    60.0
}
fn default_ring_capacity() -> usize {
    11
}
fn default_ring_max() -> i64 {
    714
}
fn default_ring_start() -> i64 {
    537
}
fn default_settle_ms() -> u64 {
    150
}

/// Configuration manager
pub struct ConfigManager {
    config: ConnectomeConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.connectome.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading connectome configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!("Config file: {}", path.display()),
            None => info!("Config file: NONE (using defaults)"),
        }
        info!(
            ring_capacity = config.ring.capacity,
            coloring = %config.graph.coloring,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load an explicit config file, still honouring environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".connectome.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .connectome.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.connectome.toml (current directory)
    /// 2. ~/.connectome/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(ConnectomeConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".connectome.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".connectome").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        info!("No config file found, using defaults");
        Ok((ConnectomeConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<ConnectomeConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: ConnectomeConfig) -> ConnectomeConfig {
        if let Ok(level) = std::env::var("CONNECTOME_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONNECTOME_LOG_FORMAT") {
            config.logging.format = format;
        }

        if let Some(v) = env_bool("CONNECTOME_INCLUDE_NEIGHBORING_CELLS_AS_INDIVIDUAL_CELLS") {
            config.graph.include_neighboring_cells_as_individual_cells = v;
        }
        if let Some(v) = env_bool("CONNECTOME_INCLUDE_ANNOTATIONS") {
            config.graph.include_annotations = v;
        }
        if let Some(v) = env_bool("CONNECTOME_INCLUDE_POST_EMBRYONIC") {
            config.graph.include_post_embryonic = v;
        }
        if let Ok(coloring) = std::env::var("CONNECTOME_COLORING") {
            match coloring.parse() {
                Ok(option) => config.graph.coloring = option,
                Err(e) => warn!("Ignoring CONNECTOME_COLORING: {}", e),
            }
        }

        if let Some(capacity) = env_parse("CONNECTOME_RING_CAPACITY") {
            config.ring.capacity = capacity;
        }
        if let Some(settle) = env_parse("CONNECTOME_RING_SETTLE_MS") {
            config.ring.settle_ms = settle;
        }

        config
    }

    /// Validate configuration
    fn validate_config(config: &ConnectomeConfig) -> Result<(), ConfigError> {
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        let ring = &config.ring;
        if ring.capacity < 3 {
            return Err(ConfigError::ValidationError(format!(
                "ring.capacity must be at least 3, got {}",
                ring.capacity
            )));
        }
        if ring.max - ring.min < 3 {
            return Err(ConfigError::ValidationError(format!(
                "ring extent [{}, {}] is too small",
                ring.min, ring.max
            )));
        }
        if ring.start_at < ring.min || ring.start_at > ring.max {
            return Err(ConfigError::ValidationError(format!(
                "ring.start_at {} is outside [{}, {}]",
                ring.start_at, ring.min, ring.max
            )));
        }

        if !(config.graph.split_fanout_radius.is_finite() && config.graph.split_fanout_radius >= 0.0)
        {
            return Err(ConfigError::ValidationError(
                "graph.split_fanout_radius must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }

    pub fn config(&self) -> &ConnectomeConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = ConnectomeConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring {}: not a boolean ({})", name, raw);
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}: cannot parse {}", name, raw);
            None
        }
    }
}
