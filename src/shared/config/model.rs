use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub memory: MemoryConfig,
    pub execution: ExecutionConfig,
    pub spill: SpillConfig,
    pub exchange: ExchangeConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            stdout_level: "info".into(),
            file_level: "debug".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Limit on the root memory context of one task, in bytes.
    pub query_max_memory_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            query_max_memory_bytes: 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_page_positions: usize,
    pub max_page_bytes: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_page_positions: 1024,
            max_page_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpillConfig {
    pub enabled: bool,
    pub paths: Vec<String>,
    /// Fraction of a filesystem that may be in use before a path is skipped.
    pub max_used_space_threshold: f64,
    pub compression: bool,
    pub encryption: bool,
    pub cleanup_on_startup: bool,
}

impl Default for SpillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: vec!["spill".into()],
            max_used_space_threshold: 0.9,
            compression: false,
            encryption: false,
            cleanup_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Fetching pauses while the client buffers more than this.
    pub max_buffered_bytes: u64,
    /// Upper bound requested per transport round trip.
    pub max_response_bytes: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: 32 * 1024 * 1024,
            max_response_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// Also write captured states to `dir`, one file per operator per snapshot.
    pub persist: bool,
    pub dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            persist: false,
            dir: "snapshots".into(),
        }
    }
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("SNAPFLOW_CONFIG").unwrap_or_else(|_| "config".to_string());

    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(&config_path).required(false))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
