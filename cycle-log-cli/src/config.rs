//! Configuration loading and validation

use anyhow::{Context, Result};
use cycle_log_engine::{CompiledConfig, ConfigError, EngineConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.json or config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_folder_path")]
    pub folder_path: PathBuf,
    #[serde(default = "default_output_csv")]
    pub output_csv: PathBuf,
    #[serde(default)]
    pub rename_logs: bool,
    #[serde(default = "default_new_ext")]
    pub new_ext: String,
    #[serde(default = "default_log_extensions")]
    pub log_extensions: Vec<String>,
    #[serde(default)]
    pub csv_fields: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional file receiving a copy of all diagnostics
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub parallel_reads: bool,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

fn default_folder_path() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_output_csv() -> PathBuf {
    PathBuf::from("./results/output.csv")
}

fn default_new_ext() -> String {
    ".txt".to_string()
}

fn default_log_extensions() -> Vec<String> {
    vec![".log".to_string(), ".txt".to_string()]
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            folder_path: default_folder_path(),
            output_csv: default_output_csv(),
            rename_logs: false,
            new_ext: default_new_ext(),
            log_extensions: default_log_extensions(),
            csv_fields: Vec::new(),
            log_level: default_log_level(),
            log_file: None,
            parallel_reads: false,
            engine: EngineConfig::default(),
        }
    }
}

/// Problems specific to the application-level options
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("Invalid FOLDER_PATH: {0:?}")]
    InvalidFolder(PathBuf),

    #[error("Unknown LOG_LEVEL: {0}")]
    UnknownLogLevel(String),

    #[error("LOG_EXTENSIONS must contain at least one suffix")]
    NoExtensions,

    #[error("Missing or empty config key: {0}")]
    MissingKey(&'static str),

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

impl AppConfig {
    /// Level filter named by `LOG_LEVEL`
    pub fn level_filter(&self) -> Result<LevelFilter, AppConfigError> {
        parse_level(&self.log_level)
    }

    /// Check the application options and compile the engine configuration
    pub fn validate(&self) -> Result<CompiledConfig, AppConfigError> {
        if self.csv_fields.is_empty() {
            return Err(AppConfigError::MissingKey("CSV_FIELDS"));
        }
        if self.output_csv.as_os_str().is_empty() {
            return Err(AppConfigError::MissingKey("OUTPUT_CSV"));
        }
        if self.log_extensions.is_empty() {
            return Err(AppConfigError::NoExtensions);
        }
        self.level_filter()?;
        let compiled = self.engine.compile()?;
        if !self.folder_path.is_dir() {
            return Err(AppConfigError::InvalidFolder(self.folder_path.clone()));
        }
        Ok(compiled)
    }
}

/// Map the configured level name (Python-style names accepted) to a filter
pub fn parse_level(name: &str) -> Result<LevelFilter, AppConfigError> {
    match name.to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => Ok(LevelFilter::Error),
        "WARNING" | "WARN" => Ok(LevelFilter::Warn),
        "INFO" => Ok(LevelFilter::Info),
        "DEBUG" => Ok(LevelFilter::Debug),
        "TRACE" => Ok(LevelFilter::Trace),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(AppConfigError::UnknownLogLevel(name.to_string())),
    }
}

/// Load configuration from a JSON (or, by extension, TOML) file
///
/// Returns `None` when the file does not exist; the caller decides whether the
/// defaults are enough.
pub fn load_config(path: &Path) -> Result<Option<AppConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file: {:?}", path));
        }
    };

    let is_toml = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: AppConfig = if is_toml {
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config file: {:?}", path))?
    };

    Ok(Some(config))
}
