use crate::labels::{default_labels, ClassLabelTable, LabelError};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub model: ModelSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl ServerSettings {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    #[serde(default = "default_warmup")]
    pub warmup: bool,
}

fn default_warmup() -> bool {
    true
}

impl ModelSettings {
    pub fn label_table(&self) -> Result<ClassLabelTable, LabelError> {
        ClassLabelTable::new(self.labels.clone())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Model file not found: {:?}", self.path));
        }
        self.label_table().map(|_| ()).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitSettings {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    pub inference_timeout_ms: Option<u64>,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            inference_timeout_ms: None,
        }
    }
}

impl LimitSettings {
    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if self.limits.max_upload_bytes == 0 {
            return Err("limits.max_upload_bytes must be non-zero".to_string());
        }
        if tracing::Level::from_str(&self.log.level).is_err() {
            return Err(format!("unknown log level: {}", self.log.level));
        }
        self.model.validate()
    }
}

/// Loads `configuration/base.yaml`, the file of the environment named by
/// `APP_ENVIRONMENT`, then `APP_`-prefixed environment variables.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    load_from(&base_path.join("configuration"), environment)
}

pub fn load_from(
    configuration_directory: &Path,
    environment: Environment,
) -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings
        .validate()
        .map_err(|e| config::ConfigError::Message(format!("Configuration validation failed: {}", e)))?;

    Ok(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
