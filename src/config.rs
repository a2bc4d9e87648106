use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const DEFAULT_UPLOAD_FIELD: &str = "videos";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub upload_field: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Reject non-numeric parameters instead of sending them as null.
    #[serde(default)]
    pub strict_parameters: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub upload_field: String,
    pub strict_parameters: bool,
    pub log_level: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_from(&base_dir.join("config.toml"))
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        let config_file = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            Some(toml::from_str::<ConfigFile>(&content)?)
        } else {
            None
        };

        Ok(Self::resolve(config_file, |key| std::env::var(key).ok()))
    }

    /// Env vars override the config file, which overrides the defaults.
    pub fn resolve(config_file: Option<ConfigFile>, env: impl Fn(&str) -> Option<String>) -> Self {
        let file = config_file.unwrap_or_default();
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let api_base = lookup("API_BASE")
            .or(file.service.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let upload_field = lookup("UPLOAD_FIELD")
            .or(file.service.upload_field)
            .unwrap_or_else(|| DEFAULT_UPLOAD_FIELD.to_string());

        let strict_parameters = lookup("STRICT_PARAMETERS")
            .and_then(|v| parse_bool(&v))
            .or(file.submission.strict_parameters)
            .unwrap_or(false);

        let log_level = lookup("LOG_LEVEL")
            .or(file.logging.log_level)
            .unwrap_or_else(|| "info".to_string());

        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_field,
            strict_parameters,
            log_level,
        }
    }

    pub fn from_env() -> Self {
        Self::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_field: DEFAULT_UPLOAD_FIELD.to_string(),
            strict_parameters: false,
            log_level: "info".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
