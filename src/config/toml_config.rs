use crate::adapters::http::DEFAULT_EXTRACT_PATH;
use crate::core::batch::MAX_BATCH_FILES;
use crate::core::export::DEFAULT_EXPORT_FILENAME;
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::logger::LOG_LEVELS;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub endpoint: String,
    #[serde(default = "default_extract_path")]
    pub extract_path: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_export_filename")]
    pub filename: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub download_signatures: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            filename: default_export_filename(),
            formats: default_formats(),
            download_signatures: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Level for this crate's log events when `RUST_LOG` is unset.
    pub log_level: Option<String>,
}

fn default_extract_path() -> String {
    DEFAULT_EXTRACT_PATH.to_string()
}

fn default_max_files() -> usize {
    MAX_BATCH_FILES
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_export_filename() -> String {
    DEFAULT_EXPORT_FILENAME.to_string()
}

fn default_formats() -> Vec<String> {
    vec!["xlsx".to_string()]
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn service_endpoint(&self) -> &str {
        &self.service.endpoint
    }

    fn extract_path(&self) -> &str {
        &self.service.extract_path
    }

    fn request_headers(&self) -> Option<&HashMap<String, String>> {
        self.service.headers.as_ref()
    }

    fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    fn max_files(&self) -> usize {
        self.batch.max_files
    }

    fn allowed_extensions(&self) -> &[String] {
        &self.batch.allowed_extensions
    }

    fn output_path(&self) -> &str {
        &self.export.output_path
    }

    fn export_filename(&self) -> &str {
        &self.export.filename
    }

    fn export_formats(&self) -> &[String] {
        &self.export.formats
    }

    fn download_signatures(&self) -> bool {
        self.export.download_signatures
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("service.endpoint", &self.service.endpoint)?;
        validation::validate_extract_path("service.extract_path", &self.service.extract_path)?;
        if let Some(timeout) = self.service.timeout_seconds {
            validation::validate_range("service.timeout_seconds", timeout, 1, 3600)?;
        }
        validation::validate_range("batch.max_files", self.batch.max_files, 1, MAX_BATCH_FILES)?;
        if self.batch.allowed_extensions.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "batch.allowed_extensions".to_string(),
            });
        }
        validation::validate_path("export.output_path", &self.export.output_path)?;
        validation::validate_non_empty_string("export.filename", &self.export.filename)?;
        validation::validate_export_formats("export.formats", &self.export.formats)?;
        if let Some(level) = self.log_level() {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "monitoring.log_level".to_string(),
                    value: level.to_string(),
                    reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
                });
            }
        }
        Ok(())
    }
}
