//! Runtime settings for the scanner
//!
//! Layers, last one wins:
//! - built-in defaults
//! - optional TOML file (`HOSTSCAN_CONFIG`, else `<config_dir>/hostscan/settings.toml`)
//! - environment variables (`ENVIRONMENT`, `LOGGING_LEVEL`, `HOSTSCAN_*`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[serde(alias = "dev", alias = "test")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "test" => Some(Environment::Development),
            "prod" | "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    /// Root for data/ and collectors/; derived from the environment when unset
    pub data_dir: Option<PathBuf>,
    pub logging: LoggingSettings,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// debug | info | warning | error | critical
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub workers: usize,
    pub collector_timeout_secs: u64,
    /// Export after every scan when an exporter is configured
    pub export: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            data_dir: None,
            logging: LoggingSettings::default(),
            scan: ScanSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            collector_timeout_secs: 60,
            export: false,
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_secs)
    }
}

impl Settings {
    /// File + process environment. Never fails: a bad file or variable falls
    /// back to defaults and is reported in the returned warnings, which the
    /// caller logs once its subscriber is installed.
    pub fn load() -> (Self, Vec<String>) {
        Self::load_from(Self::config_file_path().as_deref(), std::env::vars())
    }

    pub fn load_from<I>(file: Option<&Path>, vars: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut warnings = Vec::new();
        let mut settings = match file {
            Some(path) if path.exists() => Self::from_file(path).unwrap_or_else(|e| {
                warnings.push(format!("Ignoring settings file {}: {}", path.display(), e));
                Self::default()
            }),
            _ => Self::default(),
        };
        warnings.extend(settings.apply_env(vars));
        (settings, warnings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HOSTSCAN_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()?;
        path.push("hostscan");
        path.push("settings.toml");
        Some(path)
    }

    /// Applies recognised variables; malformed values are skipped and reported
    pub fn apply_env<I>(&mut self, vars: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut warnings = Vec::new();
        for (key, value) in vars {
            match key.as_str() {
                "ENVIRONMENT" => match Environment::parse(&value) {
                    Some(env) => self.environment = env,
                    None => warnings.push(format!("Unknown ENVIRONMENT '{}', keeping {:?}", value, self.environment)),
                },
                "LOGGING_LEVEL" => self.logging.level = value,
                "HOSTSCAN_DATA_DIR" if !value.is_empty() => self.data_dir = Some(PathBuf::from(value)),
                "HOSTSCAN_WORKERS" => match value.parse::<usize>() {
                    Ok(n) if n > 0 => self.scan.workers = n,
                    _ => warnings.push(format!("Invalid HOSTSCAN_WORKERS '{}'", value)),
                },
                "HOSTSCAN_COLLECTOR_TIMEOUT_SECS" => match value.parse::<u64>() {
                    Ok(n) if n > 0 => self.scan.collector_timeout_secs = n,
                    _ => warnings.push(format!("Invalid HOSTSCAN_COLLECTOR_TIMEOUT_SECS '{}'", value)),
                },
                _ => {}
            }
        }
        warnings
    }

    /// `tracing` filter directive for the configured level
    pub fn log_filter(&self) -> &'static str {
        match self.logging.level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warning" | "warn" => "warn",
            "error" | "critical" => "error",
            _ => "info",
        }
    }
}
